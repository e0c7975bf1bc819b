use chrono::{DateTime, Utc};
use serde::Serialize;

use ai_client::TokenUsage;
use triage_common::JobMode;

/// Stats from one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub job_mode: JobMode,
    pub simulated: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub worklist_size: usize,
    pub tickets_fetched: usize,
    pub fetch_errors: usize,
    pub tickets_analyzed: usize,
    pub analysis_errors: usize,
    pub tokens: TokenUsage,
}

impl RunStats {
    pub fn new(job_mode: JobMode, simulated: bool, worklist_size: usize) -> Self {
        Self {
            job_mode,
            simulated,
            started_at: Utc::now(),
            finished_at: None,
            worklist_size,
            tickets_fetched: 0,
            fetch_errors: 0,
            tickets_analyzed: 0,
            analysis_errors: 0,
            tokens: TokenUsage::default(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_secs(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Triage Run Complete ===")?;
        writeln!(f, "Mode:              {}{}", self.job_mode, if self.simulated { " (simulated)" } else { "" })?;
        writeln!(f, "Duration:          {:.1}s", self.duration_secs())?;
        writeln!(f, "Worklist:          {}", self.worklist_size)?;
        writeln!(f, "Tickets fetched:   {}", self.tickets_fetched)?;
        writeln!(f, "Fetch errors:      {}", self.fetch_errors)?;
        writeln!(f, "Analyzed:          {}", self.tickets_analyzed)?;
        writeln!(f, "Analysis errors:   {}", self.analysis_errors)?;
        writeln!(f, "\nTokens:")?;
        writeln!(f, "  Input:  {}", self.tokens.input)?;
        writeln!(f, "  Output: {}", self.tokens.output)?;
        write!(f, "  Total:  {}", self.tokens.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_counts_and_tokens() {
        let mut stats = RunStats::new(JobMode::PerTicket, false, 12);
        stats.tickets_fetched = 11;
        stats.fetch_errors = 1;
        stats.tokens = TokenUsage::new(900, 100);
        stats.finish();
        let text = stats.to_string();
        assert!(text.contains("Worklist:          12"));
        assert!(text.contains("Fetch errors:      1"));
        assert!(text.contains("Total:  1000"));
    }

    #[test]
    fn duration_never_negative() {
        let stats = RunStats::new(JobMode::Overall, true, 0);
        assert!(stats.duration_secs() >= 0.0);
    }
}
