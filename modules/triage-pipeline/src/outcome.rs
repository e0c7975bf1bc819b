use serde::Serialize;
use uuid::Uuid;

use triage_common::{AnalysisResult, FetchResult, OverallReport, TicketReport};

use crate::stats::RunStats;

/// Reportable output of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "report", rename_all = "kebab-case")]
pub enum RunReport {
    PerTicket(Vec<TicketReport>),
    Overall(OverallReport),
}

/// Everything acquired before a run stopped early, for manual follow-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartialData {
    pub fetched: Vec<FetchResult>,
    pub analyzed: Vec<AnalysisResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(RunReport),
    Cancelled { partial: PartialData },
    /// The AI backend became unusable; automated analysis stopped.
    FatalFallback { message: String, partial: PartialData },
    /// Pre-flight count says the dataset does not fit the model.
    PayloadTooLarge { token_count: u64, limit: u64 },
    /// Nothing left to analyze after acquisition.
    NoValidData,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    pub fn partial(&self) -> Option<&PartialData> {
        match self {
            RunOutcome::Cancelled { partial } | RunOutcome::FatalFallback { partial, .. } => {
                Some(partial)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub stats: RunStats,
}
