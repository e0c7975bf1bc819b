use uuid::Uuid;

use ai_client::FileHandle;
use triage_common::{AnalysisResult, CompanyCache, FetchResult, JobMode, OverallAnalysis};

use crate::outcome::PartialData;
use crate::stats::RunStats;

/// Accumulated data for the active run. Owned by the controller's run loop
/// and passed by `&mut` into each phase; dropped when the run returns.
pub(crate) struct RunState {
    pub run_id: Uuid,
    pub fetched: Vec<FetchResult>,
    pub analyzed: Vec<AnalysisResult>,
    pub overall: Option<OverallAnalysis>,
    /// Remote copy of the dataset, overall mode only. Must be released
    /// before the run returns.
    pub dataset: Option<FileHandle>,
    pub cache: CompanyCache,
    pub stats: RunStats,
}

impl RunState {
    pub fn new(job_mode: JobMode, simulated: bool, worklist_size: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            fetched: Vec::with_capacity(worklist_size),
            analyzed: Vec::new(),
            overall: None,
            dataset: None,
            cache: CompanyCache::new(),
            stats: RunStats::new(job_mode, simulated, worklist_size),
        }
    }

    pub fn valid_count(&self) -> usize {
        self.fetched.iter().filter(|f| !f.is_error()).count()
    }

    /// Snapshot of everything acquired so far.
    pub fn partial(&self) -> PartialData {
        PartialData {
            fetched: self.fetched.clone(),
            analyzed: self.analyzed.clone(),
        }
    }

    /// Fill the counters that are derived from the accumulated results.
    pub fn tally(&mut self) {
        self.stats.tickets_fetched = self.fetched.len();
        self.stats.fetch_errors = self.fetched.iter().filter(|f| f.is_error()).count();
        match &self.overall {
            Some(overall) => {
                self.stats.tickets_analyzed = usize::from(overall.succeeded);
                self.stats.analysis_errors = usize::from(!overall.succeeded);
            }
            None => {
                self.stats.tickets_analyzed =
                    self.analyzed.iter().filter(|a| a.analysis().is_some()).count();
                self.stats.analysis_errors = self.analyzed.len() - self.stats.tickets_analyzed;
            }
        }
    }
}
