use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use triage_common::{FetchResult, JobMode, RunConfig, ValidationError, WorkItem, Worklist};

use crate::aggregator::{merge_overall, merge_per_ticket};
use crate::analysis_phase::{self, AnalysisExit};
use crate::control::{RunHandle, RunPhase};
use crate::departments::prepare_cache;
use crate::events::{NoopObserver, RunEvent, RunObserver};
use crate::fetch_phase;
use crate::outcome::{RunOutcome, RunReport, RunSummary};
use crate::simulate::SimulatedAnalyzer;
use crate::state::RunState;
use crate::traits::{TicketAnalyzer, TicketFetcher};

/// Interval of the progress ticker while analysis runs.
pub const PROGRESS_TICK: Duration = Duration::from_secs(1);

/// Collaborators for a [`BatchController`]. A fetcher is only needed for
/// identifier worklists; an analyzer only outside simulate mode.
#[derive(Clone, TypedBuilder)]
pub struct PipelineDeps {
    #[builder(default, setter(strip_option))]
    pub fetcher: Option<Arc<dyn TicketFetcher>>,
    #[builder(default, setter(strip_option))]
    pub analyzer: Option<Arc<dyn TicketAnalyzer>>,
    #[builder(default = Arc::new(NoopObserver) as Arc<dyn RunObserver>)]
    pub observer: Arc<dyn RunObserver>,
    /// Where department names are persisted between runs.
    #[builder(default, setter(strip_option, into))]
    pub department_cache: Option<PathBuf>,
}

/// Drives one batch at a time: validation, fetch phase, analysis phase,
/// aggregation. Pause/resume/cancel go through [`RunHandle`].
pub struct BatchController {
    deps: PipelineDeps,
    handle: RunHandle,
}

impl BatchController {
    pub fn new(deps: PipelineDeps) -> Self {
        Self {
            deps,
            handle: RunHandle::new(),
        }
    }

    pub fn handle(&self) -> RunHandle {
        self.handle.clone()
    }

    /// Run in the background. Control the run through [`Self::handle`].
    pub fn start(
        self: Arc<Self>,
        worklist: Worklist,
        config: RunConfig,
    ) -> JoinHandle<Result<RunSummary, ValidationError>> {
        tokio::spawn(async move { self.run(worklist, &config).await })
    }

    pub async fn run(
        &self,
        worklist: Worklist,
        config: &RunConfig,
    ) -> Result<RunSummary, ValidationError> {
        config.validate(&worklist)?;

        let extract = worklist.is_extract();
        let fetcher = match (&self.deps.fetcher, extract) {
            (_, true) => None,
            (Some(fetcher), false) => Some(fetcher.clone()),
            (None, false) => return Err(ValidationError::MissingBackendCredentials),
        };
        let analyzer: Arc<dyn TicketAnalyzer> = match (&self.deps.analyzer, config.simulate) {
            (_, true) => Arc::new(SimulatedAnalyzer),
            (Some(analyzer), false) => analyzer.clone(),
            (None, false) => return Err(ValidationError::MissingAiCredentials),
        };

        let items = worklist.into_items();
        self.handle.reset(items.len());
        let mut state = RunState::new(config.job_mode, config.simulate, items.len());

        info!(
            run_id = %state.run_id,
            mode = %config.job_mode,
            tickets = items.len(),
            extract,
            simulate = config.simulate,
            "Starting triage run"
        );

        state.cache = prepare_cache(
            &items,
            extract,
            fetcher.as_deref(),
            self.deps.department_cache.as_deref(),
        )
        .await;

        // Phase 1: acquisition
        match fetcher {
            None => {
                state.fetched = from_extract(items);
                self.handle.set_fetched(state.fetched.len());
            }
            Some(fetcher) => {
                self.handle.set_phase(RunPhase::Fetching);
                let completed = fetch_phase::run(
                    fetcher.as_ref(),
                    &items,
                    config.extraction_profile,
                    config.api_delay,
                    &self.handle,
                    self.deps.observer.as_ref(),
                    &mut state.fetched,
                )
                .await;
                if !completed {
                    let partial = state.partial();
                    return Ok(self.finish(state, RunOutcome::Cancelled { partial }));
                }
            }
        }

        if state.valid_count() == 0 {
            warn!(run_id = %state.run_id, "No valid ticket data to analyze");
            return Ok(self.finish(state, RunOutcome::NoValidData));
        }

        // Phase 2: analysis
        self.handle.set_phase(RunPhase::Analyzing);
        let analysis_total = match config.job_mode {
            JobMode::PerTicket => state.fetched.len(),
            JobMode::Overall => 1,
        };
        self.handle.set_total(analysis_total);
        let _ticker = self.spawn_ticker(!extract, state.fetched.len(), analysis_total);

        let outcome = match config.job_mode {
            JobMode::PerTicket => {
                let exit = analysis_phase::per_ticket(
                    analyzer.as_ref(),
                    &config.taxonomy,
                    &self.handle,
                    self.deps.observer.as_ref(),
                    &mut state,
                )
                .await;
                match exit {
                    AnalysisExit::Completed => RunOutcome::Completed(RunReport::PerTicket(
                        merge_per_ticket(&state.fetched, &state.analyzed, &state.cache),
                    )),
                    other => self.stopped(other, &state),
                }
            }
            JobMode::Overall => {
                let Some(prompt) = config.prompt.as_ref() else {
                    return Err(ValidationError::MissingPrompt);
                };
                let exit = analysis_phase::overall(
                    analyzer.as_ref(),
                    prompt,
                    &config.dataset_name,
                    config.simulate,
                    &self.handle,
                    self.deps.observer.as_ref(),
                    &mut state,
                )
                .await;
                match (exit, state.overall.clone()) {
                    (AnalysisExit::Completed, Some(analysis)) => RunOutcome::Completed(
                        RunReport::Overall(merge_overall(prompt, analysis, &state.fetched, &state.cache)),
                    ),
                    (AnalysisExit::Completed, None) => RunOutcome::FatalFallback {
                        message: "Overall analysis produced no result".to_string(),
                        partial: state.partial(),
                    },
                    (other, _) => self.stopped(other, &state),
                }
            }
        };

        Ok(self.finish(state, outcome))
    }

    /// Outcome for an analysis phase that did not complete.
    fn stopped(&self, exit: AnalysisExit, state: &RunState) -> RunOutcome {
        match exit {
            AnalysisExit::Cancelled => RunOutcome::Cancelled {
                partial: state.partial(),
            },
            AnalysisExit::Fatal(message) => RunOutcome::FatalFallback {
                message,
                partial: state.partial(),
            },
            AnalysisExit::PayloadTooLarge { token_count, limit } => {
                RunOutcome::PayloadTooLarge { token_count, limit }
            }
            AnalysisExit::Completed => RunOutcome::FatalFallback {
                message: "Analysis finished without a report".to_string(),
                partial: state.partial(),
            },
        }
    }

    fn finish(&self, mut state: RunState, outcome: RunOutcome) -> RunSummary {
        state.tally();
        state.stats.finish();

        let phase = match outcome {
            RunOutcome::Cancelled { .. } => RunPhase::Cancelled,
            _ => RunPhase::Done,
        };
        self.handle.set_phase(phase);

        let event = match &outcome {
            RunOutcome::Completed(report) => RunEvent::Completed(report.clone()),
            RunOutcome::Cancelled { .. } => RunEvent::Cancelled,
            RunOutcome::FatalFallback { message, partial } => RunEvent::FatalFallback {
                message: message.clone(),
                partial: partial.clone(),
            },
            RunOutcome::PayloadTooLarge { token_count, limit } => RunEvent::PayloadTooLarge {
                token_count: *token_count,
                limit: *limit,
            },
            RunOutcome::NoValidData => RunEvent::NoValidData,
        };
        self.deps.observer.on_event(event);

        info!(run_id = %state.run_id, phase = %phase, "{}", state.stats);

        RunSummary {
            run_id: state.run_id,
            outcome,
            stats: state.stats,
        }
    }

    /// Emit progress every second while analysis runs. Stops when the
    /// returned guard is dropped.
    fn spawn_ticker(&self, fetched_phase: bool, fetch_total: usize, analysis_total: usize) -> TickerGuard {
        let handle = self.handle.clone();
        let observer = self.deps.observer.clone();
        TickerGuard(tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_TICK);
            interval.tick().await;
            loop {
                interval.tick().await;
                if fetched_phase {
                    observer.on_event(RunEvent::FetchProgress {
                        done: handle.fetched(),
                        total: fetch_total,
                    });
                }
                observer.on_event(RunEvent::AnalysisProgress {
                    done: handle.analyzed(),
                    total: analysis_total,
                });
            }
        }))
    }
}

struct TickerGuard(JoinHandle<()>);

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Extract records skip the fetch phase and go straight to analysis.
fn from_extract(items: Vec<WorkItem>) -> Vec<FetchResult> {
    items
        .into_iter()
        .map(|item| match item.record {
            Some(record) => FetchResult::fetched(item.index, item.ticket_id, record),
            None => FetchResult::failed(item.index, item.ticket_id, "Extract entry has no ticket data"),
        })
        .collect()
}
