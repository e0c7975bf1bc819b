//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use triage_common::{AnalysisPrompt, BackendCredentials, JobMode, RunConfig, Taxonomy};
use triage_pipeline::{BatchController, EventLog, PipelineDeps, RunHandle, TicketAnalyzer, TicketFetcher};

pub const PROMPT_TEXT: &str = "Group these tickets by root cause.";

pub fn backend() -> BackendCredentials {
    BackendCredentials {
        domain: "acme.freshservice.com".to_string(),
        api_key: "abc123XYZ".to_string(),
    }
}

pub fn taxonomy() -> Taxonomy {
    Taxonomy::new("Billing\nReporting", "Refunds\nExports")
}

pub fn prompt() -> AnalysisPrompt {
    AnalysisPrompt {
        id: "root-cause".to_string(),
        name: "Root cause".to_string(),
        prompt: PROMPT_TEXT.to_string(),
    }
}

/// Per-ticket run against live-looking credentials, no fetch delay.
pub fn per_ticket_config() -> RunConfig {
    RunConfig::builder()
        .job_mode(JobMode::PerTicket)
        .backend(Some(backend()))
        .gemini_api_key(Some("gemini-key".to_string()))
        .model(Some("gemini-2.0-flash".to_string()))
        .api_delay(Duration::ZERO)
        .taxonomy(taxonomy())
        .build()
}

pub fn overall_config() -> RunConfig {
    RunConfig::builder()
        .job_mode(JobMode::Overall)
        .backend(Some(backend()))
        .gemini_api_key(Some("gemini-key".to_string()))
        .model(Some("gemini-2.0-flash".to_string()))
        .api_delay(Duration::ZERO)
        .prompt(Some(prompt()))
        .dataset_name("tickets.json")
        .build()
}

pub fn simulated(mut config: RunConfig) -> RunConfig {
    config.simulate = true;
    config.gemini_api_key = None;
    config.model = None;
    config
}

/// Lets a mock hook reach the controller's handle, which only exists once
/// the controller is built from the mocks.
#[derive(Clone, Default)]
pub struct HandleSlot(Arc<OnceLock<RunHandle>>);

impl HandleSlot {
    pub fn set(&self, handle: RunHandle) {
        let _ = self.0.set(handle);
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.0.get() {
            handle.cancel();
        }
    }

    pub fn pause(&self) {
        if let Some(handle) = self.0.get() {
            handle.pause();
        }
    }
}

pub fn controller(
    fetcher: Arc<dyn TicketFetcher>,
    analyzer: Arc<dyn TicketAnalyzer>,
    events: Arc<EventLog>,
) -> BatchController {
    BatchController::new(
        PipelineDeps::builder()
            .fetcher(fetcher)
            .analyzer(analyzer)
            .observer(events)
            .build(),
    )
}
