use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::outcome::{PartialData, RunReport};

/// Lifecycle notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    FetchProgress { done: usize, total: usize },
    AnalysisProgress { done: usize, total: usize },
    Completed(RunReport),
    Cancelled,
    FatalFallback { message: String, partial: PartialData },
    PayloadTooLarge { token_count: u64, limit: u64 },
    NoValidData,
}

impl RunEvent {
    pub fn is_progress(&self) -> bool {
        matches!(
            self,
            RunEvent::FetchProgress { .. } | RunEvent::AnalysisProgress { .. }
        )
    }
}

pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: RunEvent);
}

/// Drops everything.
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn on_event(&self, _event: RunEvent) {}
}

/// Forwards events to a channel. A closed receiver is ignored.
impl RunObserver for mpsc::UnboundedSender<RunEvent> {
    fn on_event(&self, event: RunEvent) {
        let _ = self.send(event);
    }
}

/// Keeps every event in memory, in order.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<RunEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events other than progress ticks.
    pub fn lifecycle(&self) -> Vec<RunEvent> {
        self.events().into_iter().filter(|e| !e.is_progress()).collect()
    }
}

impl RunObserver for EventLog {
    fn on_event(&self, event: RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
