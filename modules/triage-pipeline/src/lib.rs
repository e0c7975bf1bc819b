pub mod aggregator;
pub mod analysis_phase;
pub mod analyzer;
pub mod control;
pub mod controller;
mod departments;
pub mod events;
pub mod fetch_phase;
pub mod outcome;
pub mod simulate;
mod state;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use analyzer::GeminiAnalyzer;
pub use control::{RunHandle, RunPhase};
pub use controller::{BatchController, PipelineDeps};
pub use events::{EventLog, NoopObserver, RunEvent, RunObserver};
pub use outcome::{PartialData, RunOutcome, RunReport, RunSummary};
pub use simulate::SimulatedAnalyzer;
pub use stats::RunStats;
pub use traits::{TicketAnalyzer, TicketFetcher};
