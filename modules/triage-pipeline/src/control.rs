use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Poll interval while a run is paused.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching,
    Analyzing,
    Done,
    Cancelled,
}

impl RunPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RunPhase::Fetching,
            2 => RunPhase::Analyzing,
            3 => RunPhase::Done,
            4 => RunPhase::Cancelled,
            _ => RunPhase::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RunPhase::Idle => 0,
            RunPhase::Fetching => 1,
            RunPhase::Analyzing => 2,
            RunPhase::Done => 3,
            RunPhase::Cancelled => 4,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "Fetching ticket details..."),
            Self::Analyzing => write!(f, "Analyzing with Gemini..."),
            Self::Done => write!(f, "Analysis complete"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Flags and counters shared between the running pipeline and whoever
/// drives it. The pipeline is the only writer of phase and counters;
/// pause/cancel come from outside.
#[derive(Debug, Default)]
struct Shared {
    paused: AtomicBool,
    cancelled: AtomicBool,
    phase: AtomicU8,
    total: AtomicUsize,
    fetched: AtomicUsize,
    analyzed: AtomicUsize,
}

/// Cheap cloneable handle to a controller's run flags. Every method takes
/// effect immediately; the pipeline observes it at its next checkpoint.
#[derive(Debug, Clone, Default)]
pub struct RunHandle {
    shared: Arc<Shared>,
}

impl RunHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop scheduling new items. In-flight calls finish. Idempotent.
    pub fn pause(&self) {
        if !self.is_cancelled() {
            self.shared.paused.store(true, Ordering::SeqCst);
        }
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
    }

    /// Returns the new paused state.
    pub fn toggle_pause(&self) -> bool {
        if self.is_paused() {
            self.resume();
            false
        } else {
            self.pause();
            self.is_paused()
        }
    }

    /// Cancel wins over pause: a paused run wakes up and exits.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        self.shared.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.shared.phase.load(Ordering::SeqCst))
    }

    pub fn total(&self) -> usize {
        self.shared.total.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> usize {
        self.shared.fetched.load(Ordering::SeqCst)
    }

    pub fn analyzed(&self) -> usize {
        self.shared.analyzed.load(Ordering::SeqCst)
    }

    // --- pipeline side ---

    /// Clear flags and counters for a new run.
    pub(crate) fn reset(&self, total: usize) {
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.cancelled.store(false, Ordering::SeqCst);
        self.shared.total.store(total, Ordering::SeqCst);
        self.shared.fetched.store(0, Ordering::SeqCst);
        self.shared.analyzed.store(0, Ordering::SeqCst);
        self.set_phase(RunPhase::Idle);
    }

    pub(crate) fn set_phase(&self, phase: RunPhase) {
        self.shared.phase.store(phase.as_u8(), Ordering::SeqCst);
    }

    pub(crate) fn set_total(&self, total: usize) {
        self.shared.total.store(total, Ordering::SeqCst);
    }

    pub(crate) fn record_fetched(&self) -> usize {
        self.shared.fetched.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn set_fetched(&self, count: usize) {
        self.shared.fetched.store(count, Ordering::SeqCst);
    }

    pub(crate) fn record_analyzed(&self) -> usize {
        self.shared.analyzed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Block the loop while paused, polling so a cancel is seen promptly.
    /// Returns false if the run was cancelled.
    pub(crate) async fn checkpoint(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        while self.is_paused() {
            if self.is_cancelled() {
                break;
            }
            tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
        }
        !self.is_cancelled()
    }

    /// Wait out `duration` in poll-sized steps. Returns false as soon as the
    /// run is cancelled.
    pub(crate) async fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            tokio::time::sleep((deadline - now).min(PAUSE_POLL_INTERVAL)).await;
        }
    }
}
