//! Clock/scheduler adapters
//!
//! This module wraps the platform's ability to fire a repeating or delayed
//! callback on a background task:
//! - **`Clock`**: the adapter trait; allocates tick sources
//! - **`TokioClock`**: real wall-clock scheduling on the Tokio runtime
//! - **`ManualClock`**: deterministic test double fired by hand

pub mod manual;
pub mod tokio_clock;

use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::ScheduleError;

pub use manual::ManualClock;
pub use tokio_clock::TokioClock;

/// A stream of tick events delivered by a clock.
///
/// Dropping the source is the cancellation request: the producing side
/// notices the closed channel and stops scheduling.
#[derive(Debug)]
pub struct TickSource {
    rx: mpsc::UnboundedReceiver<()>,
}

impl TickSource {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<()>) -> Self {
        Self { rx }
    }

    /// Wait for the next tick. Returns `false` once the producer is gone
    /// and no further ticks will ever arrive.
    pub async fn next(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

/// The scheduling backend boundary.
///
/// A clock only knows how to deliver raw tick events at some cadence; all
/// time accounting lives in the manager that consumes the source.
pub trait Clock: Send + Sync {
    /// Allocate a source that ticks every `period`, starting one full
    /// period from now.
    fn repeating(&self, period: Duration) -> Result<TickSource, ScheduleError>;

    /// Allocate a source that ticks exactly once after `delay`.
    fn delayed(&self, delay: Duration) -> Result<TickSource, ScheduleError>;
}
