//! Manager construction seam
//!
//! `Timer` never names a concrete scheduling backend; it asks a factory for
//! managers. The default factory schedules against the wall clock, tests
//! hand in one bound to a [`ManualClock`](crate::clock::ManualClock).

use std::sync::Arc;

use crate::clock::{Clock, TokioClock};
use crate::error::ScheduleError;

use super::TimerManager;

/// Produces the managers a [`Timer`](crate::timer::Timer) schedules with.
pub trait ManagerFactory: Send + Sync {
    fn create(&self, interval: f64, time: f64, repeats: bool)
        -> Result<TimerManager, ScheduleError>;
}

/// Factory bound to a specific clock. `Default` uses the wall clock.
pub struct ClockFactory {
    clock: Arc<dyn Clock>,
}

impl ClockFactory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for ClockFactory {
    fn default() -> Self {
        Self::new(Arc::new(TokioClock::new()))
    }
}

impl ManagerFactory for ClockFactory {
    fn create(
        &self,
        interval: f64,
        time: f64,
        repeats: bool,
    ) -> Result<TimerManager, ScheduleError> {
        TimerManager::with_clock(Arc::clone(&self.clock), interval, time, repeats)
    }
}
