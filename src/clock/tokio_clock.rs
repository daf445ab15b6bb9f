//! Wall-clock scheduling backed by the Tokio runtime

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Clock, TickSource};
use crate::error::ScheduleError;

/// The default clock: spawns one background task per tick source on the
/// current Tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl TokioClock {
    pub fn new() -> Self {
        Self
    }

    fn runtime(&self) -> Result<Handle, ScheduleError> {
        Handle::try_current().map_err(|_| ScheduleError::NoRuntime)
    }
}

impl Clock for TokioClock {
    fn repeating(&self, period: Duration) -> Result<TickSource, ScheduleError> {
        let handle = self.runtime()?;
        let (tx, rx) = mpsc::unbounded_channel();

        handle.spawn(async move {
            // First tick lands one full period after allocation, not
            // immediately.
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);

            loop {
                interval.tick().await;
                if tx.send(()).is_err() {
                    debug!("Tick source dropped, stopping periodic schedule");
                    break;
                }
            }
        });

        Ok(TickSource::new(rx))
    }

    fn delayed(&self, delay: Duration) -> Result<TickSource, ScheduleError> {
        let handle = self.runtime()?;
        let (tx, rx) = mpsc::unbounded_channel();

        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(()).is_err() {
                debug!("Tick source dropped before delayed fire");
            }
        });

        Ok(TickSource::new(rx))
    }
}
