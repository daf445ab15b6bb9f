//! Hand-driven clock for deterministic tests

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use super::{Clock, TickSource};
use crate::error::ScheduleError;

/// A clock that never consults wall time: every allocated source ticks only
/// when [`fire`](ManualClock::fire) is called.
///
/// Intended for tests that need exact tick counts instead of real delays.
/// Can also simulate backend exhaustion to exercise the creation-failure
/// path.
#[derive(Debug, Default)]
pub struct ManualClock {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    senders: Vec<mpsc::UnboundedSender<()>>,
    exhausted: bool,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent allocations fail with [`ScheduleError::Exhausted`].
    pub fn set_exhausted(&self, exhausted: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.exhausted = exhausted;
        }
    }

    /// Deliver one tick to every live source.
    pub fn fire(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.senders.retain(|tx| tx.send(()).is_ok());
        }
    }

    /// Deliver `count` ticks to every live source.
    pub fn fire_many(&self, count: usize) {
        for _ in 0..count {
            self.fire();
        }
    }

    /// Number of sources still attached to a consumer.
    pub fn active_sources(&self) -> usize {
        match self.inner.lock() {
            Ok(mut inner) => {
                inner.senders.retain(|tx| !tx.is_closed());
                inner.senders.len()
            }
            Err(_) => 0,
        }
    }

    fn allocate(&self) -> Result<TickSource, ScheduleError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| ScheduleError::Exhausted)?;

        if inner.exhausted {
            debug!("Manual clock exhausted, refusing tick source");
            return Err(ScheduleError::Exhausted);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        inner.senders.push(tx);
        Ok(TickSource::new(rx))
    }
}

impl Clock for ManualClock {
    fn repeating(&self, _period: Duration) -> Result<TickSource, ScheduleError> {
        self.allocate()
    }

    fn delayed(&self, _delay: Duration) -> Result<TickSource, ScheduleError> {
        self.allocate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fire_reaches_every_source() {
        let clock = ManualClock::new();
        let mut a = clock.repeating(Duration::from_secs(1)).expect("allocate");
        let mut b = clock.delayed(Duration::from_secs(1)).expect("allocate");

        clock.fire();
        assert!(a.next().await);
        assert!(b.next().await);
    }

    #[test]
    fn exhausted_clock_refuses_allocation() {
        let clock = ManualClock::new();
        clock.set_exhausted(true);
        assert!(matches!(
            clock.repeating(Duration::from_secs(1)),
            Err(ScheduleError::Exhausted)
        ));

        clock.set_exhausted(false);
        assert!(clock.repeating(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn dropped_sources_are_pruned() {
        let clock = ManualClock::new();
        let source = clock.repeating(Duration::from_secs(1)).expect("allocate");
        assert_eq!(clock.active_sources(), 1);

        drop(source);
        assert_eq!(clock.active_sources(), 0);
    }
}
