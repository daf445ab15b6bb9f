//! Counting-down timer with an auto-stop boundary

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::ScheduleError;
use crate::manager::{ManagerControl, ManagerFactory};

use super::Timer;

/// A timer that counts downward and stops itself at the zero boundary.
///
/// Wraps a [`Timer`]: the supplied interval is forced negative, a countdown
/// already at 0 never starts, and the tick callback is wrapped so that
/// crossing zero requests `stop` before the final value is delivered. The
/// boundary value itself (0 or below) still reaches the callback; a
/// `resume` issued from inside that final callback is a no-op because the
/// cancel is already queued ahead of it.
pub struct Countdown {
    timer: Timer,
}

impl Countdown {
    /// A countdown starting at `time` seconds.
    pub fn new(time: f64) -> Self {
        Self {
            timer: Timer::with_initial(time),
        }
    }

    /// A countdown drawing schedules from the given factory.
    pub fn with_factory(time: f64, factory: Arc<dyn ManagerFactory>) -> Self {
        Self {
            timer: Timer::with_factory(time, factory),
        }
    }

    /// Count down by `interval.abs()` seconds per tick, reporting each new
    /// value to `callback`. A countdown whose time is already exactly 0
    /// does nothing.
    pub fn tick<F>(&mut self, interval: f64, mut callback: F) -> Result<(), ScheduleError>
    where
        F: FnMut(f64) + Send + 'static,
    {
        let interval = -interval.abs();

        if self.timer.time() == 0.0 {
            debug!("Countdown already expired, not scheduling");
            return Ok(());
        }

        // The schedule's control handle lands in this slot before the
        // schedule is resumed, so even a first tick that crosses the
        // boundary finds it populated.
        let control: Arc<Mutex<Option<ManagerControl>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&control);

        self.timer.tick_with(
            interval,
            move |time| {
                if time <= 0.0 {
                    // Stop before delivering the boundary value, so the
                    // cancel outranks anything the callback requests.
                    if let Ok(guard) = slot.lock() {
                        if let Some(control) = guard.as_ref() {
                            control.cancel();
                        }
                    }
                    debug!("Countdown reached its boundary at {}", time);
                }
                callback(time);
            },
            move |handle| {
                if let Ok(mut guard) = control.lock() {
                    *guard = Some(handle);
                }
            },
        )
    }

    pub fn time(&self) -> f64 {
        self.timer.time()
    }

    pub fn interval(&self) -> f64 {
        self.timer.interval()
    }

    pub fn is_paused(&self) -> bool {
        self.timer.is_paused()
    }

    pub fn pause(&mut self) {
        self.timer.pause();
    }

    pub fn pause_for<F>(&mut self, duration: f64, callback: F)
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.timer.pause_for(duration, callback);
    }

    pub fn resume(&mut self) {
        self.timer.resume();
    }

    pub fn stop(&mut self) {
        self.timer.stop();
    }
}
