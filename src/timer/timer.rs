//! Counting-up timer

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::ScheduleError;
use crate::manager::{ClockFactory, ManagerControl, ManagerFactory, TimerManager};

/// Tolerance for matching accumulated paused time against a requested pause
/// duration; bare float equality would miss by one ULP for intervals like
/// 0.1.
const AUTO_RESUME_TOLERANCE: f64 = 1e-9;

/// State the manager callbacks write back into the timer.
#[derive(Debug)]
struct Shared {
    time: f64,
    paused: bool,
}

/// A counting-up timer.
///
/// `tick` starts a repeating schedule and reports the running time to a
/// callback; `pause` redirects ticks into paused-time accounting without
/// halting the schedule; `stop` cancels it. Each reconfiguration replaces
/// the underlying manager, cancelling the previous schedule.
///
/// A timer whose schedule could not be allocated simply holds no manager:
/// every operation on it is a safe no-op.
pub struct Timer {
    shared: Arc<Mutex<Shared>>,
    interval: f64,
    manager: Option<TimerManager>,
    factory: Arc<dyn ManagerFactory>,
}

impl Timer {
    /// A timer starting at 0.
    pub fn new() -> Self {
        Self::with_initial(0.0)
    }

    /// A timer starting at `time` seconds.
    pub fn with_initial(time: f64) -> Self {
        Self::with_factory(time, Arc::new(ClockFactory::default()))
    }

    /// A timer whose schedules come from the given factory. This is the
    /// injection point for alternative scheduling backends such as a manual
    /// clock in tests.
    pub fn with_factory(time: f64, factory: Arc<dyn ManagerFactory>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                time,
                paused: false,
            })),
            interval: 1.0,
            manager: None,
            factory,
        }
    }

    /// Current running time in seconds.
    pub fn time(&self) -> f64 {
        self.shared.lock().map(|s| s.time).unwrap_or_default()
    }

    /// The configured tick gap.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn is_paused(&self) -> bool {
        self.shared.lock().map(|s| s.paused).unwrap_or_default()
    }

    /// (Re)configure the timer: schedule a tick every `interval` seconds,
    /// reporting the new running time to `callback`.
    ///
    /// Any previously running schedule is cancelled and replaced. On error
    /// the timer holds no schedule and no callback will ever fire.
    pub fn tick<F>(&mut self, interval: f64, callback: F) -> Result<(), ScheduleError>
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.tick_with(interval, callback, |_| {})
    }

    /// `tick`, additionally handing the new schedule's control handle to
    /// `register` before the schedule is resumed, so a callback that needs
    /// the control (the countdown boundary stop) can never observe a tick
    /// ahead of it.
    pub(crate) fn tick_with<F, R>(
        &mut self,
        interval: f64,
        mut callback: F,
        register: R,
    ) -> Result<(), ScheduleError>
    where
        F: FnMut(f64) + Send + 'static,
        R: FnOnce(ManagerControl),
    {
        self.interval = interval;

        // Drop the previous manager first so its cancel is queued before
        // the replacement starts ticking.
        self.manager = None;

        let manager = self.factory.create(interval, self.time(), true)?;
        register(manager.controller());

        let shared = Arc::clone(&self.shared);
        manager.on_resume(move |time| {
            if let Ok(mut s) = shared.lock() {
                s.time = time;
            }
            callback(time);
        });
        manager.resume();

        if let Ok(mut s) = self.shared.lock() {
            s.paused = false;
        }
        self.manager = Some(manager);
        debug!("Timer ticking every {}s", interval);
        Ok(())
    }

    /// Pause indefinitely. Ticks keep arriving at the same cadence but
    /// accrue paused time instead of running time.
    pub fn pause(&mut self) {
        let Some(manager) = &self.manager else {
            return;
        };
        manager.pause();
        if let Ok(mut s) = self.shared.lock() {
            s.paused = true;
        }
        debug!("Timer paused");
    }

    /// Pause, reporting accumulated paused time to `callback`, and resume
    /// automatically once it reaches `duration` seconds. A `duration` of 0
    /// pauses indefinitely while still reporting.
    pub fn pause_for<F>(&mut self, duration: f64, mut callback: F)
    where
        F: FnMut(f64) + Send + 'static,
    {
        let Some(manager) = &self.manager else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        let control = manager.controller();
        manager.on_pause(move |paused_time| {
            if duration != 0.0 && (paused_time - duration).abs() < AUTO_RESUME_TOLERANCE {
                if let Ok(mut s) = shared.lock() {
                    s.paused = false;
                }
                control.resume();
            }
            callback(paused_time);
        });
        manager.pause();

        if let Ok(mut s) = self.shared.lock() {
            s.paused = true;
        }
        debug!("Timer paused for {}s", duration);
    }

    /// Continue running-time accounting; paused-time accounting resets to 0.
    pub fn resume(&mut self) {
        if let Ok(mut s) = self.shared.lock() {
            s.paused = false;
        }
        if let Some(manager) = &self.manager {
            manager.resume();
        }
    }

    /// Cancel the running schedule. Safe to call repeatedly; a fresh `tick`
    /// starts the timer over.
    pub fn stop(&mut self) {
        if let Some(manager) = &self.manager {
            manager.cancel();
            debug!("Timer stopped");
        }
    }

    /// Fire-and-forget: invoke `callback` once, `after` seconds from now.
    pub fn once<F>(after: f64, callback: F) -> Result<(), ScheduleError>
    where
        F: FnOnce() + Send + 'static,
    {
        Self::once_with(&ClockFactory::default(), after, callback)
    }

    /// `once` against a caller-supplied factory.
    pub fn once_with<F>(
        factory: &dyn ManagerFactory,
        after: f64,
        callback: F,
    ) -> Result<(), ScheduleError>
    where
        F: FnOnce() + Send + 'static,
    {
        let manager = factory.create(after, 0.0, false)?;
        let mut callback = Some(callback);
        manager.on_resume(move |_| {
            if let Some(callback) = callback.take() {
                callback();
            }
        });
        manager.resume();
        manager.detach();
        debug!("One-shot timer armed for {}s", after);
        Ok(())
    }

    /// Control handle of the running schedule, for tests that poke at it
    /// from inside callbacks.
    #[cfg(test)]
    pub(crate) fn controller(&self) -> Option<ManagerControl> {
        self.manager.as_ref().map(TimerManager::controller)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
