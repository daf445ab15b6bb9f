//! Scheduled activity ownership and time accounting

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::clock::{Clock, TickSource, TokioClock};
use crate::error::ScheduleError;

type ResumeHandler = Box<dyn FnMut(f64) + Send>;
type PauseHandler = Box<dyn FnMut(f64) + Send>;
type CancelHandler = Box<dyn FnOnce() + Send>;

/// Requests sent from handles into the dispatch task.
enum Command {
    Resume,
    Pause,
    Cancel,
    OnResume(ResumeHandler),
    OnPause(PauseHandler),
    OnCancel(CancelHandler),
}

/// Snapshot of a manager's time accounting, published after every change.
#[derive(Debug, Clone, Default)]
pub struct ManagerState {
    /// Accumulated running time in seconds; signed, so repeated negative
    /// intervals drive it downward.
    pub time: f64,
    /// Time accumulated while paused; reset to 0 on resume.
    pub paused_time: f64,
    pub paused: bool,
}

/// Owns one scheduled activity: a repeating tick source, or a one-shot
/// delayed fire armed by [`resume`](TimerManager::resume).
///
/// All accounting and every handler invocation happen on a single dispatch
/// task per manager, so callbacks never run concurrently and tick delivery
/// order matches tick time order. The handle itself only sends non-blocking
/// requests. Dropping the handle cancels the activity unless it was
/// [`detach`](TimerManager::detach)ed first.
pub struct TimerManager {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ManagerState>,
    interval: f64,
    repeats: bool,
    detached: bool,
}

impl TimerManager {
    /// Create a manager scheduled against the wall clock.
    ///
    /// Fails only when the scheduling primitive cannot be allocated: no
    /// Tokio runtime, a non-finite or zero interval, or backend exhaustion.
    pub fn create(interval: f64, time: f64, repeats: bool) -> Result<Self, ScheduleError> {
        Self::with_clock(Arc::new(TokioClock::new()), interval, time, repeats)
    }

    /// Create a manager scheduled against a caller-supplied clock.
    ///
    /// When `repeats` is true the recurring tick source is allocated here so
    /// failure surfaces at construction, but its ticks are discarded until
    /// the first `resume()`. When false, nothing is scheduled until
    /// `resume()` arms a single delayed fire.
    pub fn with_clock(
        clock: Arc<dyn Clock>,
        interval: f64,
        time: f64,
        repeats: bool,
    ) -> Result<Self, ScheduleError> {
        let period = period_from(interval)?;
        let ticks = if repeats {
            Some(clock.repeating(period)?)
        } else {
            None
        };
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ScheduleError::NoRuntime)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ManagerState {
            time,
            paused_time: 0.0,
            paused: false,
        });

        let dispatch = Dispatch {
            clock,
            interval,
            period,
            time,
            paused_time: 0.0,
            paused: false,
            repeats,
            started: false,
            ticks,
            on_resume: None,
            on_pause: None,
            on_cancel: None,
            rx,
            state: state_tx,
        };
        runtime.spawn(dispatch.run());

        debug!(
            "Created timer manager: interval={}, time={}, repeats={}",
            interval, time, repeats
        );
        Ok(Self {
            tx,
            state: state_rx,
            interval,
            repeats,
            detached: false,
        })
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn repeats(&self) -> bool {
        self.repeats
    }

    /// Accumulated running time as of the last processed tick.
    pub fn time(&self) -> f64 {
        self.state.borrow().time
    }

    /// Time accumulated while paused since the last resume.
    pub fn paused_time(&self) -> f64 {
        self.state.borrow().paused_time
    }

    pub fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    /// Full accounting snapshot as of the last processed tick.
    pub fn state(&self) -> ManagerState {
        self.state.borrow().clone()
    }

    /// Install the handler invoked with the new running time on each tick.
    pub fn on_resume<F>(&self, handler: F)
    where
        F: FnMut(f64) + Send + 'static,
    {
        let _ = self.tx.send(Command::OnResume(Box::new(handler)));
    }

    /// Install the handler invoked with the accumulated paused time on each
    /// tick that arrives while paused.
    pub fn on_pause<F>(&self, handler: F)
    where
        F: FnMut(f64) + Send + 'static,
    {
        let _ = self.tx.send(Command::OnPause(Box::new(handler)));
    }

    /// Install the handler invoked exactly once when the activity terminates.
    pub fn on_cancel<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.tx.send(Command::OnCancel(Box::new(handler)));
    }

    /// Start or continue ticking. For a repeating manager this clears the
    /// paused flag and resets paused-time accounting; for a one-shot it arms
    /// a single delayed fire measured from this call.
    pub fn resume(&self) {
        let _ = self.tx.send(Command::Resume);
    }

    /// Redirect subsequent ticks into paused-time accounting. The schedule
    /// itself keeps firing at the same cadence.
    pub fn pause(&self) {
        let _ = self.tx.send(Command::Pause);
    }

    /// Request cancellation. Idempotent; the cancel-handler fires once when
    /// the activity actually terminates, after which no handler runs again.
    pub fn cancel(&self) {
        let _ = self.tx.send(Command::Cancel);
    }

    /// A lightweight control handle usable from inside handler callbacks.
    pub fn controller(&self) -> ManagerControl {
        ManagerControl {
            tx: self.tx.clone(),
        }
    }

    /// Consume the handle without cancelling the activity. A detached
    /// one-shot still delivers its pending fire, then its task exits; a
    /// detached repeating manager stops ticking once the handle is gone.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        if !self.detached {
            let _ = self.tx.send(Command::Cancel);
        }
    }
}

/// Clonable resume/pause/cancel handle. Unlike [`TimerManager`] it does not
/// cancel anything on drop, so handler callbacks can hold one safely.
#[derive(Clone)]
pub struct ManagerControl {
    tx: mpsc::UnboundedSender<Command>,
}

impl ManagerControl {
    pub fn resume(&self) {
        let _ = self.tx.send(Command::Resume);
    }

    pub fn pause(&self) {
        let _ = self.tx.send(Command::Pause);
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(Command::Cancel);
    }
}

fn period_from(interval: f64) -> Result<Duration, ScheduleError> {
    if interval == 0.0 {
        return Err(ScheduleError::InvalidInterval(interval));
    }
    // Rejects non-finite values and magnitudes beyond Duration's range.
    Duration::try_from_secs_f64(interval.abs())
        .map_err(|_| ScheduleError::InvalidInterval(interval))
}

/// Per-manager dispatch loop: the single consumer of both the tick source
/// and the command channel, and the only place that touches time accounting
/// or invokes handlers.
struct Dispatch {
    clock: Arc<dyn Clock>,
    interval: f64,
    period: Duration,
    time: f64,
    paused_time: f64,
    paused: bool,
    repeats: bool,
    started: bool,
    ticks: Option<TickSource>,
    on_resume: Option<ResumeHandler>,
    on_pause: Option<PauseHandler>,
    on_cancel: Option<CancelHandler>,
    rx: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ManagerState>,
}

impl Dispatch {
    async fn run(mut self) {
        loop {
            tokio::select! {
                // Queued control commands are handled before queued ticks,
                // so handler installation, pause, and cancel are never
                // outrun by a tick that arrived in the same batch.
                biased;

                cmd = self.rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.handle_command(cmd) {
                                break;
                            }
                        }
                        None => {
                            // Every handle dropped without a cancel: only a
                            // detached one-shot keeps its pending fire.
                            if let Some(mut source) = self.ticks.take() {
                                if !self.repeats && source.next().await {
                                    self.fire_once();
                                }
                            }
                            break;
                        }
                    }
                }

                fired = next_tick(&mut self.ticks) => {
                    if !fired {
                        self.ticks = None;
                        continue;
                    }
                    self.handle_tick();
                }
            }
        }
        debug!("Timer manager dispatch terminated");
    }

    /// Returns true when the dispatch loop should terminate.
    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Resume => {
                if self.repeats {
                    if self.paused {
                        self.paused_time = 0.0;
                        self.paused = false;
                        self.publish();
                        debug!("Resumed repeating timer, paused-time reset");
                    }
                    self.started = true;
                } else {
                    match self.clock.delayed(self.period) {
                        Ok(source) => self.ticks = Some(source),
                        Err(e) => warn!("Failed to arm one-shot fire: {}", e),
                    }
                }
                false
            }
            Command::Pause => {
                if !self.paused {
                    self.paused = true;
                    self.publish();
                    debug!("Paused timer, ticks now accrue paused time");
                }
                false
            }
            Command::Cancel => {
                if let Some(handler) = self.on_cancel.take() {
                    handler();
                }
                debug!("Cancelled timer manager");
                true
            }
            Command::OnResume(f) => {
                self.on_resume = Some(f);
                false
            }
            Command::OnPause(f) => {
                self.on_pause = Some(f);
                false
            }
            Command::OnCancel(f) => {
                self.on_cancel = Some(f);
                false
            }
        }
    }

    fn handle_tick(&mut self) {
        if !self.repeats {
            self.fire_once();
            return;
        }
        if !self.started {
            // Allocated at construction but never resumed; a suspended
            // manager drops its ticks instead of queueing them.
            return;
        }
        if self.paused {
            self.paused_time += self.interval;
            self.publish();
            if let Some(handler) = self.on_pause.as_mut() {
                handler(self.paused_time);
            }
        } else {
            self.time += self.interval;
            self.publish();
            if let Some(handler) = self.on_resume.as_mut() {
                handler(self.time);
            }
        }
    }

    /// One-shot delivery: at most once per `resume()`.
    fn fire_once(&mut self) {
        self.ticks = None;
        self.time += self.interval;
        self.publish();
        if let Some(handler) = self.on_resume.as_mut() {
            handler(self.time);
        }
    }

    fn publish(&self) {
        self.state.send_replace(ManagerState {
            time: self.time,
            paused_time: self.paused_time,
            paused: self.paused,
        });
    }
}

async fn next_tick(ticks: &mut Option<TickSource>) -> bool {
    match ticks {
        Some(source) => source.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tokio::sync::mpsc::unbounded_channel;

    fn manual_manager(
        clock: &Arc<ManualClock>,
        interval: f64,
        time: f64,
        repeats: bool,
    ) -> TimerManager {
        TimerManager::with_clock(Arc::clone(clock) as Arc<dyn Clock>, interval, time, repeats)
            .expect("manager allocation")
    }

    #[tokio::test]
    async fn repeating_ticks_accumulate_time() {
        let clock = Arc::new(ManualClock::new());
        let manager = manual_manager(&clock, 1.0, 0.0, true);

        let (tx, mut rx) = unbounded_channel();
        manager.on_resume(move |t| {
            let _ = tx.send(t);
        });
        manager.resume();

        clock.fire_many(3);
        assert_eq!(rx.recv().await, Some(1.0));
        assert_eq!(rx.recv().await, Some(2.0));
        assert_eq!(rx.recv().await, Some(3.0));
        assert_eq!(manager.time(), 3.0);
    }

    #[tokio::test]
    async fn ticks_before_first_resume_are_discarded() {
        let clock = Arc::new(ManualClock::new());
        let manager = manual_manager(&clock, 1.0, 0.0, true);

        let (tx, mut rx) = unbounded_channel();
        manager.on_resume(move |t| {
            let _ = tx.send(t);
        });

        // Not yet resumed: these must not count. Yield so the dispatch task
        // drains them before the resume below.
        clock.fire_many(2);
        tokio::task::yield_now().await;

        manager.resume();
        clock.fire();

        assert_eq!(rx.recv().await, Some(1.0));
        assert_eq!(manager.time(), 1.0);
    }

    #[tokio::test]
    async fn pause_reroutes_ticks_and_resume_resets_paused_time() {
        let clock = Arc::new(ManualClock::new());
        let manager = manual_manager(&clock, 0.5, 0.0, true);

        let (tick_tx, mut ticks) = unbounded_channel();
        let (pause_tx, mut pauses) = unbounded_channel();
        manager.on_resume(move |t| {
            let _ = tick_tx.send(t);
        });
        manager.on_pause(move |t| {
            let _ = pause_tx.send(t);
        });
        manager.resume();

        clock.fire();
        assert_eq!(ticks.recv().await, Some(0.5));

        manager.pause();
        clock.fire_many(2);
        assert_eq!(pauses.recv().await, Some(0.5));
        assert_eq!(pauses.recv().await, Some(1.0));
        // Running time untouched while paused.
        assert_eq!(manager.time(), 0.5);
        assert!(manager.is_paused());

        manager.resume();
        clock.fire();
        assert_eq!(ticks.recv().await, Some(1.0));
        assert_eq!(manager.paused_time(), 0.0);
        assert!(!manager.is_paused());
    }

    #[tokio::test]
    async fn negative_interval_counts_downward() {
        let clock = Arc::new(ManualClock::new());
        let manager = manual_manager(&clock, -1.0, 2.0, true);

        let (tx, mut rx) = unbounded_channel();
        manager.on_resume(move |t| {
            let _ = tx.send(t);
        });
        manager.resume();

        clock.fire_many(3);
        assert_eq!(rx.recv().await, Some(1.0));
        assert_eq!(rx.recv().await, Some(0.0));
        assert_eq!(rx.recv().await, Some(-1.0));
    }

    #[tokio::test]
    async fn cancel_fires_handler_exactly_once() {
        let clock = Arc::new(ManualClock::new());
        let manager = manual_manager(&clock, 1.0, 0.0, true);

        let (tx, mut rx) = unbounded_channel();
        manager.on_cancel(move || {
            let _ = tx.send(());
        });
        manager.resume();

        manager.cancel();
        manager.cancel();

        assert_eq!(rx.recv().await, Some(()));
        // Channel closes with the dispatch task; a second invocation would
        // have arrived before the close.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn no_tick_is_delivered_after_cancel() {
        let clock = Arc::new(ManualClock::new());
        let manager = manual_manager(&clock, 1.0, 0.0, true);

        let (tx, mut rx) = unbounded_channel();
        manager.on_resume(move |t| {
            let _ = tx.send(t);
        });
        manager.resume();
        manager.cancel();

        clock.fire_many(3);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn dropping_the_handle_cancels() {
        let clock = Arc::new(ManualClock::new());
        let manager = manual_manager(&clock, 1.0, 0.0, true);

        let (tx, mut rx) = unbounded_channel();
        manager.on_cancel(move || {
            let _ = tx.send(());
        });

        drop(manager);
        assert_eq!(rx.recv().await, Some(()));
    }

    #[tokio::test]
    async fn one_shot_fires_at_most_once_per_resume() {
        let clock = Arc::new(ManualClock::new());
        let manager = manual_manager(&clock, 5.0, 0.0, false);

        let (tx, mut rx) = unbounded_channel();
        manager.on_resume(move |t| {
            let _ = tx.send(t);
        });

        // Nothing armed until resume.
        assert_eq!(clock.active_sources(), 0);

        // Yield so the resume is processed and the delayed source armed
        // before the manual fire.
        manager.resume();
        tokio::task::yield_now().await;
        clock.fire();
        assert_eq!(rx.recv().await, Some(5.0));

        // The spent source is gone; extra fires reach nobody.
        clock.fire_many(3);
        manager.resume();
        tokio::task::yield_now().await;
        clock.fire();
        assert_eq!(rx.recv().await, Some(10.0));
    }

    #[tokio::test]
    async fn construction_fails_on_invalid_interval() {
        assert!(matches!(
            TimerManager::create(0.0, 0.0, true),
            Err(ScheduleError::InvalidInterval(_))
        ));
        assert!(matches!(
            TimerManager::create(f64::NAN, 0.0, true),
            Err(ScheduleError::InvalidInterval(_))
        ));
        // Finite but beyond Duration's range must error, not panic.
        assert!(matches!(
            TimerManager::create(1e20, 0.0, true),
            Err(ScheduleError::InvalidInterval(_))
        ));
        assert!(matches!(
            TimerManager::create(-1e20, 0.0, false),
            Err(ScheduleError::InvalidInterval(_))
        ));
    }

    #[test]
    fn construction_fails_without_a_runtime() {
        assert!(matches!(
            TimerManager::create(1.0, 0.0, true),
            Err(ScheduleError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn construction_fails_when_clock_is_exhausted() {
        let clock = Arc::new(ManualClock::new());
        clock.set_exhausted(true);
        let result =
            TimerManager::with_clock(Arc::clone(&clock) as Arc<dyn Clock>, 1.0, 0.0, true);
        assert!(matches!(result, Err(ScheduleError::Exhausted)));
    }
}
