//! Egg Timer - A pausable tick/countdown timer library built on Tokio
//!
//! This library provides timers that fire callbacks on a repeating or
//! one-shot schedule, pause and resume without losing elapsed-time
//! accounting, and count down to an auto-stop boundary. Scheduling backends
//! are pluggable, so tests can drive timers from a manual clock instead of
//! wall time.

pub mod clock;
pub mod error;
pub mod manager;
pub mod timer;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, TickSource, TokioClock};
pub use error::ScheduleError;
pub use manager::{ClockFactory, ManagerControl, ManagerFactory, ManagerState, TimerManager};
pub use timer::{Countdown, Timer};
