//! Public timer types
//!
//! - **`Timer`**: counting-up timer with tick/pause/resume/stop and a
//!   fire-and-forget `once`
//! - **`Countdown`**: wraps a `Timer` to count downward and stop itself at
//!   the zero boundary

pub mod countdown;
pub mod timer;

pub use countdown::Countdown;
pub use timer::Timer;
