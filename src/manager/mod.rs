//! Timer management
//!
//! This module provides:
//! - **`TimerManager`**: owns one scheduled activity and its time accounting
//! - **`ManagerControl`**: lightweight handle for issuing resume/pause/cancel
//!   from inside callbacks
//! - **`ManagerFactory`** / **`ClockFactory`**: the injection seam that lets
//!   callers swap the scheduling backend (e.g. a manual clock in tests)

pub mod factory;
pub mod timer_manager;

pub use factory::{ClockFactory, ManagerFactory};
pub use timer_manager::{ManagerControl, ManagerState, TimerManager};
