//! Utility functions module
//!
//! Clock sources and process signal handling.

pub mod clock;
pub mod signals;

pub use clock::{Clock, ManualClock, SystemClock};
pub use signals::shutdown_signal;
