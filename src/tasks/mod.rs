//! Background tasks module
//!
//! Tasks spawned next to the HTTP server: the tick loop that drives due
//! alerts and the keeper that holds the wake lock while timers exist.

pub mod tick_loop;
pub mod wake_lock_keeper;

// Re-export main functions
pub use tick_loop::tick_task;
pub use wake_lock_keeper::{wake_lock_task, WAKE_LOCK_RETRY};
