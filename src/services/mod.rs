//! Device-side services
//!
//! Persistence, alert output, the give-event channel and the wake lock.
//! Everything here is best effort: a failing capability degrades to a log
//! line and never interrupts the timers.

pub mod alert;
pub mod store;
pub mod trigger;
pub mod wake_lock;

pub use alert::{AlertEngine, AlertError, AlertSink, LogAlert, TerminalBell};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError, TimerStore};
pub use trigger::{GiveEvent, Subscription, TriggerChannel};
pub use wake_lock::WakeLock;
