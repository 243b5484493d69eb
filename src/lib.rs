//! Redose - neuromuscular blocker re-dosing timers
//!
//! Tracks bolus and maintenance phases of relaxant doses against a target
//! duration, alerts when a redose is due, and persists the timers so they
//! survive restarts and device sleep.

pub mod api;
pub mod catalog;
pub mod config;
pub mod patient;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use catalog::{AgentInfo, AgentKey};
pub use config::Config;
pub use state::{AppState, Services};
pub use utils::signals::shutdown_signal;
