//! State management module
//!
//! The relaxant timer record, the timer collection state machine and the
//! application state that wires them to the device services.

pub mod app_state;
pub mod board;
pub mod timer;

// Re-export main types
pub use app_state::{AppState, Services, TickReport};
pub use board::{GiveOutcome, TimerBoard, TimerError};
pub use timer::{clamp_target_ms, format_clock, minutes_to_ms, Phase, Timer, TimerId};
