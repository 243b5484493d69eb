//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::AgentKey,
    patient::DoseSuggestion,
    services::GiveEvent,
    state::{format_clock, Phase, Timer, TimerId},
};

/// Body of POST /timers
#[derive(Debug, Clone, Deserialize)]
pub struct StartRequest {
    pub agent: AgentKey,
    /// Custom duration; the agent's bolus default when absent
    #[serde(default)]
    pub minutes: Option<f64>,
}

/// Body of POST /timers/:id/top-up
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopUpRequest {
    #[serde(default)]
    pub minutes: Option<f64>,
}

/// Body of POST /timers/:id/nudge
#[derive(Debug, Clone, Deserialize)]
pub struct NudgeRequest {
    pub delta_minutes: f64,
}

/// Turn a user-entered minute value into whole minutes
///
/// Out-of-range values are clamped later by the timer itself.
pub fn whole_minutes(minutes: Option<f64>) -> Option<i64> {
    minutes.filter(|m| m.is_finite()).map(|m| m.round() as i64)
}

/// Display-ready view of one timer at a given instant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerView {
    pub id: TimerId,
    pub agent: AgentKey,
    pub label: String,
    pub phase: Phase,
    /// e.g. "Rocuronium — Bolus"
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub first_dose_at: Option<DateTime<Utc>>,
    pub target_minutes: i64,
    pub remaining_ms: i64,
    /// `mm:ss`, negative when overdue
    pub remaining: String,
    pub since_first_dose: Option<String>,
    pub progress_percent: f64,
    pub due: bool,
    pub silenced: bool,
    pub paused: bool,
    pub top_up_count: u32,
}

impl TimerView {
    pub fn new(timer: &Timer, now: DateTime<Utc>) -> Self {
        let label = timer.agent.info().label;
        let remaining_ms = timer.remaining(now).num_milliseconds();
        Self {
            id: timer.id.clone(),
            agent: timer.agent,
            label: label.to_string(),
            phase: timer.phase,
            title: format!("{} — {}", label, timer.phase),
            started_at: timer.started_at,
            first_dose_at: timer.first_dose_at,
            target_minutes: timer.target_minutes(),
            remaining_ms,
            remaining: format_clock(remaining_ms),
            since_first_dose: timer
                .since_first_dose(now)
                .map(|d| format_clock(d.num_milliseconds())),
            progress_percent: (timer.progress(now) * 10.0).round() / 10.0,
            due: timer.is_due(now),
            silenced: timer.silenced,
            paused: timer.is_paused(),
            top_up_count: timer.top_up_count,
        }
    }
}

/// API response for timer actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: Option<TimerView>,
}

impl ApiResponse {
    pub fn new(status: &str, message: String, timer: Option<TimerView>) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    pub fn ok(message: String, timer: TimerView) -> Self {
        Self::new("ok", message, Some(timer))
    }

    pub fn removed(message: String) -> Self {
        Self::new("removed", message, None)
    }
}

/// Response to POST /give/:agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiveResponse {
    pub event: GiveEvent,
    /// Subscribers that received the event; zero means it was dropped
    pub delivered: usize,
    pub timer: Option<TimerView>,
}

/// Timer list with alerting status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub now: DateTime<Utc>,
    pub timers: Vec<TimerView>,
    pub any_due: bool,
    pub alert_cadence_active: bool,
    pub wake_lock_held: bool,
    pub uptime: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Maintenance dose suggestion for one agent
#[derive(Debug, Clone, Serialize)]
pub struct DoseResponse {
    pub agent: AgentKey,
    pub label: &'static str,
    pub maint_dose_range_mg_per_kg: (f64, f64),
    /// `None` when no usable patient record is stored
    pub suggestion: Option<DoseSuggestion>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
