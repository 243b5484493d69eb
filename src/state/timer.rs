//! Re-dosing timer record and its pure time computations

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::catalog::AgentKey;

pub const MIN_TARGET_MS: i64 = 60_000;
pub const MAX_TARGET_MS: i64 = 240 * 60_000;

/// Clamp a target duration to [1, 240] minutes
pub fn clamp_target_ms(ms: i64) -> i64 {
    ms.clamp(MIN_TARGET_MS, MAX_TARGET_MS)
}

pub fn minutes_to_ms(minutes: i64) -> i64 {
    minutes.saturating_mul(60_000)
}

/// Unique timer identifier, stable for the instance's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(String);

impl TimerId {
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TimerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TimerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dosing phase the current clock is measuring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Bolus,
    Maintenance,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Bolus => f.write_str("Bolus"),
            Phase::Maintenance => f.write_str("Maintenance"),
        }
    }
}

/// A single relaxant re-dosing timer
///
/// Remaining time is never stored; it is derived from `started_at`, the
/// target and the instant it is asked about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: TimerId,
    pub agent: AgentKey,
    pub phase: Phase,
    /// Start of the current phase/cycle
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    /// First bolus dose, kept across top-ups
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_dose_at: Option<DateTime<Utc>>,
    pub target_duration_ms: i64,
    pub silenced: bool,
    #[serde(default)]
    pub top_up_count: u32,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub paused_at: Option<DateTime<Utc>>,
}

impl Timer {
    /// New bolus timer started at `now`
    pub fn bolus(agent: AgentKey, target_ms: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: TimerId::generate(),
            agent,
            phase: Phase::Bolus,
            started_at: now,
            first_dose_at: Some(now),
            target_duration_ms: clamp_target_ms(target_ms),
            silenced: false,
            top_up_count: 0,
            paused_at: None,
        }
    }

    /// Restart the clock for a maintenance dose
    pub fn top_up(&mut self, target_ms: i64, now: DateTime<Utc>) {
        self.phase = Phase::Maintenance;
        self.started_at = now;
        self.target_duration_ms = clamp_target_ms(target_ms);
        self.top_up_count = self.top_up_count.saturating_add(1);
        self.silenced = false;
        self.paused_at = None;
    }

    /// Re-apply the target clamp to a record read back from storage
    pub fn sanitized(mut self) -> Self {
        self.target_duration_ms = clamp_target_ms(self.target_duration_ms);
        self
    }

    pub fn nudge(&mut self, delta_minutes: i64) {
        self.target_duration_ms =
            clamp_target_ms(self.target_duration_ms.saturating_add(minutes_to_ms(delta_minutes)));
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Resume, shifting the start forward by the time spent paused
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Some(paused_at) = self.paused_at.take() {
            let paused_for = now.signed_duration_since(paused_at).max(Duration::zero());
            if let Some(shifted) = self.started_at.checked_add_signed(paused_for) {
                self.started_at = shifted;
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn target(&self) -> Duration {
        Duration::try_milliseconds(clamp_target_ms(self.target_duration_ms)).unwrap_or_else(Duration::zero)
    }

    pub fn target_minutes(&self) -> i64 {
        self.target_duration_ms / 60_000
    }

    /// Elapsed time in the current cycle; frozen while paused
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let anchor = self.paused_at.unwrap_or(now);
        anchor.signed_duration_since(self.started_at)
    }

    /// Signed remaining time; negative means overdue by that magnitude
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.target()
            .checked_sub(&self.elapsed(now))
            .unwrap_or_else(Duration::min_value)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now) <= Duration::zero()
    }

    /// Due and still allowed to alert
    pub fn is_alerting(&self, now: DateTime<Utc>) -> bool {
        !self.silenced && self.is_due(now)
    }

    /// Elapsed share of the target, 0-100
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        let target_ms = self.target().num_milliseconds();
        if target_ms <= 0 {
            return 100.0;
        }
        let pct = self.elapsed(now).num_milliseconds() as f64 / target_ms as f64 * 100.0;
        pct.clamp(0.0, 100.0)
    }

    pub fn since_first_dose(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.first_dose_at.map(|at| now.signed_duration_since(at))
    }
}

/// Format milliseconds as `mm:ss`, with a leading minus when negative
pub fn format_clock(ms: i64) -> String {
    let sign = if ms < 0 { "-" } else { "" };
    let secs = ms.unsigned_abs() / 1000;
    format!("{}{:02}:{:02}", sign, secs / 60, secs % 60)
}
