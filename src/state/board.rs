//! Timer collection and its state machine
//!
//! `TimerBoard` owns every timer for the session, most recent first. All
//! operations take `now` explicitly and perform no I/O, so persistence,
//! alerting and scheduling stay with the caller.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::timer::{minutes_to_ms, Timer, TimerId};
use crate::catalog::AgentKey;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("no timer with id {0}")]
    NotFound(TimerId),
}

/// What a give event did to the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiveOutcome {
    Started(TimerId),
    Restarted(TimerId),
}

impl GiveOutcome {
    pub fn timer_id(&self) -> &TimerId {
        match self {
            GiveOutcome::Started(id) | GiveOutcome::Restarted(id) => id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimerBoard {
    timers: Vec<Timer>,
}

impl TimerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_timers(timers: Vec<Timer>) -> Self {
        Self { timers }
    }

    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn get(&self, id: &TimerId) -> Option<&Timer> {
        self.timers.iter().find(|t| &t.id == id)
    }

    fn get_mut(&mut self, id: &TimerId) -> Result<&mut Timer, TimerError> {
        self.timers
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| TimerError::NotFound(id.clone()))
    }

    /// Start a bolus timer with the agent's default duration
    pub fn start_bolus(&mut self, agent: AgentKey, now: DateTime<Utc>) -> TimerId {
        self.start(agent, agent.info().bolus_minutes_default, now)
    }

    /// Start a bolus timer with an explicit duration in minutes
    pub fn start(&mut self, agent: AgentKey, minutes: i64, now: DateTime<Utc>) -> TimerId {
        self.insert(Timer::bolus(agent, minutes_to_ms(minutes), now)).id.clone()
    }

    /// Put a new timer at the head of the collection
    pub fn insert(&mut self, timer: Timer) -> &Timer {
        debug!("Adding {} timer {} for {} min", timer.agent, timer.id, timer.target_minutes());
        self.timers.insert(0, timer);
        &self.timers[0]
    }

    /// Switch to maintenance and restart the clock
    ///
    /// Repeated calls just keep restarting; `minutes` overrides the agent's
    /// maintenance default.
    pub fn top_up_and_restart(
        &mut self,
        id: &TimerId,
        minutes: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<&Timer, TimerError> {
        let timer = self.get_mut(id)?;
        let minutes = minutes.unwrap_or(timer.agent.info().maint_minutes_default);
        timer.top_up(minutes_to_ms(minutes), now);
        debug!("Timer {} topped up ({} so far), {} min", id, timer.top_up_count, minutes);
        Ok(timer)
    }

    pub fn nudge(&mut self, id: &TimerId, delta_minutes: i64) -> Result<&Timer, TimerError> {
        let timer = self.get_mut(id)?;
        timer.nudge(delta_minutes);
        Ok(timer)
    }

    pub fn silence(&mut self, id: &TimerId) -> Result<&Timer, TimerError> {
        let timer = self.get_mut(id)?;
        timer.silenced = true;
        Ok(timer)
    }

    pub fn pause(&mut self, id: &TimerId, now: DateTime<Utc>) -> Result<&Timer, TimerError> {
        let timer = self.get_mut(id)?;
        timer.pause(now);
        Ok(timer)
    }

    pub fn resume(&mut self, id: &TimerId, now: DateTime<Utc>) -> Result<&Timer, TimerError> {
        let timer = self.get_mut(id)?;
        timer.resume(now);
        Ok(timer)
    }

    pub fn remove(&mut self, id: &TimerId) -> Result<Timer, TimerError> {
        let index = self
            .timers
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| TimerError::NotFound(id.clone()))?;
        Ok(self.timers.remove(index))
    }

    /// Route a dosing action: restart the agent's latest timer, or start one
    ///
    /// Timers are kept most recent first, so the first match is the latest.
    pub fn give(&mut self, agent: AgentKey, now: DateTime<Utc>) -> GiveOutcome {
        if let Some(timer) = self.timers.iter_mut().find(|t| t.agent == agent) {
            timer.top_up(minutes_to_ms(agent.info().maint_minutes_default), now);
            debug!("Give {} restarted timer {}", agent, timer.id);
            return GiveOutcome::Restarted(timer.id.clone());
        }
        GiveOutcome::Started(self.start_bolus(agent, now))
    }

    /// Ids of timers that are due and not silenced
    pub fn alerting(&self, now: DateTime<Utc>) -> Vec<TimerId> {
        self.timers
            .iter()
            .filter(|t| t.is_alerting(now))
            .map(|t| t.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::state::timer::Phase;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    #[test]
    fn start_bolus_uses_agent_default_for_every_agent() {
        let mut board = TimerBoard::new();
        for agent in AgentKey::ALL {
            let id = board.start_bolus(agent, t0());
            let timer = board.get(&id).unwrap();
            assert_eq!(timer.phase, Phase::Bolus);
            assert!(!timer.silenced);
            assert_eq!(timer.top_up_count, 0);
            assert_eq!(timer.first_dose_at, Some(t0()));
            assert_eq!(
                timer.remaining(t0()).num_milliseconds(),
                agent.info().bolus_minutes_default * 60_000
            );
        }
    }

    #[test]
    fn newest_timer_is_first() {
        let mut board = TimerBoard::new();
        let first = board.start_bolus(AgentKey::Rocuronium, t0());
        let second = board.start_bolus(AgentKey::Atracurium, t0() + Duration::seconds(5));
        assert_eq!(board.timers()[0].id, second);
        assert_eq!(board.timers()[1].id, first);
    }

    #[test]
    fn rocuronium_bolus_then_maintenance() {
        let mut board = TimerBoard::new();
        let id = board.start_bolus(AgentKey::Rocuronium, t0());
        assert_eq!(board.get(&id).unwrap().phase.to_string(), "Bolus");

        let later = t0() + Duration::minutes(30);
        let timer = board.top_up_and_restart(&id, None, later).unwrap();
        assert_eq!(timer.phase.to_string(), "Maintenance");
        assert_eq!(timer.remaining(later).num_minutes(), 17);
    }

    #[test]
    fn repeated_top_ups_keep_restarting() {
        let mut board = TimerBoard::new();
        let id = board.start_bolus(AgentKey::Vecuronium, t0());
        board.silence(&id).unwrap();
        for n in 1..=3 {
            let now = t0() + Duration::minutes(15 * n);
            let timer = board.top_up_and_restart(&id, None, now).unwrap();
            assert_eq!(timer.phase, Phase::Maintenance);
            assert!(!timer.silenced);
            assert_eq!(timer.started_at, now);
            assert_eq!(timer.top_up_count, n as u32);
        }
    }

    #[test]
    fn top_up_override_is_clamped() {
        let mut board = TimerBoard::new();
        let id = board.start_bolus(AgentKey::Atracurium, t0());
        let timer = board.top_up_and_restart(&id, Some(500), t0()).unwrap();
        assert_eq!(timer.target_minutes(), 240);
    }

    #[test]
    fn silence_does_not_touch_clock() {
        let mut board = TimerBoard::new();
        let id = board.start(AgentKey::Rocuronium, 1, t0());
        let now = t0() + Duration::seconds(61);
        assert_eq!(board.alerting(now), vec![id.clone()]);
        board.silence(&id).unwrap();
        assert!(board.alerting(now).is_empty());
        assert_eq!(board.get(&id).unwrap().started_at, t0());
    }

    #[test]
    fn silencing_one_leaves_others_alerting() {
        let mut board = TimerBoard::new();
        let a = board.start(AgentKey::Rocuronium, 1, t0());
        let b = board.start(AgentKey::Atracurium, 1, t0());
        let now = t0() + Duration::minutes(2);
        board.silence(&a).unwrap();
        assert_eq!(board.alerting(now), vec![b]);
    }

    #[test]
    fn stale_ids_report_not_found() {
        let mut board = TimerBoard::new();
        let id = board.start_bolus(AgentKey::Rocuronium, t0());
        board.remove(&id).unwrap();
        assert!(board.is_empty());
        assert_eq!(board.silence(&id), Err(TimerError::NotFound(id.clone())));
        assert!(board.top_up_and_restart(&id, None, t0()).is_err());
        assert!(board.nudge(&id, 2).is_err());
        assert!(board.remove(&id).is_err());
    }

    #[test]
    fn give_starts_then_restarts_per_agent() {
        let mut board = TimerBoard::new();
        let started = board.give(AgentKey::Atracurium, t0());
        assert!(matches!(started, GiveOutcome::Started(_)));

        let restarted = board.give(AgentKey::Atracurium, t0() + Duration::minutes(40));
        assert_eq!(restarted, GiveOutcome::Restarted(started.timer_id().clone()));
        assert_eq!(board.len(), 1);
        assert_eq!(board.timers()[0].phase, Phase::Maintenance);
        assert_eq!(board.timers()[0].top_up_count, 1);
        assert_eq!(board.timers()[0].target_minutes(), 20);

        board.give(AgentKey::Vecuronium, t0());
        assert_eq!(board.len(), 2);
    }

    #[test]
    fn custom_one_minute_timer_becomes_due() {
        let mut board = TimerBoard::new();
        let id = board.start(AgentKey::Cisatracurium, 1, t0());
        let timer = board.get(&id).unwrap();
        assert!(!timer.is_due(t0() + Duration::seconds(59)));
        assert!(timer.is_due(t0() + Duration::seconds(61)));
        assert!(timer.remaining(t0() + Duration::seconds(61)) < Duration::zero());
    }
}
