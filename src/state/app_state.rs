//! Main application state management
//!
//! `AppState` owns the timer board and wires every mutation to persistence,
//! the alert engine and the tick loop. Mutations are applied and persisted in
//! call order under one lock; persistence never fails the operation, and an
//! operation on a stale timer id changes nothing.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{minutes_to_ms, GiveOutcome, Timer, TimerBoard, TimerError, TimerId};
use crate::{
    catalog::AgentKey,
    patient::Patient,
    services::{AlertEngine, GiveEvent, KeyValueStore, Subscription, TimerStore, TriggerChannel, WakeLock},
    utils::Clock,
};

/// Collaborators injected into [`AppState`]
pub struct Services {
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn KeyValueStore>,
    pub alerts: AlertEngine,
    pub trigger: TriggerChannel,
    pub wake_lock: WakeLock,
}

/// Result of one alert evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Timers due and not silenced
    pub alerting: usize,
    /// Timers that entered the alerting set on this evaluation
    pub newly_due: usize,
}

pub struct AppState {
    board: Mutex<TimerBoard>,
    /// Alerting set as of the last evaluation
    alerting: Mutex<HashSet<TimerId>>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn KeyValueStore>,
    timer_store: TimerStore,
    pub alerts: AlertEngine,
    pub trigger: TriggerChannel,
    pub wake_lock: WakeLock,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    last_action: Mutex<Option<(String, DateTime<Utc>)>>,
    /// Number of timers, watched by the background tasks
    timer_count_tx: watch::Sender<usize>,
}

impl AppState {
    /// Create the state, restoring any persisted timers
    pub fn new(services: Services, host: String, port: u16) -> Self {
        let timer_store = TimerStore::new(Arc::clone(&services.store));
        let restored = timer_store.load();
        if !restored.is_empty() {
            info!("Restored {} relaxant timer(s)", restored.len());
        }
        let (timer_count_tx, _) = watch::channel(restored.len());

        Self {
            board: Mutex::new(TimerBoard::from_timers(restored)),
            alerting: Mutex::new(HashSet::new()),
            clock: services.clock,
            store: services.store,
            timer_store,
            alerts: services.alerts,
            trigger: services.trigger,
            wake_lock: services.wake_lock,
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            timer_count_tx,
        }
    }

    fn board(&self) -> MutexGuard<'_, TimerBoard> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Apply a mutation, then persist, notify and re-evaluate alerts
    fn mutate<T, F>(&self, action: &str, op: F) -> T
    where
        F: FnOnce(&mut TimerBoard, DateTime<Utc>) -> T,
    {
        let now = self.now();
        let mut board = self.board();
        let result = op(&mut board, now);
        self.commit(action, board, now);
        result
    }

    /// Like [`Self::mutate`], but a stale timer id changes nothing at all
    fn try_mutate<T, F>(&self, action: &str, op: F) -> Result<T, TimerError>
    where
        F: FnOnce(&mut TimerBoard, DateTime<Utc>) -> Result<T, TimerError>,
    {
        let now = self.now();
        let mut board = self.board();
        match op(&mut board, now) {
            Ok(result) => {
                self.commit(action, board, now);
                Ok(result)
            }
            Err(e) => {
                drop(board);
                debug!("Ignoring {} on stale timer: {}", action, e);
                Err(e)
            }
        }
    }

    /// Persist while still holding the board, so saves land in mutation order
    fn commit(&self, action: &str, board: MutexGuard<'_, TimerBoard>, now: DateTime<Utc>) {
        self.timer_store.save(board.timers());
        let count = board.len();
        drop(board);

        if let Ok(mut last) = self.last_action.lock() {
            *last = Some((action.to_string(), now));
        }
        self.timer_count_tx.send_replace(count);
        self.evaluate_alerts(now);
    }

    /// Start a bolus timer, with the agent default or a custom duration
    pub fn start(&self, agent: AgentKey, minutes: Option<i64>) -> Timer {
        let timer = self.mutate("start", |board, now| {
            let minutes = minutes.unwrap_or(agent.info().bolus_minutes_default);
            board.insert(Timer::bolus(agent, minutes_to_ms(minutes), now)).clone()
        });
        info!("Started {} bolus timer {} ({} min)", agent, timer.id, timer.target_minutes());
        timer
    }

    pub fn start_bolus(&self, agent: AgentKey) -> Timer {
        self.start(agent, None)
    }

    /// Switch to maintenance, restart the clock and confirm with a pulse
    pub fn top_up_and_restart(&self, id: &TimerId, minutes: Option<i64>) -> Result<Timer, TimerError> {
        let timer = self.try_mutate("top-up", |board, now| {
            board.top_up_and_restart(id, minutes, now).cloned()
        })?;
        info!("Timer {} topped up, maintenance {} min", id, timer.target_minutes());
        self.alerts.pulse();
        Ok(timer)
    }

    pub fn nudge(&self, id: &TimerId, delta_minutes: i64) -> Result<Timer, TimerError> {
        self.try_mutate("nudge", |board, _| board.nudge(id, delta_minutes).cloned())
    }

    pub fn silence(&self, id: &TimerId) -> Result<Timer, TimerError> {
        let timer = self.try_mutate("silence", |board, _| board.silence(id).cloned())?;
        info!("Timer {} silenced", id);
        Ok(timer)
    }

    pub fn pause(&self, id: &TimerId) -> Result<Timer, TimerError> {
        self.try_mutate("pause", |board, now| board.pause(id, now).cloned())
    }

    pub fn resume(&self, id: &TimerId) -> Result<Timer, TimerError> {
        self.try_mutate("resume", |board, now| board.resume(id, now).cloned())
    }

    pub fn remove(&self, id: &TimerId) -> Result<Timer, TimerError> {
        let timer = self.try_mutate("remove", |board, _| board.remove(id))?;
        info!("Timer {} removed", id);
        Ok(timer)
    }

    /// Handle a dosing action for an agent
    pub fn give(&self, event: &GiveEvent) -> GiveOutcome {
        let outcome = self.mutate("give", |board, now| board.give(event.agent_key, now));
        match &outcome {
            GiveOutcome::Started(id) => info!("Give {}: started timer {}", event.agent_key, id),
            GiveOutcome::Restarted(id) => {
                info!("Give {}: restarted timer {}", event.agent_key, id);
                self.alerts.pulse();
            }
        }
        outcome
    }

    /// Subscribe this state to give events on its trigger channel
    ///
    /// The handler holds only a weak reference, so the subscription never
    /// keeps the state alive.
    pub fn attach_trigger(self: &Arc<Self>) -> Subscription {
        let weak = Arc::downgrade(self);
        self.trigger.subscribe(move |event| match weak.upgrade() {
            Some(state) => {
                state.give(event);
            }
            None => warn!("Give event for {} after shutdown", event.agent_key),
        })
    }

    /// Publish a give event for `agent` now; returns the delivery count
    pub fn publish_give(&self, agent: AgentKey) -> (GiveEvent, usize) {
        let event = GiveEvent::new(agent, self.now());
        let delivered = self.trigger.publish(event);
        (event, delivered)
    }

    /// Recompute the alerting set and drive the alert engine
    ///
    /// Pulses once when a timer newly becomes due, keeps the shared cadence
    /// running while any timer is alerting and stops it otherwise.
    ///
    /// The alerting set stays locked from the board read through the
    /// start/stop decision, so evaluations apply in snapshot order.
    pub fn evaluate_alerts(&self, now: DateTime<Utc>) -> TickReport {
        let mut previous = self.alerting.lock().unwrap_or_else(PoisonError::into_inner);
        let current: HashSet<TimerId> = self.board().alerting(now).into_iter().collect();
        let newly_due = current.difference(&previous).count();
        *previous = current;
        let alerting = previous.len();

        if newly_due > 0 {
            info!("{} timer(s) due for redose", newly_due);
            self.alerts.pulse();
        }
        if alerting > 0 {
            self.alerts.start_due_cadence();
        } else {
            self.alerts.stop_due_cadence();
        }
        TickReport { alerting, newly_due }
    }

    pub fn tick(&self) -> TickReport {
        self.evaluate_alerts(self.now())
    }

    pub fn timers(&self) -> Vec<Timer> {
        self.board().timers().to_vec()
    }

    pub fn timer(&self, id: &TimerId) -> Option<Timer> {
        self.board().get(id).cloned()
    }

    pub fn timer_count(&self) -> usize {
        *self.timer_count_tx.borrow()
    }

    pub fn subscribe_timer_count(&self) -> watch::Receiver<usize> {
        self.timer_count_tx.subscribe()
    }

    /// Called after the tick loop notices the process was asleep
    pub fn on_resume(&self) {
        if self.timer_count() > 0 {
            if let Err(e) = self.wake_lock.acquire() {
                debug!("Wake lock re-acquire after resume failed: {}", e);
            }
        }
        self.tick();
    }

    pub fn patient(&self) -> Option<Patient> {
        Patient::load(self.store.as_ref())
    }

    pub fn set_patient(&self, patient: &Patient) {
        patient.save(self.store.as_ref());
    }

    /// Write the current collection; used at shutdown
    pub fn persist(&self) {
        let board = self.board();
        self.timer_store.save(board.timers());
    }

    /// Stop background effects and flush state
    pub fn shutdown(&self) {
        self.alerts.stop_due_cadence();
        self.wake_lock.release();
        self.persist();
        info!("Timer state persisted");
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        match self.last_action.lock().ok().and_then(|last| last.clone()) {
            Some((action, at)) => (Some(action), Some(at)),
            None => (None, None),
        }
    }
}
