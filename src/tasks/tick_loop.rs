//! Tick loop background task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::AppState;

/// Gap between ticks, in tick periods, treated as the process having slept
const SLEEP_GAP_TICKS: u32 = 5;

/// Background task that re-evaluates due timers while any timer exists
///
/// Idles on the timer-count channel while the collection is empty and
/// starts ticking again as soon as a timer is added. Each tick reads the wall
/// clock, so a long gap (device sleep) is detected and recovered from on the
/// very next tick.
pub async fn tick_task(state: Arc<AppState>, period: Duration) {
    info!("Starting tick loop ({}ms)", period.as_millis());

    let mut count_rx = state.subscribe_timer_count();
    let sleep_gap = chrono::Duration::from_std(period * SLEEP_GAP_TICKS)
        .unwrap_or_else(|_| chrono::Duration::seconds(5));

    loop {
        // Wait until there is something to tick for
        while *count_rx.borrow_and_update() == 0 {
            state.tick();
            if count_rx.changed().await.is_err() {
                debug!("Timer count channel closed, tick loop exiting");
                return;
            }
        }

        debug!("Timers present, tick loop running");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = state.now();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = state.now();
                    let gap = now.signed_duration_since(last_tick);
                    last_tick = now;
                    if gap > sleep_gap {
                        info!("No ticks for {}s, resuming after sleep", gap.num_seconds());
                        state.on_resume();
                    } else {
                        state.tick();
                    }
                }

                changed = count_rx.changed() => {
                    if changed.is_err() {
                        debug!("Timer count channel closed, tick loop exiting");
                        return;
                    }
                    if *count_rx.borrow_and_update() == 0 {
                        debug!("No timers left, tick loop idle");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::{
        catalog::AgentKey,
        services::{MemoryStore, WakeLock},
        state::app_state::tests::{harness, harness_with},
    };

    #[tokio::test(start_paused = true)]
    async fn alerts_once_timer_becomes_due() {
        let h = harness();
        let task = tokio::spawn(tick_task(Arc::clone(&h.state), Duration::from_secs(1)));

        h.state.start(AgentKey::Rocuronium, Some(1));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(h.sink.hits.load(Ordering::SeqCst), 0);

        h.clock.advance(chrono::Duration::seconds(61));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(h.sink.hits.load(Ordering::SeqCst), 1);
        assert!(h.state.alerts.is_cadence_running());

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn goes_idle_when_last_timer_removed() {
        let h = harness();
        let task = tokio::spawn(tick_task(Arc::clone(&h.state), Duration::from_secs(1)));

        let timer = h.state.start(AgentKey::Vecuronium, Some(1));
        h.clock.advance(chrono::Duration::minutes(2));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(h.state.alerts.is_cadence_running());

        h.state.remove(&timer.id).unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(!h.state.alerts.is_cadence_running());
        assert!(!task.is_finished());

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_gap_is_treated_as_resume() {
        let h = harness_with(Arc::new(MemoryStore::new()), WakeLock::with_command("sleep", ["3600"]));
        let task = tokio::spawn(tick_task(Arc::clone(&h.state), Duration::from_secs(1)));
        let timer = h.state.start_bolus(AgentKey::Rocuronium);

        // wall clock keeps pace with the ticks: no resume
        for _ in 0..3 {
            h.clock.advance(chrono::Duration::seconds(1));
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert!(!h.state.wake_lock.is_held());

        // ten minutes pass between two ticks
        h.clock.advance(chrono::Duration::minutes(10));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(h.state.wake_lock.is_held());
        let remaining = h.state.timer(&timer.id).unwrap().remaining(h.state.now());
        assert_eq!(remaining.num_minutes(), 20);

        h.state.wake_lock.release();
        task.abort();
    }
}
