//! Wake-lock keeper background task

use std::{sync::Arc, time::Duration};
use tokio::time::interval;
use tracing::{debug, info};

use crate::state::AppState;

pub const WAKE_LOCK_RETRY: Duration = Duration::from_secs(15);

/// Hold the wake lock while timers exist, release it when none remain
///
/// Acquisition is best effort; a failure is retried on the next round or the
/// next change in the timer count.
pub async fn wake_lock_task(state: Arc<AppState>, retry: Duration) {
    if !state.wake_lock.is_enabled() {
        info!("Wake lock disabled");
        return;
    }
    info!("Starting wake-lock keeper");

    let mut count_rx = state.subscribe_timer_count();
    let mut ticker = interval(retry);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = count_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }

        let timers = *count_rx.borrow_and_update();
        if timers > 0 {
            if !state.wake_lock.is_held() {
                if let Err(e) = state.wake_lock.acquire() {
                    debug!("Wake lock unavailable, will retry: {}", e);
                }
            }
        } else if state.wake_lock.is_held() {
            state.wake_lock.release();
        }
    }
}
