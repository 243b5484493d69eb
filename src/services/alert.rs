//! Due-alert engine
//!
//! `pulse` fires every configured sink once and swallows failures; a missing
//! audio device must never interrupt the timers. The due cadence is a single
//! repeating task shared by all timers, so simultaneous due timers never
//! produce overlapping beeps.

use std::{
    io::Write,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

pub const DEFAULT_ALERT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert output unavailable: {0}")]
    Unavailable(#[from] std::io::Error),
}

/// One way of getting the clinician's attention
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;
    fn pulse(&self) -> Result<(), AlertError>;
}

/// Terminal bell on stderr
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AlertSink for TerminalBell {
    fn name(&self) -> &'static str {
        "bell"
    }

    fn pulse(&self) -> Result<(), AlertError> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

/// Log line at warn level, always available
#[derive(Debug, Default)]
pub struct LogAlert;

impl AlertSink for LogAlert {
    fn name(&self) -> &'static str {
        "log"
    }

    fn pulse(&self) -> Result<(), AlertError> {
        warn!("Relaxant redose alert");
        Ok(())
    }
}

struct Pulser {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl Pulser {
    fn pulse(&self) {
        for sink in &self.sinks {
            if let Err(e) = sink.pulse() {
                debug!("Alert sink {} failed: {}", sink.name(), e);
            }
        }
    }
}

pub struct AlertEngine {
    pulser: Arc<Pulser>,
    interval: Duration,
    cadence: Mutex<Option<JoinHandle<()>>>,
}

impl AlertEngine {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>, interval: Duration) -> Self {
        Self {
            pulser: Arc::new(Pulser { sinks }),
            interval: interval.max(Duration::from_millis(100)),
            cadence: Mutex::new(None),
        }
    }

    /// Engine with no outputs
    pub fn silent() -> Self {
        Self::new(Vec::new(), DEFAULT_ALERT_INTERVAL)
    }

    /// Emit one alert on every sink, best effort
    pub fn pulse(&self) {
        self.pulser.pulse();
    }

    pub fn is_cadence_running(&self) -> bool {
        self.cadence
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    /// Start the repeating due alert; no-op if already running
    ///
    /// The first repeat comes one interval from now. Returns whether a new
    /// loop was started.
    pub fn start_due_cadence(&self) -> bool {
        let Ok(mut slot) = self.cadence.lock() else {
            warn!("Alert cadence lock poisoned");
            return false;
        };
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("No runtime for alert cadence: {}", e);
                return false;
            }
        };

        let pulser = Arc::clone(&self.pulser);
        let period = self.interval;
        *slot = Some(runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                pulser.pulse();
            }
        }));
        info!("Due alert cadence started ({}s)", period.as_secs_f32());
        true
    }

    /// Stop the repeating due alert; no-op if not running
    pub fn stop_due_cadence(&self) -> bool {
        let Ok(mut slot) = self.cadence.lock() else {
            return false;
        };
        match slot.take() {
            Some(handle) => {
                handle.abort();
                info!("Due alert cadence stopped");
                true
            }
            None => false,
        }
    }
}

impl Drop for AlertEngine {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.cadence.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}
