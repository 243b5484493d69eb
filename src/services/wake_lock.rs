//! Best-effort sleep inhibitor held while timers are running

use std::{process::Stdio, sync::Mutex};

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Holds a `systemd-inhibit` child process for as long as the lock is held
#[derive(Debug)]
pub struct WakeLock {
    enabled: bool,
    program: String,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl WakeLock {
    pub fn new() -> Self {
        Self::with_command(
            "systemd-inhibit",
            [
                "--what=idle:sleep",
                "--who=redose",
                "--why=Relaxant timers running",
                "--mode=block",
                "sleep",
                "infinity",
            ],
        )
    }

    /// Hold the lock by keeping `program` running until release
    pub fn with_command<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            child: Mutex::new(None),
        }
    }

    /// A lock that never acquires anything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the inhibitor process is alive
    pub fn is_held(&self) -> bool {
        let Ok(mut slot) = self.child.lock() else {
            return false;
        };
        let exited = match slot.as_mut() {
            Some(child) => !matches!(child.try_wait(), Ok(None)),
            None => return false,
        };
        if exited {
            debug!("Wake lock inhibitor exited");
            *slot = None;
        }
        !exited
    }

    /// Try to take the lock; failures are logged and left for the next retry
    pub fn acquire(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.is_held() {
            return Ok(());
        }
        tokio::runtime::Handle::try_current()
            .map_err(|e| format!("No runtime to hold wake lock: {}", e))?;
        let mut slot = self
            .child
            .lock()
            .map_err(|e| format!("Failed to lock wake lock state: {}", e))?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to execute {}: {}", self.program, e))?;

        *slot = Some(child);
        info!("Wake lock acquired");
        Ok(())
    }

    /// Release the lock if held
    pub fn release(&self) {
        let Ok(mut slot) = self.child.lock() else {
            return;
        };
        if let Some(mut child) = slot.take() {
            if let Err(e) = child.start_kill() {
                warn!("Failed to stop wake lock inhibitor: {}", e);
            }
            info!("Wake lock released");
        }
    }
}

impl Default for WakeLock {
    fn default() -> Self {
        Self::new()
    }
}
