//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "redose")]
#[command(about = "Device-local controller for neuromuscular blocker re-dosing timers")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Directory holding persisted timers and patient data
    #[arg(short, long, default_value = "./redose-data")]
    pub data_dir: PathBuf,

    /// Tick interval in milliseconds (100-5000)
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// Seconds between repeated alerts while a timer is due
    #[arg(long, default_value = "10")]
    pub alert_interval_secs: u64,

    /// Do not try to inhibit system sleep while timers run
    #[arg(long)]
    pub no_wake_lock: bool,

    /// Do not ring the terminal bell on alerts
    #[arg(long)]
    pub no_bell: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.clamp(100, 5_000))
    }

    pub fn alert_interval(&self) -> Duration {
        Duration::from_secs(self.alert_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["redose"]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.alert_interval(), Duration::from_secs(10));
        assert_eq!(config.log_level(), "info");
        assert!(!config.no_wake_lock);
    }

    #[test]
    fn tick_interval_is_clamped() {
        let config = Config::try_parse_from(["redose", "--tick-ms", "5", "-v"]).unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.log_level(), "debug");
    }
}
