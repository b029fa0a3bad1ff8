//! Engine configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use event_store::SnapshotPolicy;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Engine configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `SNAPSHOT_INTERVAL`: events between snapshots, `0` disables (default: `50`)
/// - `REPLAY_STEP_DELAY_MS`: pause between replay steps (default: `0`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub snapshot_interval: u64,
    pub replay_step_delay_ms: u64,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl EngineConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            snapshot_interval: lookup("SNAPSHOT_INTERVAL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.snapshot_interval),
            replay_step_delay_ms: lookup("REPLAY_STEP_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.replay_step_delay_ms),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_format),
        }
    }

    pub fn with_snapshot_interval(mut self, interval: u64) -> Self {
        self.snapshot_interval = interval;
        self
    }

    pub fn snapshot_policy(&self) -> SnapshotPolicy {
        SnapshotPolicy::every(self.snapshot_interval)
    }

    pub fn replay_step_delay(&self) -> Duration {
        Duration::from_millis(self.replay_step_delay_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 50,
            replay_step_delay_ms: 0,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}
