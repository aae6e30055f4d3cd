use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PinningConfig {
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Probe the endpoint certificate before reporting `Connected`.
    #[serde(default = "default_true")]
    pub verify_on_start: bool,

    /// Consecutive pin mismatches tolerated before the session is halted.
    #[serde(default = "default_max_trust_failures")]
    pub max_trust_failures: u32,

    /// Interval of the background certificate monitor; 0 disables it.
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,

    #[serde(default = "default_expiry_warning_days")]
    pub expiry_warning_days: u32,
}

impl PinningConfig {
    pub fn monitor_interval(&self) -> Option<Duration> {
        (self.monitor_interval_secs > 0).then(|| Duration::from_secs(self.monitor_interval_secs))
    }

    pub fn expiry_warning(&self) -> Duration {
        Duration::from_secs(u64::from(self.expiry_warning_days) * 24 * 60 * 60)
    }
}

impl Default for PinningConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            verify_on_start: true,
            max_trust_failures: default_max_trust_failures(),
            monitor_interval_secs: default_monitor_interval_secs(),
            expiry_warning_days: default_expiry_warning_days(),
        }
    }
}

fn default_store_path() -> String {
    "ferrous-doh-pins.toml".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_trust_failures() -> u32 {
    3
}

fn default_monitor_interval_secs() -> u64 {
    60
}

fn default_expiry_warning_days() -> u32 {
    30
}
