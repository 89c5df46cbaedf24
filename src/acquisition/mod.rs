mod stats;
mod worker;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use stats::{AcquisitionStats, StatsSnapshot};
pub use worker::{release_device, AcquisitionLoop, AcquisitionWorker, DeviceCommand, SpawnError, StepOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Sleep between fetches on the acquisition thread.
    pub idle_sleep_ms: u64,
    /// Upper bound on waiting for the thread to finish on stop.
    pub stop_timeout_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            idle_sleep_ms: 1,
            stop_timeout_ms: 2000,
        }
    }
}

impl AcquisitionConfig {
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.stop_timeout_ms == 0 {
            return Err("Stop timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}
