//! Polling intervals and deadlines.

use std::time::Duration;

use serde::Deserialize;

use crate::application::cluster::{DEFAULT_CLUSTER_READY, DEFAULT_STATUS_CONCURRENCY};
use crate::application::machine::MachineTiming;
use crate::application::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    /// Interval between readiness probes.
    pub poll_interval_ms: u64,
    /// How long to wait for the container engine to start.
    pub engine_start_timeout_secs: u64,
    /// How long to wait for the container engine after a settings change.
    pub engine_restart_timeout_secs: u64,
    /// How long to wait for a new cluster's API server and context.
    pub cluster_ready_timeout_secs: u64,
    /// Pause after writing engine settings before probing.
    pub settings_settle_ms: u64,
    /// Concurrent status lookups when listing clusters.
    pub status_concurrency: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            engine_start_timeout_secs: 60,
            engine_restart_timeout_secs: 120,
            cluster_ready_timeout_secs: 180,
            settings_settle_ms: 2000,
            status_concurrency: DEFAULT_STATUS_CONCURRENCY,
        }
    }
}

impl TimingConfig {
    pub fn machine_timing(&self) -> MachineTiming {
        let interval = Duration::from_millis(self.poll_interval_ms);
        MachineTiming {
            start: RetryPolicy::new(interval, Duration::from_secs(self.engine_start_timeout_secs)),
            restart: RetryPolicy::new(interval, Duration::from_secs(self.engine_restart_timeout_secs)),
            settle: Duration::from_millis(self.settings_settle_ms),
        }
    }

    pub fn cluster_ready(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_secs(self.cluster_ready_timeout_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_machine_defaults() {
        assert_eq!(TimingConfig::default().machine_timing(), MachineTiming::default());
        assert_eq!(TimingConfig::default().cluster_ready(), DEFAULT_CLUSTER_READY);
    }
}
