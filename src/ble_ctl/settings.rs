use std::time::Duration;

use crate::gatt_const::REMOTE_DEVICE_NAME;

/// Fixed-delay retry configuration of the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before the first readiness probe, for a BLE stack that is
    /// still coming up after boot.
    pub initial_delay: Duration,
    /// Pause between scan attempts and after a lost connection.
    pub per_attempt_delay: Duration,
    pub max_scan_readiness_attempts: u32,
    pub readiness_probe_delay: Duration,
    pub readiness_probe_window: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            per_attempt_delay: Duration::from_secs(2),
            max_scan_readiness_attempts: 6,
            readiness_probe_delay: Duration::from_secs(5),
            readiness_probe_window: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub device_name: String,
    pub scan_timeout: Duration,
    /// Upper bound for connect and subscribe calls.
    pub operation_timeout: Duration,
    pub liveness_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            device_name: REMOTE_DEVICE_NAME.to_string(),
            scan_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(10),
            liveness_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}
