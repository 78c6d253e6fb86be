//! Recorder configuration

use serde::{Deserialize, Serialize};
use trackrec_core::{TrackRecError, TrackRecResult};

/// Drive loop and event settings for recording requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Timeout passed to encoder dequeue calls; 0 polls without blocking
    pub dequeue_timeout_us: i64,
    /// Sleep between steps that wrote no encoded output
    pub idle_backoff_ms: u64,
    /// Capacity of the request event broadcast channel
    pub event_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            dequeue_timeout_us: 0,
            idle_backoff_ms: 2,
            event_capacity: 64,
        }
    }
}

impl RecorderConfig {
    /// Check values the drive loop cannot work with
    pub fn validate(&self) -> TrackRecResult<()> {
        if self.dequeue_timeout_us < 0 {
            return Err(TrackRecError::InvalidConfiguration {
                message: format!(
                    "dequeue_timeout_us must not be negative (got {})",
                    self.dequeue_timeout_us
                ),
            });
        }
        if self.event_capacity == 0 {
            return Err(TrackRecError::InvalidConfiguration {
                message: "event_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RecorderConfig::default();
        assert_eq!(config.dequeue_timeout_us, 0);
        assert_eq!(config.idle_backoff_ms, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RecorderConfig = serde_json::from_str(r#"{"idle_backoff_ms": 0}"#).unwrap();
        assert_eq!(config.idle_backoff_ms, 0);
        assert_eq!(config.event_capacity, 64);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = RecorderConfig {
            event_capacity: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIGURATION");
    }
}
