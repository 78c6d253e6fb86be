//! Configuration types and defaults

use serde::{Deserialize, Serialize};
use trackrec_core::{TrackRecError, TrackRecResult};
use trackrec_recorder::RecorderConfig;
use trackrec_thumbnails::ExtractorConfig;

/// Default log directive used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str =
    "trackrec=debug,trackrec_recorder=debug,trackrec_thumbnails=debug";

/// Global trackrec configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Install a tracing subscriber on init
    pub debug_logging: bool,
    /// Filter directive for that subscriber; `RUST_LOG` takes precedence
    pub log_filter: String,
    /// Runtime worker threads; `None` uses one per core
    pub worker_threads: Option<usize>,
    /// Recording requests
    pub recorder: RecorderConfig,
    /// Thumbnail extraction
    pub extractor: ExtractorConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            worker_threads: None,
            recorder: RecorderConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> TrackRecResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate this configuration and the nested ones
    pub fn validate(&self) -> TrackRecResult<()> {
        if self.worker_threads == Some(0) {
            return Err(TrackRecError::InvalidConfiguration {
                message: "worker_threads must be at least 1".to_string(),
            });
        }
        self.recorder.validate()?;
        self.extractor.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = GlobalConfig::from_json_str(
            r#"{ "debug_logging": true, "recorder": { "idle_backoff_ms": 5 } }"#,
        )
        .unwrap();

        assert!(config.debug_logging);
        assert_eq!(config.recorder.idle_backoff_ms, 5);
        assert_eq!(config.recorder.event_capacity, RecorderConfig::default().event_capacity);
        assert_eq!(config.extractor, ExtractorConfig::default());
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let err = GlobalConfig::from_json_str("{ not json").unwrap_err();
        assert_eq!(err.error_code(), "JSON_ERROR");
    }

    #[test]
    fn test_zero_worker_threads_rejected() {
        let err = GlobalConfig::from_json_str(r#"{ "worker_threads": 0 }"#).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIGURATION");
    }

    #[test]
    fn test_nested_validation() {
        let config = GlobalConfig {
            extractor: ExtractorConfig {
                max_concurrent_requests: 0,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
