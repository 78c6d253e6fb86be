//! Extraction and cache configuration

use serde::{Deserialize, Serialize};
use trackrec_core::{TrackRecError, TrackRecResult};

/// Thumbnail extractor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Requests allowed to decode at the same time; others wait for a slot
    pub max_concurrent_requests: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 4,
        }
    }
}

impl ExtractorConfig {
    /// Reject settings the extractor cannot run with
    pub fn validate(&self) -> TrackRecResult<()> {
        if self.max_concurrent_requests == 0 {
            return Err(TrackRecError::InvalidConfiguration {
                message: "max_concurrent_requests must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Thumbnail cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailCacheConfig {
    /// Maximum cached thumbnails; 0 falls back to the default
    pub capacity: usize,
}

impl ThumbnailCacheConfig {
    /// Capacity used when none is configured
    pub const DEFAULT_CAPACITY: usize = 128;
}

impl Default for ThumbnailCacheConfig {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
        }
    }
}
