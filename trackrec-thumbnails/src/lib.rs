//! # trackrec thumbnails
//!
//! Keyed, cancellable thumbnail extraction. Each request decodes frames near
//! a list of timestamps with its own decoder and reports progress as an
//! ordered event sequence, either over a channel or through a
//! [`ThumbnailExtractListener`]. A caller-owned [`ThumbnailCache`] can
//! short-circuit extraction entirely through the [`CachedThumbnailLoader`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod extractor;
pub mod listener;
pub mod params;

pub use cache::{CacheStats, CachedThumbnailLoader, CachingListener, LoadSource, ThumbnailCache};
pub use config::{ExtractorConfig, ThumbnailCacheConfig};
pub use extractor::ThumbnailExtractor;
pub use listener::{ExtractionEvent, ThumbnailExtractListener};
pub use params::{ExtractionMode, ThumbnailExtractParameters};
