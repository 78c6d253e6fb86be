//! Client-side thumbnail caching
//!
//! The cache belongs to the caller, not the extractor. Entries are keyed by
//! the requested timestamp, so a fast extraction that returned a nearby key
//! frame is still found under the timestamp that was asked for.

use crate::config::ThumbnailCacheConfig;
use crate::extractor::ThumbnailExtractor;
use crate::listener::{ExtractionEvent, ThumbnailExtractListener};
use crate::params::ThumbnailExtractParameters;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use trackrec_core::{Thumbnail, TrackRecError};

/// Cache counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    /// Cached thumbnails
    pub entries: usize,
    /// Maximum cached thumbnails
    pub capacity: usize,
    /// Lookups that found a thumbnail
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0.0 before any lookup
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded, least-recently-used thumbnail cache keyed by timestamp
pub struct ThumbnailCache {
    entries: Mutex<LruCache<i64, Thumbnail>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ThumbnailCache {
    /// Create a cache from configuration
    pub fn new(config: ThumbnailCacheConfig) -> Self {
        Self::with_capacity(config.capacity)
    }

    /// Create a cache holding up to `capacity` thumbnails (0 means the default)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(ThumbnailCacheConfig::DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up one timestamp, marking it recently used
    pub fn get(&self, timestamp_us: i64) -> Option<Thumbnail> {
        let found = self.entries.lock().get(&timestamp_us).cloned();
        self.record_lookup(found.is_some());
        found
    }

    /// Look up every timestamp; `None` unless all of them are cached
    pub fn get_all(&self, timestamps_us: &[i64]) -> Option<Vec<Thumbnail>> {
        let mut entries = self.entries.lock();
        let mut found = Vec::with_capacity(timestamps_us.len());
        for timestamp_us in timestamps_us {
            match entries.get(timestamp_us) {
                Some(thumbnail) => {
                    self.record_lookup(true);
                    found.push(thumbnail.clone());
                }
                None => {
                    self.record_lookup(false);
                    return None;
                }
            }
        }
        Some(found)
    }

    /// Store a thumbnail, evicting the least recently used one when full
    pub fn put(&self, timestamp_us: i64, thumbnail: Thumbnail) {
        if let Some((evicted, _)) = self.entries.lock().push(timestamp_us, thumbnail) {
            if evicted != timestamp_us {
                debug!(evicted, "Evicted cached thumbnail");
            }
        }
    }

    /// Whether a timestamp is cached, without touching recency or counters
    pub fn contains(&self, timestamp_us: i64) -> bool {
        self.entries.lock().contains(&timestamp_us)
    }

    /// Cached thumbnail count
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn record_lookup(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new(ThumbnailCacheConfig::default())
    }
}

impl std::fmt::Debug for ThumbnailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Listener that stores extracted thumbnails before forwarding events
pub struct CachingListener<L> {
    cache: Arc<ThumbnailCache>,
    timestamps_us: Vec<i64>,
    inner: L,
}

impl<L: ThumbnailExtractListener> CachingListener<L> {
    /// Wrap `inner`, caching into `cache`
    pub fn new(cache: Arc<ThumbnailCache>, inner: L) -> Self {
        Self {
            cache,
            timestamps_us: Vec::new(),
            inner,
        }
    }
}

impl<L: ThumbnailExtractListener> ThumbnailExtractListener for CachingListener<L> {
    fn on_started(&mut self, id: &str, timestamps_us: &[i64]) {
        self.timestamps_us = timestamps_us.to_vec();
        self.inner.on_started(id, timestamps_us);
    }

    fn on_extracted(&mut self, id: &str, index: usize, thumbnail: Option<Thumbnail>) {
        if let (Some(thumbnail), Some(&timestamp_us)) =
            (&thumbnail, self.timestamps_us.get(index))
        {
            self.cache.put(timestamp_us, thumbnail.clone());
        }
        self.inner.on_extracted(id, index, thumbnail);
    }

    fn on_completed(&mut self, id: &str) {
        self.inner.on_completed(id);
    }

    fn on_cancelled(&mut self, id: &str) {
        self.inner.on_cancelled(id);
    }

    fn on_error(&mut self, id: &str, error: &TrackRecError) {
        self.inner.on_error(id, error);
    }
}

/// Where a load was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Every timestamp was cached; the extractor was not involved
    Cache,
    /// An extraction was started
    Extractor,
}

/// Loads thumbnails from the cache when possible, extracting otherwise
#[derive(Debug, Clone)]
pub struct CachedThumbnailLoader {
    extractor: ThumbnailExtractor,
    cache: Arc<ThumbnailCache>,
}

impl CachedThumbnailLoader {
    /// Create a loader
    pub fn new(extractor: ThumbnailExtractor, cache: Arc<ThumbnailCache>) -> Self {
        Self { extractor, cache }
    }

    /// The shared cache
    pub fn cache(&self) -> &Arc<ThumbnailCache> {
        &self.cache
    }

    /// Load and receive events on a channel
    pub fn load(
        &self,
        id: &str,
        params: ThumbnailExtractParameters,
    ) -> (LoadSource, mpsc::UnboundedReceiver<ExtractionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let source = self.load_with_listener(id, params, event_tx);
        (source, event_rx)
    }

    /// Load and report to `listener`.
    ///
    /// A full cache hit delivers the whole event sequence before returning
    /// and cancels any in-flight extraction for `id`, as a new extraction
    /// would.
    pub fn load_with_listener(
        &self,
        id: &str,
        params: ThumbnailExtractParameters,
        mut listener: impl ThumbnailExtractListener + 'static,
    ) -> LoadSource {
        let Some(thumbnails) = self.cache.get_all(&params.timestamps_us) else {
            self.extractor.extract_with_listener(
                id,
                params,
                CachingListener::new(self.cache.clone(), listener),
            );
            return LoadSource::Extractor;
        };

        self.extractor.stop(id);
        let ThumbnailExtractParameters {
            timestamps_us,
            mut decoder,
            ..
        } = params;
        decoder.release();

        debug!(
            request_id = id,
            count = thumbnails.len(),
            "Serving thumbnails from cache"
        );
        listener.on_started(id, &timestamps_us);
        for (index, thumbnail) in thumbnails.into_iter().enumerate() {
            listener.on_extracted(id, index, Some(thumbnail));
        }
        listener.on_completed(id);
        LoadSource::Cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thumbnail(timestamp_us: i64) -> Thumbnail {
        Thumbnail::new(timestamp_us, 1, 1, vec![0u8; 4].into())
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ThumbnailCache::with_capacity(2);
        cache.put(0, thumbnail(0));
        cache.put(1, thumbnail(1));
        assert!(cache.get(0).is_some());

        cache.put(2, thumbnail(2));

        assert!(cache.contains(0));
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_uses_default() {
        let cache = ThumbnailCache::with_capacity(0);
        assert_eq!(cache.stats().capacity, ThumbnailCacheConfig::DEFAULT_CAPACITY);
    }

    #[test]
    fn test_get_all_requires_every_timestamp() {
        let cache = ThumbnailCache::default();
        cache.put(0, thumbnail(0));
        cache.put(1_000_000, thumbnail(1_000_000));

        assert_eq!(cache.get_all(&[0, 1_000_000]).map(|t| t.len()), Some(2));
        assert!(cache.get_all(&[0, 2_000_000]).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_caching_listener_keys_by_requested_timestamp() {
        let cache = Arc::new(ThumbnailCache::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut listener = CachingListener::new(cache.clone(), tx);

        listener.on_started("req", &[1_500_000, 2_500_000]);
        listener.on_extracted("req", 0, Some(thumbnail(1_000_000)));
        listener.on_extracted("req", 1, None);
        listener.on_completed("req");

        assert_eq!(cache.get(1_500_000).map(|t| t.timestamp_us), Some(1_000_000));
        assert!(!cache.contains(2_500_000));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 4);
    }
}
