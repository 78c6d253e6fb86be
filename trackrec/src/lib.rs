//! # trackrec - Multi-track media recording
//!
//! trackrec records several media tracks (typically one audio and one
//! video) from their frame sources through encoders into one shared
//! multiplex target, and extracts thumbnails from media sources with a
//! cancellable, ordered event protocol.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trackrec::mock::{MockBufferReader, MockEncoder, MockMediaTarget};
//! use trackrec::{MediaFormat, MediaTargetHandle, TrackReader, TrackRec, TrackRecordParameters};
//!
//! fn main() -> Result<(), trackrec::TrackRecError> {
//!     let trackrec = TrackRec::init()?;
//!     let format = MediaFormat::audio("audio/mp4a-latm", 44_100, 1);
//!     let target = MediaTargetHandle::new(MockMediaTarget::new());
//!
//!     trackrec.recorder().record(
//!         "session",
//!         vec![TrackRecordParameters::new(
//!             TrackReader::buffer(MockBufferReader::new(100, 1024)),
//!             0,
//!             format.clone(),
//!             target,
//!             MockEncoder::new(format),
//!         )],
//!     )?;
//!
//!     trackrec.recorder().finish("session");
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use trackrec_core::{
    audio_bitrate, mock, video_bitrate, BufferFlags, BufferInfo, BufferTrackReader, Encoder, Frame,
    MediaFormat, MediaKind, MediaTarget, MediaTargetHandle, MediaTrackReader, OutputDequeue,
    RenderStatus, Renderer, SeekMode, SurfaceHandle, SurfaceTrackReader, Thumbnail, ThumbnailDecoder,
    TrackReader, TrackRecError, TrackRecResult, TrackRenderer, VIDEO_BITS_PER_PIXEL,
};

pub use trackrec_recorder::{
    AudioTrackRecorder, PassthroughRenderer, RecordEvent, RecordRequestManager, RecordResult,
    RecorderConfig, RecorderFactory, RecorderState, RequestInfo, TrackRecordParameters,
    TrackRecorder, TrackRegistration, TrackStats, VideoTrackRecorder,
};

pub use trackrec_thumbnails::{
    CacheStats, CachedThumbnailLoader, CachingListener, ExtractionEvent, ExtractionMode,
    ExtractorConfig, LoadSource, ThumbnailCache, ThumbnailCacheConfig, ThumbnailExtractListener,
    ThumbnailExtractParameters, ThumbnailExtractor,
};

// Public API modules
pub mod config;
pub mod logging;

pub use config::{GlobalConfig, DEFAULT_LOG_FILTER};
pub use logging::init_logging;

use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::info;

/// Main entry point for trackrec.
///
/// Owns the tokio runtime that track workers and thumbnail workers run on.
/// Drop the last clone outside of an async context.
#[derive(Clone)]
pub struct TrackRec {
    inner: Arc<TrackRecInner>,
}

struct TrackRecInner {
    recorder: RecordRequestManager,
    extractor: ThumbnailExtractor,
    config: GlobalConfig,
    // last, so workers are torn down after the services
    runtime: Runtime,
}

impl TrackRec {
    /// Initialize trackrec with default settings
    ///
    /// # Example
    /// ```rust,no_run
    /// use trackrec::TrackRec;
    ///
    /// let trackrec = TrackRec::init()?;
    /// # Ok::<(), trackrec::TrackRecError>(())
    /// ```
    pub fn init() -> TrackRecResult<Self> {
        Self::init_with(GlobalConfig::default())
    }

    /// Initialize with custom global configuration
    pub fn init_with(config: GlobalConfig) -> TrackRecResult<Self> {
        config.validate()?;
        if config.debug_logging {
            init_logging(&config.log_filter);
        }

        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name("trackrec-worker");
        if let Some(threads) = config.worker_threads {
            builder.worker_threads(threads);
        }
        let runtime = builder.build().map_err(|e| TrackRecError::Initialization {
            reason: format!("Failed to create async runtime: {}", e),
        })?;

        let recorder =
            RecordRequestManager::with_handle(runtime.handle().clone(), config.recorder.clone())?;
        let extractor =
            ThumbnailExtractor::with_handle(runtime.handle().clone(), config.extractor.clone())?;

        info!(
            worker_threads = ?config.worker_threads,
            max_concurrent_extractions = config.extractor.max_concurrent_requests,
            "trackrec initialized"
        );

        Ok(Self {
            inner: Arc::new(TrackRecInner {
                recorder,
                extractor,
                config,
                runtime,
            }),
        })
    }

    /// The record request manager
    pub fn recorder(&self) -> &RecordRequestManager {
        &self.inner.recorder
    }

    /// The thumbnail extractor
    pub fn extractor(&self) -> &ThumbnailExtractor {
        &self.inner.extractor
    }

    /// A cache-aware loader over this instance's extractor
    pub fn thumbnail_loader(&self, cache: Arc<ThumbnailCache>) -> CachedThumbnailLoader {
        CachedThumbnailLoader::new(self.inner.extractor.clone(), cache)
    }

    /// Handle to the owned runtime
    pub fn handle(&self) -> &Handle {
        self.inner.runtime.handle()
    }

    /// Run a future to completion on the owned runtime
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.inner.runtime.block_on(future)
    }

    /// Configuration this instance was initialized with
    pub fn config(&self) -> &GlobalConfig {
        &self.inner.config
    }

    /// Stop every recording and every thumbnail extraction
    pub fn shutdown(&self) {
        self.inner.recorder.stop_all();
        self.inner.extractor.stop_all();
        info!("trackrec shut down");
    }
}

impl std::fmt::Debug for TrackRec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackRec")
            .field("active_recordings", &self.inner.recorder.active_requests())
            .field("extractor", &self.inner.extractor)
            .field("config", &self.inner.config)
            .finish()
    }
}
