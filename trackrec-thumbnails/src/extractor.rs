//! Keyed, cancellable thumbnail extraction
//!
//! At most one extraction runs per identity. A second `extract` for an
//! identity that is still in flight cancels the first (it receives
//! `Cancelled`) and replaces it. Cancellation is cooperative: the worker
//! checks the flag between decodes and never releases the decoder while a
//! decode is running.

use crate::config::ExtractorConfig;
use crate::listener::{ExtractionEvent, ThumbnailExtractListener};
use crate::params::{ExtractionMode, ThumbnailExtractParameters};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};
use trackrec_core::{ThumbnailDecoder, TrackRecError, TrackRecResult};

struct Delivery {
    listener: Option<Box<dyn ThumbnailExtractListener>>,
    finished: bool,
}

/// Shared state of one extraction request.
///
/// All listener calls go through `delivery`. A terminal event marks the job
/// finished under the same lock, so nothing is delivered after it.
struct ExtractionJob {
    id: String,
    cancelled: AtomicBool,
    delivery: Mutex<Delivery>,
}

impl ExtractionJob {
    fn new(id: &str, listener: Box<dyn ThumbnailExtractListener>) -> Self {
        Self {
            id: id.to_string(),
            cancelled: AtomicBool::new(false),
            delivery: Mutex::new(Delivery {
                listener: Some(listener),
                finished: false,
            }),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn emit(&self, deliver: impl FnOnce(&mut dyn ThumbnailExtractListener)) {
        let mut delivery = self.delivery.lock();
        if delivery.finished {
            return;
        }
        if let Some(listener) = delivery.listener.as_deref_mut() {
            deliver(listener);
        }
    }

    /// Deliver a terminal event; returns false when the job had already ended
    fn finish(&self, deliver: impl FnOnce(&mut dyn ThumbnailExtractListener)) -> bool {
        let mut delivery = self.delivery.lock();
        if delivery.finished {
            return false;
        }
        delivery.finished = true;
        if let Some(mut listener) = delivery.listener.take() {
            deliver(listener.as_mut());
        }
        true
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if self.finish(|listener| listener.on_cancelled(&self.id)) {
            debug!(request_id = %self.id, "Thumbnail extraction cancelled");
        }
    }
}

/// Thumbnail extraction service
#[derive(Clone)]
pub struct ThumbnailExtractor {
    jobs: Arc<DashMap<String, Arc<ExtractionJob>>>,
    permits: Arc<Semaphore>,
    runtime: Handle,
    config: ExtractorConfig,
}

impl ThumbnailExtractor {
    /// Create an extractor on the current tokio runtime
    pub fn new(config: ExtractorConfig) -> TrackRecResult<Self> {
        let runtime = Handle::try_current().map_err(|e| TrackRecError::Initialization {
            reason: format!("thumbnail extractor needs a tokio runtime: {}", e),
        })?;
        Self::with_handle(runtime, config)
    }

    /// Create an extractor whose workers run on `runtime`
    pub fn with_handle(runtime: Handle, config: ExtractorConfig) -> TrackRecResult<Self> {
        config.validate()?;
        Ok(Self {
            jobs: Arc::new(DashMap::new()),
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            runtime,
            config,
        })
    }

    /// Start an extraction and receive its events on a channel
    pub fn extract(
        &self,
        id: &str,
        params: ThumbnailExtractParameters,
    ) -> mpsc::UnboundedReceiver<ExtractionEvent> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.extract_with_listener(id, params, event_tx);
        event_rx
    }

    /// Start an extraction reporting to `listener`.
    ///
    /// `on_started` is delivered before this returns. An in-flight request
    /// with the same identity is cancelled and replaced.
    pub fn extract_with_listener(
        &self,
        id: &str,
        params: ThumbnailExtractParameters,
        listener: impl ThumbnailExtractListener + 'static,
    ) {
        let job = Arc::new(ExtractionJob::new(id, Box::new(listener)));

        {
            // hold delivery so a concurrent stop cannot cancel before Started
            let mut delivery = job.delivery.lock();
            if let Some(previous) = self.jobs.insert(id.to_string(), job.clone()) {
                previous.cancel();
                info!(request_id = id, "Replaced in-flight thumbnail extraction");
            }
            if let Some(listener) = delivery.listener.as_deref_mut() {
                listener.on_started(id, &params.timestamps_us);
            }
        }

        debug!(
            request_id = id,
            timestamps = params.timestamps_us.len(),
            mode = ?params.mode,
            "Thumbnail extraction queued"
        );
        self.runtime.spawn(run_job(
            job,
            params,
            self.permits.clone(),
            self.jobs.clone(),
        ));
    }

    /// Cancel the extraction for `id`. No callback for it is delivered after
    /// this returns. Unknown identities are ignored
    pub fn stop(&self, id: &str) {
        if let Some((_, job)) = self.jobs.remove(id) {
            job.cancel();
        }
    }

    /// Cancel every in-flight extraction
    pub fn stop_all(&self) {
        let ids: Vec<String> = self.jobs.iter().map(|job| job.key().clone()).collect();
        for id in ids {
            self.stop(&id);
        }
    }

    /// Whether an extraction for `id` is in flight
    pub fn is_active(&self, id: &str) -> bool {
        self.jobs.contains_key(id)
    }

    /// Identities of in-flight extractions
    pub fn active_requests(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.iter().map(|job| job.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Extractor configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }
}

impl std::fmt::Debug for ThumbnailExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailExtractor")
            .field("active_requests", &self.jobs.len())
            .field("config", &self.config)
            .finish()
    }
}

async fn run_job(
    job: Arc<ExtractionJob>,
    params: ThumbnailExtractParameters,
    permits: Arc<Semaphore>,
    jobs: Arc<DashMap<String, Arc<ExtractionJob>>>,
) {
    match permits.acquire_owned().await {
        Ok(permit) => {
            let worker_job = job.clone();
            let result = tokio::task::spawn_blocking(move || extract_frames(&worker_job, params)).await;
            drop(permit);

            if let Err(join_error) = result {
                let error = TrackRecError::Decode {
                    timestamp_us: 0,
                    reason: format!("extraction worker panicked: {}", join_error),
                };
                job.finish(|listener| listener.on_error(&job.id, &error));
            }
        }
        Err(closed) => {
            let mut decoder = params.decoder;
            decoder.release();
            let error = TrackRecError::Initialization {
                reason: closed.to_string(),
            };
            job.finish(|listener| listener.on_error(&job.id, &error));
        }
    }

    jobs.remove_if(&job.id, |_, current| Arc::ptr_eq(current, &job));
}

fn extract_frames(job: &ExtractionJob, params: ThumbnailExtractParameters) {
    let ThumbnailExtractParameters {
        timestamps_us,
        mode,
        mut decoder,
    } = params;

    let result = decode_all(job, &timestamps_us, mode, decoder.as_mut());
    decoder.release();

    match result {
        Ok(true) => {
            if job.finish(|listener| listener.on_completed(&job.id)) {
                debug!(request_id = %job.id, "Thumbnail extraction completed");
            }
        }
        Ok(false) => {}
        Err(e) => {
            warn!(request_id = %job.id, error = %e, "Thumbnail extraction failed");
            job.finish(|listener| listener.on_error(&job.id, &e));
        }
    }
}

/// Returns `Ok(false)` when cancelled before every pass finished
fn decode_all(
    job: &ExtractionJob,
    timestamps_us: &[i64],
    mode: ExtractionMode,
    decoder: &mut dyn ThumbnailDecoder,
) -> TrackRecResult<bool> {
    if job.is_cancelled() {
        return Ok(false);
    }
    decoder.init()?;

    for &seek in mode.passes() {
        for (index, &timestamp_us) in timestamps_us.iter().enumerate() {
            if job.is_cancelled() {
                return Ok(false);
            }
            let thumbnail = decoder.decode_frame(timestamp_us, seek)?;
            if thumbnail.is_none() {
                debug!(request_id = %job.id, timestamp_us, "No frame available");
            }
            job.emit(|listener| listener.on_extracted(&job.id, index, thumbnail));
        }
    }

    Ok(!job.is_cancelled())
}
