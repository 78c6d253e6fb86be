//! Multi-track record request coordination
//!
//! Each request owns one recorder per track. Every recorder is driven on its
//! own blocking worker, and a supervisor task waits for all of them to settle
//! before finalizing the shared media target and publishing the outcome.

use crate::config::RecorderConfig;
use crate::event::RecordEvent;
use crate::factory::{RecorderFactory, TrackRecordParameters};
use crate::recorder::{RecordResult, TrackRecorder};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use trackrec_core::{MediaTargetHandle, TrackRecError, TrackRecResult};
use uuid::Uuid;

/// Stop and finish flags shared between a request and its workers
#[derive(Debug, Default)]
struct RequestControl {
    cancelled: AtomicBool,
    finishing: AtomicBool,
    // set by `stop`; the entry stays registered until the supervisor settles it
    stopping: AtomicBool,
}

struct RequestEntry {
    instance: Uuid,
    control: Arc<RequestControl>,
    targets: Vec<MediaTargetHandle>,
    track_count: usize,
    started_at: DateTime<Utc>,
}

impl RequestEntry {
    fn is_stopping(&self) -> bool {
        self.control.stopping.load(Ordering::SeqCst)
    }
}

/// Snapshot of an active request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// Request identity
    pub id: String,
    /// Unique id of this run of the request
    pub instance: Uuid,
    /// Number of tracks
    pub track_count: usize,
    /// When the request started
    pub started_at: DateTime<Utc>,
    /// Whether a graceful finish was requested
    pub finishing: bool,
}

/// How a track worker ended
#[derive(Debug)]
enum TrackOutcome {
    Completed,
    Cancelled,
    Failed(TrackRecError),
}

/// Runs record requests, at most one per identity
pub struct RecordRequestManager {
    requests: Arc<DashMap<String, RequestEntry>>,
    factory: RecorderFactory,
    config: RecorderConfig,
    runtime: Handle,
    event_tx: broadcast::Sender<RecordEvent>,
}

impl RecordRequestManager {
    /// Create a manager on the current tokio runtime
    pub fn new(config: RecorderConfig) -> TrackRecResult<Self> {
        let runtime = Handle::try_current().map_err(|e| TrackRecError::Initialization {
            reason: format!("record request manager needs a tokio runtime: {}", e),
        })?;
        Self::with_handle(runtime, config)
    }

    /// Create a manager whose workers run on `runtime`
    pub fn with_handle(runtime: Handle, config: RecorderConfig) -> TrackRecResult<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            requests: Arc::new(DashMap::new()),
            factory: RecorderFactory::with_dequeue_timeout_us(config.dequeue_timeout_us),
            config,
            runtime,
            event_tx,
        })
    }

    /// Subscribe to request events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.event_tx.subscribe()
    }

    /// Start recording `tracks` under `id`.
    ///
    /// Fails with [`TrackRecError::DuplicateRequest`] while a request with the
    /// same identity is active or still winding down after [`stop`](Self::stop);
    /// its terminal event is published before the identity is free again. Startup is all-or-nothing: if any track fails
    /// to start, the tracks already started are stopped, the media targets
    /// are released and the error is returned.
    pub fn record(&self, id: &str, tracks: Vec<TrackRecordParameters>) -> TrackRecResult<()> {
        if tracks.is_empty() {
            return Err(TrackRecError::InvalidConfiguration {
                message: format!("record request {} has no tracks", id),
            });
        }

        let instance = Uuid::new_v4();
        let control = Arc::new(RequestControl::default());
        let mut targets: Vec<MediaTargetHandle> = Vec::new();
        for track in &tracks {
            if !targets
                .iter()
                .any(|target| target.same_target(&track.media_target))
            {
                targets.push(track.media_target.clone());
            }
        }

        match self.requests.entry(id.to_string()) {
            Entry::Occupied(_) => {
                return Err(TrackRecError::DuplicateRequest {
                    request_id: id.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(RequestEntry {
                    instance,
                    control: control.clone(),
                    targets: targets.clone(),
                    track_count: tracks.len(),
                    started_at: Utc::now(),
                });
            }
        }

        let recorders = match self.start_tracks(id, tracks, &targets) {
            Ok(recorders) => recorders,
            Err(e) => {
                self.requests
                    .remove_if(id, |_, entry| entry.instance == instance);
                return Err(e);
            }
        };

        let _ = self.event_tx.send(RecordEvent::Started {
            id: id.to_string(),
            tracks: recorders.len(),
        });
        tracing::info!(
            request_id = id,
            tracks = recorders.len(),
            "Record request started"
        );

        let workers: Vec<JoinHandle<TrackOutcome>> = recorders
            .into_iter()
            .enumerate()
            .map(|(track_index, recorder)| {
                let worker = TrackWorker {
                    id: id.to_string(),
                    track_index,
                    recorder,
                    control: control.clone(),
                    idle_backoff: Duration::from_millis(self.config.idle_backoff_ms),
                    event_tx: self.event_tx.clone(),
                };
                self.runtime.spawn_blocking(move || worker.run())
            })
            .collect();

        self.runtime.spawn(supervise(
            id.to_string(),
            instance,
            workers,
            targets,
            self.requests.clone(),
            self.event_tx.clone(),
        ));
        Ok(())
    }

    fn start_tracks(
        &self,
        id: &str,
        tracks: Vec<TrackRecordParameters>,
        targets: &[MediaTargetHandle],
    ) -> TrackRecResult<Vec<Box<dyn TrackRecorder>>> {
        // selection acquires nothing, so build every recorder before starting any
        let mut recorders = tracks
            .into_iter()
            .map(|params| self.factory.create(params))
            .collect::<TrackRecResult<Vec<_>>>()?;

        for index in 0..recorders.len() {
            if let Err(e) = recorders[index].start() {
                tracing::error!(
                    request_id = id,
                    track = index,
                    error = %e,
                    "Track failed to start, aborting request"
                );
                for recorder in recorders.iter_mut().take(index + 1) {
                    recorder.stop();
                }
                for target in targets {
                    target.release();
                }
                return Err(e);
            }
        }

        Ok(recorders)
    }

    /// Stop a request immediately. No sample reaches its media target once
    /// this returns. Unknown identities are ignored.
    ///
    /// The identity stays reserved until the request's terminal event has
    /// been published.
    pub fn stop(&self, id: &str) {
        let Some(entry) = self.requests.get(id) else {
            tracing::debug!(request_id = id, "Stop requested for unknown record request");
            return;
        };
        if entry.control.stopping.swap(true, Ordering::SeqCst) {
            return;
        }

        entry.control.cancelled.store(true, Ordering::SeqCst);
        for target in &entry.targets {
            target.close();
        }
        tracing::info!(request_id = id, "Record request stopped");
    }

    /// Stop every active request
    pub fn stop_all(&self) {
        for id in self.active_requests() {
            self.stop(&id);
        }
    }

    /// Ask every track of a request to flush to end of stream; the request
    /// completes once all tracks get there. Unknown identities are ignored
    pub fn finish(&self, id: &str) {
        match self.requests.get(id).filter(|entry| !entry.is_stopping()) {
            Some(entry) => {
                entry.control.finishing.store(true, Ordering::SeqCst);
                tracing::info!(request_id = id, "Finishing record request");
            }
            None => tracing::debug!(request_id = id, "Finish requested for unknown record request"),
        }
    }

    /// Whether a request with this identity is active
    pub fn is_active(&self, id: &str) -> bool {
        self.requests
            .get(id)
            .map_or(false, |entry| !entry.is_stopping())
    }

    /// Identities of all active requests
    pub fn active_requests(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .requests
            .iter()
            .filter(|entry| !entry.is_stopping())
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Details of an active request
    pub fn request_info(&self, id: &str) -> Option<RequestInfo> {
        self.requests
            .get(id)
            .filter(|entry| !entry.is_stopping())
            .map(|entry| RequestInfo {
            id: id.to_string(),
            instance: entry.instance,
            track_count: entry.track_count,
            started_at: entry.started_at,
            finishing: entry.control.finishing.load(Ordering::SeqCst),
        })
    }
}

impl std::fmt::Debug for RecordRequestManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordRequestManager")
            .field("active_requests", &self.requests.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Drive loop for one track
struct TrackWorker {
    id: String,
    track_index: usize,
    recorder: Box<dyn TrackRecorder>,
    control: Arc<RequestControl>,
    idle_backoff: Duration,
    event_tx: broadcast::Sender<RecordEvent>,
}

impl TrackWorker {
    fn run(mut self) -> TrackOutcome {
        let mut end_signalled = false;

        let outcome = loop {
            if self.control.cancelled.load(Ordering::SeqCst) {
                break TrackOutcome::Cancelled;
            }
            if !end_signalled && self.control.finishing.load(Ordering::SeqCst) {
                end_signalled = true;
                if let Err(e) = self.recorder.signal_end_of_input() {
                    break TrackOutcome::Failed(e);
                }
            }

            let written = self.recorder.stats().samples_written;
            match self.recorder.process_next_frame() {
                Ok(RecordResult::EosReached) => {
                    let _ = self.event_tx.send(RecordEvent::TrackCompleted {
                        id: self.id.clone(),
                        track_index: self.track_index,
                    });
                    break TrackOutcome::Completed;
                }
                Ok(RecordResult::FormatChanged) => {
                    let _ = self.event_tx.send(RecordEvent::TrackFormatChanged {
                        id: self.id.clone(),
                        track_index: self.track_index,
                    });
                }
                Ok(RecordResult::FrameProcessed) => {
                    if self.recorder.stats().samples_written == written
                        && !self.idle_backoff.is_zero()
                    {
                        std::thread::sleep(self.idle_backoff);
                    }
                }
                Ok(RecordResult::NotRunning) => {
                    break TrackOutcome::Failed(TrackRecError::NotRunning {
                        track_index: self.track_index,
                    });
                }
                Err(e) => break TrackOutcome::Failed(e),
            }
        };

        let outcome = match outcome {
            // errors caused by a concurrent stop are part of stopping
            TrackOutcome::Failed(_) if self.control.cancelled.load(Ordering::SeqCst) => {
                TrackOutcome::Cancelled
            }
            TrackOutcome::Failed(e) => {
                tracing::error!(
                    request_id = %self.id,
                    track = self.track_index,
                    error = %e,
                    "Track failed, stopping sibling tracks"
                );
                self.control.cancelled.store(true, Ordering::SeqCst);
                TrackOutcome::Failed(e)
            }
            other => other,
        };

        self.recorder.stop();
        let stats = self.recorder.stats();
        tracing::debug!(
            request_id = %self.id,
            track = self.track_index,
            samples = stats.samples_written,
            bytes = stats.bytes_written,
            "Track worker finished"
        );
        outcome
    }
}

async fn supervise(
    id: String,
    instance: Uuid,
    workers: Vec<JoinHandle<TrackOutcome>>,
    targets: Vec<MediaTargetHandle>,
    requests: Arc<DashMap<String, RequestEntry>>,
    event_tx: broadcast::Sender<RecordEvent>,
) {
    let mut failure: Option<TrackRecError> = None;
    let mut all_completed = true;

    for result in join_all(workers).await {
        match result {
            Ok(TrackOutcome::Completed) => {}
            Ok(TrackOutcome::Cancelled) => all_completed = false,
            Ok(TrackOutcome::Failed(e)) => {
                all_completed = false;
                failure.get_or_insert(e);
            }
            Err(join_error) => {
                all_completed = false;
                failure.get_or_insert(TrackRecError::Initialization {
                    reason: format!("track worker panicked: {}", join_error),
                });
            }
        }
    }

    for target in &targets {
        target.release();
    }

    let event = match failure {
        Some(e) => {
            tracing::error!(request_id = %id, error = %e, "Record request failed");
            RecordEvent::Failed {
                id: id.clone(),
                code: e.error_code().to_string(),
                error: e.to_string(),
            }
        }
        None if all_completed => {
            tracing::info!(request_id = %id, "Record request completed");
            RecordEvent::Completed { id: id.clone() }
        }
        None => RecordEvent::Stopped { id: id.clone() },
    };

    // the identity is released only after the terminal event is out
    match requests.entry(id) {
        Entry::Occupied(entry) if entry.get().instance == instance => {
            let _ = event_tx.send(event);
            entry.remove();
        }
        _ => {
            let _ = event_tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackrec_core::mock::{MockBufferReader, MockEncoder, MockMediaTarget};
    use trackrec_core::{MediaFormat, TrackReader};

    fn audio_track(target: &MediaTargetHandle, frames: usize) -> TrackRecordParameters {
        let format = MediaFormat::audio("audio/mp4a-latm", 44_100, 1);
        TrackRecordParameters::new(
            TrackReader::buffer(MockBufferReader::new(frames, 64)),
            0,
            format.clone(),
            target.clone(),
            MockEncoder::new(format),
        )
    }

    #[test]
    fn test_new_requires_runtime() {
        let err = RecordRequestManager::new(RecorderConfig::default()).unwrap_err();
        assert_eq!(err.error_code(), "INITIALIZATION_FAILED");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_request_rejected() {
        let manager = RecordRequestManager::new(RecorderConfig::default()).unwrap();
        let err = manager.record("empty", Vec::new()).unwrap_err();
        assert!(matches!(err, TrackRecError::InvalidConfiguration { .. }));
        assert!(!manager.is_active("empty"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_request_info_while_active() {
        let manager = RecordRequestManager::new(RecorderConfig::default()).unwrap();
        let target = MediaTargetHandle::new(MockMediaTarget::new());
        let format = MediaFormat::audio("audio/mp4a-latm", 44_100, 1);
        let track = TrackRecordParameters::new(
            TrackReader::buffer(MockBufferReader::endless(64)),
            0,
            format.clone(),
            target,
            MockEncoder::new(format),
        );

        manager.record("info", vec![track]).unwrap();
        let info = manager.request_info("info").unwrap();
        assert_eq!(info.id, "info");
        assert_eq!(info.track_count, 1);
        assert!(!info.finishing);
        assert_eq!(manager.active_requests(), vec!["info".to_string()]);

        manager.stop("info");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_single_track_completes() {
        let manager = RecordRequestManager::new(RecorderConfig::default()).unwrap();
        let mut events = manager.subscribe();
        let target = MediaTargetHandle::new(MockMediaTarget::new());

        manager.record("single", vec![audio_track(&target, 3)]).unwrap();

        let terminal = loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .unwrap()
                .unwrap();
            if event.is_terminal() {
                break event;
            }
        };
        assert_eq!(
            terminal,
            RecordEvent::Completed {
                id: "single".to_string()
            }
        );
        assert!(target.is_released());
    }
}
