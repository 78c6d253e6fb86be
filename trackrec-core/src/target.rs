//! Multiplex target access
//!
//! Every track of a recording drains into the same container, so the
//! target sits behind a [`MediaTargetHandle`] that serializes track
//! registration and sample writes. Once the handle is closed no further
//! write reaches the target, and the target is released at most once.

use crate::error::{TrackRecError, TrackRecResult};
use crate::format::MediaFormat;
use crate::frame::BufferInfo;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Container multiplexer
pub trait MediaTarget: Send {
    /// Register a track, returning the index samples must be written to
    fn add_track(&mut self, format: &MediaFormat, requested_index: usize) -> TrackRecResult<usize>;

    /// Write one encoded sample
    fn write_sample_data(
        &mut self,
        track_index: usize,
        data: Bytes,
        info: &BufferInfo,
    ) -> TrackRecResult<()>;

    /// Finalize the container and release resources
    fn release(&mut self);
}

struct TargetState {
    target: Box<dyn MediaTarget>,
    tracks: BTreeMap<usize, MediaFormat>,
    closed: bool,
    released: bool,
}

/// Shared, lock-guarded access to a multiplex target
#[derive(Clone)]
pub struct MediaTargetHandle {
    state: Arc<Mutex<TargetState>>,
}

impl MediaTargetHandle {
    /// Wrap a target
    pub fn new(target: impl MediaTarget + 'static) -> Self {
        Self::from_boxed(Box::new(target))
    }

    /// Wrap an already boxed target
    pub fn from_boxed(target: Box<dyn MediaTarget>) -> Self {
        Self {
            state: Arc::new(Mutex::new(TargetState {
                target,
                tracks: BTreeMap::new(),
                closed: false,
                released: false,
            })),
        }
    }

    /// Register a track with its real output format
    pub fn add_track(&self, format: &MediaFormat, requested_index: usize) -> TrackRecResult<usize> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TrackRecError::MediaTarget {
                reason: format!("cannot add track {}: target closed", requested_index),
            });
        }

        let actual = state.target.add_track(format, requested_index)?;
        state.tracks.insert(actual, format.clone());
        debug!(
            requested = requested_index,
            actual, "Registered track {} with media target", format
        );
        Ok(actual)
    }

    /// Write a sample; returns `false` when the target is closed and the
    /// sample was dropped
    pub fn write_sample(
        &self,
        track_index: usize,
        data: Bytes,
        info: &BufferInfo,
    ) -> TrackRecResult<bool> {
        let mut state = self.state.lock();
        if state.closed {
            debug!(track = track_index, "Dropping sample for closed media target");
            return Ok(false);
        }
        if !state.tracks.contains_key(&track_index) {
            return Err(TrackRecError::MediaTarget {
                reason: format!("track {} written before registration", track_index),
            });
        }

        state.target.write_sample_data(track_index, data, info)?;
        Ok(true)
    }

    /// Reject all further writes without releasing the target
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Close and finalize the target. Returns `true` only for the call that
    /// actually released it.
    pub fn release(&self) -> bool {
        let mut state = self.state.lock();
        state.closed = true;
        if state.released {
            return false;
        }

        state.target.release();
        state.released = true;
        info!(tracks = state.tracks.len(), "Media target released");
        true
    }

    /// Whether writes are rejected
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Whether the target has been finalized
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Whether both handles point at the same target
    pub fn same_target(&self, other: &MediaTargetHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Number of registered tracks
    pub fn track_count(&self) -> usize {
        self.state.lock().tracks.len()
    }
}

impl std::fmt::Debug for MediaTargetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MediaTargetHandle")
            .field("tracks", &state.tracks.len())
            .field("closed", &state.closed)
            .field("released", &state.released)
            .finish()
    }
}
