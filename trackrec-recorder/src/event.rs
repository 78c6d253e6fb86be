//! Record request events

use serde::{Deserialize, Serialize};

/// Lifecycle events broadcast by the
/// [`RecordRequestManager`](crate::RecordRequestManager).
///
/// Every started request ends with exactly one of `Completed`, `Stopped` or
/// `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordEvent {
    /// All tracks started and their workers are running
    Started {
        /// Request identity
        id: String,
        /// Number of tracks
        tracks: usize,
    },
    /// A track registered with the media target
    TrackFormatChanged {
        /// Request identity
        id: String,
        /// Position of the track in the request
        track_index: usize,
    },
    /// A track reached end of stream
    TrackCompleted {
        /// Request identity
        id: String,
        /// Position of the track in the request
        track_index: usize,
    },
    /// Every track reached end of stream and the media target was finalized
    Completed {
        /// Request identity
        id: String,
    },
    /// The request was stopped before completing
    Stopped {
        /// Request identity
        id: String,
    },
    /// A track failed and the whole request was torn down
    Failed {
        /// Request identity
        id: String,
        /// Error code of the first failure
        code: String,
        /// Description of the first failure
        error: String,
    },
}

impl RecordEvent {
    /// Request identity the event belongs to
    pub fn request_id(&self) -> &str {
        match self {
            RecordEvent::Started { id, .. }
            | RecordEvent::TrackFormatChanged { id, .. }
            | RecordEvent::TrackCompleted { id, .. }
            | RecordEvent::Completed { id }
            | RecordEvent::Stopped { id }
            | RecordEvent::Failed { id, .. } => id,
        }
    }

    /// Whether this is the final event for its request
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecordEvent::Completed { .. } | RecordEvent::Stopped { .. } | RecordEvent::Failed { .. }
        )
    }
}
