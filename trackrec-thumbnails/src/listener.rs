//! Extraction event protocol
//!
//! Per request, events arrive in this order: one `Started`, any number of
//! `Extracted` (an index may repeat under two-pass extraction, and a missing
//! frame is delivered as `None`), then exactly one of `Completed`,
//! `Cancelled` or `Error`.

use tokio::sync::mpsc;
use trackrec_core::{Thumbnail, TrackRecError};

/// Ordered extraction event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionEvent {
    /// Extraction accepted
    Started {
        /// Request identity
        id: String,
        /// Requested timestamps
        timestamps_us: Vec<i64>,
    },
    /// A frame for one requested timestamp
    Extracted {
        /// Request identity
        id: String,
        /// Position in the requested timestamps
        index: usize,
        /// Decoded frame, `None` when nothing was available
        thumbnail: Option<Thumbnail>,
    },
    /// Every timestamp was processed
    Completed {
        /// Request identity
        id: String,
    },
    /// Stopped or superseded
    Cancelled {
        /// Request identity
        id: String,
    },
    /// Decoding failed
    Error {
        /// Request identity
        id: String,
        /// Error code
        code: String,
        /// Error description
        error: String,
    },
}

impl ExtractionEvent {
    /// Request identity the event belongs to
    pub fn request_id(&self) -> &str {
        match self {
            ExtractionEvent::Started { id, .. }
            | ExtractionEvent::Extracted { id, .. }
            | ExtractionEvent::Completed { id }
            | ExtractionEvent::Cancelled { id }
            | ExtractionEvent::Error { id, .. } => id,
        }
    }

    /// Whether no further events follow for this request
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExtractionEvent::Completed { .. }
                | ExtractionEvent::Cancelled { .. }
                | ExtractionEvent::Error { .. }
        )
    }
}

/// Callback receiver for extraction events.
///
/// Callbacks run on the extraction worker while the request's delivery lock
/// is held, so they must not call back into the extractor for the same
/// identity.
#[allow(unused_variables)]
pub trait ThumbnailExtractListener: Send {
    /// Extraction accepted
    fn on_started(&mut self, id: &str, timestamps_us: &[i64]) {}

    /// A frame was decoded, or found unavailable, for `index`
    fn on_extracted(&mut self, id: &str, index: usize, thumbnail: Option<Thumbnail>) {}

    /// All timestamps processed
    fn on_completed(&mut self, id: &str) {}

    /// Stopped or superseded
    fn on_cancelled(&mut self, id: &str) {}

    /// Decoding failed
    fn on_error(&mut self, id: &str, error: &TrackRecError) {}
}

impl ThumbnailExtractListener for mpsc::UnboundedSender<ExtractionEvent> {
    fn on_started(&mut self, id: &str, timestamps_us: &[i64]) {
        let _ = self.send(ExtractionEvent::Started {
            id: id.to_string(),
            timestamps_us: timestamps_us.to_vec(),
        });
    }

    fn on_extracted(&mut self, id: &str, index: usize, thumbnail: Option<Thumbnail>) {
        let _ = self.send(ExtractionEvent::Extracted {
            id: id.to_string(),
            index,
            thumbnail,
        });
    }

    fn on_completed(&mut self, id: &str) {
        let _ = self.send(ExtractionEvent::Completed { id: id.to_string() });
    }

    fn on_cancelled(&mut self, id: &str) {
        let _ = self.send(ExtractionEvent::Cancelled { id: id.to_string() });
    }

    fn on_error(&mut self, id: &str, error: &TrackRecError) {
        let _ = self.send(ExtractionEvent::Error {
            id: id.to_string(),
            code: error.error_code().to_string(),
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_listener_forwards_events() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        tx.on_started("req", &[0, 10]);
        tx.on_extracted("req", 1, None);
        tx.on_error(
            "req",
            &TrackRecError::Decode {
                timestamp_us: 10,
                reason: "bad frame".to_string(),
            },
        );

        assert_eq!(
            rx.try_recv().unwrap(),
            ExtractionEvent::Started {
                id: "req".to_string(),
                timestamps_us: vec![0, 10]
            }
        );
        assert!(!rx.try_recv().unwrap().is_terminal());
        let error = rx.try_recv().unwrap();
        assert!(error.is_terminal());
        assert!(matches!(error, ExtractionEvent::Error { ref code, .. } if code == "DECODE_FAILED"));
    }
}
