//! Error types for trackrec

use thiserror::Error;

/// Main error type for recording and extraction operations
#[derive(Error, Debug)]
pub enum TrackRecError {
    /// Frame source could not be acquired or started
    #[error("Frame source initialization failed: {reason}")]
    SourceInit {
        /// Reason for the failure
        reason: String,
    },

    /// Encoder could not be configured or started
    #[error("Encoder initialization failed for {mime_type}: {reason}")]
    EncoderInit {
        /// Target MIME type the encoder was configured with
        mime_type: String,
        /// Reason for the failure
        reason: String,
    },

    /// Renderer does not support the input required by the track type
    #[error("Renderer not compatible with {mime_type}: expected {expected}")]
    RendererIncompatible {
        /// Target MIME type
        mime_type: String,
        /// Renderer capability the track requires
        expected: String,
    },

    /// Reader does not support the frame production model required by the track type
    #[error("Reader not compatible with {mime_type}: expected {expected}")]
    ReaderIncompatible {
        /// Target MIME type
        mime_type: String,
        /// Reader capability the track requires
        expected: String,
    },

    /// Target format has no audio or video MIME type
    #[error("Unsupported media type: {mime_type}")]
    UnsupportedMediaType {
        /// Offending MIME type (empty when missing)
        mime_type: String,
    },

    /// A request with this identity is already active
    #[error("Request already active: {request_id}")]
    DuplicateRequest {
        /// Request identity
        request_id: String,
    },

    /// Codec reported a buffer index but returned no frame for it
    #[error("No frame available for buffer {tag}")]
    NoFrameAvailable {
        /// Buffer index reported by the codec
        tag: usize,
    },

    /// Decoding a frame failed
    #[error("Decoding failed at {timestamp_us}us: {reason}")]
    Decode {
        /// Requested presentation time
        timestamp_us: i64,
        /// Reason for failure
        reason: String,
    },

    /// Encoder failed while running
    #[error("Encoder error: {reason}")]
    Encoder {
        /// Reason for failure
        reason: String,
    },

    /// Renderer failed while running
    #[error("Render error: {reason}")]
    Render {
        /// Reason for failure
        reason: String,
    },

    /// Multiplex target rejected an operation
    #[error("Media target error: {reason}")]
    MediaTarget {
        /// Reason for failure
        reason: String,
    },

    /// A track's encoder is no longer running
    #[error("Track {track_index} is not running")]
    NotRunning {
        /// Requested target track index
        track_index: usize,
    },

    /// Runtime or subsystem initialization failed
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },

    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Configuration could not be parsed
    #[error("JSON error: {source}")]
    Json {
        /// Underlying parse error
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for trackrec operations
pub type TrackRecResult<T> = Result<T, TrackRecError>;

impl TrackRecError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            TrackRecError::SourceInit { .. } => "SOURCE_INIT_FAILED",
            TrackRecError::EncoderInit { .. } => "ENCODER_INIT_FAILED",
            TrackRecError::RendererIncompatible { .. } => "RENDERER_NOT_COMPATIBLE",
            TrackRecError::ReaderIncompatible { .. } => "READER_NOT_COMPATIBLE",
            TrackRecError::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
            TrackRecError::DuplicateRequest { .. } => "DUPLICATE_REQUEST",
            TrackRecError::NoFrameAvailable { .. } => "NO_FRAME_AVAILABLE",
            TrackRecError::Decode { .. } => "DECODE_FAILED",
            TrackRecError::Encoder { .. } => "ENCODER_ERROR",
            TrackRecError::Render { .. } => "RENDER_ERROR",
            TrackRecError::MediaTarget { .. } => "MEDIA_TARGET_ERROR",
            TrackRecError::NotRunning { .. } => "NOT_RUNNING",
            TrackRecError::Initialization { .. } => "INITIALIZATION_FAILED",
            TrackRecError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            TrackRecError::Io { .. } => "IO_ERROR",
            TrackRecError::Json { .. } => "JSON_ERROR",
        }
    }

    /// Check if error is recoverable
    ///
    /// Factory-level incompatibilities and encoder or runtime initialization
    /// failures are permanent for the given parameters. A source that failed
    /// to start, such as a camera held by another client, may start on a
    /// later attempt.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TrackRecError::Io { .. } => true,
            TrackRecError::DuplicateRequest { .. } => true,
            TrackRecError::NoFrameAvailable { .. } => true,
            TrackRecError::SourceInit { .. } => true,
            _ => false,
        }
    }

    /// Whether the error was raised while selecting a recorder, before any
    /// resource was acquired
    pub fn is_compatibility_error(&self) -> bool {
        matches!(
            self,
            TrackRecError::RendererIncompatible { .. }
                | TrackRecError::ReaderIncompatible { .. }
                | TrackRecError::UnsupportedMediaType { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let error = TrackRecError::DuplicateRequest {
            request_id: "req1".to_string(),
        };
        assert_eq!(error.error_code(), "DUPLICATE_REQUEST");
        assert!(error.is_recoverable());

        let error = TrackRecError::UnsupportedMediaType {
            mime_type: "text/plain".to_string(),
        };
        assert_eq!(error.error_code(), "UNSUPPORTED_MEDIA_TYPE");
        assert!(error.is_compatibility_error());
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_recoverable_classification() {
        let busy_source = TrackRecError::SourceInit {
            reason: "camera in use".to_string(),
        };
        assert!(busy_source.is_recoverable());

        let encoder = TrackRecError::EncoderInit {
            mime_type: "video/avc".to_string(),
            reason: "no codec".to_string(),
        };
        assert!(!encoder.is_recoverable());

        let runtime = TrackRecError::Initialization {
            reason: "no runtime".to_string(),
        };
        assert!(!runtime.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let error = TrackRecError::ReaderIncompatible {
            mime_type: "video/avc".to_string(),
            expected: "surface reader".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Reader not compatible with video/avc: expected surface reader"
        );
    }

    #[test]
    fn test_error_from_json() {
        let json_error = serde_json::from_str::<u32>("not json").unwrap_err();
        let error = TrackRecError::from(json_error);

        match error {
            TrackRecError::Json { .. } => (),
            _ => panic!("Expected Json error variant"),
        }
    }
}
