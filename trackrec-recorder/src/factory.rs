//! Recorder selection from track parameters

use crate::audio::AudioTrackRecorder;
use crate::passthrough::PassthroughRenderer;
use crate::recorder::TrackRecorder;
use crate::video::VideoTrackRecorder;
use tracing::debug;
use trackrec_core::{
    Encoder, MediaFormat, MediaKind, MediaTargetHandle, Renderer, SurfaceHandle, TrackReader,
    TrackRecError, TrackRecResult, TrackRenderer,
};

/// Everything needed to record one track of a request
pub struct TrackRecordParameters {
    /// Frame source
    pub reader: TrackReader,
    /// Track index to request from the media target
    pub target_track: usize,
    /// Format the encoder is configured with
    pub target_format: MediaFormat,
    /// Shared multiplex target
    pub media_target: MediaTargetHandle,
    /// Encoder for this track
    pub encoder: Box<dyn Encoder>,
    /// Renderer; audio tracks fall back to a passthrough renderer
    pub renderer: Option<TrackRenderer>,
    /// Externally shared surface handed to the renderer, if any
    pub input_surface: Option<SurfaceHandle>,
}

impl TrackRecordParameters {
    /// Parameters without a renderer or shared input surface
    pub fn new(
        reader: TrackReader,
        target_track: usize,
        target_format: MediaFormat,
        media_target: MediaTargetHandle,
        encoder: impl Encoder + 'static,
    ) -> Self {
        Self {
            reader,
            target_track,
            target_format,
            media_target,
            encoder: Box::new(encoder),
            renderer: None,
            input_surface: None,
        }
    }

    /// Set the renderer
    pub fn with_renderer(mut self, renderer: TrackRenderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Set the shared input surface
    pub fn with_input_surface(mut self, surface: SurfaceHandle) -> Self {
        self.input_surface = Some(surface);
        self
    }
}

impl std::fmt::Debug for TrackRecordParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackRecordParameters")
            .field("reader", &self.reader)
            .field("target_track", &self.target_track)
            .field("target_format", &self.target_format)
            .field("encoder", &self.encoder.name())
            .field("renderer", &self.renderer)
            .field("input_surface", &self.input_surface)
            .finish()
    }
}

/// Picks the recorder implementation for a track from its target MIME type.
///
/// Selection acquires nothing: incompatible parameters fail before any
/// encoder, renderer or source is touched.
#[derive(Debug, Clone, Default)]
pub struct RecorderFactory {
    dequeue_timeout_us: i64,
}

impl RecorderFactory {
    /// Factory whose recorders poll the encoder without blocking
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose recorders wait up to `timeout_us` on encoder dequeues
    pub fn with_dequeue_timeout_us(timeout_us: i64) -> Self {
        Self {
            dequeue_timeout_us: timeout_us,
        }
    }

    /// Build the recorder for `params`
    pub fn create(&self, params: TrackRecordParameters) -> TrackRecResult<Box<dyn TrackRecorder>> {
        let TrackRecordParameters {
            reader,
            target_track,
            target_format,
            media_target,
            encoder,
            renderer,
            input_surface,
        } = params;
        let mime_type = target_format.mime_type.clone();

        let recorder: Box<dyn TrackRecorder> = match target_format.kind() {
            Some(MediaKind::Video) => {
                let TrackReader::Surface(reader) = reader else {
                    return Err(TrackRecError::ReaderIncompatible {
                        mime_type,
                        expected: "surface reader".to_string(),
                    });
                };
                let Some(TrackRenderer::Surface(renderer)) = renderer else {
                    return Err(TrackRecError::RendererIncompatible {
                        mime_type,
                        expected: "surface renderer".to_string(),
                    });
                };
                Box::new(VideoTrackRecorder::new(
                    reader,
                    media_target,
                    target_track,
                    target_format,
                    renderer,
                    encoder,
                    input_surface,
                    self.dequeue_timeout_us,
                ))
            }
            Some(MediaKind::Audio) => {
                let TrackReader::Buffer(reader) = reader else {
                    return Err(TrackRecError::ReaderIncompatible {
                        mime_type,
                        expected: "buffer reader".to_string(),
                    });
                };
                let renderer: Box<dyn Renderer> = match renderer {
                    Some(renderer) => renderer.into_inner(),
                    None => Box::new(PassthroughRenderer::new()),
                };
                Box::new(AudioTrackRecorder::new(
                    reader,
                    media_target,
                    target_track,
                    target_format,
                    renderer,
                    encoder,
                    self.dequeue_timeout_us,
                ))
            }
            None => return Err(TrackRecError::UnsupportedMediaType { mime_type }),
        };

        debug!(
            track = target_track,
            kind = %recorder.media_kind(),
            "Created recorder for {}", mime_type
        );
        Ok(recorder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderState;
    use trackrec_core::mock::{
        MockBufferReader, MockEncoder, MockMediaTarget, MockSurfaceReader, MockSurfaceRenderer,
    };

    fn params(reader: TrackReader, format: MediaFormat) -> TrackRecordParameters {
        let encoder = MockEncoder::new(format.clone());
        TrackRecordParameters::new(
            reader,
            0,
            format,
            MediaTargetHandle::new(MockMediaTarget::new()),
            encoder,
        )
    }

    fn rejected(params: TrackRecordParameters) -> TrackRecError {
        match RecorderFactory::new().create(params) {
            Ok(recorder) => panic!("expected rejection, got a {:?} recorder", recorder.media_kind()),
            Err(e) => e,
        }
    }

    #[test]
    fn test_video_selects_surface_recorder() {
        let params = params(
            TrackReader::surface(MockSurfaceReader::new()),
            MediaFormat::video("video/avc", 640, 480),
        )
        .with_renderer(TrackRenderer::surface(MockSurfaceRenderer::new(100)));

        let recorder = RecorderFactory::new().create(params).unwrap();
        assert_eq!(recorder.media_kind(), MediaKind::Video);
        assert_eq!(recorder.state(), RecorderState::NotStarted);
    }

    #[test]
    fn test_audio_without_renderer_uses_passthrough() {
        let params = params(
            TrackReader::buffer(MockBufferReader::new(1, 16)),
            MediaFormat::audio("audio/mp4a-latm", 44_100, 1),
        );

        let recorder = RecorderFactory::new().create(params).unwrap();
        assert_eq!(recorder.media_kind(), MediaKind::Audio);
    }

    #[test]
    fn test_video_rejects_buffer_reader() {
        let params = params(
            TrackReader::buffer(MockBufferReader::new(1, 16)),
            MediaFormat::video("video/avc", 640, 480),
        )
        .with_renderer(TrackRenderer::surface(MockSurfaceRenderer::new(100)));

        let err = rejected(params);
        assert_eq!(err.error_code(), "READER_NOT_COMPATIBLE");
    }

    #[test]
    fn test_video_rejects_missing_or_buffer_renderer() {
        let missing = params(
            TrackReader::surface(MockSurfaceReader::new()),
            MediaFormat::video("video/avc", 640, 480),
        );
        let err = rejected(missing);
        assert_eq!(err.error_code(), "RENDERER_NOT_COMPATIBLE");

        let buffer = params(
            TrackReader::surface(MockSurfaceReader::new()),
            MediaFormat::video("video/avc", 640, 480),
        )
        .with_renderer(TrackRenderer::buffer(PassthroughRenderer::new()));
        let err = rejected(buffer);
        assert!(err.is_compatibility_error());
    }

    #[test]
    fn test_audio_rejects_surface_reader() {
        let params = params(
            TrackReader::surface(MockSurfaceReader::new()),
            MediaFormat::audio("audio/opus", 48_000, 2),
        );

        let err = rejected(params);
        assert!(matches!(err, TrackRecError::ReaderIncompatible { .. }));
    }

    #[test]
    fn test_unknown_media_type() {
        let params = params(
            TrackReader::buffer(MockBufferReader::new(1, 16)),
            MediaFormat::new("text/vtt"),
        );

        let err = rejected(params);
        assert!(matches!(
            err,
            TrackRecError::UnsupportedMediaType { ref mime_type } if mime_type == "text/vtt"
        ));
    }
}
