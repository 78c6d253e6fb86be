//! Recorder for surface-drawn tracks (video)

use crate::recorder::{
    EncodePipeline, RecordResult, RecorderState, TrackRecorder, TrackRegistration, TrackStats,
};
use std::time::Instant;
use tracing::{debug, error};
use trackrec_core::{
    Encoder, MediaFormat, MediaKind, MediaTargetHandle, RenderStatus, Renderer, SurfaceHandle,
    SurfaceTrackReader, TrackRecError, TrackRecResult,
};

/// Records a track whose frames arrive on a renderer surface.
///
/// The source draws into the renderer's input surface; with a camera the
/// draw is a no-op because frames are pushed asynchronously. Each step then
/// asks the renderer to present the latest surface content to the encoder
/// and drains the encoder. Presentation times come from a monotonic clock
/// started when the recorder starts.
pub struct VideoTrackRecorder {
    reader: Box<dyn SurfaceTrackReader>,
    pipeline: EncodePipeline,
    input_surface: Option<SurfaceHandle>,
    draw_surface: Option<SurfaceHandle>,
    clock: Option<Instant>,
    input_ended: bool,
    reader_stopped: bool,
}

impl VideoTrackRecorder {
    /// Create a recorder; `input_surface` is an optional externally shared surface
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Box<dyn SurfaceTrackReader>,
        media_target: MediaTargetHandle,
        target_track: usize,
        target_format: MediaFormat,
        renderer: Box<dyn Renderer>,
        encoder: Box<dyn Encoder>,
        input_surface: Option<SurfaceHandle>,
        dequeue_timeout_us: i64,
    ) -> Self {
        Self {
            reader,
            pipeline: EncodePipeline::new(
                target_track,
                target_format,
                media_target,
                encoder,
                renderer,
                dequeue_timeout_us,
            ),
            input_surface,
            draw_surface: None,
            clock: None,
            input_ended: false,
            reader_stopped: false,
        }
    }

    /// Surface the frame source draws into, available after start
    pub fn draw_surface(&self) -> Option<SurfaceHandle> {
        self.draw_surface
    }

    fn presentation_time_ns(&self) -> i64 {
        self.clock
            .map(|clock| clock.elapsed().as_nanos() as i64)
            .unwrap_or_default()
    }

    fn start_inner(&mut self) -> TrackRecResult<()> {
        self.pipeline.init_codecs(self.input_surface)?;

        let surface = self
            .pipeline
            .renderer
            .input_surface()
            .ok_or_else(|| TrackRecError::Render {
                reason: format!(
                    "renderer exposes no input surface for {}",
                    self.pipeline.target_format.mime_type
                ),
            })?;
        self.draw_surface = Some(surface);

        self.pipeline.start_encoder()?;
        self.reader.start().map_err(|e| match e {
            TrackRecError::SourceInit { .. } => e,
            other => TrackRecError::SourceInit {
                reason: other.to_string(),
            },
        })?;

        self.clock = Some(Instant::now());
        Ok(())
    }

    fn step(&mut self) -> TrackRecResult<RecordResult> {
        if !self.input_ended {
            if let Some(surface) = self.draw_surface {
                let pts = self.presentation_time_ns();
                self.reader.draw_frame(surface, pts)?;
                self.pipeline.stats.frames_read += 1;
                // a frame the encoder had no room for is superseded by the next draw
                if self.pipeline.render(None, pts)? == RenderStatus::InputBusy {
                    self.pipeline.stats.input_busy += 1;
                }
            }
        }

        self.pipeline.finish_step()
    }
}

impl TrackRecorder for VideoTrackRecorder {
    fn start(&mut self) -> TrackRecResult<()> {
        match self.start_inner() {
            Ok(()) => {
                self.pipeline.state = RecorderState::Running;
                debug!(surface = ?self.draw_surface, "Video track recorder started");
                Ok(())
            }
            Err(e) => {
                self.pipeline.mark_error();
                Err(e)
            }
        }
    }

    fn process_next_frame(&mut self) -> TrackRecResult<RecordResult> {
        if !self.pipeline.encoder.is_running() {
            return Ok(RecordResult::NotRunning);
        }

        self.step().map_err(|e| {
            error!(error = %e, "Video track step failed");
            self.pipeline.mark_error();
            e
        })
    }

    fn signal_end_of_input(&mut self) -> TrackRecResult<()> {
        if self.input_ended {
            return Ok(());
        }
        self.input_ended = true;
        if self.pipeline.state == RecorderState::Running {
            self.pipeline.state = RecorderState::Draining;
        }
        self.pipeline.encoder.signal_end_of_input()
    }

    fn stop(&mut self) {
        self.pipeline.stop();
        if !self.reader_stopped {
            self.reader_stopped = true;
            self.reader.stop();
        }
    }

    fn state(&self) -> RecorderState {
        self.pipeline.state
    }

    fn stats(&self) -> TrackStats {
        self.pipeline.stats
    }

    fn registration(&self) -> TrackRegistration {
        self.pipeline.registration
    }

    fn media_kind(&self) -> MediaKind {
        MediaKind::Video
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackrec_core::mock::{
        MockEncoder, MockMediaTarget, MockSurfaceReader, MockSurfaceRenderer, TargetCall,
    };
    use trackrec_core::video_bitrate;

    fn video_format() -> MediaFormat {
        MediaFormat::video("video/avc", 1280, 720)
            .with_frame_rate(30)
            .with_key_frame_interval(5)
            .with_bit_rate(video_bitrate(1280, 720, 30))
    }

    fn recorder(
        reader: MockSurfaceReader,
        renderer: MockSurfaceRenderer,
        encoder: MockEncoder,
        target: MockMediaTarget,
    ) -> VideoTrackRecorder {
        VideoTrackRecorder::new(
            Box::new(reader),
            MediaTargetHandle::new(target),
            0,
            video_format(),
            Box::new(renderer),
            Box::new(encoder),
            None,
            0,
        )
    }

    #[test]
    fn test_renderer_receives_encoder_surface() {
        let renderer = MockSurfaceRenderer::new(4096);
        let renderer_probe = renderer.probe();
        let encoder = MockEncoder::new(video_format()).with_input_surface(SurfaceHandle(42));
        let mut recorder = recorder(
            MockSurfaceReader::new(),
            renderer,
            encoder,
            MockMediaTarget::new(),
        );

        recorder.start().unwrap();

        assert_eq!(
            renderer_probe.lock().surfaces,
            Some((None, Some(SurfaceHandle(42))))
        );
        assert!(recorder.draw_surface().is_some());
    }

    #[test]
    fn test_records_until_end_of_input() {
        let reader = MockSurfaceReader::new();
        let reader_probe = reader.probe();
        let encoder = MockEncoder::new(video_format()).with_codec_config();
        let encoder_probe = encoder.probe();
        let target = MockMediaTarget::new();
        let calls = target.calls();
        let mut recorder = recorder(reader, MockSurfaceRenderer::new(4096), encoder, target);

        recorder.start().unwrap();
        assert_eq!(recorder.process_next_frame().unwrap(), RecordResult::FormatChanged);
        for _ in 0..9 {
            assert_eq!(recorder.process_next_frame().unwrap(), RecordResult::FrameProcessed);
        }

        recorder.signal_end_of_input().unwrap();
        assert_eq!(recorder.process_next_frame().unwrap(), RecordResult::EosReached);
        assert_eq!(recorder.state(), RecorderState::Completed);

        assert_eq!(reader_probe.lock().frames, 10);
        assert_eq!(recorder.stats().samples_written, 10);

        let calls = calls.lock();
        assert!(matches!(calls[0], TargetCall::AddTrack { .. }));
        assert!(calls[1..]
            .iter()
            .all(|call| matches!(call, TargetCall::Write { size: 4096, .. })));

        let probe = encoder_probe.lock();
        assert!(probe.end_of_input);
        assert_eq!(probe.dequeued_tags, probe.released_tags);
    }

    #[test]
    fn test_idle_camera_keeps_draining() {
        let renderer = MockSurfaceRenderer::new(1024).with_max_frames(2);
        let mut recorder = recorder(
            MockSurfaceReader::new(),
            renderer,
            MockEncoder::new(video_format()),
            MockMediaTarget::new(),
        );
        recorder.start().unwrap();

        for _ in 0..5 {
            recorder.process_next_frame().unwrap();
        }
        assert_eq!(recorder.stats().samples_written, 2);
    }

    #[test]
    fn test_camera_unavailable() {
        let mut recorder = recorder(
            MockSurfaceReader::new().failing_start(),
            MockSurfaceRenderer::new(1024),
            MockEncoder::new(video_format()),
            MockMediaTarget::new(),
        );

        let err = recorder.start().unwrap_err();
        assert!(matches!(err, TrackRecError::SourceInit { .. }));
        assert_eq!(recorder.state(), RecorderState::Error);

        recorder.stop();
        recorder.stop();
    }
}
