//! Renderer that forwards raw bytes to the encoder unchanged

use tracing::trace;
use trackrec_core::{
    BufferInfo, Encoder, Frame, MediaFormat, RenderStatus, Renderer, SurfaceHandle, TrackRecResult,
};

/// Copies each source frame into an encoder input buffer, keeping its size,
/// presentation time and flags. An end-of-stream source frame therefore
/// reaches the encoder as end of input.
///
/// When the encoder has no free input buffer the frame is left with the
/// caller ([`RenderStatus::InputBusy`]); nothing is dropped.
#[derive(Debug, Default)]
pub struct PassthroughRenderer {
    input_timeout_us: i64,
    frames_forwarded: u64,
    busy_polls: u64,
}

impl PassthroughRenderer {
    /// Create a renderer that polls for encoder input without blocking
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout_us` for a free encoder input buffer
    pub fn with_input_timeout_us(mut self, timeout_us: i64) -> Self {
        self.input_timeout_us = timeout_us;
        self
    }

    /// Frames handed to the encoder
    pub fn frames_forwarded(&self) -> u64 {
        self.frames_forwarded
    }

    /// Renders that found the encoder input queue full
    pub fn busy_polls(&self) -> u64 {
        self.busy_polls
    }
}

impl Renderer for PassthroughRenderer {
    fn init(
        &mut self,
        _input_surface: Option<SurfaceHandle>,
        _output_surface: Option<SurfaceHandle>,
        _target_format: &MediaFormat,
    ) -> TrackRecResult<()> {
        Ok(())
    }

    fn render_frame(
        &mut self,
        frame: Option<&Frame>,
        _presentation_time_ns: i64,
        encoder: &mut dyn Encoder,
    ) -> TrackRecResult<RenderStatus> {
        let Some(frame) = frame else {
            return Ok(RenderStatus::Rendered);
        };
        if frame.buffer.is_none() && !frame.is_end_of_stream() {
            return Ok(RenderStatus::Rendered);
        }

        let Some(tag) = encoder.dequeue_input_frame(self.input_timeout_us) else {
            self.busy_polls += 1;
            trace!(
                pts = frame.info.presentation_time_us,
                eos = frame.is_end_of_stream(),
                "Encoder input full"
            );
            return Ok(RenderStatus::InputBusy);
        };

        trace!(tag, size = frame.info.size, "Forwarding raw frame");
        let info = BufferInfo {
            offset: 0,
            ..frame.info
        };
        encoder.queue_input_frame(Frame::new(Some(tag), frame.data(), info))?;
        self.frames_forwarded += 1;
        Ok(RenderStatus::Rendered)
    }

    fn release(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use trackrec_core::mock::MockEncoder;
    use trackrec_core::{BufferFlags, OutputDequeue};

    #[test]
    fn test_forwards_frame_metadata() {
        let mut encoder = MockEncoder::new(MediaFormat::audio("audio/mp4a-latm", 44_100, 1));
        let probe = encoder.probe();
        let mut renderer = PassthroughRenderer::new();

        let frame = Frame::new(
            None,
            Some(Bytes::from(vec![1u8; 512])),
            BufferInfo::new(0, 512, 46_440, BufferFlags::NONE),
        );
        assert_eq!(
            renderer.render_frame(Some(&frame), 46_440_000, &mut encoder).unwrap(),
            RenderStatus::Rendered
        );

        assert_eq!(probe.lock().queued_inputs, 1);
        assert_eq!(renderer.frames_forwarded(), 1);

        // first output is the format change, then the echoed sample
        assert_eq!(encoder.dequeue_output_frame(0), OutputDequeue::FormatChanged);
        let OutputDequeue::Buffer(tag) = encoder.dequeue_output_frame(0) else {
            panic!("expected an output buffer");
        };
        let output = encoder.get_output_frame(tag).unwrap();
        assert_eq!(output.info.size, 512);
        assert_eq!(output.info.presentation_time_us, 46_440);
    }

    #[test]
    fn test_end_of_stream_propagates() {
        let mut encoder = MockEncoder::new(MediaFormat::audio("audio/mp4a-latm", 44_100, 1));
        let mut renderer = PassthroughRenderer::new();

        let eos = Frame::new(None, None, BufferInfo::new(0, 0, 0, BufferFlags::END_OF_STREAM));
        renderer.render_frame(Some(&eos), 0, &mut encoder).unwrap();

        encoder.dequeue_output_frame(0);
        let OutputDequeue::Buffer(tag) = encoder.dequeue_output_frame(0) else {
            panic!("expected an output buffer");
        };
        assert!(encoder.get_output_frame(tag).unwrap().is_end_of_stream());
    }

    #[test]
    fn test_empty_frame_is_ignored() {
        let mut encoder = MockEncoder::new(MediaFormat::audio("audio/mp4a-latm", 44_100, 1));
        let probe = encoder.probe();
        let mut renderer = PassthroughRenderer::new();

        renderer.render_frame(Some(&Frame::empty()), 0, &mut encoder).unwrap();
        renderer.render_frame(None, 0, &mut encoder).unwrap();

        assert_eq!(probe.lock().queued_inputs, 0);
    }

    #[test]
    fn test_full_input_queue_leaves_frame_with_caller() {
        let mut encoder =
            MockEncoder::new(MediaFormat::audio("audio/mp4a-latm", 44_100, 1)).with_busy_input(1);
        let probe = encoder.probe();
        let mut renderer = PassthroughRenderer::new();
        let eos = Frame::new(None, None, BufferInfo::new(0, 0, 0, BufferFlags::END_OF_STREAM));

        assert_eq!(
            renderer.render_frame(Some(&eos), 0, &mut encoder).unwrap(),
            RenderStatus::InputBusy
        );
        assert_eq!(probe.lock().queued_inputs, 0);
        assert_eq!(renderer.busy_polls(), 1);

        assert_eq!(
            renderer.render_frame(Some(&eos), 0, &mut encoder).unwrap(),
            RenderStatus::Rendered
        );
        assert_eq!(probe.lock().queued_inputs, 1);
    }
}
