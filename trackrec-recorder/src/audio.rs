//! Recorder for buffer-pulled tracks (audio)

use crate::recorder::{
    EncodePipeline, RecordResult, RecorderState, TrackRecorder, TrackRegistration, TrackStats,
};
use tracing::{debug, error, trace};
use trackrec_core::{
    BufferFlags, BufferInfo, BufferTrackReader, Encoder, Frame, MediaFormat, MediaKind,
    MediaTargetHandle, RenderStatus, Renderer, TrackRecError, TrackRecResult,
};

/// Records a track whose frames are pulled synchronously from a buffer reader.
///
/// A frame the encoder could not accept is held and offered again on the
/// next step, so neither raw audio nor the end-of-stream marker is lost
/// while the encoder input queue is full.
pub struct AudioTrackRecorder {
    reader: Box<dyn BufferTrackReader>,
    pipeline: EncodePipeline,
    pending: Option<Frame>,
    end_requested: bool,
    // set once the end-of-stream frame was accepted by the encoder
    input_ended: bool,
    last_presentation_time_us: i64,
    reader_stopped: bool,
}

impl AudioTrackRecorder {
    /// Create a recorder; nothing is acquired until [`TrackRecorder::start`]
    pub fn new(
        reader: Box<dyn BufferTrackReader>,
        media_target: MediaTargetHandle,
        target_track: usize,
        target_format: MediaFormat,
        renderer: Box<dyn Renderer>,
        encoder: Box<dyn Encoder>,
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
            pending: None,
            end_requested: false,
            input_ended: false,
            last_presentation_time_us: 0,
            reader_stopped: false,
        }
    }

    fn step(&mut self) -> TrackRecResult<RecordResult> {
        if !self.input_ended {
            let frame = match self.pending.take() {
                Some(frame) => frame,
                None if self.end_requested => self.end_of_stream_frame(),
                None => self.read_frame()?,
            };
            self.submit(frame)?;
        }

        self.pipeline.finish_step()
    }

    fn read_frame(&mut self) -> TrackRecResult<Frame> {
        let frame = self.reader.read_next_frame()?;
        if frame.buffer.is_some() {
            self.pipeline.stats.frames_read += 1;
            self.last_presentation_time_us = frame.info.presentation_time_us;
        }
        if frame.is_end_of_stream() {
            debug!("Audio source reached end of stream");
            self.request_end();
        }
        Ok(frame)
    }

    fn end_of_stream_frame(&self) -> Frame {
        Frame::new(
            None,
            None,
            BufferInfo::new(0, 0, self.last_presentation_time_us, BufferFlags::END_OF_STREAM),
        )
    }

    /// Offer a frame to the encoder, keeping it for the next step if the input is full
    fn submit(&mut self, frame: Frame) -> TrackRecResult<()> {
        match self
            .pipeline
            .render(Some(&frame), frame.info.presentation_time_ns())?
        {
            RenderStatus::Rendered => {
                if frame.is_end_of_stream() {
                    self.input_ended = true;
                }
            }
            RenderStatus::InputBusy => {
                trace!(pts = frame.info.presentation_time_us, "Encoder input busy, retrying next step");
                self.pipeline.stats.input_busy += 1;
                self.pending = Some(frame);
            }
        }
        Ok(())
    }

    fn request_end(&mut self) {
        self.end_requested = true;
        if self.pipeline.state == RecorderState::Running {
            self.pipeline.state = RecorderState::Draining;
        }
    }
}

impl TrackRecorder for AudioTrackRecorder {
    fn start(&mut self) -> TrackRecResult<()> {
        let result = self
            .pipeline
            .init_codecs(None)
            .and_then(|_| self.pipeline.start_encoder())
            .and_then(|_| {
                self.reader.start().map_err(|e| match e {
                    TrackRecError::SourceInit { .. } => e,
                    other => TrackRecError::SourceInit {
                        reason: other.to_string(),
                    },
                })
            });

        match result {
            Ok(()) => {
                self.pipeline.state = RecorderState::Running;
                debug!("Audio track recorder started");
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
            error!(error = %e, "Audio track step failed");
            self.pipeline.mark_error();
            e
        })
    }

    fn signal_end_of_input(&mut self) -> TrackRecResult<()> {
        if self.end_requested {
            return Ok(());
        }
        self.request_end();

        // a held raw frame goes first; the next step follows it with end of stream
        if self.pending.is_none() {
            let eos = self.end_of_stream_frame();
            self.submit(eos)?;
        }
        Ok(())
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
        MediaKind::Audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passthrough::PassthroughRenderer;
    use trackrec_core::mock::{MockBufferReader, MockEncoder, MockMediaTarget, TargetCall};

    fn audio_format() -> MediaFormat {
        MediaFormat::audio("audio/mp4a-latm", 44_100, 1).with_bit_rate(128_000)
    }

    fn recorder(
        reader: MockBufferReader,
        encoder: MockEncoder,
        target: MockMediaTarget,
    ) -> AudioTrackRecorder {
        AudioTrackRecorder::new(
            Box::new(reader),
            MediaTargetHandle::new(target),
            1,
            audio_format(),
            Box::new(PassthroughRenderer::new()),
            Box::new(encoder),
            0,
        )
    }

    fn run_to_end(recorder: &mut AudioTrackRecorder) -> Vec<RecordResult> {
        let mut results = Vec::new();
        for _ in 0..100 {
            let result = recorder.process_next_frame().unwrap();
            results.push(result);
            if result == RecordResult::EosReached {
                break;
            }
        }
        results
    }

    #[test]
    fn test_records_until_end_of_stream() {
        let encoder = MockEncoder::new(audio_format());
        let encoder_probe = encoder.probe();
        let target = MockMediaTarget::new();
        let calls = target.calls();
        let mut recorder = recorder(MockBufferReader::new(5, 256), encoder, target);

        recorder.start().unwrap();
        assert_eq!(recorder.state(), RecorderState::Running);

        let results = run_to_end(&mut recorder);
        assert_eq!(results.first(), Some(&RecordResult::FormatChanged));
        assert_eq!(results.last(), Some(&RecordResult::EosReached));
        assert_eq!(
            results
                .iter()
                .filter(|r| **r == RecordResult::FormatChanged)
                .count(),
            1
        );
        assert_eq!(recorder.state(), RecorderState::Completed);

        let stats = recorder.stats();
        assert_eq!(stats.frames_read, 5);
        assert_eq!(stats.samples_written, 5);
        assert_eq!(stats.bytes_written, 5 * 256);
        assert_eq!(stats.format_changes, 1);

        let calls = calls.lock();
        assert!(matches!(calls[0], TargetCall::AddTrack { requested: 1, .. }));
        assert_eq!(calls.len(), 6);

        let probe = encoder_probe.lock();
        assert_eq!(probe.dequeued_tags, probe.released_tags);
        assert_eq!(probe.invalid_releases, 0);
    }

    #[test]
    fn test_no_writes_after_end_of_stream() {
        let target = MockMediaTarget::new();
        let calls = target.calls();
        let mut recorder = recorder(
            MockBufferReader::new(3, 128),
            MockEncoder::new(audio_format()),
            target,
        );
        recorder.start().unwrap();
        run_to_end(&mut recorder);
        let writes = calls.lock().len();

        for _ in 0..5 {
            assert_eq!(recorder.process_next_frame().unwrap(), RecordResult::EosReached);
        }
        assert_eq!(calls.lock().len(), writes);
    }

    #[test]
    fn test_signal_end_of_input_flushes_endless_source() {
        let mut recorder = recorder(
            MockBufferReader::endless(64),
            MockEncoder::new(audio_format()),
            MockMediaTarget::new(),
        );
        recorder.start().unwrap();
        for _ in 0..4 {
            recorder.process_next_frame().unwrap();
        }

        recorder.signal_end_of_input().unwrap();
        assert_eq!(recorder.state(), RecorderState::Draining);

        let results = run_to_end(&mut recorder);
        assert_eq!(results.last(), Some(&RecordResult::EosReached));
        assert_eq!(recorder.stats().frames_read, 4);
    }

    #[test]
    fn test_busy_encoder_input_keeps_every_frame() {
        let encoder = MockEncoder::new(audio_format()).with_busy_input(3);
        let encoder_probe = encoder.probe();
        let mut recorder = recorder(MockBufferReader::new(5, 256), encoder, MockMediaTarget::new());
        recorder.start().unwrap();

        let results = run_to_end(&mut recorder);
        assert_eq!(results.last(), Some(&RecordResult::EosReached));

        let stats = recorder.stats();
        assert_eq!(stats.frames_read, 5);
        assert_eq!(stats.samples_written, 5);
        assert_eq!(stats.input_busy, 3);
        // five samples plus the end-of-stream frame
        assert_eq!(encoder_probe.lock().queued_inputs, 6);
    }

    #[test]
    fn test_end_of_input_retried_while_encoder_busy() {
        let encoder = MockEncoder::new(audio_format());
        let encoder_probe = encoder.probe();
        let mut recorder = recorder(MockBufferReader::endless(64), encoder, MockMediaTarget::new());
        recorder.start().unwrap();
        for _ in 0..2 {
            recorder.process_next_frame().unwrap();
        }

        encoder_probe.lock().busy_input_polls = 2;
        recorder.signal_end_of_input().unwrap();
        assert_eq!(recorder.state(), RecorderState::Draining);
        assert_eq!(encoder_probe.lock().queued_inputs, 2);

        // a second signal does not queue another end of stream
        recorder.signal_end_of_input().unwrap();

        let results = run_to_end(&mut recorder);
        assert_eq!(results.last(), Some(&RecordResult::EosReached));
        assert_eq!(recorder.state(), RecorderState::Completed);
        assert_eq!(recorder.stats().frames_read, 2);
        assert_eq!(recorder.stats().input_busy, 2);
        assert_eq!(encoder_probe.lock().queued_inputs, 3);
    }

    #[test]
    fn test_held_frame_precedes_end_of_input() {
        let encoder = MockEncoder::new(audio_format()).with_busy_input(1);
        let encoder_probe = encoder.probe();
        let target = MockMediaTarget::new();
        let calls = target.calls();
        let mut recorder = recorder(MockBufferReader::endless(64), encoder, target);
        recorder.start().unwrap();

        // first read is held back by the full input queue
        recorder.process_next_frame().unwrap();
        assert_eq!(encoder_probe.lock().queued_inputs, 0);

        recorder.signal_end_of_input().unwrap();
        let results = run_to_end(&mut recorder);
        assert_eq!(results.last(), Some(&RecordResult::EosReached));

        assert_eq!(recorder.stats().frames_read, 1);
        assert_eq!(recorder.stats().samples_written, 1);
        assert_eq!(encoder_probe.lock().queued_inputs, 2);
        let writes = calls
            .lock()
            .iter()
            .filter(|c| matches!(c, TargetCall::Write { .. }))
            .count();
        assert_eq!(writes, 1);
    }

    #[test]
    fn test_not_running_after_stop() {
        let reader = MockBufferReader::new(3, 128);
        let reader_probe = reader.probe();
        let mut recorder = recorder(
            reader,
            MockEncoder::new(audio_format()),
            MockMediaTarget::new(),
        );
        recorder.start().unwrap();

        recorder.stop();
        recorder.stop();

        assert_eq!(recorder.process_next_frame().unwrap(), RecordResult::NotRunning);
        assert_eq!(reader_probe.lock().stop_calls, 1);
    }

    #[test]
    fn test_encoder_init_failure() {
        let mut recorder = recorder(
            MockBufferReader::new(3, 128),
            MockEncoder::new(audio_format()).failing_init(),
            MockMediaTarget::new(),
        );

        let err = recorder.start().unwrap_err();
        assert_eq!(err.error_code(), "ENCODER_INIT_FAILED");
        assert_eq!(recorder.state(), RecorderState::Error);
    }

    #[test]
    fn test_source_init_failure() {
        let mut recorder = recorder(
            MockBufferReader::new(3, 128).failing_start(),
            MockEncoder::new(audio_format()),
            MockMediaTarget::new(),
        );

        let err = recorder.start().unwrap_err();
        assert_eq!(err.error_code(), "SOURCE_INIT_FAILED");
    }
}
