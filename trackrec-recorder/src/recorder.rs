//! Track recorder contract and the encoder drain shared by every recorder
//!
//! A recorder advances one track by one unit of work per
//! [`TrackRecorder::process_next_frame`] call: produce one raw frame, hand it
//! to the renderer, then drain whatever encoded output is ready into the
//! media target. Audio and video recorders differ only in how the raw frame
//! is produced; the drain lives in [`EncodePipeline`].

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use trackrec_core::{
    Encoder, Frame, MediaFormat, MediaKind, MediaTargetHandle, OutputDequeue, RenderStatus,
    Renderer, TrackRecError, TrackRecResult,
};

/// Outcome of a single recorder step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordResult {
    /// A frame went through the pipeline
    FrameProcessed,
    /// The encoder reported its real output format and the track was registered
    FormatChanged,
    /// The encoder produced its end-of-stream buffer
    EosReached,
    /// The encoder is not running; stop driving this recorder
    NotRunning,
}

/// Lifecycle state of a recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecorderState {
    /// Created, `start` not yet called
    NotStarted,
    /// Producing and encoding frames
    Running,
    /// End of input signalled, waiting for the encoder to flush
    Draining,
    /// End of stream written
    Completed,
    /// A step or start failed
    Error,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecorderState::NotStarted => "not-started",
            RecorderState::Running => "running",
            RecorderState::Draining => "draining",
            RecorderState::Completed => "completed",
            RecorderState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Target track registration with the media target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackRegistration {
    /// Waiting for the encoder's output format; holds the index to ask for
    Unregistered {
        /// Index requested when the track gets registered
        requested: usize,
    },
    /// Registered; samples go to `actual`
    Registered {
        /// Index assigned by the media target
        actual: usize,
    },
}

impl TrackRegistration {
    /// Index samples are written to, once registered
    pub fn registered_index(&self) -> Option<usize> {
        match self {
            TrackRegistration::Registered { actual } => Some(*actual),
            TrackRegistration::Unregistered { .. } => None,
        }
    }

    /// Whether the track has been registered
    pub fn is_registered(&self) -> bool {
        matches!(self, TrackRegistration::Registered { .. })
    }
}

/// Per-track counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackStats {
    /// Raw frames read or drawn from the source
    pub frames_read: u64,
    /// Encoded samples written to the media target
    pub samples_written: u64,
    /// Encoded bytes written to the media target
    pub bytes_written: u64,
    /// Encoder output buffers handed back
    pub buffers_released: u64,
    /// Output format changes that registered the track
    pub format_changes: u64,
    /// Encoded samples dropped because the track was not registered yet
    pub dropped_unregistered: u64,
    /// Renders deferred to a later step because the encoder input was full
    pub input_busy: u64,
}

/// One track's recording state machine
pub trait TrackRecorder: Send {
    /// Initialize the encoder and renderer, then start the encoder and the frame source
    fn start(&mut self) -> TrackRecResult<()>;

    /// Advance the track by one frame and drain ready encoder output
    fn process_next_frame(&mut self) -> TrackRecResult<RecordResult>;

    /// Stop feeding new frames and ask the encoder to flush to end of stream
    fn signal_end_of_input(&mut self) -> TrackRecResult<()>;

    /// Stop and release the encoder and frame source. Idempotent
    fn stop(&mut self);

    /// Current lifecycle state
    fn state(&self) -> RecorderState;

    /// Snapshot of the track counters
    fn stats(&self) -> TrackStats;

    /// Current target track registration
    fn registration(&self) -> TrackRegistration;

    /// Media kind this recorder handles
    fn media_kind(&self) -> MediaKind;
}

/// Outcome of one drain pass
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DrainPass {
    pub format_changed: bool,
    pub end_of_stream: bool,
}

/// Renderer, encoder and media target wiring shared by all recorders
pub(crate) struct EncodePipeline {
    pub(crate) target_format: MediaFormat,
    pub(crate) media_target: MediaTargetHandle,
    pub(crate) encoder: Box<dyn Encoder>,
    pub(crate) renderer: Box<dyn Renderer>,
    pub(crate) registration: TrackRegistration,
    pub(crate) state: RecorderState,
    pub(crate) stats: TrackStats,
    dequeue_timeout_us: i64,
    eos_reached: bool,
    stopped: bool,
}

impl EncodePipeline {
    pub(crate) fn new(
        target_track: usize,
        target_format: MediaFormat,
        media_target: MediaTargetHandle,
        encoder: Box<dyn Encoder>,
        renderer: Box<dyn Renderer>,
        dequeue_timeout_us: i64,
    ) -> Self {
        Self {
            target_format,
            media_target,
            encoder,
            renderer,
            registration: TrackRegistration::Unregistered {
                requested: target_track,
            },
            state: RecorderState::NotStarted,
            stats: TrackStats::default(),
            dequeue_timeout_us,
            eos_reached: false,
            stopped: false,
        }
    }

    /// Configure the encoder first, since the renderer may render into its surface
    pub(crate) fn init_codecs(
        &mut self,
        input_surface: Option<trackrec_core::SurfaceHandle>,
    ) -> TrackRecResult<()> {
        self.encoder
            .init(&self.target_format)
            .map_err(|e| self.encoder_init_error(e))?;

        let output_surface = self.encoder.input_surface();
        self.renderer
            .init(input_surface, output_surface, &self.target_format)
    }

    pub(crate) fn start_encoder(&mut self) -> TrackRecResult<()> {
        self.encoder
            .start()
            .map_err(|e| self.encoder_init_error(e))?;
        debug!(
            encoder = self.encoder.name(),
            "Encoder started for {}", self.target_format
        );
        Ok(())
    }

    fn encoder_init_error(&self, error: TrackRecError) -> TrackRecError {
        match error {
            TrackRecError::EncoderInit { .. } => error,
            other => TrackRecError::EncoderInit {
                mime_type: self.target_format.mime_type.clone(),
                reason: other.to_string(),
            },
        }
    }

    pub(crate) fn render(
        &mut self,
        frame: Option<&Frame>,
        presentation_time_ns: i64,
    ) -> TrackRecResult<RenderStatus> {
        self.renderer
            .render_frame(frame, presentation_time_ns, self.encoder.as_mut())
    }

    /// Drain unless end of stream was already reached, and fold the pass into a step result
    pub(crate) fn finish_step(&mut self) -> TrackRecResult<RecordResult> {
        if self.eos_reached {
            return Ok(RecordResult::EosReached);
        }

        let pass = self.drain()?;
        if pass.end_of_stream {
            self.eos_reached = true;
            self.state = RecorderState::Completed;
        }

        if pass.format_changed {
            Ok(RecordResult::FormatChanged)
        } else if self.eos_reached {
            Ok(RecordResult::EosReached)
        } else {
            Ok(RecordResult::FrameProcessed)
        }
    }

    fn drain(&mut self) -> TrackRecResult<DrainPass> {
        let mut pass = DrainPass::default();

        loop {
            match self.encoder.dequeue_output_frame(self.dequeue_timeout_us) {
                OutputDequeue::TryAgainLater => break,
                OutputDequeue::FormatChanged => {
                    if self.registration.is_registered() {
                        debug!("Ignoring repeated encoder output format change");
                        continue;
                    }
                    self.register_track()?;
                    pass.format_changed = true;
                    break;
                }
                OutputDequeue::Buffer(tag) => {
                    let written = self.write_output(tag);
                    self.encoder.release_output_frame(tag);
                    self.stats.buffers_released += 1;

                    if written? {
                        debug!(tag, "Encoder produced end of stream");
                        pass.end_of_stream = true;
                        break;
                    }
                }
                OutputDequeue::Unrecognized(code) => {
                    warn!(code, "Unhandled value when receiving encoded output frame");
                }
            }
        }

        Ok(pass)
    }

    fn register_track(&mut self) -> TrackRecResult<()> {
        let TrackRegistration::Unregistered { requested } = self.registration else {
            return Ok(());
        };

        let output_format = self.encoder.output_format();
        let actual = self.media_target.add_track(&output_format, requested)?;
        info!(
            requested,
            actual, "Encoder output format received: {}", output_format
        );

        self.target_format = output_format;
        self.registration = TrackRegistration::Registered { actual };
        self.stats.format_changes += 1;
        Ok(())
    }

    /// Write one output buffer; returns whether it carried end of stream
    fn write_output(&mut self, tag: usize) -> TrackRecResult<bool> {
        let frame = self
            .encoder
            .get_output_frame(tag)
            .ok_or(TrackRecError::NoFrameAvailable { tag })?;
        let info = frame.info;

        if info.size > 0 && !info.flags.is_codec_config() {
            match (self.registration, frame.data()) {
                (TrackRegistration::Registered { actual }, Some(data)) => {
                    let len = data.len() as u64;
                    if self.media_target.write_sample(actual, data, &info)? {
                        self.stats.samples_written += 1;
                        self.stats.bytes_written += len;
                    }
                }
                (TrackRegistration::Registered { .. }, None) => {
                    warn!(tag, "Encoded frame has no data");
                }
                (TrackRegistration::Unregistered { requested }, _) => {
                    self.stats.dropped_unregistered += 1;
                    warn!(
                        tag,
                        track = requested,
                        "Dropping encoded frame produced before output format"
                    );
                }
            }
        }

        Ok(info.flags.is_end_of_stream())
    }

    pub(crate) fn mark_error(&mut self) {
        self.state = RecorderState::Error;
    }

    pub(crate) fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.encoder.stop();
        self.encoder.release();
        self.renderer.release();
        debug!(
            encoder = self.encoder.name(),
            written = self.stats.samples_written,
            "Encoder stopped"
        );
    }
}
