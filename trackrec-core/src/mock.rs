//! Mock collaborators for tests and demos
//!
//! Each mock shares a probe (`Arc<Mutex<..>>`) with the test that created
//! it, so behavior can be inspected after the mock has been moved into a
//! recorder or extractor.

use crate::codec::{Encoder, SeekMode, Thumbnail, ThumbnailDecoder};
use crate::error::{TrackRecError, TrackRecResult};
use crate::format::MediaFormat;
use crate::frame::{BufferFlags, BufferInfo, Frame, OutputDequeue, SurfaceHandle};
use crate::reader::{BufferTrackReader, MediaTrackReader, SurfaceTrackReader};
use crate::render::{RenderStatus, Renderer};
use crate::target::MediaTarget;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// ENCODER
// ============================================================================

/// Output the mock encoder will produce on subsequent dequeues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutput {
    /// Report a format change
    FormatChanged,
    /// Produce an encoded buffer
    Sample {
        /// Encoded size in bytes
        size: usize,
        /// Presentation time
        presentation_time_us: i64,
        /// Buffer flags
        flags: BufferFlags,
    },
    /// Report a raw status code
    Status(i32),
}

/// Observable state of a [`MockEncoder`]
#[derive(Debug, Default)]
pub struct EncoderProbe {
    /// Format passed to `init`
    pub configured: Option<MediaFormat>,
    /// Whether the encoder is running; tests may clear it to simulate a codec failure
    pub running: bool,
    /// Number of input frames queued
    pub queued_inputs: usize,
    /// Output buffer indices handed out, in order
    pub dequeued_tags: Vec<usize>,
    /// Output buffer indices released, in order
    pub released_tags: Vec<usize>,
    /// Releases of indices that were not outstanding
    pub invalid_releases: usize,
    /// Whether end of input was signalled
    pub end_of_input: bool,
    /// Calls to `stop`
    pub stop_calls: usize,
    /// Calls to `release`
    pub release_calls: usize,
    /// Upcoming `dequeue_input_frame` calls that report a full input queue
    pub busy_input_polls: usize,
    pending: VecDeque<MockOutput>,
    format_reported: bool,
}

/// Scripted encoder that echoes each queued input as one encoded sample
#[derive(Debug)]
pub struct MockEncoder {
    probe: Arc<Mutex<EncoderProbe>>,
    output_format: MediaFormat,
    surface: Option<SurfaceHandle>,
    fail_init: bool,
    codec_config_first: bool,
    missing_tags: HashSet<usize>,
    outstanding: HashMap<usize, Frame>,
    next_input_tag: usize,
    next_output_tag: usize,
}

impl MockEncoder {
    /// Encoder reporting `output_format` on its first format change
    pub fn new(output_format: MediaFormat) -> Self {
        Self {
            probe: Arc::new(Mutex::new(EncoderProbe::default())),
            output_format,
            surface: None,
            fail_init: false,
            codec_config_first: false,
            missing_tags: HashSet::new(),
            outstanding: HashMap::new(),
            next_input_tag: 0,
            next_output_tag: 0,
        }
    }

    /// Expose an input surface, as a video encoder would
    pub fn with_input_surface(mut self, surface: SurfaceHandle) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Fail `init` with an encoder initialization error
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Report a full input queue on the next `polls` input dequeues
    pub fn with_busy_input(self, polls: usize) -> Self {
        self.probe.lock().busy_input_polls = polls;
        self
    }

    /// Emit a codec-config buffer right after the format change
    pub fn with_codec_config(mut self) -> Self {
        self.codec_config_first = true;
        self
    }

    /// Return no frame for this output index
    pub fn with_missing_frame(mut self, tag: usize) -> Self {
        self.missing_tags.insert(tag);
        self
    }

    /// Queue output ahead of anything produced from input
    pub fn push_output(&self, output: MockOutput) {
        self.probe.lock().pending.push_back(output);
    }

    /// Shared probe
    pub fn probe(&self) -> Arc<Mutex<EncoderProbe>> {
        self.probe.clone()
    }

    fn enqueue_sample(&self, info: &BufferInfo) {
        let mut probe = self.probe.lock();
        if !probe.format_reported {
            probe.format_reported = true;
            probe.pending.push_back(MockOutput::FormatChanged);
            if self.codec_config_first {
                probe.pending.push_back(MockOutput::Sample {
                    size: 16,
                    presentation_time_us: 0,
                    flags: BufferFlags::CODEC_CONFIG,
                });
            }
        }
        probe.pending.push_back(MockOutput::Sample {
            size: info.size,
            presentation_time_us: info.presentation_time_us,
            flags: info.flags,
        });
    }
}

impl Encoder for MockEncoder {
    fn init(&mut self, format: &MediaFormat) -> TrackRecResult<()> {
        if self.fail_init {
            return Err(TrackRecError::EncoderInit {
                mime_type: format.mime_type.clone(),
                reason: "mock encoder configured to fail".to_string(),
            });
        }
        self.probe.lock().configured = Some(format.clone());
        Ok(())
    }

    fn input_surface(&self) -> Option<SurfaceHandle> {
        self.surface
    }

    fn start(&mut self) -> TrackRecResult<()> {
        self.probe.lock().running = true;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.probe.lock().running
    }

    fn dequeue_input_frame(&mut self, _timeout_us: i64) -> Option<usize> {
        {
            let mut probe = self.probe.lock();
            if probe.busy_input_polls > 0 {
                probe.busy_input_polls -= 1;
                return None;
            }
        }
        let tag = self.next_input_tag;
        self.next_input_tag += 1;
        Some(tag)
    }

    fn queue_input_frame(&mut self, frame: Frame) -> TrackRecResult<()> {
        self.probe.lock().queued_inputs += 1;
        self.enqueue_sample(&frame.info);
        Ok(())
    }

    fn signal_end_of_input(&mut self) -> TrackRecResult<()> {
        self.probe.lock().end_of_input = true;
        self.enqueue_sample(&BufferInfo::new(0, 0, 0, BufferFlags::END_OF_STREAM));
        Ok(())
    }

    fn dequeue_output_frame(&mut self, _timeout_us: i64) -> OutputDequeue {
        let next = self.probe.lock().pending.pop_front();
        match next {
            None => OutputDequeue::TryAgainLater,
            Some(MockOutput::FormatChanged) => {
                self.probe.lock().format_reported = true;
                OutputDequeue::FormatChanged
            }
            Some(MockOutput::Status(code)) => OutputDequeue::from_code(code),
            Some(MockOutput::Sample {
                size,
                presentation_time_us,
                flags,
            }) => {
                let tag = self.next_output_tag;
                self.next_output_tag += 1;
                let frame = Frame::new(
                    Some(tag),
                    Some(Bytes::from(vec![0xAB; size])),
                    BufferInfo::new(0, size, presentation_time_us, flags),
                );
                self.outstanding.insert(tag, frame);
                self.probe.lock().dequeued_tags.push(tag);
                OutputDequeue::Buffer(tag)
            }
        }
    }

    fn get_output_frame(&mut self, tag: usize) -> Option<Frame> {
        if self.missing_tags.contains(&tag) {
            return None;
        }
        self.outstanding.get(&tag).cloned()
    }

    fn release_output_frame(&mut self, tag: usize) {
        let mut probe = self.probe.lock();
        if self.outstanding.remove(&tag).is_none() {
            probe.invalid_releases += 1;
        }
        probe.released_tags.push(tag);
    }

    fn output_format(&self) -> MediaFormat {
        self.output_format.clone()
    }

    fn stop(&mut self) {
        let mut probe = self.probe.lock();
        probe.running = false;
        probe.stop_calls += 1;
    }

    fn release(&mut self) {
        self.probe.lock().release_calls += 1;
    }

    fn name(&self) -> &str {
        "mock-encoder"
    }
}

// ============================================================================
// MEDIA TARGET
// ============================================================================

/// A call observed by [`MockMediaTarget`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetCall {
    /// `add_track`
    AddTrack {
        /// MIME type of the registered format
        mime_type: String,
        /// Index the recorder asked for
        requested: usize,
        /// Index handed back
        actual: usize,
    },
    /// `write_sample_data`
    Write {
        /// Track index written to
        track_index: usize,
        /// Sample size
        size: usize,
        /// Sample presentation time
        presentation_time_us: i64,
    },
    /// `release`
    Release,
}

/// Multiplex target that records every call
#[derive(Debug, Default)]
pub struct MockMediaTarget {
    calls: Arc<Mutex<Vec<TargetCall>>>,
    remap: HashMap<usize, usize>,
    fail_writes: bool,
}

impl MockMediaTarget {
    /// Create a target
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand back `actual` when `requested` is registered
    pub fn with_remap(mut self, requested: usize, actual: usize) -> Self {
        self.remap.insert(requested, actual);
        self
    }

    /// Fail every sample write
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Shared call log
    pub fn calls(&self) -> Arc<Mutex<Vec<TargetCall>>> {
        self.calls.clone()
    }
}

impl MediaTarget for MockMediaTarget {
    fn add_track(&mut self, format: &MediaFormat, requested_index: usize) -> TrackRecResult<usize> {
        let actual = self
            .remap
            .get(&requested_index)
            .copied()
            .unwrap_or(requested_index);
        self.calls.lock().push(TargetCall::AddTrack {
            mime_type: format.mime_type.clone(),
            requested: requested_index,
            actual,
        });
        Ok(actual)
    }

    fn write_sample_data(
        &mut self,
        track_index: usize,
        data: Bytes,
        info: &BufferInfo,
    ) -> TrackRecResult<()> {
        if self.fail_writes {
            return Err(TrackRecError::MediaTarget {
                reason: "mock target configured to fail writes".to_string(),
            });
        }
        self.calls.lock().push(TargetCall::Write {
            track_index,
            size: data.len(),
            presentation_time_us: info.presentation_time_us,
        });
        Ok(())
    }

    fn release(&mut self) {
        self.calls.lock().push(TargetCall::Release);
    }
}

// ============================================================================
// READERS
// ============================================================================

/// Observable state of a mock reader
#[derive(Debug, Default)]
pub struct ReaderProbe {
    /// Calls to `start`
    pub start_calls: usize,
    /// Calls to `stop`
    pub stop_calls: usize,
    /// Frames read or drawn
    pub frames: usize,
}

/// Buffer reader producing fixed-size PCM-like frames
#[derive(Debug)]
pub struct MockBufferReader {
    probe: Arc<Mutex<ReaderProbe>>,
    frame_count: Option<usize>,
    frame_size: usize,
    frame_duration_us: i64,
    read_delay: Option<Duration>,
    fail_start: bool,
    produced: usize,
}

impl MockBufferReader {
    /// Reader producing `frame_count` frames followed by an end-of-stream frame
    pub fn new(frame_count: usize, frame_size: usize) -> Self {
        Self {
            probe: Arc::new(Mutex::new(ReaderProbe::default())),
            frame_count: Some(frame_count),
            frame_size,
            frame_duration_us: 23_220,
            read_delay: None,
            fail_start: false,
            produced: 0,
        }
    }

    /// Reader that never reaches end of stream
    pub fn endless(frame_size: usize) -> Self {
        Self {
            frame_count: None,
            ..Self::new(0, frame_size)
        }
    }

    /// Sleep before each read, like a capture device pacing its buffers
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Fail `start` with a source initialization error
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Shared probe
    pub fn probe(&self) -> Arc<Mutex<ReaderProbe>> {
        self.probe.clone()
    }
}

impl MediaTrackReader for MockBufferReader {
    fn start(&mut self) -> TrackRecResult<()> {
        self.probe.lock().start_calls += 1;
        if self.fail_start {
            return Err(TrackRecError::SourceInit {
                reason: "mock reader configured to fail".to_string(),
            });
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.probe.lock().stop_calls += 1;
    }
}

impl BufferTrackReader for MockBufferReader {
    fn read_next_frame(&mut self) -> TrackRecResult<Frame> {
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }

        let pts = self.produced as i64 * self.frame_duration_us;
        let frame = match self.frame_count {
            Some(count) if self.produced > count => return Ok(Frame::empty()),
            Some(count) if self.produced == count => {
                Frame::new(None, None, BufferInfo::new(0, 0, pts, BufferFlags::END_OF_STREAM))
            }
            _ => Frame::new(
                None,
                Some(Bytes::from(vec![0u8; self.frame_size])),
                BufferInfo::new(0, self.frame_size, pts, BufferFlags::NONE),
            ),
        };

        self.produced += 1;
        self.probe.lock().frames += 1;
        Ok(frame)
    }
}

/// Surface reader whose frames are produced externally
#[derive(Debug, Default)]
pub struct MockSurfaceReader {
    probe: Arc<Mutex<ReaderProbe>>,
    fail_start: bool,
}

impl MockSurfaceReader {
    /// Create a reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `start` with a source initialization error
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Shared probe
    pub fn probe(&self) -> Arc<Mutex<ReaderProbe>> {
        self.probe.clone()
    }
}

impl MediaTrackReader for MockSurfaceReader {
    fn start(&mut self) -> TrackRecResult<()> {
        self.probe.lock().start_calls += 1;
        if self.fail_start {
            return Err(TrackRecError::SourceInit {
                reason: "mock camera unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.probe.lock().stop_calls += 1;
    }
}

impl SurfaceTrackReader for MockSurfaceReader {
    fn draw_frame(&mut self, _surface: SurfaceHandle, _presentation_time_ns: i64)
        -> TrackRecResult<()> {
        // the camera is the producer
        self.probe.lock().frames += 1;
        Ok(())
    }
}

// ============================================================================
// RENDERER
// ============================================================================

/// Observable state of a [`MockSurfaceRenderer`]
#[derive(Debug, Default)]
pub struct RendererProbe {
    /// Surfaces passed to `init` (input, output)
    pub surfaces: Option<(Option<SurfaceHandle>, Option<SurfaceHandle>)>,
    /// Frames rendered
    pub rendered: usize,
    /// Calls to `release`
    pub release_calls: usize,
}

/// GL-style renderer that presents one frame to the encoder per call
#[derive(Debug)]
pub struct MockSurfaceRenderer {
    probe: Arc<Mutex<RendererProbe>>,
    own_surface: SurfaceHandle,
    frame_size: usize,
    max_frames: Option<usize>,
    input_surface: Option<SurfaceHandle>,
}

impl MockSurfaceRenderer {
    /// Renderer presenting frames of `frame_size` bytes
    pub fn new(frame_size: usize) -> Self {
        Self {
            probe: Arc::new(Mutex::new(RendererProbe::default())),
            own_surface: SurfaceHandle(7),
            frame_size,
            max_frames: None,
            input_surface: None,
        }
    }

    /// Stop presenting new frames after `count`, like a camera that went idle
    pub fn with_max_frames(mut self, count: usize) -> Self {
        self.max_frames = Some(count);
        self
    }

    /// Shared probe
    pub fn probe(&self) -> Arc<Mutex<RendererProbe>> {
        self.probe.clone()
    }
}

impl Renderer for MockSurfaceRenderer {
    fn init(
        &mut self,
        input_surface: Option<SurfaceHandle>,
        output_surface: Option<SurfaceHandle>,
        _target_format: &MediaFormat,
    ) -> TrackRecResult<()> {
        self.input_surface = Some(input_surface.unwrap_or(self.own_surface));
        self.probe.lock().surfaces = Some((input_surface, output_surface));
        Ok(())
    }

    fn input_surface(&self) -> Option<SurfaceHandle> {
        self.input_surface
    }

    fn render_frame(
        &mut self,
        _frame: Option<&Frame>,
        presentation_time_ns: i64,
        encoder: &mut dyn Encoder,
    ) -> TrackRecResult<RenderStatus> {
        let mut probe = self.probe.lock();
        if matches!(self.max_frames, Some(max) if probe.rendered >= max) {
            return Ok(RenderStatus::Rendered);
        }
        probe.rendered += 1;
        drop(probe);

        let info = BufferInfo::new(
            0,
            self.frame_size,
            presentation_time_ns / 1_000,
            BufferFlags::NONE,
        );
        encoder.queue_input_frame(Frame::new(None, None, info))?;
        Ok(RenderStatus::Rendered)
    }

    fn release(&mut self) {
        self.probe.lock().release_calls += 1;
    }
}

// ============================================================================
// THUMBNAIL DECODER
// ============================================================================

/// Observable state of a [`MockThumbnailDecoder`]
#[derive(Debug, Default)]
pub struct DecoderProbe {
    /// Calls to `init`
    pub init_calls: usize,
    /// Decodes performed, in order
    pub decodes: Vec<(i64, SeekMode)>,
    /// Calls to `release`
    pub release_calls: usize,
    /// Whether `release` ran while a decode was in progress
    pub released_mid_decode: bool,
    decoding: bool,
}

/// Decoder producing tiny solid images
#[derive(Debug)]
pub struct MockThumbnailDecoder {
    probe: Arc<Mutex<DecoderProbe>>,
    key_frame_interval_us: i64,
    decode_delay: Option<Duration>,
    unavailable: HashSet<i64>,
    failing: HashSet<i64>,
    fail_init: bool,
}

impl MockThumbnailDecoder {
    /// Decoder with key frames every second
    pub fn new() -> Self {
        Self {
            probe: Arc::new(Mutex::new(DecoderProbe::default())),
            key_frame_interval_us: 1_000_000,
            decode_delay: None,
            unavailable: HashSet::new(),
            failing: HashSet::new(),
            fail_init: false,
        }
    }

    /// Sleep during each decode
    pub fn with_decode_delay(mut self, delay: Duration) -> Self {
        self.decode_delay = Some(delay);
        self
    }

    /// Key frame spacing used for approximate seeks
    pub fn with_key_frame_interval(mut self, interval_us: i64) -> Self {
        self.key_frame_interval_us = interval_us.max(1);
        self
    }

    /// Return no frame for this timestamp
    pub fn with_unavailable(mut self, timestamp_us: i64) -> Self {
        self.unavailable.insert(timestamp_us);
        self
    }

    /// Fail decoding at this timestamp
    pub fn with_failure_at(mut self, timestamp_us: i64) -> Self {
        self.failing.insert(timestamp_us);
        self
    }

    /// Fail `init`
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Shared probe
    pub fn probe(&self) -> Arc<Mutex<DecoderProbe>> {
        self.probe.clone()
    }
}

impl Default for MockThumbnailDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbnailDecoder for MockThumbnailDecoder {
    fn init(&mut self) -> TrackRecResult<()> {
        self.probe.lock().init_calls += 1;
        if self.fail_init {
            return Err(TrackRecError::Decode {
                timestamp_us: 0,
                reason: "mock source could not be opened".to_string(),
            });
        }
        Ok(())
    }

    fn decode_frame(
        &mut self,
        timestamp_us: i64,
        mode: SeekMode,
    ) -> TrackRecResult<Option<Thumbnail>> {
        {
            let mut probe = self.probe.lock();
            probe.decoding = true;
            probe.decodes.push((timestamp_us, mode));
        }
        if let Some(delay) = self.decode_delay {
            std::thread::sleep(delay);
        }
        self.probe.lock().decoding = false;

        if self.failing.contains(&timestamp_us) {
            return Err(TrackRecError::Decode {
                timestamp_us,
                reason: "corrupt frame".to_string(),
            });
        }
        if self.unavailable.contains(&timestamp_us) {
            return Ok(None);
        }

        let frame_time = match mode {
            SeekMode::Exact => timestamp_us,
            SeekMode::PreviousKeyFrame => {
                timestamp_us - timestamp_us.rem_euclid(self.key_frame_interval_us)
            }
        };
        Ok(Some(Thumbnail::new(
            frame_time,
            2,
            2,
            Bytes::from(vec![0xFF; 2 * 2 * 4]),
        )))
    }

    fn release(&mut self) {
        let mut probe = self.probe.lock();
        if probe.decoding {
            probe.released_mid_decode = true;
        }
        probe.release_calls += 1;
    }
}
