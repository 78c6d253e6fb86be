//! Codec capability interfaces
//!
//! Encoders and decoders are external collaborators (hardware codecs,
//! software libraries). The pipeline only drives them through these traits.
//! Dequeue calls follow a "try now, report not-ready" contract: with a zero
//! timeout they must return immediately.

use crate::error::TrackRecResult;
use crate::format::MediaFormat;
use crate::frame::{Frame, OutputDequeue, SurfaceHandle};
use bytes::Bytes;

/// Stateful encoder
pub trait Encoder: Send {
    /// Configure the encoder for the target format
    fn init(&mut self, format: &MediaFormat) -> TrackRecResult<()>;

    /// Surface the encoder reads input from, when it accepts surface input
    fn input_surface(&self) -> Option<SurfaceHandle> {
        None
    }

    /// Start the encoder
    fn start(&mut self) -> TrackRecResult<()>;

    /// Whether the encoder is started and not yet stopped
    fn is_running(&self) -> bool;

    /// Poll for a free input buffer index
    fn dequeue_input_frame(&mut self, timeout_us: i64) -> Option<usize>;

    /// Submit a filled input buffer; `frame.tag` must come from `dequeue_input_frame`
    fn queue_input_frame(&mut self, frame: Frame) -> TrackRecResult<()>;

    /// Tell a surface-fed encoder that no more input will arrive
    fn signal_end_of_input(&mut self) -> TrackRecResult<()>;

    /// Poll for encoded output
    fn dequeue_output_frame(&mut self, timeout_us: i64) -> OutputDequeue;

    /// Output frame for a buffer index returned by `dequeue_output_frame`
    fn get_output_frame(&mut self, tag: usize) -> Option<Frame>;

    /// Hand an output buffer back to the encoder
    fn release_output_frame(&mut self, tag: usize);

    /// Actual output format, valid after a `FormatChanged` dequeue
    fn output_format(&self) -> MediaFormat;

    /// Stop encoding. Must be a no-op when already stopped
    fn stop(&mut self);

    /// Release codec resources. Must be a no-op when already released
    fn release(&mut self);

    /// Name used in logs
    fn name(&self) -> &str {
        "encoder"
    }
}

/// How a decoder positions itself before producing a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekMode {
    /// Nearest preceding key frame; cheap but approximate
    PreviousKeyFrame,
    /// The frame at (or closest to) the requested timestamp
    Exact,
}

/// A decoded still image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    /// Presentation time of the decoded frame
    pub timestamp_us: i64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// RGBA pixel data
    pub data: Bytes,
}

impl Thumbnail {
    /// Create a thumbnail
    pub fn new(timestamp_us: i64, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            timestamp_us,
            width,
            height,
            data,
        }
    }
}

/// Frame decoder used for thumbnail extraction
pub trait ThumbnailDecoder: Send {
    /// Open the source and prepare for decoding
    fn init(&mut self) -> TrackRecResult<()>;

    /// Decode one frame near `timestamp_us`; `Ok(None)` when nothing is available there
    fn decode_frame(&mut self, timestamp_us: i64, mode: SeekMode)
        -> TrackRecResult<Option<Thumbnail>>;

    /// Release decoder resources. Must be a no-op when already released
    fn release(&mut self);
}
