//! Frame and buffer metadata types

use bytes::Bytes;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Buffer flags carried with every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferFlags(u32);

impl BufferFlags {
    /// No flags set
    pub const NONE: Self = Self(0);
    /// Buffer contains a key frame
    pub const KEY_FRAME: Self = Self(1);
    /// Buffer contains codec configuration data, not media samples
    pub const CODEC_CONFIG: Self = Self(2);
    /// Last buffer of the stream
    pub const END_OF_STREAM: Self = Self(4);

    /// Raw flag bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every flag in `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the end-of-stream flag is set
    pub const fn is_end_of_stream(self) -> bool {
        self.contains(Self::END_OF_STREAM)
    }

    /// Whether the codec-config flag is set
    pub const fn is_codec_config(self) -> bool {
        self.contains(Self::CODEC_CONFIG)
    }

    /// Whether the key-frame flag is set
    pub const fn is_key_frame(self) -> bool {
        self.contains(Self::KEY_FRAME)
    }
}

impl BitOr for BufferFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BufferFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Buffer metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferInfo {
    /// Offset of valid data in the buffer
    pub offset: usize,
    /// Size of valid data in bytes
    pub size: usize,
    /// Presentation timestamp in microseconds
    pub presentation_time_us: i64,
    /// Buffer flags
    pub flags: BufferFlags,
}

impl BufferInfo {
    /// Create buffer metadata
    pub fn new(offset: usize, size: usize, presentation_time_us: i64, flags: BufferFlags) -> Self {
        Self {
            offset,
            size,
            presentation_time_us,
            flags,
        }
    }

    /// Presentation timestamp in nanoseconds
    pub fn presentation_time_ns(&self) -> i64 {
        self.presentation_time_us.saturating_mul(1_000)
    }
}

/// A buffer travelling through the pipeline
///
/// `tag` is the codec buffer index the frame was dequeued with. The holder
/// must hand the index back to the codec exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Codec buffer index, `None` for frames not owned by a codec
    pub tag: Option<usize>,
    /// Raw data, `None` for surface-backed frames
    pub buffer: Option<Bytes>,
    /// Buffer metadata
    pub info: BufferInfo,
}

impl Frame {
    /// Create a frame
    pub fn new(tag: Option<usize>, buffer: Option<Bytes>, info: BufferInfo) -> Self {
        Self { tag, buffer, info }
    }

    /// Frame with no data, used by sources that have nothing to deliver
    pub fn empty() -> Self {
        Self {
            tag: None,
            buffer: None,
            info: BufferInfo::default(),
        }
    }

    /// Valid bytes of the buffer as described by the metadata
    pub fn data(&self) -> Option<Bytes> {
        let buffer = self.buffer.as_ref()?;
        let start = self.info.offset.min(buffer.len());
        let end = start.saturating_add(self.info.size).min(buffer.len());
        Some(buffer.slice(start..end))
    }

    /// Whether this frame terminates the stream
    pub fn is_end_of_stream(&self) -> bool {
        self.info.flags.is_end_of_stream()
    }
}

/// Opaque handle to a platform drawing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

impl fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Outcome of polling a codec for output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDequeue {
    /// An output buffer is ready at this index
    Buffer(usize),
    /// Nothing available right now
    TryAgainLater,
    /// The output format changed; read it before the next buffer
    FormatChanged,
    /// Any other codec status code
    Unrecognized(i32),
}

impl OutputDequeue {
    /// Raw status code for sentinel outcomes
    pub const TRY_AGAIN_LATER: i32 = -1;
    /// Raw status code for a format change
    pub const FORMAT_CHANGED: i32 = -2;

    /// Map a raw dequeue code: non-negative values are buffer indices
    pub fn from_code(code: i32) -> Self {
        match code {
            c if c >= 0 => OutputDequeue::Buffer(c as usize),
            Self::TRY_AGAIN_LATER => OutputDequeue::TryAgainLater,
            Self::FORMAT_CHANGED => OutputDequeue::FormatChanged,
            other => OutputDequeue::Unrecognized(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_flags() {
        let flags = BufferFlags::KEY_FRAME | BufferFlags::END_OF_STREAM;
        assert!(flags.is_key_frame());
        assert!(flags.is_end_of_stream());
        assert!(!flags.is_codec_config());
        assert_eq!(flags.bits(), 5);

        let mut flags = BufferFlags::NONE;
        flags |= BufferFlags::CODEC_CONFIG;
        assert!(flags.is_codec_config());
    }

    #[test]
    fn test_frame_data_respects_offset_and_size() {
        let frame = Frame::new(
            Some(0),
            Some(Bytes::from_static(b"xxpayloadyy")),
            BufferInfo::new(2, 7, 0, BufferFlags::NONE),
        );
        assert_eq!(frame.data().unwrap(), Bytes::from_static(b"payload"));

        // size past the end is clamped
        let frame = Frame::new(
            None,
            Some(Bytes::from_static(b"abc")),
            BufferInfo::new(1, 10, 0, BufferFlags::NONE),
        );
        assert_eq!(frame.data().unwrap(), Bytes::from_static(b"bc"));
        assert!(Frame::empty().data().is_none());
    }

    #[test]
    fn test_output_dequeue_codes() {
        assert_eq!(OutputDequeue::from_code(3), OutputDequeue::Buffer(3));
        assert_eq!(OutputDequeue::from_code(-1), OutputDequeue::TryAgainLater);
        assert_eq!(OutputDequeue::from_code(-2), OutputDequeue::FormatChanged);
        assert_eq!(OutputDequeue::from_code(-3), OutputDequeue::Unrecognized(-3));
    }

    #[test]
    fn test_presentation_time_ns() {
        let info = BufferInfo::new(0, 0, 1_500, BufferFlags::NONE);
        assert_eq!(info.presentation_time_ns(), 1_500_000);
    }
}
