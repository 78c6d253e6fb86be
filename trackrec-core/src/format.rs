//! Media format descriptors
//!
//! A [`MediaFormat`] describes what a track is encoded as. The recorder
//! only interprets the MIME type; every other field is passed through to
//! the encoder and the multiplex target untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Bits per pixel used to derive a default video bitrate
pub const VIDEO_BITS_PER_PIXEL: f32 = 0.25;

/// Top-level media kind derived from a MIME type prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    /// `video/*`
    Video,
    /// `audio/*`
    Audio,
}

impl MediaKind {
    /// Resolve the media kind from a MIME type, `None` when unresolvable
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        if mime_type.starts_with("video/") {
            Some(MediaKind::Video)
        } else if mime_type.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Track format description
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaFormat {
    /// MIME type, e.g. `video/avc` or `audio/mp4a-latm`
    pub mime_type: String,
    /// Frame width in pixels (video)
    pub width: Option<u32>,
    /// Frame height in pixels (video)
    pub height: Option<u32>,
    /// Frames per second (video)
    pub frame_rate: Option<u32>,
    /// Seconds between key frames (video)
    pub key_frame_interval: Option<u32>,
    /// Sample rate in Hz (audio)
    pub sample_rate: Option<u32>,
    /// Channel count (audio)
    pub channel_count: Option<u32>,
    /// Target bitrate in bits per second
    pub bit_rate: Option<u32>,
    /// Codec-specific keys not covered above
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl MediaFormat {
    /// Create a format with only a MIME type set
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            ..Default::default()
        }
    }

    /// Create a video format
    pub fn video(mime_type: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::new(mime_type)
        }
    }

    /// Create an audio format
    pub fn audio(mime_type: impl Into<String>, sample_rate: u32, channel_count: u32) -> Self {
        Self {
            sample_rate: Some(sample_rate),
            channel_count: Some(channel_count),
            ..Self::new(mime_type)
        }
    }

    /// Set the bitrate
    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = Some(bit_rate);
        self
    }

    /// Set the frame rate
    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    /// Set the key frame interval in seconds
    pub fn with_key_frame_interval(mut self, seconds: u32) -> Self {
        self.key_frame_interval = Some(seconds);
        self
    }

    /// Set a codec-specific key
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Media kind of this format, `None` for anything but audio or video
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime(&self.mime_type)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime_type)?;
        if let (Some(w), Some(h)) = (self.width, self.height) {
            write!(f, " {}x{}", w, h)?;
        }
        if let Some(rate) = self.sample_rate {
            write!(f, " {}Hz", rate)?;
        }
        if let Some(channels) = self.channel_count {
            write!(f, " {}ch", channels)?;
        }
        if let Some(bit_rate) = self.bit_rate {
            write!(f, " {}bps", bit_rate)?;
        }
        Ok(())
    }
}

/// Default video bitrate for the given dimensions and frame rate
pub fn video_bitrate(width: u32, height: u32, frame_rate: u32) -> u32 {
    (VIDEO_BITS_PER_PIXEL * frame_rate as f32 * width as f32 * height as f32) as u32
}

/// Uncompressed PCM bitrate for 16-bit samples
pub fn audio_bitrate(sample_rate: u32, channel_count: u32) -> u32 {
    sample_rate * 2 * channel_count * 8
}
