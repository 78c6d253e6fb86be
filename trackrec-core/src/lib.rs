//! # trackrec core
//!
//! Shared building blocks for the track recording pipeline: media formats,
//! frames and buffer metadata, the capability traits implemented by
//! external codecs, frame sources, renderers and multiplex targets, and
//! the error type used across the workspace.
//!
//! The [`mock`] module provides in-memory implementations of every
//! capability trait for tests and demos.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod format;
pub mod frame;
pub mod mock;
pub mod reader;
pub mod render;
pub mod target;

pub use codec::{Encoder, SeekMode, Thumbnail, ThumbnailDecoder};
pub use error::{TrackRecError, TrackRecResult};
pub use format::{audio_bitrate, video_bitrate, MediaFormat, MediaKind, VIDEO_BITS_PER_PIXEL};
pub use frame::{BufferFlags, BufferInfo, Frame, OutputDequeue, SurfaceHandle};
pub use reader::{BufferTrackReader, MediaTrackReader, SurfaceTrackReader, TrackReader};
pub use render::{RenderStatus, Renderer, TrackRenderer};
pub use target::{MediaTarget, MediaTargetHandle};
