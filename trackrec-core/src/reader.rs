//! Frame sources
//!
//! Sources come in two shapes. Buffer readers are pulled synchronously by
//! the recorder; surface readers draw into a surface and may be driven
//! entirely by an external producer such as a camera, in which case
//! `draw_frame` does nothing.

use crate::error::TrackRecResult;
use crate::frame::{Frame, SurfaceHandle};

/// Lifecycle shared by every frame source
pub trait MediaTrackReader: Send {
    /// Acquire the source and begin producing frames
    fn start(&mut self) -> TrackRecResult<()>;

    /// Stop producing frames. Must be a no-op when already stopped
    fn stop(&mut self);
}

/// Pull-model source producing raw buffers
pub trait BufferTrackReader: MediaTrackReader {
    /// Read exactly one frame. Blocking behavior is source-defined; a frame
    /// with no buffer means nothing was available.
    fn read_next_frame(&mut self) -> TrackRecResult<Frame>;
}

/// Push-model source drawing into a surface
pub trait SurfaceTrackReader: MediaTrackReader {
    /// Draw the next frame into `surface`
    fn draw_frame(&mut self, surface: SurfaceHandle, presentation_time_ns: i64)
        -> TrackRecResult<()>;
}

/// A frame source tagged with its production model
pub enum TrackReader {
    /// Pull-model buffer source (e.g. microphone)
    Buffer(Box<dyn BufferTrackReader>),
    /// Push-model surface source (e.g. camera)
    Surface(Box<dyn SurfaceTrackReader>),
}

impl TrackReader {
    /// Wrap a buffer reader
    pub fn buffer(reader: impl BufferTrackReader + 'static) -> Self {
        TrackReader::Buffer(Box::new(reader))
    }

    /// Wrap a surface reader
    pub fn surface(reader: impl SurfaceTrackReader + 'static) -> Self {
        TrackReader::Surface(Box::new(reader))
    }

    /// Short description of the production model
    pub fn describe(&self) -> &'static str {
        match self {
            TrackReader::Buffer(_) => "buffer reader",
            TrackReader::Surface(_) => "surface reader",
        }
    }
}

impl std::fmt::Debug for TrackReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}
