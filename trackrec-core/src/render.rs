//! Frame renderers
//!
//! A renderer turns a raw frame into encoder input: a GL renderer draws
//! from its input surface onto the encoder's input surface, a software
//! renderer copies bytes into encoder input buffers.

use crate::codec::Encoder;
use crate::error::TrackRecResult;
use crate::format::MediaFormat;
use crate::frame::{Frame, SurfaceHandle};

/// What happened to a frame handed to [`Renderer::render_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// The frame reached the encoder's input side
    Rendered,
    /// The encoder had no free input buffer; the frame was not consumed and
    /// must be offered again
    InputBusy,
}

/// Renderer between a frame source and an encoder
pub trait Renderer: Send {
    /// Prepare for rendering. `input_surface` is a surface shared with an
    /// external producer, `output_surface` the encoder's input surface.
    fn init(
        &mut self,
        input_surface: Option<SurfaceHandle>,
        output_surface: Option<SurfaceHandle>,
        target_format: &MediaFormat,
    ) -> TrackRecResult<()>;

    /// Surface frame sources draw into, available after `init`
    fn input_surface(&self) -> Option<SurfaceHandle> {
        None
    }

    /// Render one frame and feed the result to the encoder's input side.
    /// Surface renderers receive `None` and consume their input surface.
    fn render_frame(
        &mut self,
        frame: Option<&Frame>,
        presentation_time_ns: i64,
        encoder: &mut dyn Encoder,
    ) -> TrackRecResult<RenderStatus>;

    /// Release rendering resources. Must be a no-op when already released
    fn release(&mut self);
}

/// A renderer tagged with the input it accepts
pub enum TrackRenderer {
    /// Consumes frames from a GL surface
    Surface(Box<dyn Renderer>),
    /// Consumes raw byte buffers
    Buffer(Box<dyn Renderer>),
}

impl TrackRenderer {
    /// Wrap a surface-input renderer
    pub fn surface(renderer: impl Renderer + 'static) -> Self {
        TrackRenderer::Surface(Box::new(renderer))
    }

    /// Wrap a buffer-input renderer
    pub fn buffer(renderer: impl Renderer + 'static) -> Self {
        TrackRenderer::Buffer(Box::new(renderer))
    }

    /// Short description of the accepted input
    pub fn describe(&self) -> &'static str {
        match self {
            TrackRenderer::Surface(_) => "surface renderer",
            TrackRenderer::Buffer(_) => "buffer renderer",
        }
    }

    /// Unwrap the renderer regardless of its input type
    pub fn into_inner(self) -> Box<dyn Renderer> {
        match self {
            TrackRenderer::Surface(renderer) | TrackRenderer::Buffer(renderer) => renderer,
        }
    }
}

impl std::fmt::Debug for TrackRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}
