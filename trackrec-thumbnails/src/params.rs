//! Extraction request parameters

use serde::{Deserialize, Serialize};
use trackrec_core::{SeekMode, ThumbnailDecoder};

/// How precisely frames are located
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractionMode {
    /// Nearest preceding key frame
    #[default]
    Fast,
    /// The exact frame at each timestamp
    Exact,
    /// A fast pass over every timestamp, then an exact refinement pass.
    /// Each index is delivered twice.
    TwoPass,
}

impl ExtractionMode {
    /// Decoder seek modes in the order their passes run
    pub fn passes(self) -> &'static [SeekMode] {
        match self {
            ExtractionMode::Fast => &[SeekMode::PreviousKeyFrame],
            ExtractionMode::Exact => &[SeekMode::Exact],
            ExtractionMode::TwoPass => &[SeekMode::PreviousKeyFrame, SeekMode::Exact],
        }
    }
}

/// One extraction request. The request owns its decoder, which is released
/// by the extraction worker once decoding ends.
pub struct ThumbnailExtractParameters {
    /// Timestamps to extract, in delivery index order
    pub timestamps_us: Vec<i64>,
    /// Seek precision
    pub mode: ExtractionMode,
    /// Decoder for the source
    pub decoder: Box<dyn ThumbnailDecoder>,
}

impl ThumbnailExtractParameters {
    /// Fast extraction of `timestamps_us`
    pub fn new(timestamps_us: Vec<i64>, decoder: impl ThumbnailDecoder + 'static) -> Self {
        Self {
            timestamps_us,
            mode: ExtractionMode::Fast,
            decoder: Box::new(decoder),
        }
    }

    /// Set the extraction mode
    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }
}

impl std::fmt::Debug for ThumbnailExtractParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailExtractParameters")
            .field("timestamps_us", &self.timestamps_us)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_pass_refines_after_fast_pass() {
        assert_eq!(
            ExtractionMode::TwoPass.passes(),
            &[SeekMode::PreviousKeyFrame, SeekMode::Exact]
        );
        assert_eq!(ExtractionMode::default(), ExtractionMode::Fast);
    }
}
