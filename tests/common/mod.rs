mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from cardigits for tests
pub use cardigits::detection::CharacterRecognizer;
pub use cardigits::{
    BoundingBox, ClassifyConfig, DigitResult, GlyphTile, PipelineConfig, Polarity,
    RecognitionError, RegionSpec, SegmentConfig,
};
