pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;

pub use config::{ClassifyConfig, PipelineConfig, RectifyConfig, SegmentConfig, TileSource};
pub use error::{ExtractError, RecognitionError, Result};
pub use models::{BoundingBox, DigitResult, GlyphTile, Polarity, Quadrilateral, RegionSpec};
pub use pipeline::{DebugConfig, Pipeline, PipelineOutput, RegionOutput, RegionStatus, RunSummary};
