pub mod preprocessing;
pub mod geometry;
pub mod rectify;
pub mod region;
pub mod contours;
pub mod segment;
pub mod classify;
pub mod ocr;

pub use classify::classify_tiles;
pub use ocr::{CharacterRecognizer, DisabledRecognizer, OcrConfig, OcrsRecognizer};
pub use rectify::{Rectified, rectify};
pub use region::{extract_region, extract_regions};
pub use segment::{Segmentation, segment_glyphs};
