use thiserror::Error;

/// Errors that abort a pipeline run (or a single region of it).
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no four-cornered card boundary found after {attempts} approximation attempts")]
    BoundaryNotFound { attempts: usize },

    #[error(
        "region (top={top}, bottom={bottom}, left={left}, right={right}) is empty for a {width}x{height} image"
    )]
    InvalidRegion {
        top: f64,
        bottom: f64,
        left: f64,
        right: f64,
        width: u32,
        height: u32,
    },

    #[error("input image has zero width or height")]
    EmptyImage,

    #[error("card corners are degenerate; no perspective transform exists")]
    DegenerateQuadrilateral,

    #[error("OCR engine error: {0}")]
    Ocr(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

/// Failure of a single character-recognition call.
///
/// Never escapes the classifier: each one becomes an unresolved digit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    #[error("recognizer returned no text")]
    NoText,

    #[error("recognizer returned non-digit text {0:?}")]
    NotADigit(String),

    #[error("recognition is disabled")]
    Disabled,

    #[error("recognizer failed: {0}")]
    Engine(String),
}
