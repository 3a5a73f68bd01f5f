use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("No color chart found: {0}")]
    ChartNotFound(String),

    #[error("File access failed: {0}")]
    FileAccess(String),

    #[error("Patch mask has no pixels for channel {channel}")]
    EmptyPatchStatistics { channel: usize },

    #[error("No black reference region found in raw frame")]
    NoBlackReference,

    #[error("Failed to decode raw image: {0}")]
    DecodeError(String),

    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Regression failed: {0}")]
    Regression(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CalibrationError {
    pub fn file_access(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        CalibrationError::FileAccess(format!("{}: {}", path.display(), err))
    }
}

pub type Result<T> = std::result::Result<T, CalibrationError>;
