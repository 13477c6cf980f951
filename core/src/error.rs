use thiserror::Error;

/// Reasons a byte buffer cannot be decoded as a WAV stream.
///
/// `Display` and [`FormatError::reason`] both yield the short
/// machine-readable reason string.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    #[error("truncated header")]
    TruncatedHeader,

    #[error("unsupported channel count")]
    UnsupportedChannelCount,

    #[error("data chunk not found")]
    DataChunkNotFound,

    #[error("data size exceeds buffer")]
    DataSizeExceedsBuffer,

    #[error("unsupported bit depth")]
    UnsupportedBitDepth,

    #[error("misaligned sample data")]
    MisalignedSampleData,
}

impl FormatError {
    pub fn reason(&self) -> &'static str {
        match self {
            FormatError::TruncatedHeader => "truncated header",
            FormatError::UnsupportedChannelCount => "unsupported channel count",
            FormatError::DataChunkNotFound => "data chunk not found",
            FormatError::DataSizeExceedsBuffer => "data size exceeds buffer",
            FormatError::UnsupportedBitDepth => "unsupported bit depth",
            FormatError::MisalignedSampleData => "misaligned sample data",
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Playback error: {0}")]
    Playback(String),
}

pub type Result<T> = std::result::Result<T, Error>;
