//! Error types for Sizzle.

use thiserror::Error;

/// Result type alias using Sizzle's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Sizzle.
#[derive(Error, Debug)]
pub enum Error {
    // Decode errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    #[error("Truncated container: {0}")]
    TruncatedContainer(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    // Transport errors
    #[error("No decoded audio loaded")]
    NoData,

    #[error("Audio backend error: {0}")]
    Backend(String),

    // Generic errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Returns true if this error was produced while decoding a container.
    pub const fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::InvalidContainer(_)
                | Self::TruncatedContainer(_)
                | Self::UnsupportedFormat(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_classification() {
        assert!(Error::InvalidContainer("bad magic".into()).is_decode_error());
        assert!(Error::UnsupportedFormat("12-bit".into()).is_decode_error());
        assert!(Error::Io(std::io::Error::other("gone")).is_decode_error());
        assert!(!Error::NoData.is_decode_error());
        assert!(!Error::Backend("no device".into()).is_decode_error());
    }

    #[test]
    fn test_error_display() {
        let err = Error::UnsupportedFormat("12 bits per sample".into());
        assert_eq!(
            err.to_string(),
            "Unsupported audio format: 12 bits per sample"
        );
        assert_eq!(Error::NoData.to_string(), "No decoded audio loaded");
    }
}
