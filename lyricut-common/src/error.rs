//! Common error types for lyricut

use thiserror::Error;

/// Common result type for lyricut operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the lyricut crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found (song audio, lyric sheet, ...)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input (empty waveform, unusable lyric sheet, bad phrase bounds)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Audio decoding or resampling error
    #[error("Audio error: {0}")]
    Audio(String),

    /// Cache read/write error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error marks a missing external resource rather than a
    /// processing failure. Used by batch code to distinguish "skip this song"
    /// diagnostics from genuine processing breakage.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = Error::Config("missing output directory".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: missing output directory"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound("song".into()).is_not_found());
        assert!(!Error::Internal("x".into()).is_not_found());
    }
}
