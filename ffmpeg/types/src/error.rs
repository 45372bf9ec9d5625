/*!
    Errors raised while producing frames.
*/

use thiserror::Error;

/**
    Error type for frame producers (decoders, synthetic sources).
*/
#[derive(Debug, Error)]
pub enum Error {
    /// The input could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Opening or running a decoder failed.
    #[error("codec error: {message}")]
    Codec { message: String },
    /// Malformed input or frame buffer.
    #[error("invalid data: {message}")]
    InvalidData { message: String },
    /// Valid input this code cannot handle.
    #[error("unsupported format: {message}")]
    UnsupportedFormat { message: String },
    /// No more frames.
    #[error("end of stream")]
    Eof,
}

impl Error {
    /// A decoder could not be opened or rejected its input.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Input or a frame buffer is malformed.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Input is valid but uses a layout this code does not handle.
    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            message: message.into(),
        }
    }

    /**
        Sources treat this like a clean end of stream instead of a failure.
    */
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}

/**
    Result type alias for frame producers.
*/
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn display_includes_message() {
        assert_eq!(
            Error::codec("no decoder for h265").to_string(),
            "codec error: no decoder for h265"
        );
        assert_eq!(
            Error::invalid_data("short buffer").to_string(),
            "invalid data: short buffer"
        );
        assert_eq!(Error::Eof.to_string(), "end of stream");
    }

    #[test]
    fn io_errors_keep_their_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.mp4");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.source().is_some());
        assert!(e.to_string().contains("missing.mp4"));
    }

    #[test]
    fn only_eof_is_eof() {
        assert!(Error::Eof.is_eof());
        assert!(!Error::unsupported_format("yuv410p").is_eof());
    }
}
