/*!
    Error types for the fusion pipeline.
*/

use ffmpeg_types::PixelFormat;
use thiserror::Error;

use crate::StreamId;

/**
    Structural errors: contract violations by the caller of the pipeline.

    These are surfaced to the caller of the failing operation and never
    swallowed by the pipeline itself.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A push or pop referenced a stream that was never registered.
    #[error("unknown stream {0}")]
    UnknownStream(StreamId),
    /// A stream id was registered twice.
    #[error("stream {0} is already registered")]
    DuplicateStream(StreamId),
    /// A stream already has a source or producer attached.
    #[error("stream {0} already has a producer")]
    StreamClaimed(StreamId),
    /// A frame was pushed after its stream was closed.
    #[error("stream {0} is closed")]
    StreamClosed(StreamId),
    /// A frame without pixels was pushed.
    #[error("invalid frame for stream {stream}: {reason}")]
    InvalidFrame { stream: StreamId, reason: String },
    /// A pipeline needs at least two streams to fuse.
    #[error("fusion needs at least 2 streams, got {0}")]
    TooFewStreams(usize),
    /// An operation over a set of streams was given an empty set.
    #[error("no streams given")]
    NoStreams,
    /// The pipeline was built without a fuser.
    #[error("no fuser configured")]
    MissingFuser,
    /// The pipeline configuration failed validation.
    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),
    /// The pipeline is stopping, so the operation was abandoned.
    #[error("pipeline is stopping")]
    Stopped,
    /// A pipeline thread could not be spawned.
    #[error("failed to spawn {thread} thread: {message}")]
    Spawn { thread: String, message: String },
}

/**
    Recoverable, per-set failures reported by a fuser.

    The worker discards the frames of a failed set, counts the failure and
    moves on to the next set.
*/
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FusionError {
    /// Input frames differ in size.
    #[error("frame sizes do not match: expected {expected:?}, found {found:?}")]
    SizeMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
    /// Input frames differ in pixel format.
    #[error("pixel formats do not match: expected {expected}, found {found}")]
    FormatMismatch {
        expected: PixelFormat,
        found: PixelFormat,
    },
    /// The fuser cannot operate on this pixel format.
    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(PixelFormat),
    /// A frame buffer does not match its declared size and format.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    /// The fuser needs a different number of inputs.
    #[error("expected {expected} input frames, got {found}")]
    InputCount { expected: usize, found: usize },
    /// Too few matched features to align the inputs.
    #[error("insufficient matches: found {found}, need {required}")]
    InsufficientMatches { found: usize, required: usize },
    /// The estimated transform is degenerate.
    #[error("degenerate homography")]
    DegenerateHomography,
    /// The fuser panicked; the panic was contained in the worker.
    #[error("fuser panicked: {0}")]
    Panicked(String),
    /// Any other fuser-specific failure.
    #[error("{0}")]
    Other(String),
}

/**
    Errors loading or validating a pipeline configuration.
*/
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_error_names_the_stream() {
        assert_eq!(
            PipelineError::UnknownStream(StreamId(7)).to_string(),
            "unknown stream #7"
        );
        assert_eq!(
            PipelineError::TooFewStreams(1).to_string(),
            "fusion needs at least 2 streams, got 1"
        );
    }

    #[test]
    fn fusion_error_display() {
        let e = FusionError::SizeMismatch {
            expected: (640, 360),
            found: (320, 180),
        };
        assert_eq!(
            e.to_string(),
            "frame sizes do not match: expected (640, 360), found (320, 180)"
        );
        assert_eq!(
            FusionError::UnsupportedFormat(PixelFormat::Nv12).to_string(),
            "unsupported pixel format nv12"
        );
    }
}
