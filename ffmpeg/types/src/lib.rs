/*!
    Frame vocabulary for the fusion pipeline crates.

    This crate defines the types that cross crate boundaries: the decoded
    frames that sources hand to the pipeline and that fusers produce. It has
    no dependency on FFmpeg, so the pipeline core and its tests can use it
    without pulling in FFmpeg bindings.

    # Core Types

    - [`VideoFrame`] - Decoded, tightly packed raster image with timing
    - [`PixelFormat`] - Pixel layouts and their buffer sizes
    - [`Pts`] - Timestamps in time_base units
    - [`Rational`] - Time bases and frame rates

    # Error Handling

    - [`Error`] and [`Result`] - Errors raised while producing frames
*/

mod error;
mod format;
mod frame;
mod rational;
mod timestamp;

pub use error::{Error, Result};
pub use format::PixelFormat;
pub use frame::VideoFrame;
pub use rational::Rational;
pub use timestamp::Pts;
