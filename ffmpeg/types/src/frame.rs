/*!
    Decoded frame type.
*/

use std::time::Duration;

use crate::{PixelFormat, Pts, Rational};

/**
    One raster image moving through the pipeline.

    Pixels are tightly packed: rows have no padding and planes follow each
    other. A frame has one owner at a time; it is moved from source to queue
    to fuser and never shared.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// None when the producer has no timing for this frame.
    pub pts: Option<Pts>,
    /// Unit of `pts`.
    pub time_base: Rational,
}

impl VideoFrame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        pts: Option<Pts>,
        time_base: Rational,
    ) -> Self {
        Self {
            data,
            width,
            height,
            format,
            pts,
            time_base,
        }
    }

    /// Offset from the start of the stream, if the frame is timed.
    pub fn presentation_time(&self) -> Option<Duration> {
        self.pts.map(|pts| pts.to_duration(self.time_base))
    }

    /**
        Buffer length that `width`, `height` and `format` call for. A frame
        whose `data` differs from this is malformed.
    */
    pub fn expected_len(&self) -> usize {
        self.format.buffer_size(self.width, self.height)
    }

    /// A frame with a zero dimension or no bytes carries no image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

static_assertions::assert_impl_all!(VideoFrame: Send, Sync);
