/*!
    Decoder configuration types.
*/

use ffmpeg_types::{Error, PixelFormat, Result};

/**
    Configuration for video file decoding.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoDecoderConfig {
    /// Pixel format of decoded frames. Must be a packed format.
    pub output_format: PixelFormat,
    /// Output width (None = keep the source width).
    pub width: Option<u32>,
    /// Output height (None = keep the source height).
    pub height: Option<u32>,
}

impl VideoDecoderConfig {
    /**
        Create a config that outputs RGB24 at the source size.
    */
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Create a config that outputs RGB24 scaled to `width` x `height`.
    */
    pub fn to_rgb24(width: u32, height: u32) -> Self {
        Self {
            output_format: PixelFormat::Rgb24,
            width: Some(width),
            height: Some(height),
        }
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.output_format = format;
        self
    }

    /**
        Resolve the output size for a source of `src_width` x `src_height`.
    */
    pub fn output_size(&self, src_width: u32, src_height: u32) -> (u32, u32) {
        (
            self.width.unwrap_or(src_width),
            self.height.unwrap_or(src_height),
        )
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.output_format.bytes_per_pixel().is_none() {
            return Err(Error::unsupported_format(format!(
                "decoder output must be a packed format, got {}",
                self.output_format
            )));
        }
        if self.width == Some(0) || self.height == Some(0) {
            return Err(Error::invalid_data("decoder output size must be non-zero"));
        }
        Ok(())
    }
}

impl Default for VideoDecoderConfig {
    fn default() -> Self {
        Self {
            output_format: PixelFormat::Rgb24,
            width: None,
            height: None,
        }
    }
}
