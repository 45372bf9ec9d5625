/*!
    Pixel formats and buffer layouts.
*/

use std::fmt;

/**
    Video pixel formats.

    This is the subset of formats decoders hand to the pipeline. Buffers are
    always tightly packed: planes follow each other without row padding.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 12bpp (most common video format)
    Yuv420p,
    /// Semi-planar YUV 4:2:0, 12bpp (common hardware decoder output)
    Nv12,
    /// Packed BGRA, 32bpp
    Bgra,
    /// Packed RGBA, 32bpp
    Rgba,
    /// Packed RGB, 24bpp
    Rgb24,
    /// Packed BGR, 24bpp
    Bgr24,
    /// Planar YUV 4:2:2, 16bpp
    Yuv422p,
    /// Planar YUV 4:4:4, 24bpp
    Yuv444p,
    /// Planar YUV 4:2:0, 10-bit samples stored in 16-bit words
    Yuv420p10,
}

impl PixelFormat {
    /**
        Storage bits per pixel, averaged over all planes.
    */
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Yuv420p | Self::Nv12 => 12,
            Self::Yuv422p => 16,
            Self::Rgb24 | Self::Bgr24 | Self::Yuv444p | Self::Yuv420p10 => 24,
            Self::Bgra | Self::Rgba => 32,
        }
    }

    /**
        Returns true if this is a planar (or semi-planar) format.
    */
    pub const fn is_planar(self) -> bool {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p | Self::Yuv420p10 | Self::Nv12 => true,
            Self::Bgra | Self::Rgba | Self::Rgb24 | Self::Bgr24 => false,
        }
    }

    /**
        Returns true if every sample is stored in a single byte.
    */
    pub const fn is_8bit(self) -> bool {
        !matches!(self, Self::Yuv420p10)
    }

    /**
        Bytes per pixel for packed formats, None for planar ones.
    */
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        if self.is_planar() {
            None
        } else {
            Some(self.bits_per_pixel() as usize / 8)
        }
    }

    /**
        Size in bytes of a tightly packed buffer for a frame of this format.

        Chroma planes of subsampled formats round odd dimensions up.
    */
    pub const fn buffer_size(self, width: u32, height: u32) -> usize {
        let w = width as usize;
        let h = height as usize;
        let cw = w.div_ceil(2);
        let ch = h.div_ceil(2);
        match self {
            Self::Yuv420p | Self::Nv12 => w * h + 2 * cw * ch,
            Self::Yuv420p10 => 2 * (w * h + 2 * cw * ch),
            Self::Yuv422p => w * h + 2 * cw * h,
            Self::Yuv444p => 3 * w * h,
            Self::Rgb24 | Self::Bgr24 => 3 * w * h,
            Self::Bgra | Self::Rgba => 4 * w * h,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Yuv420p => "yuv420p",
            Self::Nv12 => "nv12",
            Self::Bgra => "bgra",
            Self::Rgba => "rgba",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
            Self::Yuv420p10 => "yuv420p10",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_formats_have_bytes_per_pixel() {
        assert_eq!(PixelFormat::Rgb24.bytes_per_pixel(), Some(3));
        assert_eq!(PixelFormat::Bgra.bytes_per_pixel(), Some(4));
        assert_eq!(PixelFormat::Yuv420p.bytes_per_pixel(), None);
        assert_eq!(PixelFormat::Nv12.bytes_per_pixel(), None);
    }

    #[test]
    fn buffer_size_for_even_dimensions() {
        assert_eq!(PixelFormat::Yuv420p.buffer_size(4, 4), 16 + 2 * 4);
        assert_eq!(PixelFormat::Yuv422p.buffer_size(4, 4), 16 + 2 * 8);
        assert_eq!(PixelFormat::Rgb24.buffer_size(4, 4), 48);
        assert_eq!(PixelFormat::Rgba.buffer_size(4, 4), 64);
    }

    #[test]
    fn buffer_size_rounds_chroma_up() {
        // 3x3 luma, 2x2 chroma planes
        assert_eq!(PixelFormat::Yuv420p.buffer_size(3, 3), 9 + 2 * 4);
        assert_eq!(PixelFormat::Yuv420p10.buffer_size(3, 3), 2 * (9 + 2 * 4));
    }

    #[test]
    fn bits_per_pixel_counts_storage() {
        assert_eq!(PixelFormat::Nv12.bits_per_pixel(), 12);
        assert_eq!(PixelFormat::Yuv420p10.bits_per_pixel(), 24);
        assert_eq!(PixelFormat::Bgra.bits_per_pixel(), 32);
    }

    #[test]
    fn ten_bit_is_not_8bit() {
        assert!(!PixelFormat::Yuv420p10.is_8bit());
        assert!(PixelFormat::Yuv420p.is_8bit());
        assert!(PixelFormat::Bgr24.is_8bit());
    }

    #[test]
    fn display_uses_ffmpeg_names() {
        assert_eq!(PixelFormat::Yuv420p.to_string(), "yuv420p");
        assert_eq!(PixelFormat::Bgr24.to_string(), "bgr24");
    }
}
