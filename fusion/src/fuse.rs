/*!
    The fusion capability and the built-in fusers.
*/

use ffmpeg_types::{PixelFormat, VideoFrame};

use crate::{FrameSet, FusionError};

/**
    Combines one frame from each input stream into a single frame.

    Called only from the fusion worker thread, once per complete set, in set
    order. Implementations report every failure (too few matches, degenerate
    geometry, mismatched inputs) as a [`FusionError`]; the worker discards
    the set and continues.
*/
pub trait Fuser: Send {
    fn fuse(&mut self, inputs: &FrameSet) -> Result<VideoFrame, FusionError>;
}

impl<F> Fuser for F
where
    F: FnMut(&FrameSet) -> Result<VideoFrame, FusionError> + Send,
{
    fn fuse(&mut self, inputs: &FrameSet) -> Result<VideoFrame, FusionError> {
        self(inputs)
    }
}

/**
    Check that every input has the first input's size and format and a
    buffer of the right length. Returns the first input.
*/
fn check_uniform(inputs: &FrameSet) -> Result<&VideoFrame, FusionError> {
    let mut frames = inputs.frames();
    let first = frames.next().ok_or(FusionError::InputCount {
        expected: 2,
        found: 0,
    })?;
    check_buffer(first)?;
    for frame in frames {
        if frame.format != first.format {
            return Err(FusionError::FormatMismatch {
                expected: first.format,
                found: frame.format,
            });
        }
        if frame.dimensions() != first.dimensions() {
            return Err(FusionError::SizeMismatch {
                expected: first.dimensions(),
                found: frame.dimensions(),
            });
        }
        check_buffer(frame)?;
    }
    Ok(first)
}

fn check_buffer(frame: &VideoFrame) -> Result<(), FusionError> {
    if frame.data.len() != frame.expected_len() {
        return Err(FusionError::MalformedFrame(format!(
            "{}x{} {} needs {} bytes, got {}",
            frame.width,
            frame.height,
            frame.format,
            frame.expected_len(),
            frame.data.len()
        )));
    }
    Ok(())
}

/**
    Averages all inputs sample by sample.

    Inputs must share size and an 8-bit pixel format. The fused frame takes
    its timing from the first input.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct BlendFuser;

impl BlendFuser {
    pub fn new() -> Self {
        Self
    }
}

impl Fuser for BlendFuser {
    fn fuse(&mut self, inputs: &FrameSet) -> Result<VideoFrame, FusionError> {
        if inputs.len() < 2 {
            return Err(FusionError::InputCount {
                expected: 2,
                found: inputs.len(),
            });
        }
        let first = check_uniform(inputs)?;
        if !first.format.is_8bit() {
            return Err(FusionError::UnsupportedFormat(first.format));
        }

        let count = inputs.len() as u32;
        let mut sums = vec![0u32; first.data.len()];
        for frame in inputs.frames() {
            for (sum, &sample) in sums.iter_mut().zip(&frame.data) {
                *sum += u32::from(sample);
            }
        }
        let data = sums
            .into_iter()
            .map(|sum| ((sum + count / 2) / count) as u8)
            .collect();

        Ok(VideoFrame::new(
            data,
            first.width,
            first.height,
            first.format,
            first.pts,
            first.time_base,
        ))
    }
}

/**
    Stitches inputs side by side, in stream id order, into one wide frame.

    Works on packed RGB-family formats; inputs must share height and format.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct HStackFuser;

impl HStackFuser {
    pub fn new() -> Self {
        Self
    }
}

impl Fuser for HStackFuser {
    fn fuse(&mut self, inputs: &FrameSet) -> Result<VideoFrame, FusionError> {
        let mut frames = inputs.frames();
        let first = frames.next().ok_or(FusionError::InputCount {
            expected: 2,
            found: 0,
        })?;
        let format: PixelFormat = first.format;
        let bpp = format
            .bytes_per_pixel()
            .ok_or(FusionError::UnsupportedFormat(format))?;
        check_buffer(first)?;
        for frame in frames {
            if frame.format != format {
                return Err(FusionError::FormatMismatch {
                    expected: format,
                    found: frame.format,
                });
            }
            if frame.height != first.height {
                return Err(FusionError::SizeMismatch {
                    expected: first.dimensions(),
                    found: frame.dimensions(),
                });
            }
            check_buffer(frame)?;
        }

        let width: u32 = inputs.frames().map(|f| f.width).sum();
        let height = first.height;
        let row_len = width as usize * bpp;
        let mut data = Vec::with_capacity(row_len * height as usize);
        for row in 0..height as usize {
            for frame in inputs.frames() {
                let stride = frame.width as usize * bpp;
                data.extend_from_slice(&frame.data[row * stride..(row + 1) * stride]);
            }
        }

        Ok(VideoFrame::new(
            data,
            width,
            height,
            format,
            first.pts,
            first.time_base,
        ))
    }
}
