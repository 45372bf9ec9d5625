/*!
    Synthetic frame source for running without media files.
*/

use std::thread;
use std::time::Duration;

use ffmpeg_types::{PixelFormat, Pts, Rational, Result, VideoFrame};
use fusion::FrameSource;

/**
    Moving RGB gradient. Each stream gets its own blue level so fused output
    shows which inputs contributed.

    Frames are produced at roughly the configured rate, like a live decoder.
*/
pub struct TestPatternSource {
    width: u32,
    height: u32,
    frames: u64,
    next: u64,
    seed: u8,
    interval: Duration,
    time_base: Rational,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32, frames: u64, seed: u8) -> Self {
        Self {
            width,
            height,
            frames,
            next: 0,
            seed,
            interval: Duration::ZERO,
            time_base: Rational::new(1, 30),
        }
    }

    /**
        Sleep for one frame interval between frames.
    */
    pub fn with_rate(mut self, fps: f64) -> Self {
        if fps.is_finite() && fps > 0.0 {
            self.interval = Duration::from_secs_f64(1.0 / fps);
            self.time_base = Rational::new(1, (fps.round() as i32).max(1));
        }
        self
    }

    fn render(&self, index: u64) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = (index * 4) as usize;
        let mut data = Vec::with_capacity(PixelFormat::Rgb24.buffer_size(self.width, self.height));
        for y in 0..h {
            let g = (y * 255 / h.max(1)) as u8;
            for x in 0..w {
                let r = ((x + shift) * 255 / w.max(1)) as u8;
                data.extend_from_slice(&[r, g, self.seed]);
            }
        }
        data
    }
}

impl FrameSource for TestPatternSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if self.next >= self.frames {
            return Ok(None);
        }
        if self.next > 0 && !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
        let index = self.next;
        self.next += 1;

        Ok(Some(VideoFrame::new(
            self.render(index),
            self.width,
            self.height,
            PixelFormat::Rgb24,
            Some(Pts(index as i64)),
            self.time_base,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn produces_the_requested_frames() {
        let mut source = TestPatternSource::new(8, 4, 3, 200);
        let mut pts = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.dimensions(), (8, 4));
            assert_eq!(frame.data.len(), frame.expected_len());
            assert_eq!(frame.data[2], 200);
            pts.push(frame.pts);
        }
        assert_eq!(pts, vec![Some(Pts(0)), Some(Pts(1)), Some(Pts(2))]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn gradient_moves_between_frames() {
        let mut source = TestPatternSource::new(16, 2, 2, 0);
        let first = source.next_frame().unwrap().unwrap();
        let second = source.next_frame().unwrap().unwrap();
        assert_ne!(first.data, second.data);
    }
}
