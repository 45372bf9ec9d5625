/*!
    Terminal presenter: counts fused frames and optionally writes them out
    as PNG files.
*/

use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use ffmpeg_types::{PixelFormat, VideoFrame};
use fusion::{FusedFrame, Presenter};
use image::{RgbImage, RgbaImage};

pub struct FrameSink {
    output_dir: Option<PathBuf>,
    max_frames: Option<u64>,
    shown: u64,
    error: Option<anyhow::Error>,
}

impl FrameSink {
    pub fn new(output_dir: Option<PathBuf>, max_frames: Option<u64>) -> anyhow::Result<Self> {
        if let Some(dir) = &output_dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(Self {
            output_dir,
            max_frames,
            shown: 0,
            error: None,
        })
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }

    /**
        The write error that ended presentation, if any.
    */
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error.take()
    }
}

impl Presenter for FrameSink {
    fn present(&mut self, fused: FusedFrame) -> ControlFlow<()> {
        self.shown += 1;
        log::debug!(
            "frame {} ({}x{}) at {:?} from {:?}",
            fused.sequence,
            fused.frame.width,
            fused.frame.height,
            fused.frame.presentation_time().unwrap_or_default(),
            fused.sources
        );

        if let Some(dir) = &self.output_dir {
            let path = dir.join(format!("fused-{:06}.png", fused.sequence));
            if let Err(e) = save_png(&fused.frame, &path) {
                self.error = Some(e);
                return ControlFlow::Break(());
            }
        }

        match self.max_frames {
            Some(max) if self.shown >= max => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }
}

/**
    Write a packed RGB-family frame as PNG.
*/
pub fn save_png(frame: &VideoFrame, path: &Path) -> anyhow::Result<()> {
    let (width, height) = frame.dimensions();
    let saved = match frame.format {
        PixelFormat::Rgb24 => RgbImage::from_raw(width, height, frame.data.clone())
            .context("frame buffer does not match its size")?
            .save(path),
        PixelFormat::Bgr24 => RgbImage::from_raw(width, height, swap_red_blue(&frame.data, 3))
            .context("frame buffer does not match its size")?
            .save(path),
        PixelFormat::Rgba => RgbaImage::from_raw(width, height, frame.data.clone())
            .context("frame buffer does not match its size")?
            .save(path),
        PixelFormat::Bgra => RgbaImage::from_raw(width, height, swap_red_blue(&frame.data, 4))
            .context("frame buffer does not match its size")?
            .save(path),
        other => bail!("cannot write {other} frames as PNG"),
    };
    saved.with_context(|| format!("failed to write {}", path.display()))
}

fn swap_red_blue(data: &[u8], bpp: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    for px in out.chunks_exact_mut(bpp) {
        px.swap(0, 2);
    }
    out
}
