use std::path::Path;

use ffmpeg_decode::{VideoDecoderConfig, VideoFileDecoder};
use ffmpeg_types::{Result, VideoFrame};
use fusion::FrameSource;

/**
    Media file input, decoded and scaled to RGB24.
*/
pub struct FileSource {
    decoder: VideoFileDecoder,
}

impl FileSource {
    pub fn open(path: &Path, width: u32, height: u32) -> Result<Self> {
        let decoder = VideoFileDecoder::open(path, VideoDecoderConfig::to_rgb24(width, height))?;
        if let Some(rate) = decoder.frame_rate() {
            log::info!("{}: {:.2} fps", path.display(), rate.to_f64());
        }
        Ok(Self { decoder })
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        self.decoder.next_frame()
    }
}
