/*!
    Video file decoding for the fusion pipeline.

    Opens a media file, decodes its best video stream and converts every
    frame to one packed pixel format and size, ready for fusion.

    # Example

    ```ignore
    use ffmpeg_decode::{VideoFileDecoder, VideoDecoderConfig};

    let config = VideoDecoderConfig::to_rgb24(640, 360);
    let mut decoder = VideoFileDecoder::open("left.mp4", config)?;

    while let Some(frame) = decoder.next_frame()? {
        // frame.data holds 640x360 RGB24 pixels
    }
    ```

    Decoding is pull-based: each call to `next_frame` reads packets until
    the codec yields a frame, and flushes the codec once the file ends.
*/

pub use ffmpeg_types::{Error, PixelFormat, Result, VideoFrame};

mod config;
mod video;

pub use config::VideoDecoderConfig;
pub use video::VideoFileDecoder;
