/*!
    Video file decoder implementation.
*/

use std::path::Path;

use ffmpeg_next::{
    codec::{self, decoder::Video as VideoDecoderFFmpeg},
    ffi,
    format::{self, Pixel, context::Input},
    media::Type,
    software::scaling::{self, flag::Flags},
    util::frame::video::Video as VideoFrameFFmpeg,
};

use ffmpeg_types::{Error, PixelFormat, Pts, Rational, Result, VideoFrame};

use crate::config::VideoDecoderConfig;

/**
    Decoder for the best video stream of a media file.

    Frames come out in decode order, converted to the configured pixel
    format and size.
*/
pub struct VideoFileDecoder {
    input: Input,
    decoder: VideoDecoderFFmpeg,
    stream_index: usize,
    time_base: Rational,
    frame_rate: Option<Rational>,
    config: VideoDecoderConfig,
    scaler: Option<Scaler>,
    decoded: VideoFrameFFmpeg,
    flushed: bool,
    finished: bool,
}

/**
    Scaling context together with the input shape it was built for.
*/
struct Scaler {
    context: scaling::Context,
    src: (Pixel, u32, u32),
}

impl VideoFileDecoder {
    /**
        Open `path` and prepare a decoder for its best video stream.
    */
    pub fn open(path: impl AsRef<Path>, config: VideoDecoderConfig) -> Result<Self> {
        config.validate()?;
        ffmpeg_next::init().map_err(|e| Error::codec(e.to_string()))?;

        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }

        let input = format::input(&path).map_err(|e| Error::codec(e.to_string()))?;
        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| Error::invalid_data(format!("{} has no video stream", path.display())))?;

        let stream_index = stream.index();
        let time_base = rational_from_ffmpeg(stream.time_base());
        let frame_rate = Some(rational_from_ffmpeg(stream.avg_frame_rate()))
            .filter(|rate| rate.num > 0 && rate.den > 0);

        let decoder_ctx = codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| Error::codec(e.to_string()))?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| Error::codec(e.to_string()))?;

        log::info!(
            "opened {}: stream {stream_index}, {}x{}, time base {time_base}",
            path.display(),
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            input,
            decoder,
            stream_index,
            time_base,
            frame_rate,
            config,
            scaler: None,
            decoded: VideoFrameFFmpeg::empty(),
            flushed: false,
            finished: false,
        })
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /**
        Average frame rate of the stream, if the container reports one.
    */
    pub fn frame_rate(&self) -> Option<Rational> {
        self.frame_rate
    }

    /**
        Size of the frames this decoder will produce.
    */
    pub fn output_size(&self) -> (u32, u32) {
        self.config
            .output_size(self.decoder.width(), self.decoder.height())
    }

    /**
        Decode the next frame.

        Returns `Ok(None)` once the file is exhausted and the codec drained.
    */
    pub fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            if self.receive()? {
                let frame = self.convert()?;
                return Ok(Some(frame));
            }
            if self.flushed {
                self.finished = true;
                return Ok(None);
            }
            self.feed()?;
        }
    }

    /**
        Try to take one decoded frame out of the codec.
    */
    fn receive(&mut self) -> Result<bool> {
        match self.decoder.receive_frame(&mut self.decoded) {
            Ok(()) => Ok(true),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::AVERROR(ffi::EAGAIN) => {
                Ok(false)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(false),
            Err(e) => Err(Error::codec(e.to_string())),
        }
    }

    /**
        Read packets until one of our stream is sent to the codec, or send
        end of stream once the file is exhausted.
    */
    fn feed(&mut self) -> Result<()> {
        let mut packet = ffmpeg_next::Packet::empty();
        loop {
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    return self
                        .decoder
                        .send_packet(&packet)
                        .map_err(|e| Error::codec(e.to_string()));
                }
                Err(ffmpeg_next::Error::Eof) => {
                    log::debug!("end of file, flushing decoder");
                    self.flushed = true;
                    return self
                        .decoder
                        .send_eof()
                        .map_err(|e| Error::codec(e.to_string()));
                }
                Err(e) => return Err(Error::codec(e.to_string())),
            }
        }
    }

    /**
        Scale the current decoded frame into the output format.
    */
    fn convert(&mut self) -> Result<VideoFrame> {
        let src = (
            self.decoded.format(),
            self.decoded.width(),
            self.decoded.height(),
        );
        let (width, height) = self.config.output_size(src.1, src.2);
        let output_format = self.config.output_format;
        let dst_pixel = pixel_to_ffmpeg(output_format)?;

        // Input shape can change mid-stream; rebuild the scaler when it does.
        if self.scaler.as_ref().is_none_or(|s| s.src != src) {
            let context =
                scaling::Context::get(src.0, src.1, src.2, dst_pixel, width, height, Flags::BILINEAR)
                    .map_err(|e| Error::codec(e.to_string()))?;
            self.scaler = Some(Scaler { context, src });
        }
        let Some(scaler) = self.scaler.as_mut() else {
            return Err(Error::codec("scaler not initialized"));
        };

        let mut scaled = VideoFrameFFmpeg::empty();
        scaler
            .context
            .run(&self.decoded, &mut scaled)
            .map_err(|e| Error::codec(e.to_string()))?;

        let data = copy_packed_rows(&scaled, output_format, width, height)?;
        let pts = self.decoded.timestamp().or(self.decoded.pts()).map(Pts);

        Ok(VideoFrame::new(
            data,
            width,
            height,
            output_format,
            pts,
            self.time_base,
        ))
    }
}

/**
    Copy a packed frame into a tightly packed buffer, dropping row padding.
*/
fn copy_packed_rows(
    frame: &VideoFrameFFmpeg,
    format: PixelFormat,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let bpp = format
        .bytes_per_pixel()
        .ok_or_else(|| Error::unsupported_format(format!("{format} is not packed")))?;
    if width == 0 || height == 0 {
        return Err(Error::invalid_data("scaled frame has no pixels"));
    }
    let row_len = width as usize * bpp;
    let stride = frame.stride(0);
    let plane = frame.data(0);
    if stride < row_len || plane.len() < stride * (height as usize - 1) + row_len {
        return Err(Error::invalid_data(format!(
            "scaled plane too small: stride {stride}, {} bytes",
            plane.len()
        )));
    }

    let mut data = Vec::with_capacity(row_len * height as usize);
    for row in plane.chunks(stride).take(height as usize) {
        data.extend_from_slice(&row[..row_len]);
    }
    Ok(data)
}

fn rational_from_ffmpeg(r: ffmpeg_next::Rational) -> Rational {
    if r.denominator() == 0 {
        return Rational::new(0, 1);
    }
    Rational::new(r.numerator(), r.denominator())
}

fn pixel_to_ffmpeg(format: PixelFormat) -> Result<Pixel> {
    Ok(match format {
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Nv12 => Pixel::NV12,
        PixelFormat::Bgra => Pixel::BGRA,
        PixelFormat::Rgba => Pixel::RGBA,
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Bgr24 => Pixel::BGR24,
        PixelFormat::Yuv422p => Pixel::YUV422P,
        PixelFormat::Yuv444p => Pixel::YUV444P,
        PixelFormat::Yuv420p10 => Pixel::YUV420P10LE,
        other => {
            return Err(Error::unsupported_format(format!(
                "no ffmpeg pixel format for {other}"
            )));
        }
    })
}

impl std::fmt::Debug for VideoFileDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFileDecoder")
            .field("stream_index", &self.stream_index)
            .field("time_base", &self.time_base)
            .field("config", &self.config)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

// SAFETY: the decoder, demuxer and scaler are only ever used from the thread
// that currently owns this value.
unsafe impl Send for VideoFileDecoder {}
