/*!
    Frame sources: the producer side of the per-stream queues.
*/

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ffmpeg_types::VideoFrame;

use crate::worker::panic_message;
use crate::{PipelineError, PipelineState, PushOutcome, StreamId, StreamQueues};

/**
    Produces decoded frames for one stream, in presentation order.

    Each call performs one decode step. The runner checks the pipeline state
    between calls, so a stop is observed within one step.
*/
pub trait FrameSource: Send {
    /**
        Decode the next frame. `Ok(None)` means the stream has ended.
    */
    fn next_frame(&mut self) -> ffmpeg_types::Result<Option<VideoFrame>>;
}

impl<I> FrameSource for I
where
    I: Iterator<Item = VideoFrame> + Send,
{
    fn next_frame(&mut self) -> ffmpeg_types::Result<Option<VideoFrame>> {
        Ok(self.next())
    }
}

/**
    How a source thread finished.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceExit {
    /// The source ran out of frames.
    EndOfStream { frames: u64 },
    /// The pipeline stopped first.
    Stopped { frames: u64 },
    /// Decoding failed or a frame was rejected.
    Failed { frames: u64, error: String },
    /// The source thread panicked.
    Panicked(String),
}

impl SourceExit {
    /// Frames delivered to the queue before the exit.
    pub fn frames(&self) -> u64 {
        match self {
            Self::EndOfStream { frames }
            | Self::Stopped { frames }
            | Self::Failed { frames, .. } => *frames,
            Self::Panicked(_) => 0,
        }
    }
}

/**
    Run `source` on its own thread, feeding stream `id`.

    The stream is closed when the thread exits for any reason, so the worker
    never waits on a stream whose producer is gone.
*/
pub(crate) fn spawn_source(
    id: StreamId,
    mut source: Box<dyn FrameSource>,
    queues: Arc<StreamQueues>,
    state: PipelineState,
) -> Result<JoinHandle<SourceExit>, PipelineError> {
    let name = format!("source-{}", id.0);
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let exit = panic::catch_unwind(AssertUnwindSafe(|| {
                pump(id, source.as_mut(), &queues, &state)
            }))
            .unwrap_or_else(|payload| SourceExit::Panicked(panic_message(payload.as_ref())));
            if let Err(e) = queues.close_stream(id) {
                log::error!("stream {id}: failed to close: {e}");
            }
            match &exit {
                SourceExit::Failed { error, .. } => {
                    log::error!("stream {id}: source failed: {error}")
                }
                SourceExit::Panicked(message) => {
                    log::error!("stream {id}: source panicked: {message}")
                }
                other => log::info!("stream {id}: source finished ({other:?})"),
            }
            exit
        })
        .map_err(|e| PipelineError::Spawn {
            thread: name,
            message: e.to_string(),
        })
}

fn pump(
    id: StreamId,
    source: &mut dyn FrameSource,
    queues: &StreamQueues,
    state: &PipelineState,
) -> SourceExit {
    let mut frames = 0;
    loop {
        if !state.is_running() {
            return SourceExit::Stopped { frames };
        }
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return SourceExit::EndOfStream { frames },
            Err(e) if e.is_eof() => return SourceExit::EndOfStream { frames },
            Err(e) => {
                return SourceExit::Failed {
                    frames,
                    error: e.to_string(),
                };
            }
        };
        match queues.push(id, frame) {
            Ok(_) => frames += 1,
            Err(PipelineError::Stopped) => return SourceExit::Stopped { frames },
            Err(e) => {
                return SourceExit::Failed {
                    frames,
                    error: e.to_string(),
                };
            }
        }
    }
}

/**
    Push-style producer handle for decoders that run their own loop.

    The decoder calls [`FrameProducer::on_frame_decoded`] once per decoded
    frame from its own thread. Finishing or dropping the handle closes the
    stream.
*/
pub struct FrameProducer {
    id: StreamId,
    queues: Arc<StreamQueues>,
    state: PipelineState,
    finished: bool,
}

impl FrameProducer {
    pub(crate) fn new(id: StreamId, queues: Arc<StreamQueues>, state: PipelineState) -> Self {
        Self {
            id,
            queues,
            state,
            finished: false,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.id
    }

    /// Whether the decoder should keep producing.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /**
        Hand a decoded frame to the pipeline.
    */
    pub fn on_frame_decoded(&self, frame: VideoFrame) -> Result<PushOutcome, PipelineError> {
        self.queues.push(self.id, frame)
    }

    /**
        Signal the end of this stream.
    */
    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(e) = self.queues.close_stream(self.id) {
            log::error!("stream {}: failed to close: {e}", self.id);
        }
    }
}

impl Drop for FrameProducer {
    fn drop(&mut self) {
        self.close();
    }
}

static_assertions::assert_impl_all!(FrameProducer: Send, Sync);
