/*!
    Multi-stream frame fusion.

    Decoded frames from two or more input streams are queued per stream,
    paired positionally by a single worker thread (the i-th frame of every
    stream forms the i-th set), fused into one frame and published to an
    output queue that a paced presenter consumes.

    ```text
    FrameSource(i) -> StreamQueues[i] -> FusionWorker -> OutputQueue -> Presenter
    ```

    # Pipeline

    - [`FusionPipeline`] and [`FusionPipelineBuilder`] - Wires everything together
    - [`PipelineState`] - Shared lifecycle flag with [`StopReason`]
    - [`PipelineConfig`] and [`OverflowPolicy`] - Queue bounds and drain behavior

    # Stages

    - [`FrameSource`] and [`FrameProducer`] - Feed decoded frames into a stream
    - [`StreamQueues`] and [`FrameSet`] - Per-stream queues and all-or-nothing pops
    - [`Fuser`], [`BlendFuser`] and [`HStackFuser`] - Turn a set into one frame
    - [`FusionWorker`] - The thread that pairs and fuses
    - [`OutputQueue`] and [`FusedFrame`] - Fused results
    - [`Presenter`] and [`present_loop`] - Paced consumption

    # Error Handling

    Per-set fusion failures ([`FusionError`]) are logged, counted and
    skipped. Contract violations such as unknown streams or pushes after
    close are a [`PipelineError`] returned to the caller.
*/

mod config;
mod error;
mod fuse;
mod output;
mod pipeline;
mod presenter;
mod queue;
mod source;
mod state;
mod stats;
mod stream;
mod worker;

pub use config::{DEFAULT_QUEUE_CAPACITY, OverflowPolicy, PipelineConfig};
pub use error::{ConfigError, FusionError, PipelineError};
pub use fuse::{BlendFuser, Fuser, HStackFuser};
pub use output::{FusedFrame, OutputQueue};
pub use pipeline::{FusionPipeline, FusionPipelineBuilder, ShutdownReport};
pub use presenter::{
    DEFAULT_FRAME_RATE, DEFAULT_IDLE_DELAY, FALLBACK_FRAME_INTERVAL, Pacing, PresentExit,
    PresentSummary, Presenter, present_loop,
};
pub use queue::{FrameSet, PushOutcome, StreamQueues, StreamStats};
pub use source::{FrameProducer, FrameSource, SourceExit};
pub use state::{Phase, PipelineState, StopReason};
pub use stats::{PipelineStats, StatsSnapshot};
pub use stream::StreamId;
pub use worker::{FusionWorker, WorkerExit, WorkerState};
