/*!
    The fusion worker thread.
*/

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};

use ffmpeg_types::VideoFrame;

use crate::queue::WaitOutcome;
use crate::{
    FrameSet, FusedFrame, Fuser, FusionError, OutputQueue, PipelineError, PipelineState,
    PipelineStats, StopReason, StreamId, StreamQueues,
};

/**
    What the worker is doing right now.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    WaitingForFrames,
    Fusing,
    Publishing,
    /// Stopping, but complete sets may still be fused.
    Draining,
    Stopped,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::WaitingForFrames,
            1 => Self::Fusing,
            2 => Self::Publishing,
            3 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/**
    Why the worker loop ended.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// The pipeline was stopped.
    Stopped,
    /// The stream ended with an empty queue, so no set can be completed.
    Exhausted(StreamId),
    /// The worker hit a structural error or panicked.
    Failed(String),
}

/**
    Everything the worker thread shares with the rest of the pipeline.
*/
pub(crate) struct WorkerContext {
    pub queues: Arc<StreamQueues>,
    pub output: Arc<OutputQueue>,
    pub stats: Arc<PipelineStats>,
    pub state: PipelineState,
    pub streams: Vec<StreamId>,
    pub drain_on_stop: bool,
}

/**
    Handle to the thread that pairs and fuses frames.
*/
pub struct FusionWorker {
    handle: Option<JoinHandle<WorkerExit>>,
    status: Arc<AtomicU8>,
}

impl FusionWorker {
    pub(crate) fn spawn(
        ctx: WorkerContext,
        fuser: Box<dyn Fuser>,
    ) -> Result<Self, PipelineError> {
        let status = Arc::new(AtomicU8::new(WorkerState::WaitingForFrames as u8));
        let thread_status = Arc::clone(&status);
        let handle = thread::Builder::new()
            .name("fusion-worker".to_string())
            .spawn(move || run(ctx, fuser, &thread_status))
            .map_err(|e| PipelineError::Spawn {
                thread: "fusion-worker".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            handle: Some(handle),
            status,
        })
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /**
        Wait for the worker thread to exit.

        Returns None if it was already joined.
    */
    pub(crate) fn join(&mut self) -> Option<WorkerExit> {
        let handle = self.handle.take()?;
        Some(handle.join().unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            log::error!("fusion worker panicked: {message}");
            self.status
                .store(WorkerState::Stopped as u8, Ordering::Release);
            WorkerExit::Failed(message)
        }))
    }
}

fn run(ctx: WorkerContext, mut fuser: Box<dyn Fuser>, status: &AtomicU8) -> WorkerExit {
    let set_status = |s: WorkerState| status.store(s as u8, Ordering::Release);
    log::info!(
        "fusion worker started for streams {:?}",
        ctx.streams.iter().map(|s| s.0).collect::<Vec<_>>()
    );

    let mut sequence: u64 = 0;
    let exit = loop {
        set_status(if ctx.state.is_running() {
            WorkerState::WaitingForFrames
        } else {
            WorkerState::Draining
        });

        let set = match ctx.queues.wait_pop_all(&ctx.streams, ctx.drain_on_stop) {
            Ok(WaitOutcome::Ready(set)) => set,
            Ok(WaitOutcome::Stopped) => break WorkerExit::Stopped,
            Ok(WaitOutcome::Exhausted(id)) => {
                log::info!("stream {id} ended, no further sets can be completed");
                break WorkerExit::Exhausted(id);
            }
            Err(e) => {
                log::error!("fusion worker cannot wait for frames: {e}");
                break WorkerExit::Failed(e.to_string());
            }
        };

        let index = sequence;
        sequence += 1;

        set_status(WorkerState::Fusing);
        match fuse_contained(fuser.as_mut(), &set) {
            Ok(frame) => {
                set_status(WorkerState::Publishing);
                log::trace!("fused set {index}");
                ctx.output
                    .push(FusedFrame::new(index, frame, set.source_pts()));
                ctx.stats.record_fused();
            }
            Err(e) => {
                ctx.stats.record_failed();
                log::warn!("dropping set {index}: {e}");
            }
        }
        // Input frames of the set are released here.
    };

    set_status(WorkerState::Stopped);
    ctx.output.close();
    let reason = match exit {
        WorkerExit::Stopped => StopReason::Requested,
        _ => StopReason::EndOfStream,
    };
    ctx.state.request_stop(reason);
    log::info!(
        "fusion worker exited ({exit:?}): {} fused, {} failed",
        ctx.stats.fused(),
        ctx.stats.failed()
    );
    exit
}

/**
    Run the fuser, turning a panic into a per-set error.
*/
fn fuse_contained(fuser: &mut dyn Fuser, set: &FrameSet) -> Result<VideoFrame, FusionError> {
    panic::catch_unwind(AssertUnwindSafe(|| fuser.fuse(set)))
        .unwrap_or_else(|payload| Err(FusionError::Panicked(panic_message(payload.as_ref()))))
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use ffmpeg_types::{PixelFormat, Pts, Rational};
    use pretty_assertions::assert_eq;

    use crate::OverflowPolicy;

    const S0: StreamId = StreamId(0);
    const S1: StreamId = StreamId(1);

    fn frame(pts: i64) -> VideoFrame {
        VideoFrame::new(
            vec![0u8; 3],
            1,
            1,
            PixelFormat::Rgb24,
            Some(Pts(pts)),
            Rational::new(1, 1000),
        )
    }

    struct Harness {
        queues: Arc<StreamQueues>,
        output: Arc<OutputQueue>,
        stats: Arc<PipelineStats>,
        state: PipelineState,
        worker: FusionWorker,
    }

    fn harness(fuser: impl Fuser + 'static) -> Harness {
        let state = PipelineState::new();
        let queues =
            StreamQueues::with_streams([S0, S1], OverflowPolicy::Unbounded, state.clone()).unwrap();
        let output = Arc::new(OutputQueue::new());
        let stats = Arc::new(PipelineStats::new());
        let worker = FusionWorker::spawn(
            WorkerContext {
                queues: Arc::clone(&queues),
                output: Arc::clone(&output),
                stats: Arc::clone(&stats),
                state: state.clone(),
                streams: vec![S0, S1],
                drain_on_stop: true,
            },
            Box::new(fuser),
        )
        .unwrap();
        Harness {
            queues,
            output,
            stats,
            state,
            worker,
        }
    }

    fn first_input(set: &FrameSet) -> Result<VideoFrame, FusionError> {
        set.frames()
            .next()
            .cloned()
            .ok_or(FusionError::Other("empty set".into()))
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn fuses_sets_and_publishes_in_order() {
        let mut h = harness(first_input);
        for i in 0..3 {
            h.queues.push(S0, frame(i)).unwrap();
            h.queues.push(S1, frame(100 + i)).unwrap();
        }
        wait_until(|| h.output.len() == 3);

        let fused: Vec<_> = std::iter::from_fn(|| h.output.try_pop()).collect();
        assert_eq!(
            fused.iter().map(|f| f.sequence).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(fused[2].source_pts(S1), Some(Pts(102)));

        h.state.request_stop(StopReason::Requested);
        assert_eq!(h.worker.join(), Some(WorkerExit::Stopped));
        assert_eq!(h.worker.state(), WorkerState::Stopped);
        assert!(h.output.is_closed());
    }

    #[test]
    fn panicking_fuser_only_loses_its_set() {
        let mut calls = 0;
        let mut h = harness(move |set: &FrameSet| {
            calls += 1;
            if calls == 1 {
                panic!("bad homography");
            }
            first_input(set)
        });
        for i in 0..2 {
            h.queues.push(S0, frame(i)).unwrap();
            h.queues.push(S1, frame(i)).unwrap();
        }
        wait_until(|| h.stats.fused() + h.stats.failed() == 2);

        assert_eq!(h.stats.failed(), 1);
        assert_eq!(h.output.try_pop().map(|f| f.sequence), Some(1));

        h.state.request_stop(StopReason::Requested);
        assert_eq!(h.worker.join(), Some(WorkerExit::Stopped));
    }

    #[test]
    fn exhausted_stream_ends_the_worker() {
        let mut h = harness(first_input);
        h.queues.push(S0, frame(0)).unwrap();
        h.queues.push(S0, frame(1)).unwrap();
        h.queues.push(S1, frame(0)).unwrap();
        h.queues.close_stream(S1).unwrap();

        assert_eq!(h.worker.join(), Some(WorkerExit::Exhausted(S1)));
        assert_eq!(h.output.len(), 1);
        assert_eq!(h.state.stop_reason(), Some(StopReason::EndOfStream));
    }

    #[test]
    fn stop_unblocks_a_waiting_worker() {
        let mut h = harness(first_input);
        h.queues.push(S0, frame(0)).unwrap();
        wait_until(|| h.worker.state() == WorkerState::WaitingForFrames);
        thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        h.state.request_stop(StopReason::Requested);
        assert_eq!(h.worker.join(), Some(WorkerExit::Stopped));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(h.worker.is_finished());
    }
}
