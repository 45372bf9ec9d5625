/*!
    The assembled pipeline: sources, queues, worker and output.
*/

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::presenter::{Pacing, PresentSummary, Presenter, present_loop};
use crate::source::{FrameProducer, FrameSource, SourceExit, spawn_source};
use crate::worker::{WorkerContext, panic_message};
use crate::{
    Fuser, FusionWorker, OutputQueue, PipelineConfig, PipelineError, PipelineState,
    PipelineStats, StatsSnapshot, StopReason, StreamId, StreamQueues, WorkerExit, WorkerState,
};

/**
    Builder for a [`FusionPipeline`].

    ```no_run
    use fusion::{BlendFuser, FusionPipeline, StreamId};

    let pipeline = FusionPipeline::builder()
        .streams([StreamId(0), StreamId(1)])
        .fuser(BlendFuser)
        .build()?;
    # Ok::<(), fusion::PipelineError>(())
    ```
*/
#[derive(Default)]
pub struct FusionPipelineBuilder {
    streams: Vec<StreamId>,
    fuser: Option<Box<dyn Fuser>>,
    config: PipelineConfig,
    state: Option<PipelineState>,
}

impl FusionPipelineBuilder {
    pub fn stream(mut self, id: impl Into<StreamId>) -> Self {
        self.streams.push(id.into());
        self
    }

    pub fn streams(mut self, ids: impl IntoIterator<Item = StreamId>) -> Self {
        self.streams.extend(ids);
        self
    }

    pub fn fuser(mut self, fuser: impl Fuser + 'static) -> Self {
        self.fuser = Some(Box::new(fuser));
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /**
        Share an existing state handle, for example one that a signal
        handler already holds.
    */
    pub fn state(mut self, state: PipelineState) -> Self {
        self.state = Some(state);
        self
    }

    /**
        Validate the setup and start the fusion worker.
    */
    pub fn build(self) -> Result<FusionPipeline, PipelineError> {
        let mut seen = BTreeSet::new();
        for id in &self.streams {
            if !seen.insert(*id) {
                return Err(PipelineError::DuplicateStream(*id));
            }
        }
        if self.streams.len() < 2 {
            return Err(PipelineError::TooFewStreams(self.streams.len()));
        }
        let fuser = self.fuser.ok_or(PipelineError::MissingFuser)?;
        self.config
            .validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;

        let state = self.state.unwrap_or_default();
        if !state.is_running() {
            return Err(PipelineError::Stopped);
        }
        let streams: Vec<StreamId> = seen.into_iter().collect();
        let queues =
            StreamQueues::with_streams(streams.iter().copied(), self.config.overflow, state.clone())?;
        let output = Arc::new(OutputQueue::new());
        let stats = Arc::new(PipelineStats::new());

        let worker = FusionWorker::spawn(
            WorkerContext {
                queues: Arc::clone(&queues),
                output: Arc::clone(&output),
                stats: Arc::clone(&stats),
                state: state.clone(),
                streams: streams.clone(),
                drain_on_stop: self.config.drain_on_stop,
            },
            fuser,
        )?;

        log::info!(
            "pipeline started with {} streams, {:?}",
            streams.len(),
            self.config.overflow
        );
        Ok(FusionPipeline {
            state,
            queues,
            output,
            stats,
            streams,
            claimed: BTreeSet::new(),
            sources: Vec::new(),
            worker,
            report: None,
        })
    }
}

/**
    What was left behind when a pipeline finished.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    /// How each source thread exited, in the order they were added.
    pub sources: Vec<(StreamId, SourceExit)>,
    /// How the worker exited. `None` only if it was joined earlier.
    pub worker: Option<WorkerExit>,
    /// Fused frames dropped without being presented.
    pub discarded_outputs: usize,
    /// Queued input frames that never became part of a set.
    pub discarded_inputs: usize,
    pub stats: StatsSnapshot,
}

/**
    A running fusion pipeline.

    Frames enter through sources added with [`FusionPipeline::add_source`]
    or through [`FrameProducer`] handles, and leave through
    [`FusionPipeline::output`]. Dropping the pipeline shuts it down.
*/
pub struct FusionPipeline {
    state: PipelineState,
    queues: Arc<StreamQueues>,
    output: Arc<OutputQueue>,
    stats: Arc<PipelineStats>,
    streams: Vec<StreamId>,
    claimed: BTreeSet<StreamId>,
    sources: Vec<(StreamId, JoinHandle<SourceExit>)>,
    worker: FusionWorker,
    report: Option<ShutdownReport>,
}

impl FusionPipeline {
    pub fn builder() -> FusionPipelineBuilder {
        FusionPipelineBuilder::default()
    }

    fn claim(&mut self, id: StreamId) -> Result<(), PipelineError> {
        if !self.streams.contains(&id) {
            return Err(PipelineError::UnknownStream(id));
        }
        if !self.state.is_running() {
            return Err(PipelineError::Stopped);
        }
        if !self.claimed.insert(id) {
            return Err(PipelineError::StreamClaimed(id));
        }
        Ok(())
    }

    /**
        Start a thread that feeds stream `id` from `source`.
    */
    pub fn add_source(
        &mut self,
        id: StreamId,
        source: impl FrameSource + 'static,
    ) -> Result<(), PipelineError> {
        self.claim(id)?;
        let handle = spawn_source(
            id,
            Box::new(source),
            Arc::clone(&self.queues),
            self.state.clone(),
        )?;
        self.sources.push((id, handle));
        Ok(())
    }

    /**
        Get a push handle for stream `id`, for decoders that run on a thread
        of their own.
    */
    pub fn producer(&mut self, id: StreamId) -> Result<FrameProducer, PipelineError> {
        self.claim(id)?;
        Ok(FrameProducer::new(
            id,
            Arc::clone(&self.queues),
            self.state.clone(),
        ))
    }

    pub fn output(&self) -> Arc<OutputQueue> {
        Arc::clone(&self.output)
    }

    pub fn state(&self) -> PipelineState {
        self.state.clone()
    }

    pub fn stream_ids(&self) -> &[StreamId] {
        &self.streams
    }

    /**
        Ask every pipeline thread to stop. Returns immediately.
    */
    pub fn stop(&self) {
        if self.state.request_stop(StopReason::Requested) {
            log::info!("pipeline stop requested");
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot::capture(&self.stats, self.queues.stream_stats())
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    /**
        Run [`present_loop`] on the calling thread against this pipeline's
        output.
    */
    pub fn present(&self, pacing: Pacing, presenter: &mut impl Presenter) -> PresentSummary {
        present_loop(&self.output, &self.state, &self.stats, pacing, presenter)
    }

    /**
        Wait for the pipeline to end on its own, once an input runs out.

        Fused frames stay in the output queue for the presenter. Blocks for
        as long as every stream keeps producing.
    */
    pub fn join(&mut self) -> ShutdownReport {
        self.finish(false)
    }

    /**
        Stop the pipeline and release everything it holds.

        Sources are joined first, then the worker. Leftover fused and input
        frames are discarded. Calling this again returns the same report.
    */
    pub fn shutdown(&mut self) -> ShutdownReport {
        self.stop();
        self.finish(true)
    }

    fn finish(&mut self, discard_output: bool) -> ShutdownReport {
        if let Some(report) = &mut self.report {
            if discard_output {
                report.discarded_outputs += self.output.discard();
            }
            return report.clone();
        }

        let mut sources = Vec::with_capacity(self.sources.len());
        for (id, handle) in self.sources.drain(..) {
            let exit = handle
                .join()
                .unwrap_or_else(|payload| SourceExit::Panicked(panic_message(payload.as_ref())));
            sources.push((id, exit));
        }
        let worker = self.worker.join();

        let discarded_outputs = if discard_output {
            self.output.discard()
        } else {
            0
        };
        let discarded_inputs = self.queues.clear();
        self.state.mark_stopped();

        let report = ShutdownReport {
            sources,
            worker,
            discarded_outputs,
            discarded_inputs,
            stats: self.stats(),
        };
        log::info!(
            "pipeline stopped: {} fused, {} failed, {} inputs and {} outputs discarded",
            report.stats.fused,
            report.stats.failed,
            discarded_inputs,
            discarded_outputs
        );
        self.report = Some(report.clone());
        report
    }
}

impl Drop for FusionPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

static_assertions::assert_impl_all!(FusionPipeline: Send);
