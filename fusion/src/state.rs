/*!
    Pipeline lifecycle state shared by every pipeline thread.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const STOPPED: u8 = 2;

const REASON_NONE: u8 = 0;
const REASON_REQUESTED: u8 = 1;
const REASON_END_OF_STREAM: u8 = 2;

/**
    Lifecycle phase of a pipeline.

    Transitions are monotonic: `Running → Stopping → Stopped`.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Running,
    Stopping,
    Stopped,
}

/**
    Why a pipeline left the running phase.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Someone asked the pipeline to quit (user, presenter, drop).
    Requested,
    /// An input stream ran out, so no further sets can be fused.
    EndOfStream,
}

type StopListener = Box<dyn FnOnce() + Send>;

struct StateInner {
    phase: AtomicU8,
    reason: AtomicU8,
    listeners: Mutex<Vec<StopListener>>,
}

/**
    Shared shutdown signal for a pipeline.

    Cheap to clone; every clone observes the same state. Any thread may
    request a stop. Components that block (the queue map) register a stop
    listener so their waiters are woken when the stop happens.
*/
#[derive(Clone)]
pub struct PipelineState {
    inner: Arc<StateInner>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StateInner {
                phase: AtomicU8::new(RUNNING),
                reason: AtomicU8::new(REASON_NONE),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        match self.inner.phase.load(Ordering::Acquire) {
            RUNNING => Phase::Running,
            STOPPING => Phase::Stopping,
            _ => Phase::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.phase.load(Ordering::Acquire) == RUNNING
    }

    /**
        Returns why the pipeline stopped, or None while it is still running.
    */
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.inner.reason.load(Ordering::Acquire) {
            REASON_REQUESTED => Some(StopReason::Requested),
            REASON_END_OF_STREAM => Some(StopReason::EndOfStream),
            _ => None,
        }
    }

    /**
        Move the pipeline from running to stopping.

        Returns true if this call performed the transition. Later calls are
        no-ops and keep the first reason.
    */
    pub fn request_stop(&self, reason: StopReason) -> bool {
        let code = match reason {
            StopReason::Requested => REASON_REQUESTED,
            StopReason::EndOfStream => REASON_END_OF_STREAM,
        };
        // Reason first so anyone who sees Stopping also sees why.
        if self
            .inner
            .reason
            .compare_exchange(REASON_NONE, code, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.inner.phase.store(STOPPING, Ordering::Release);
        log::debug!("pipeline stopping ({reason:?})");

        let listeners = std::mem::take(&mut *self.inner.listeners.lock());
        for listener in listeners {
            listener();
        }
        true
    }

    /**
        Mark the pipeline as fully stopped once all threads are joined.
    */
    pub(crate) fn mark_stopped(&self) {
        self.request_stop(StopReason::Requested);
        self.inner.phase.store(STOPPED, Ordering::Release);
    }

    /**
        Run `listener` once when the pipeline stops.

        Runs immediately on the calling thread if the pipeline is already
        stopping. Listeners must not call back into `request_stop`.
    */
    pub(crate) fn on_stop(&self, listener: impl FnOnce() + Send + 'static) {
        let mut listeners = self.inner.listeners.lock();
        if self.is_running() {
            listeners.push(Box::new(listener));
            return;
        }
        drop(listeners);
        listener();
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineState")
            .field("phase", &self.phase())
            .field("reason", &self.stop_reason())
            .finish()
    }
}

static_assertions::assert_impl_all!(PipelineState: Send, Sync, Clone);
