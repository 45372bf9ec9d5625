/*!
    Per-stream frame queues.

    All queues live behind one mutex. The worker's "every queue has a frame"
    check and the pops that follow it must see one consistent snapshot of all
    queues, which independent per-queue locks cannot give without a race
    between the check and the pop.
*/

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use ffmpeg_types::{Pts, VideoFrame};
use parking_lot::{Condvar, Mutex};

use crate::{OverflowPolicy, PipelineError, PipelineState, StreamId};

/**
    What happened to a pushed frame.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// The frame was queued.
    Queued,
    /// The frame was queued and the oldest frame of the stream was evicted.
    DroppedOldest,
}

/**
    One frame from each stream of a set, ordered by stream id.

    Produced only by an all-or-nothing pop, so it always holds exactly one
    frame per requested stream.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSet {
    frames: Vec<(StreamId, VideoFrame)>,
}

impl FrameSet {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The frame popped from `id`'s queue.
    pub fn get(&self, id: StreamId) -> Option<&VideoFrame> {
        self.frames
            .iter()
            .find(|(stream, _)| *stream == id)
            .map(|(_, frame)| frame)
    }

    /**
        The two frames of a two-stream set, in stream id order.
    */
    pub fn pair(&self) -> Option<(&VideoFrame, &VideoFrame)> {
        match self.frames.as_slice() {
            [(_, a), (_, b)] => Some((a, b)),
            _ => None,
        }
    }

    /// Frames in stream id order.
    pub fn frames(&self) -> impl Iterator<Item = &VideoFrame> {
        self.frames.iter().map(|(_, frame)| frame)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StreamId, &VideoFrame)> {
        self.frames.iter().map(|(id, frame)| (*id, frame))
    }

    pub fn stream_ids(&self) -> Vec<StreamId> {
        self.frames.iter().map(|(id, _)| *id).collect()
    }

    /// Timestamps of the input frames, by stream.
    pub fn source_pts(&self) -> Vec<(StreamId, Option<Pts>)> {
        self.frames.iter().map(|(id, frame)| (*id, frame.pts)).collect()
    }

    pub fn into_frames(self) -> Vec<(StreamId, VideoFrame)> {
        self.frames
    }
}

/**
    Counters for one stream's queue.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub id: StreamId,
    /// Frames accepted by `push`.
    pub pushed: u64,
    /// Frames evicted by the drop-oldest policy.
    pub dropped: u64,
    /// Frames currently queued.
    pub queued: usize,
    /// Whether the stream's producer has finished.
    pub closed: bool,
}

/**
    Result of a blocking wait for a complete set.
*/
#[derive(Debug)]
pub(crate) enum WaitOutcome {
    Ready(FrameSet),
    Stopped,
    Exhausted(StreamId),
}

#[derive(Default)]
struct StreamQueue {
    frames: VecDeque<VideoFrame>,
    closed: bool,
    pushed: u64,
    dropped: u64,
}

/**
    The map of per-stream FIFO queues.

    Only a stream's producer appends to its queue; only the fusion worker
    removes from it.
*/
pub struct StreamQueues {
    queues: Mutex<BTreeMap<StreamId, StreamQueue>>,
    /// Signalled when a frame arrives, a stream closes or the pipeline stops.
    frames_ready: Condvar,
    /// Signalled when frames are popped or the pipeline stops.
    space_ready: Condvar,
    policy: OverflowPolicy,
    state: PipelineState,
}

impl StreamQueues {
    /**
        Create an empty queue map bound to `state`.

        Blocked waiters are woken when `state` stops.
    */
    pub fn new(policy: OverflowPolicy, state: PipelineState) -> Arc<Self> {
        let queues = Arc::new(Self {
            queues: Mutex::new(BTreeMap::new()),
            frames_ready: Condvar::new(),
            space_ready: Condvar::new(),
            policy,
            state: state.clone(),
        });
        let weak = Arc::downgrade(&queues);
        state.on_stop(move || {
            if let Some(queues) = weak.upgrade() {
                queues.wake_all();
            }
        });
        queues
    }

    /**
        Create a queue map with `ids` already registered.
    */
    pub fn with_streams(
        ids: impl IntoIterator<Item = StreamId>,
        policy: OverflowPolicy,
        state: PipelineState,
    ) -> Result<Arc<Self>, PipelineError> {
        let queues = Self::new(policy, state);
        for id in ids {
            queues.register_stream(id)?;
        }
        Ok(queues)
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /**
        Add an empty queue for `id`.
    */
    pub fn register_stream(&self, id: StreamId) -> Result<(), PipelineError> {
        let mut queues = self.queues.lock();
        if queues.contains_key(&id) {
            return Err(PipelineError::DuplicateStream(id));
        }
        queues.insert(id, StreamQueue::default());
        log::debug!("registered stream {id}");
        Ok(())
    }

    /// Registered stream ids in ascending order.
    pub fn stream_ids(&self) -> Vec<StreamId> {
        self.queues.lock().keys().copied().collect()
    }

    /**
        Append `frame` to the queue of stream `id` and wake the worker.

        Fails with [`PipelineError::Stopped`] once the pipeline is stopping.
        With [`OverflowPolicy::Block`] this waits while the queue is full.
    */
    pub fn push(&self, id: StreamId, frame: VideoFrame) -> Result<PushOutcome, PipelineError> {
        if frame.is_empty() {
            return Err(PipelineError::InvalidFrame {
                stream: id,
                reason: format!(
                    "{}x{} {} frame with {} bytes",
                    frame.width,
                    frame.height,
                    frame.format,
                    frame.data.len()
                ),
            });
        }

        let mut queues = self.queues.lock();
        if !self.state.is_running() {
            return Err(PipelineError::Stopped);
        }
        let outcome = match self.policy {
            OverflowPolicy::Unbounded => {
                Self::open_queue(&mut queues, id)?;
                PushOutcome::Queued
            }
            OverflowPolicy::DropOldest { capacity } => {
                let queue = Self::open_queue(&mut queues, id)?;
                let mut outcome = PushOutcome::Queued;
                while queue.frames.len() >= capacity.max(1) {
                    queue.frames.pop_front();
                    queue.dropped += 1;
                    outcome = PushOutcome::DroppedOldest;
                }
                if outcome == PushOutcome::DroppedOldest {
                    log::warn!("stream {id}: queue full, dropped oldest frame");
                }
                outcome
            }
            OverflowPolicy::Block { capacity } => {
                loop {
                    let queue = Self::open_queue(&mut queues, id)?;
                    if queue.frames.len() < capacity.max(1) {
                        break;
                    }
                    if !self.state.is_running() {
                        return Err(PipelineError::Stopped);
                    }
                    log::trace!("stream {id}: queue full, waiting for space");
                    self.space_ready.wait(&mut queues);
                }
                PushOutcome::Queued
            }
        };

        let queue = Self::open_queue(&mut queues, id)?;
        queue.frames.push_back(frame);
        queue.pushed += 1;
        drop(queues);

        self.frames_ready.notify_one();
        Ok(outcome)
    }

    /**
        Pop one frame from every queue in `ids`, or nothing at all.

        Returns `Ok(None)` when any of the queues is empty; no queue is
        touched in that case.
    */
    pub fn try_pop_all(&self, ids: &[StreamId]) -> Result<Option<FrameSet>, PipelineError> {
        let ids = Self::normalize(ids)?;
        let mut queues = self.queues.lock();
        let set = Self::pop_all_locked(&mut queues, &ids)?;
        drop(queues);

        if set.is_some() {
            self.space_ready.notify_all();
        }
        Ok(set)
    }

    /**
        Block until a complete set can be popped, the pipeline stops, or a
        stream in `ids` is exhausted.

        With `drain` set, complete sets are still returned while stopping;
        `Stopped` is only reported once no complete set is left.
    */
    pub(crate) fn wait_pop_all(
        &self,
        ids: &[StreamId],
        drain: bool,
    ) -> Result<WaitOutcome, PipelineError> {
        let ids = Self::normalize(ids)?;
        let mut queues = self.queues.lock();
        loop {
            if !drain && !self.state.is_running() {
                return Ok(WaitOutcome::Stopped);
            }
            if let Some(set) = Self::pop_all_locked(&mut queues, &ids)? {
                drop(queues);
                self.space_ready.notify_all();
                return Ok(WaitOutcome::Ready(set));
            }
            if !self.state.is_running() {
                return Ok(WaitOutcome::Stopped);
            }
            if let Some(id) = Self::exhausted_locked(&queues, &ids) {
                return Ok(WaitOutcome::Exhausted(id));
            }
            self.frames_ready.wait(&mut queues);
        }
    }

    /**
        Mark stream `id` as finished; no more frames will be pushed to it.

        Frames already queued stay available for pairing.
    */
    pub fn close_stream(&self, id: StreamId) -> Result<(), PipelineError> {
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(&id)
            .ok_or(PipelineError::UnknownStream(id))?;
        queue.closed = true;
        drop(queues);

        log::debug!("stream {id} closed");
        self.frames_ready.notify_all();
        Ok(())
    }

    /// Number of frames queued for `id`.
    pub fn len(&self, id: StreamId) -> Result<usize, PipelineError> {
        self.queues
            .lock()
            .get(&id)
            .map(|queue| queue.frames.len())
            .ok_or(PipelineError::UnknownStream(id))
    }

    pub fn is_closed(&self, id: StreamId) -> Result<bool, PipelineError> {
        self.queues
            .lock()
            .get(&id)
            .map(|queue| queue.closed)
            .ok_or(PipelineError::UnknownStream(id))
    }

    /// Counters for every stream, in stream id order.
    pub fn stream_stats(&self) -> Vec<StreamStats> {
        self.queues
            .lock()
            .iter()
            .map(|(id, queue)| StreamStats {
                id: *id,
                pushed: queue.pushed,
                dropped: queue.dropped,
                queued: queue.frames.len(),
                closed: queue.closed,
            })
            .collect()
    }

    /**
        Discard every queued frame. Returns how many were discarded.
    */
    pub fn clear(&self) -> usize {
        let mut queues = self.queues.lock();
        let discarded = queues
            .values_mut()
            .map(|queue| {
                let n = queue.frames.len();
                queue.frames.clear();
                n
            })
            .sum();
        drop(queues);
        self.space_ready.notify_all();
        discarded
    }

    fn wake_all(&self) {
        // Taking the lock orders this wake-up after any waiter's predicate check.
        let _queues = self.queues.lock();
        self.frames_ready.notify_all();
        self.space_ready.notify_all();
    }

    fn normalize(ids: &[StreamId]) -> Result<Vec<StreamId>, PipelineError> {
        if ids.is_empty() {
            return Err(PipelineError::NoStreams);
        }
        let unique: BTreeSet<StreamId> = ids.iter().copied().collect();
        Ok(unique.into_iter().collect())
    }

    fn open_queue<'a>(
        queues: &'a mut BTreeMap<StreamId, StreamQueue>,
        id: StreamId,
    ) -> Result<&'a mut StreamQueue, PipelineError> {
        let queue = queues
            .get_mut(&id)
            .ok_or(PipelineError::UnknownStream(id))?;
        if queue.closed {
            return Err(PipelineError::StreamClosed(id));
        }
        Ok(queue)
    }

    fn pop_all_locked(
        queues: &mut BTreeMap<StreamId, StreamQueue>,
        ids: &[StreamId],
    ) -> Result<Option<FrameSet>, PipelineError> {
        if let Some(unknown) = ids.iter().find(|id| !queues.contains_key(id)) {
            return Err(PipelineError::UnknownStream(*unknown));
        }
        if ids
            .iter()
            .any(|id| queues.get(id).is_none_or(|queue| queue.frames.is_empty()))
        {
            return Ok(None);
        }

        let mut frames = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(frame) = queues.get_mut(id).and_then(|q| q.frames.pop_front()) {
                frames.push((*id, frame));
            }
        }
        Ok(Some(FrameSet { frames }))
    }

    fn exhausted_locked(
        queues: &BTreeMap<StreamId, StreamQueue>,
        ids: &[StreamId],
    ) -> Option<StreamId> {
        ids.iter().copied().find(|id| {
            queues
                .get(id)
                .is_some_and(|queue| queue.closed && queue.frames.is_empty())
        })
    }
}

static_assertions::assert_impl_all!(StreamQueues: Send, Sync);
static_assertions::assert_impl_all!(FrameSet: Send);
