/*!
    Output queue between the fusion worker and the presenter.
*/

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use ffmpeg_types::{Pts, VideoFrame};
use parking_lot::Mutex;

use crate::StreamId;

/**
    A fused frame together with where it came from.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct FusedFrame {
    /// Position of the input set this frame was fused from, counting from 0.
    /// Sets whose fusion failed still use up a position.
    pub sequence: u64,
    /// The fused image.
    pub frame: VideoFrame,
    /// Timestamps of the input frames, by stream.
    pub sources: Vec<(StreamId, Option<Pts>)>,
}

impl FusedFrame {
    pub fn new(sequence: u64, frame: VideoFrame, sources: Vec<(StreamId, Option<Pts>)>) -> Self {
        Self {
            sequence,
            frame,
            sources,
        }
    }

    /// Timestamp of the input frame from `id`.
    pub fn source_pts(&self, id: StreamId) -> Option<Pts> {
        self.sources
            .iter()
            .find(|(stream, _)| *stream == id)
            .and_then(|(_, pts)| *pts)
    }
}

/**
    FIFO of fused frames.

    Pushing never blocks and never fails. The worker closes the queue when it
    exits, so a presenter can tell "nothing yet" from "nothing ever again".
*/
pub struct OutputQueue {
    frames: Mutex<VecDeque<FusedFrame>>,
    closed: AtomicBool,
}

impl OutputQueue {
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn push(&self, frame: FusedFrame) {
        self.frames.lock().push_back(frame);
    }

    /**
        Pop the oldest fused frame without blocking.
    */
    pub fn try_pop(&self) -> Option<FusedFrame> {
        self.frames.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Mark that no more frames will be pushed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /**
        Returns true once the queue is closed and every frame was popped.
    */
    pub fn is_finished(&self) -> bool {
        // Check closed first: a frame pushed before close is then visible.
        self.is_closed() && self.is_empty()
    }

    /**
        Drop every queued frame. Returns how many were dropped.
    */
    pub fn discard(&self) -> usize {
        let mut frames = self.frames.lock();
        let n = frames.len();
        frames.clear();
        n
    }
}

impl Default for OutputQueue {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(OutputQueue: Send, Sync);
static_assertions::assert_impl_all!(FusedFrame: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg_types::{PixelFormat, Rational};

    fn fused(sequence: u64) -> FusedFrame {
        let frame = VideoFrame::new(
            vec![0; 3],
            1,
            1,
            PixelFormat::Rgb24,
            Some(Pts(sequence as i64)),
            Rational::new(1, 30),
        );
        FusedFrame::new(
            sequence,
            frame,
            vec![(StreamId(0), Some(Pts(10))), (StreamId(1), None)],
        )
    }

    #[test]
    fn pops_in_push_order() {
        let queue = OutputQueue::new();
        queue.push(fused(0));
        queue.push(fused(1));
        queue.push(fused(2));

        let order: Vec<u64> = std::iter::from_fn(|| queue.try_pop())
            .map(|f| f.sequence)
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn finished_only_when_closed_and_empty() {
        let queue = OutputQueue::new();
        queue.push(fused(0));
        assert!(!queue.is_finished());

        queue.close();
        assert!(!queue.is_finished());

        queue.try_pop();
        assert!(queue.is_finished());
    }

    #[test]
    fn discard_empties_the_queue() {
        let queue = OutputQueue::new();
        queue.push(fused(0));
        queue.push(fused(1));
        assert_eq!(queue.discard(), 2);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn source_pts_lookup() {
        let frame = fused(4);
        assert_eq!(frame.source_pts(StreamId(0)), Some(Pts(10)));
        assert_eq!(frame.source_pts(StreamId(1)), None);
        assert_eq!(frame.source_pts(StreamId(2)), None);
    }
}
