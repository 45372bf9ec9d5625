/*!
    Paced presentation of fused frames.

    The presenter runs on the caller's thread. It polls the output queue,
    hands each frame to a [`Presenter`], then waits out the rest of the frame
    interval. When the queue is empty it idles briefly and polls again.
*/

use std::ops::ControlFlow;
use std::thread;
use std::time::{Duration, Instant};

use crate::{FusedFrame, OutputQueue, PipelineState, PipelineStats, StopReason};

/// Frame interval used when no usable frame rate is known.
pub const FALLBACK_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// How long to sleep when the output queue is empty.
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(10);

pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/**
    Renders fused frames. Owns each frame it is given.

    Returning [`ControlFlow::Break`] asks the pipeline to stop, the same way
    closing a player window would.
*/
pub trait Presenter {
    fn present(&mut self, frame: FusedFrame) -> ControlFlow<()>;
}

impl<F> Presenter for F
where
    F: FnMut(FusedFrame) -> ControlFlow<()>,
{
    fn present(&mut self, frame: FusedFrame) -> ControlFlow<()> {
        self(frame)
    }
}

/**
    Presentation timing.
*/
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pacing {
    /// Frames per second. `None`, zero, negative or non-finite rates use
    /// [`FALLBACK_FRAME_INTERVAL`].
    pub frame_rate: Option<f64>,
    pub idle_delay: Duration,
}

impl Pacing {
    pub fn new(frame_rate: f64) -> Self {
        Self {
            frame_rate: Some(frame_rate),
            ..Self::default()
        }
    }

    pub fn with_idle_delay(mut self, idle_delay: Duration) -> Self {
        self.idle_delay = idle_delay;
        self
    }

    /**
        Time between two presented frames.
    */
    pub fn frame_interval(&self) -> Duration {
        match self.frame_rate {
            Some(rate) if rate.is_finite() && rate > 0.0 => Duration::from_secs_f64(1.0 / rate),
            _ => FALLBACK_FRAME_INTERVAL,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            frame_rate: Some(DEFAULT_FRAME_RATE),
            idle_delay: DEFAULT_IDLE_DELAY,
        }
    }
}

/**
    Why the presentation loop returned.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentExit {
    /// The output queue was closed and fully consumed.
    Finished,
    /// The pipeline was asked to stop.
    Stopped,
    /// The presenter asked to quit.
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentSummary {
    pub presented: u64,
    /// Sequence number of the last presented frame.
    pub last_sequence: Option<u64>,
    pub exit: PresentExit,
}

/**
    Present fused frames from `output` until there are no more, or until
    the pipeline is stopped on request.

    A stop caused by the end of an input does not end presentation early:
    frames that were already fused are still shown.
*/
pub fn present_loop(
    output: &OutputQueue,
    state: &PipelineState,
    stats: &PipelineStats,
    pacing: Pacing,
    presenter: &mut impl Presenter,
) -> PresentSummary {
    let interval = pacing.frame_interval();
    log::info!("presenting at {:.1} ms per frame", interval.as_secs_f64() * 1000.0);

    let mut presented = 0;
    let mut last_sequence: Option<u64> = None;
    let exit = loop {
        if state.stop_reason() == Some(StopReason::Requested) {
            break PresentExit::Stopped;
        }

        let Some(frame) = output.try_pop() else {
            if output.is_finished() {
                break PresentExit::Finished;
            }
            thread::sleep(pacing.idle_delay);
            continue;
        };

        let started = Instant::now();
        let sequence = frame.sequence;
        if let Some(last) = last_sequence {
            if sequence > last + 1 {
                log::debug!("sets {} to {} were not fused", last + 1, sequence - 1);
            }
        }

        let flow = presenter.present(frame);
        presented += 1;
        last_sequence = Some(sequence);
        stats.record_presented();

        if flow.is_break() {
            log::info!("presenter quit after frame {sequence}");
            state.request_stop(StopReason::Requested);
            break PresentExit::Quit;
        }

        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    };

    log::info!("presentation ended ({exit:?}) after {presented} frames");
    PresentSummary {
        presented,
        last_sequence,
        exit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg_types::{PixelFormat, Pts, Rational, VideoFrame};
    use pretty_assertions::assert_eq;

    fn fused(sequence: u64) -> FusedFrame {
        let frame = VideoFrame::new(
            vec![0; 3],
            1,
            1,
            PixelFormat::Rgb24,
            Some(Pts(sequence as i64)),
            Rational::new(1, 30),
        );
        FusedFrame::new(sequence, frame, Vec::new())
    }

    fn fast() -> Pacing {
        Pacing::new(1000.0).with_idle_delay(Duration::from_millis(1))
    }

    #[test]
    fn frame_interval_falls_back_for_bad_rates() {
        assert_eq!(Pacing::new(25.0).frame_interval(), Duration::from_millis(40));
        assert_eq!(Pacing::new(0.0).frame_interval(), FALLBACK_FRAME_INTERVAL);
        assert_eq!(Pacing::new(-5.0).frame_interval(), FALLBACK_FRAME_INTERVAL);
        assert_eq!(Pacing::new(f64::NAN).frame_interval(), FALLBACK_FRAME_INTERVAL);

        let unknown = Pacing {
            frame_rate: None,
            ..Pacing::default()
        };
        assert_eq!(unknown.frame_interval(), FALLBACK_FRAME_INTERVAL);
        assert_eq!(Pacing::default().idle_delay, DEFAULT_IDLE_DELAY);
    }

    #[test]
    fn presents_everything_until_finished() {
        let output = OutputQueue::new();
        let state = PipelineState::new();
        let stats = PipelineStats::new();
        for i in [0, 1, 3] {
            output.push(fused(i));
        }
        output.close();

        let mut seen = Vec::new();
        let summary = present_loop(&output, &state, &stats, fast(), &mut |f: FusedFrame| {
            seen.push(f.sequence);
            ControlFlow::Continue(())
        });

        assert_eq!(seen, vec![0, 1, 3]);
        assert_eq!(
            summary,
            PresentSummary {
                presented: 3,
                last_sequence: Some(3),
                exit: PresentExit::Finished,
            }
        );
        assert_eq!(stats.presented(), 3);
    }

    #[test]
    fn end_of_stream_keeps_presenting_the_backlog() {
        let output = OutputQueue::new();
        let state = PipelineState::new();
        output.push(fused(0));
        output.push(fused(1));
        output.close();
        state.request_stop(StopReason::EndOfStream);

        let summary = present_loop(
            &output,
            &state,
            &PipelineStats::new(),
            fast(),
            &mut |_: FusedFrame| ControlFlow::Continue(()),
        );
        assert_eq!(summary.presented, 2);
        assert_eq!(summary.exit, PresentExit::Finished);
    }

    #[test]
    fn requested_stop_exits_immediately() {
        let output = OutputQueue::new();
        let state = PipelineState::new();
        output.push(fused(0));
        state.request_stop(StopReason::Requested);

        let summary = present_loop(
            &output,
            &state,
            &PipelineStats::new(),
            fast(),
            &mut |_: FusedFrame| ControlFlow::Continue(()),
        );
        assert_eq!(summary.presented, 0);
        assert_eq!(summary.exit, PresentExit::Stopped);
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn quitting_presenter_stops_the_pipeline() {
        let output = OutputQueue::new();
        let state = PipelineState::new();
        for i in 0..5 {
            output.push(fused(i));
        }

        let mut count = 0;
        let summary = present_loop(
            &output,
            &state,
            &PipelineStats::new(),
            fast(),
            &mut |_: FusedFrame| {
                count += 1;
                if count == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        );
        assert_eq!(summary.exit, PresentExit::Quit);
        assert_eq!(summary.last_sequence, Some(1));
        assert_eq!(state.stop_reason(), Some(StopReason::Requested));
    }

    #[test]
    fn idles_until_frames_arrive() {
        let output = std::sync::Arc::new(OutputQueue::new());
        let state = PipelineState::new();
        let feeder = {
            let output = std::sync::Arc::clone(&output);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                output.push(fused(0));
                output.close();
            })
        };

        let summary = present_loop(
            &output,
            &state,
            &PipelineStats::new(),
            fast(),
            &mut |_: FusedFrame| ControlFlow::Continue(()),
        );
        feeder.join().unwrap();
        assert_eq!(summary.presented, 1);
        assert_eq!(summary.exit, PresentExit::Finished);
    }
}
