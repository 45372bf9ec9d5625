use std::ops::ControlFlow;
use std::thread;
use std::time::{Duration, Instant};

use ffmpeg_types::{PixelFormat, Pts, Rational, VideoFrame};
use fusion::{
    BlendFuser, FrameSet, FusedFrame, FusionError, FusionPipeline, OverflowPolicy, Pacing,
    PipelineConfig, PresentExit, SourceExit, StopReason, StreamId, WorkerExit,
};
use pretty_assertions::assert_eq;

const S0: StreamId = StreamId(0);
const S1: StreamId = StreamId(1);

fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

fn frame(pts: i64, fill: u8) -> VideoFrame {
    VideoFrame::new(
        vec![fill; PixelFormat::Rgb24.buffer_size(2, 2)],
        2,
        2,
        PixelFormat::Rgb24,
        Some(Pts(pts)),
        Rational::new(1, 30),
    )
}

fn first_input(set: &FrameSet) -> Result<VideoFrame, FusionError> {
    set.frames()
        .next()
        .cloned()
        .ok_or(FusionError::Other("empty set".into()))
}

fn fast_pacing() -> Pacing {
    Pacing::new(2000.0).with_idle_delay(Duration::from_millis(1))
}

fn collect_output(pipeline: &FusionPipeline) -> Vec<FusedFrame> {
    let output = pipeline.output();
    std::iter::from_fn(|| output.try_pop()).collect()
}

#[test]
fn sets_pair_frames_by_position_under_any_interleaving() {
    init_logging();
    const N: i64 = 200;

    let mut pipeline = FusionPipeline::builder()
        .streams([S0, S1])
        .fuser(first_input)
        .config(PipelineConfig {
            overflow: OverflowPolicy::Block { capacity: 4 },
            ..PipelineConfig::default()
        })
        .build()
        .unwrap();

    let producers: Vec<_> = [(S0, 3u64), (S1, 7u64)]
        .into_iter()
        .map(|(id, stride)| {
            let producer = pipeline.producer(id).unwrap();
            thread::spawn(move || {
                for i in 0..N {
                    producer.on_frame_decoded(frame(i, 1)).unwrap();
                    if (i as u64) % stride == 0 {
                        thread::sleep(Duration::from_micros(200));
                    }
                }
                producer.finish();
            })
        })
        .collect();

    let mut presented = Vec::new();
    let summary = pipeline.present(fast_pacing(), &mut |f: FusedFrame| {
        presented.push(f);
        ControlFlow::Continue(())
    });
    for producer in producers {
        producer.join().unwrap();
    }

    assert_eq!(summary.exit, PresentExit::Finished);
    assert_eq!(presented.len(), N as usize);
    for (i, fused) in presented.iter().enumerate() {
        assert_eq!(fused.sequence, i as u64);
        assert_eq!(fused.source_pts(S0), Some(Pts(i as i64)));
        assert_eq!(fused.source_pts(S1), Some(Pts(i as i64)));
    }

    let report = pipeline.join();
    assert_eq!(report.stats.fused, N as u64);
    assert_eq!(report.stats.presented, N as u64);
    assert_eq!(report.discarded_inputs, 0);
}

#[test]
fn a_failed_set_is_skipped_and_later_sets_continue() {
    init_logging();

    let mut calls = 0;
    let mut pipeline = FusionPipeline::builder()
        .streams([S0, S1])
        .fuser(move |set: &FrameSet| {
            calls += 1;
            if calls == 2 {
                return Err(FusionError::InsufficientMatches {
                    found: 3,
                    required: 4,
                });
            }
            first_input(set)
        })
        .build()
        .unwrap();

    pipeline
        .add_source(S0, (0..3).map(|i| frame(i, 10)))
        .unwrap();
    pipeline
        .add_source(S1, (0..3).map(|i| frame(i, 20)))
        .unwrap();

    let report = pipeline.join();
    let sequences: Vec<u64> = collect_output(&pipeline)
        .iter()
        .map(|f| f.sequence)
        .collect();

    assert_eq!(sequences, vec![0, 2]);
    assert_eq!(report.stats.fused, 2);
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.worker, Some(WorkerExit::Exhausted(S0)));
}

#[test]
fn shutdown_finishes_with_blocked_producers_and_waiting_worker() {
    init_logging();

    let mut pipeline = FusionPipeline::builder()
        .streams([S0, S1])
        .fuser(BlendFuser)
        .config(PipelineConfig {
            overflow: OverflowPolicy::Block { capacity: 2 },
            ..PipelineConfig::default()
        })
        .build()
        .unwrap();

    // Stream 0 never stops producing and stream 1 never produces, so the
    // source blocks on a full queue and the worker waits on an empty one.
    pipeline
        .add_source(S0, (0..).map(|i| frame(i, 0)))
        .unwrap();
    let _idle = pipeline.producer(S1).unwrap();
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    let report = pipeline.shutdown();
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(report.worker, Some(WorkerExit::Stopped));
    assert_eq!(report.sources, vec![(S0, SourceExit::Stopped { frames: 2 })]);
    assert_eq!(report.discarded_inputs, 2);
    assert_eq!(pipeline.state().stop_reason(), Some(StopReason::Requested));
}

#[test]
fn four_streams_blend_into_one() {
    init_logging();
    let ids: Vec<StreamId> = (0..4).map(StreamId).collect();

    let mut pipeline = FusionPipeline::builder()
        .streams(ids.clone())
        .fuser(BlendFuser)
        .build()
        .unwrap();
    for (n, id) in ids.iter().enumerate() {
        let fill = (n as u8) * 20;
        pipeline
            .add_source(*id, (0..5).map(move |i| frame(i, fill)))
            .unwrap();
    }

    let report = pipeline.join();
    let fused = collect_output(&pipeline);

    assert_eq!(report.stats.fused, 5);
    assert_eq!(fused.len(), 5);
    // (0 + 20 + 40 + 60) / 4
    assert!(fused.iter().all(|f| f.frame.data.iter().all(|&b| b == 30)));
    assert!(fused.iter().all(|f| f.sources.len() == 4));
}

#[test]
fn presenter_quit_stops_every_thread() {
    init_logging();

    let mut pipeline = FusionPipeline::builder()
        .streams([S0, S1])
        .fuser(first_input)
        .build()
        .unwrap();
    pipeline
        .add_source(S0, (0..).map(|i| frame(i, 1)))
        .unwrap();
    pipeline
        .add_source(S1, (0..).map(|i| frame(i, 2)))
        .unwrap();

    let mut shown = 0;
    let summary = pipeline.present(fast_pacing(), &mut |_: FusedFrame| {
        shown += 1;
        if shown == 10 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    assert_eq!(summary.exit, PresentExit::Quit);
    assert_eq!(summary.presented, 10);

    let report = pipeline.shutdown();
    assert_eq!(report.worker, Some(WorkerExit::Stopped));
    assert!(
        report
            .sources
            .iter()
            .all(|(_, exit)| matches!(exit, SourceExit::Stopped { .. }))
    );
    assert_eq!(report.stats.presented, 10);
}

#[test]
fn drop_oldest_from_json_config_keeps_running() {
    init_logging();
    let config =
        PipelineConfig::from_json(r#"{ "overflow": { "policy": "drop_oldest", "capacity": 1 } }"#)
            .unwrap();
    assert!(config.drain_on_stop);

    let mut pipeline = FusionPipeline::builder()
        .streams([S0, S1])
        .fuser(first_input)
        .config(config)
        .build()
        .unwrap();
    let p0 = pipeline.producer(S0).unwrap();
    let p1 = pipeline.producer(S1).unwrap();

    // Pushes never block; only the newest frame of stream 0 survives.
    for i in 0..5 {
        p0.on_frame_decoded(frame(i, 0)).unwrap();
    }
    p1.on_frame_decoded(frame(100, 0)).unwrap();
    p0.finish();
    p1.finish();

    let report = pipeline.join();
    let fused = collect_output(&pipeline);
    assert_eq!(fused.len(), 1);
    assert_eq!(fused[0].source_pts(S0), Some(Pts(4)));
    assert_eq!(fused[0].source_pts(S1), Some(Pts(100)));
    assert_eq!(report.stats.streams[0].dropped, 4);
}
