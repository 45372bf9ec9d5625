use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use fusion::{
    BlendFuser, FusionPipeline, HStackFuser, Pacing, PresentSummary, ShutdownReport, StreamId,
};

#[cfg(feature = "ffmpeg")]
mod file;
mod input;
mod settings;
mod sink;
mod testsrc;

use input::InputArg;
use sink::FrameSink;
use testsrc::TestPatternSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FuserKind {
    /// Average all inputs pixel by pixel
    Blend,
    /// Place inputs side by side
    Hstack,
}

#[derive(Parser, Debug)]
#[command(name = "fusionplayer")]
#[command(about = "Plays two or more video streams fused frame by frame")]
struct Args {
    /// Inputs: `testsrc[:WxH[:frames]]` or a media file path
    #[arg(required = true, num_args = 2..)]
    inputs: Vec<InputArg>,

    /// How to fuse each set of frames
    #[arg(long, value_enum, default_value_t = FuserKind::Blend)]
    fuser: FuserKind,

    /// Presentation frame rate
    #[arg(long, default_value = "30")]
    fps: f64,

    /// Width of decoded and synthetic frames
    #[arg(long, default_value = "640")]
    width: u32,

    /// Height of decoded and synthetic frames
    #[arg(long, default_value = "360")]
    height: u32,

    /// Pipeline config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write fused frames to this directory as PNG
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Stop after presenting this many frames
    #[arg(short = 'n', long)]
    max_frames: Option<u64>,
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("ffmpeg_next", log::LevelFilter::Warn)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let config = settings::load_config(args.config.as_deref())?;
    let ids: Vec<StreamId> = (0..args.inputs.len() as u32).map(StreamId).collect();

    let builder = FusionPipeline::builder()
        .streams(ids.iter().copied())
        .config(config);
    let builder = match args.fuser {
        FuserKind::Blend => builder.fuser(BlendFuser),
        FuserKind::Hstack => builder.fuser(HStackFuser),
    };
    let mut pipeline = builder.build().context("failed to start pipeline")?;

    for (id, input) in ids.iter().zip(&args.inputs) {
        add_input(&mut pipeline, *id, input, &args)
            .with_context(|| format!("failed to open input {id}"))?;
    }

    let mut sink = FrameSink::new(args.output_dir.clone(), args.max_frames)?;
    let summary = pipeline.present(Pacing::new(args.fps), &mut sink);
    let report = pipeline.shutdown();

    print_summary(&args.inputs, &summary, &report);
    if let Some(e) = sink.take_error() {
        return Err(e);
    }
    Ok(())
}

fn add_input(
    pipeline: &mut FusionPipeline,
    id: StreamId,
    input: &InputArg,
    args: &Args,
) -> anyhow::Result<()> {
    match input {
        InputArg::TestPattern { size, frames } => {
            let (width, height) = size.unwrap_or((args.width, args.height));
            // Spread the blue channel so each stream is tinted differently.
            let seed = (id.0 as u8).wrapping_mul(85);
            let source = TestPatternSource::new(width, height, *frames, seed).with_rate(args.fps);
            pipeline.add_source(id, source)?;
        }
        #[cfg(feature = "ffmpeg")]
        InputArg::File(path) => {
            let source = file::FileSource::open(path, args.width, args.height)?;
            pipeline.add_source(id, source)?;
        }
        #[cfg(not(feature = "ffmpeg"))]
        InputArg::File(path) => {
            anyhow::bail!(
                "{} is a media file; rebuild with `--features ffmpeg` to decode it",
                path.display()
            );
        }
    }
    Ok(())
}

fn print_summary(inputs: &[InputArg], summary: &PresentSummary, report: &ShutdownReport) {
    println!();
    println!("Presented {} frames ({:?})", summary.presented, summary.exit);
    println!(
        "Fused {} sets, {} failed, {} fused frames and {} input frames discarded",
        report.stats.fused,
        report.stats.failed,
        report.discarded_outputs,
        report.discarded_inputs
    );
    if let Some(worker) = &report.worker {
        println!("Worker: {worker:?}");
    }
    for stream in &report.stats.streams {
        let exit = report
            .sources
            .iter()
            .find(|(id, _)| *id == stream.id)
            .map(|(_, exit)| format!("{exit:?}"))
            .unwrap_or_else(|| "-".to_string());
        let name = inputs
            .get(stream.id.0 as usize)
            .map(|input| match input {
                InputArg::TestPattern { .. } => "testsrc".to_string(),
                InputArg::File(path) => path.display().to_string(),
            })
            .unwrap_or_default();
        println!(
            "  {} {name}: {} pushed, {} dropped, exit {exit}",
            stream.id, stream.pushed, stream.dropped
        );
    }
}
