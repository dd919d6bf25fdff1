mod cli;

use anyhow::Result;
use async_predictor::demo::{AnnotatedFrame, DemoConfig, VisualizationDemo};
use async_predictor::run_context::{create_run, RunWriter};
use async_predictor::video::image_dir_reader::ImageDirReader;
use async_predictor::video::processor::{process_frames, progress_bar};
use async_predictor::video::{FrameSource, Frames};
use cli::Args;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse_args();

    run(args)
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };
    if let Some(n) = args.num_accelerators {
        config.predictor.num_accelerators = n;
    }
    if let Some(buffer_size) = args.buffer_size {
        config.buffer_size = Some(buffer_size);
    }

    let reader = ImageDirReader::new(&args.input)?;
    let total_frames = reader.frame_count();

    let mut demo = VisualizationDemo::new(config, args.parallel)?;
    let devices = demo.devices().iter().map(|d| d.to_string()).collect();
    let metadata = create_run(&args.output, &args.input, demo.is_parallel(), devices)?;
    let mut writer = RunWriter::new(&metadata, !args.no_frames)?;

    let pb = progress_bar(total_frames)?;
    let mut frames = Frames::new(reader);
    let stats = process_frames(
        demo.run_on_video(frames.by_ref()),
        &pb,
        |annotated: Result<AnnotatedFrame>| writer.write(&annotated?),
    )?;
    frames.finish()?;

    let summary = writer.finish(stats.duration)?;
    demo.finish()?;

    tracing::info!(
        "Processed {} frames ({} with detections, {} detections) in {:.2}s ({:.1} fps) -> {:?}",
        summary.frames,
        summary.frames_with_detections,
        summary.detections,
        summary.elapsed_secs,
        stats.fps(),
        metadata.output_dir
    );

    Ok(())
}
