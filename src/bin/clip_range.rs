// Cut one explicit time range out of a video

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};

use activity_clipper::{
    config::Config,
    export::ClipExporter,
    video::FfmpegBackend,
};

#[derive(Parser)]
#[command(name = "clip_range", version, about = "Copy [start, end] seconds of a video into a new file")]
struct Cli {
    /// Source video
    video_path: PathBuf,

    /// Start time in seconds
    start: f64,

    /// End time in seconds (inclusive)
    end: f64,

    /// Output file
    output: PathBuf,

    /// Configuration file for codec and ffmpeg paths (optional)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.validate()?;

    let backend = FfmpegBackend::new(&config.video);
    let exporter = ClipExporter::new(&backend, &config.export);

    info!("✂️  Clipping {:?} {:.2}s-{:.2}s", cli.video_path, cli.start, cli.end);
    let clip = exporter.export_range(&cli.video_path, cli.start, cli.end, &cli.output)?;

    if clip.is_short() {
        info!("   ⚠️  Source ended early: {} of {} frames", clip.frames_written, clip.spec.frame_count());
    }
    info!("   ✅ Saved {:?} ({} frames)", cli.output, clip.frames_written);
    Ok(())
}
