use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};

use activity_clipper::{
    config::Config,
    video::FfmpegBackend,
    ActivityPipeline,
};

#[derive(Parser)]
#[command(
    name = "activity-clipper",
    version,
    about = "Cut the busy stretches out of long, mostly static recordings",
    long_about = "Activity-Clipper samples a video at a fixed frame stride, scores how much each sample changed since the previous one, and exports every run of samples more than k standard deviations above the mean as its own clip."
)]
struct Cli {
    /// Video file to scan
    video_path: PathBuf,

    /// Frames between samples
    #[arg(short = 's', long = "sample-rate")]
    sample_rate: Option<u64>,

    /// Stop sampling after this many seconds
    #[arg(short, long)]
    end_time: Option<f64>,

    /// Directory for the activity plot
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Prefix for the plot file, clip subdirectory and clip names
    #[arg(short, long)]
    prefix: Option<String>,

    /// Activity plot file name
    #[arg(short, long)]
    filename: Option<String>,

    /// Root directory for exported clips
    #[arg(short, long)]
    clip_dir: Option<PathBuf>,

    /// Standard deviations above the mean that count as activity
    #[arg(short = 't', long = "threshold-devs")]
    threshold_devs: Option<f64>,

    /// Interior runs must span more than this many samples
    #[arg(long)]
    min_run_length: Option<usize>,

    /// Clips written concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Append the segment index to clip names that would collide
    #[arg(long)]
    disambiguate: bool,

    /// Skip the activity plot
    #[arg(long)]
    no_plot: bool,

    /// Configuration file (optional)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a JSON report of the run
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line values win over the configuration file
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(stride) = self.sample_rate {
            config.sampling.stride = stride;
        }
        if let Some(end_time) = self.end_time {
            config.sampling.end_time = Some(end_time);
        }
        if let Some(dir) = &self.dir {
            config.plot.dir = dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.export.prefix = prefix.clone();
        }
        if let Some(filename) = &self.filename {
            config.plot.filename = filename.clone();
        }
        if let Some(clip_dir) = &self.clip_dir {
            config.export.clip_dir = clip_dir.clone();
        }
        if let Some(k) = self.threshold_devs {
            config.segmentation.deviation_multiplier = k;
        }
        if let Some(min_run_length) = self.min_run_length {
            config.segmentation.min_run_length = min_run_length;
        }
        if let Some(workers) = self.workers {
            config.export.workers = workers;
        }
        if self.disambiguate {
            config.export.disambiguate_collisions = true;
        }
        if self.no_plot {
            config.plot.enabled = false;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .init();

    info!("Starting Activity-Clipper v{}", env!("CARGO_PKG_VERSION"));
    info!("Video: {:?}", cli.video_path);

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    cli.apply_overrides(&mut config);
    config.validate()?;

    let backend = FfmpegBackend::new(&config.video);
    if !backend.check_available() {
        anyhow::bail!(
            "ffmpeg/ffprobe not found ({} / {}); install ffmpeg or set [video] paths in the config",
            config.video.ffmpeg.display(),
            config.video.ffprobe.display()
        );
    }

    let pipeline = ActivityPipeline::new(config, Box::new(backend));
    let report = match pipeline.run(&cli.video_path) {
        Ok(report) => report,
        Err(e) => {
            warn!("{}", e.user_message());
            return Err(e.into());
        }
    };

    if let Some(report_path) = &cli.report {
        report.save_json(report_path)?;
        info!("Report saved to: {:?}", report_path);
    }

    info!("Done! {} clips written", report.segments_exported);
    Ok(())
}
