// Generate a mostly static recording with a few bursts of motion, for
// running the clipper end to end without real footage.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tracing::{info, Level};

use activity_clipper::{
    config::Config,
    video::{FfmpegBackend, Frame, VideoBackend, WriterParams},
};

#[derive(Parser)]
#[command(name = "synth_video", version, about = "Write a synthetic test recording")]
struct Cli {
    /// Output file
    output: PathBuf,

    /// Length in seconds
    #[arg(short, long, default_value_t = 600.0)]
    duration: f64,

    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    #[arg(long, default_value_t = 320)]
    width: u32,

    #[arg(long, default_value_t = 240)]
    height: u32,

    /// Number of activity bursts
    #[arg(short, long, default_value_t = 3)]
    bursts: usize,

    /// Length of each burst in seconds
    #[arg(long, default_value_t = 40.0)]
    burst_length: f64,

    /// RNG seed
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

/// A square bouncing around the frame
struct Block {
    x: f64,
    y: f64,
    dx: f64,
    dy: f64,
    size: u32,
    color: [u8; 3],
}

impl Block {
    fn random(rng: &mut SmallRng, width: u32, height: u32) -> Self {
        let size = (width.min(height) / 4).max(4);
        Self {
            x: rng.gen_range(0.0..(width - size) as f64),
            y: rng.gen_range(0.0..(height - size) as f64),
            dx: rng.gen_range(2.0..6.0),
            dy: rng.gen_range(2.0..6.0),
            size,
            color: [rng.gen(), rng.gen(), rng.gen()],
        }
    }

    fn step(&mut self, width: u32, height: u32) {
        let max_x = (width - self.size) as f64;
        let max_y = (height - self.size) as f64;
        self.x += self.dx;
        self.y += self.dy;
        if self.x <= 0.0 || self.x >= max_x {
            self.dx = -self.dx;
            self.x = self.x.clamp(0.0, max_x);
        }
        if self.y <= 0.0 || self.y >= max_y {
            self.dy = -self.dy;
            self.y = self.y.clamp(0.0, max_y);
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let (x0, y0) = (self.x as u32, self.y as u32);
        for y in y0..y0 + self.size {
            for x in x0..x0 + self.size {
                frame.set_pixel(x, y, self.color);
            }
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    if cli.width < 16 || cli.height < 16 || cli.fps <= 0.0 || cli.duration <= 0.0 {
        anyhow::bail!("need at least 16x16 pixels, a positive fps and a positive duration");
    }

    let mut rng = SmallRng::seed_from_u64(cli.seed);
    let total_frames = (cli.duration * cli.fps) as u64;
    let burst_frames = (cli.burst_length * cli.fps) as u64;

    let mut bursts: Vec<u64> = (0..cli.bursts)
        .map(|_| rng.gen_range(0..total_frames.saturating_sub(burst_frames).max(1)))
        .collect();
    bursts.sort_unstable();
    for start in &bursts {
        info!("   Burst at {:.1}s", *start as f64 / cli.fps);
    }

    // Static background with fixed per-pixel noise
    let mut background = Frame::new_black(cli.width, cli.height);
    for y in 0..cli.height {
        for x in 0..cli.width {
            let level: u8 = rng.gen_range(60..90);
            background.set_pixel(x, y, [level, level, level.saturating_add(10)]);
        }
    }

    let config = Config::default();
    let backend = FfmpegBackend::new(&config.video);
    let params = WriterParams {
        fps: cli.fps,
        width: cli.width,
        height: cli.height,
        codec: config.export.codec.clone(),
    };
    let mut sink = backend.create_writer(&cli.output, &params)?;

    info!("🎬 Writing {} frames to {:?}", total_frames, cli.output);
    let mut block: Option<Block> = None;

    for index in 0..total_frames {
        let active = bursts.iter().any(|&start| (start..start + burst_frames).contains(&index));
        match (block.is_some(), active) {
            (false, true) => block = Some(Block::random(&mut rng, cli.width, cli.height)),
            (true, false) => block = None,
            _ => {}
        }

        let mut frame = background.clone();
        if let Some(block) = block.as_mut() {
            block.step(cli.width, cli.height);
            block.draw(&mut frame);
        }
        sink.write_frame(&frame)?;

        if index > 0 && index % (cli.fps as u64 * 60).max(1) == 0 {
            info!("   {} / {} frames", index, total_frames);
        }
    }

    sink.finish()?;
    info!("✅ Done");
    Ok(())
}
