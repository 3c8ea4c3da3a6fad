//! # Activity-Clipper
//!
//! Find the busy stretches of long, mostly static footage and cut them out as
//! standalone clips.
//!
//! The library samples a video at a fixed frame stride and scores how much
//! each sample differs from the previous one. It thresholds that series at
//! `mean + k * std` and exports every sufficiently long above-threshold run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use activity_clipper::{ActivityPipeline, Config};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let pipeline = ActivityPipeline::with_ffmpeg(config);
//!
//! let report = pipeline.run("footage/0001_tank.mp4")?;
//! println!("{} clips, {:.1} minutes", report.segments_exported,
//!          report.total_extracted_seconds / 60.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`video`] - Frame sources and sinks, ffmpeg and in-memory backends
//! - [`analysis`] - Change scoring, sampling and segmentation
//! - [`export`] - Clip naming and writing
//! - [`plot`] - Activity histogram and time-series image
//! - [`pipeline`] - End-to-end run over one video
//! - [`config`] - Configuration management
//!
//! ## Custom Backends
//!
//! Anything that can decode and encode RGB frames can drive the pipeline by
//! implementing [`VideoBackend`](video::VideoBackend). The bundled
//! [`MemoryBackend`](video::MemoryBackend) keeps whole videos in memory and is
//! what the test suite runs against.

pub mod analysis;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod plot;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{ClipperError, Result},
    pipeline::{ActivityPipeline, PipelineReport},
};
