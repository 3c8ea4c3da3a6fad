//! # Activity Analysis Module
//!
//! Measures how much a recording changes over time and finds the stretches
//! where it changes unusually much.
//!
//! - **Change estimation**: mean absolute pixel difference between two frames
//! - **Sampling**: stride-spaced scores over the whole video
//! - **Segmentation**: `mean + k * std` threshold and run detection
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use activity_clipper::analysis::{Sampler, Segmenter};
//! use activity_clipper::video::{FfmpegBackend, VideoBackend};
//! use activity_clipper::config::Config;
//!
//! # fn main() -> activity_clipper::Result<()> {
//! let config = Config::default();
//! let backend = FfmpegBackend::new(&config.video);
//! let mut source = backend.open(Path::new("recording.mp4"))?;
//!
//! let samples = Sampler::from_config(&config.sampling).sample(source.as_mut())?;
//! let analysis = Segmenter::from_config(&config.segmentation).analyze(samples);
//!
//! println!("Found {} active segments", analysis.segments.len());
//! # Ok(())
//! # }
//! ```

pub mod change;
pub mod sampler;
pub mod segmenter;
pub mod stats;
pub mod types;

pub use sampler::Sampler;
pub use segmenter::Segmenter;
pub use types::{ActivityAnalysis, Sample, Segment, Threshold};
