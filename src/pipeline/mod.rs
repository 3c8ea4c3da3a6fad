//! # Activity Pipeline
//!
//! Runs sampling, segmentation, plotting and export for a single video and
//! reports what was written.

pub mod engine;

// Re-exports for convenience
pub use engine::{ActivityPipeline, PipelineReport};
