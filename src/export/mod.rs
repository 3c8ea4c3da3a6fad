//! # Clip Export Module
//!
//! Maps activity segments back onto source frames and writes each one out as
//! its own video file.

pub mod exporter;
pub mod naming;

pub use exporter::{ClipExporter, ClipSpec, ExportedClip};
pub use naming::{ClipNamer, CollisionGuard};
