//! # Video Module
//!
//! Frame sources (decoders), frame sinks (encoders) and the backends that
//! create them.

pub mod types;
pub mod source;
pub mod ffmpeg;
pub mod memory;

pub use types::{time_to_frame, Frame, VideoMetadata, WriterParams};
pub use source::{FrameSink, FrameSource, VideoBackend};
pub use ffmpeg::FfmpegBackend;
pub use memory::MemoryBackend;
