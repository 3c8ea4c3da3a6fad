use std::path::Path;

use crate::error::Result;
use crate::video::types::{Frame, VideoMetadata, WriterParams};

/// An exclusively owned, seekable decoder for one video file
///
/// Handles are opened per pass: the sampler seeks around, the exporter reads
/// contiguous ranges, and each gets its own. Implementations release their
/// decoder in `close` and again on drop; calling `close` twice is fine.
pub trait FrameSource {
    /// File this handle decodes
    fn path(&self) -> &Path;

    fn metadata(&self) -> &VideoMetadata;

    /// Index of the frame the next `read_next` will return
    fn position(&self) -> u64;

    /// Position the next read at `frame_index`
    ///
    /// For compressed formats this may land on a nearby frame; callers must
    /// not rely on exact alignment.
    fn seek(&mut self, frame_index: u64) -> Result<()>;

    /// Decode the next frame, `Ok(None)` at end of stream
    fn read_next(&mut self) -> Result<Option<Frame>>;

    fn close(&mut self);
}

/// An encoder writing frames into one output file
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the output, reporting encoder failure
    fn finish(&mut self) -> Result<()>;
}

/// Opens decoders and creates encoders
///
/// `Send + Sync` so the exporter can hand one backend to several workers,
/// each opening its own handles.
pub trait VideoBackend: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>>;

    fn create_writer(&self, path: &Path, params: &WriterParams) -> Result<Box<dyn FrameSink>>;
}
