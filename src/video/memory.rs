//! In-memory video backend.
//!
//! Holds decoded frames per path and records everything written through its
//! sinks. The pipeline tests run against it in place of ffmpeg.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, VideoError};
use crate::video::source::{FrameSink, FrameSource, VideoBackend};
use crate::video::types::{Frame, VideoMetadata, WriterParams};

#[derive(Clone)]
struct MemoryVideo {
    metadata: VideoMetadata,
    frames: Arc<Vec<Frame>>,
    read_error_at: Option<u64>,
}

/// A finished (or in-progress) output recorded by a [`MemoryBackend`]
#[derive(Debug, Clone)]
pub struct WrittenVideo {
    pub params: WriterParams,
    pub frames: Vec<Frame>,
    pub finished: bool,
}

#[derive(Default)]
struct Recorder {
    written: HashMap<PathBuf, WrittenVideo>,
    seeks: Vec<(PathBuf, u64)>,
    opened: usize,
    closed: usize,
}

#[derive(Default)]
pub struct MemoryBackend {
    videos: HashMap<PathBuf, MemoryVideo>,
    recorder: Arc<Mutex<Recorder>>,
    fail_writes: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a video under `path`; all frames must share one size
    pub fn add_video<P: Into<PathBuf>>(&mut self, path: P, fps: f64, frames: Vec<Frame>) {
        let (width, height) = frames.first().map(Frame::dimensions).unwrap_or((0, 0));
        let metadata = VideoMetadata {
            fps,
            frame_count: frames.len() as u64,
            width,
            height,
        };
        self.videos.insert(
            path.into(),
            MemoryVideo { metadata, frames: Arc::new(frames), read_error_at: None },
        );
    }

    /// Make reads of `path` fail with a frame read error at `frame_index`
    pub fn fail_reads_at<P: AsRef<Path>>(&mut self, path: P, frame_index: u64) {
        if let Some(video) = self.videos.get_mut(path.as_ref()) {
            video.read_error_at = Some(frame_index);
        }
    }

    /// Make every sink reject frames
    pub fn fail_writes(&mut self) {
        self.fail_writes = true;
    }

    /// Outputs recorded so far, keyed by path
    pub fn written(&self) -> HashMap<PathBuf, WrittenVideo> {
        self.lock().written.clone()
    }

    /// Every seek issued against any source, in order
    pub fn seeks(&self) -> Vec<(PathBuf, u64)> {
        self.lock().seeks.clone()
    }

    /// (handles opened, handles closed)
    pub fn handle_counts(&self) -> (usize, usize) {
        let recorder = self.lock();
        (recorder.opened, recorder.closed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorder> {
        self.recorder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VideoBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        let video = self.videos.get(path).ok_or_else(|| VideoError::Open {
            path: path.display().to_string(),
            reason: "no such video".to_string(),
        })?;

        if video.metadata.frame_count == 0 {
            return Err(VideoError::Open {
                path: path.display().to_string(),
                reason: "video has no frames".to_string(),
            }.into());
        }

        self.lock().opened += 1;
        Ok(Box::new(MemorySource {
            path: path.to_path_buf(),
            video: video.clone(),
            position: 0,
            open: true,
            recorder: Arc::clone(&self.recorder),
        }))
    }

    fn create_writer(&self, path: &Path, params: &WriterParams) -> Result<Box<dyn FrameSink>> {
        self.lock().written.insert(
            path.to_path_buf(),
            WrittenVideo { params: params.clone(), frames: Vec::new(), finished: false },
        );
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            params: params.clone(),
            fail_writes: self.fail_writes,
            recorder: Arc::clone(&self.recorder),
        }))
    }
}

struct MemorySource {
    path: PathBuf,
    video: MemoryVideo,
    position: u64,
    open: bool,
    recorder: Arc<Mutex<Recorder>>,
}

impl FrameSource for MemorySource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn metadata(&self) -> &VideoMetadata {
        &self.video.metadata
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, frame_index: u64) -> Result<()> {
        self.recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .seeks
            .push((self.path.clone(), frame_index));
        self.position = frame_index;
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            return Ok(None);
        }

        if self.video.read_error_at == Some(self.position) {
            return Err(VideoError::FrameRead {
                position: self.position,
                reason: "injected read failure".to_string(),
            }.into());
        }

        let frame = usize::try_from(self.position)
            .ok()
            .and_then(|index| self.video.frames.get(index))
            .cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.recorder.lock().unwrap_or_else(PoisonError::into_inner).closed += 1;
        }
    }
}

impl Drop for MemorySource {
    fn drop(&mut self) {
        self.close();
    }
}

struct MemorySink {
    path: PathBuf,
    params: WriterParams,
    fail_writes: bool,
    recorder: Arc<Mutex<Recorder>>,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != (self.params.width, self.params.height) {
            return Err(VideoError::DimensionMismatch {
                expected: (self.params.width, self.params.height),
                actual: frame.dimensions(),
            }.into());
        }

        if self.fail_writes {
            return Err(VideoError::Encoding {
                reason: format!("{}: disk full", self.path.display()),
            }.into());
        }

        let mut recorder = self.recorder.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(output) = recorder.written.get_mut(&self.path) {
            output.frames.push(frame.clone());
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut recorder = self.recorder.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(output) = recorder.written.get_mut(&self.path) {
            output.finished = true;
        }
        Ok(())
    }
}
