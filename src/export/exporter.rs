use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::types::{Sample, Segment};
use crate::config::ExportConfig;
use crate::error::{AnalysisError, ClipperError, ExportError, Result, VideoError};
use crate::export::naming::{ClipNamer, CollisionGuard};
use crate::video::source::{FrameSource, VideoBackend};
use crate::video::types::{time_to_frame, Frame, WriterParams};

/// One clip to cut: a time range mapped onto source frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    pub segment_index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub start_frame: u64,
    /// Inclusive
    pub end_frame: u64,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
}

impl ClipSpec {
    /// Frames the clip should contain if the source does not end early
    pub fn frame_count(&self) -> u64 {
        self.end_frame - self.start_frame + 1
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// A written clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedClip {
    pub spec: ClipSpec,
    pub frames_written: u64,
}

impl ExportedClip {
    /// Whether the source ran out before the requested end frame
    pub fn is_short(&self) -> bool {
        self.frames_written < self.spec.frame_count()
    }
}

/// Cuts segments out of a source video into standalone files
///
/// Every clip is read through its own freshly opened source handle, so clips
/// can be written concurrently without sharing a decoder.
pub struct ClipExporter<'a> {
    backend: &'a dyn VideoBackend,
    namer: ClipNamer,
    codec: String,
    workers: usize,
    disambiguate: bool,
}

impl<'a> ClipExporter<'a> {
    pub fn new(backend: &'a dyn VideoBackend, config: &ExportConfig) -> Self {
        Self {
            backend,
            namer: ClipNamer::from_config(config),
            codec: config.codec.clone(),
            workers: config.workers.max(1),
            disambiguate: config.disambiguate_collisions,
        }
    }

    /// Map segments onto frame ranges and output paths
    pub fn plan(
        &self,
        source_path: &Path,
        fps: f64,
        samples: &[Sample],
        segments: &[Segment],
    ) -> Result<Vec<ClipSpec>> {
        let mut guard = CollisionGuard::new(self.disambiguate);
        let mut specs = Vec::with_capacity(segments.len());

        for (segment_index, segment) in segments.iter().enumerate() {
            let (start_time, end_time) = segment.time_range(samples).ok_or(
                AnalysisError::SegmentOutOfRange {
                    start: segment.start_index,
                    end: segment.end_index,
                    len: samples.len(),
                },
            )?;

            let path = self.namer.clip_path(source_path, start_time, end_time)?;
            let (output_path, collided) = guard.claim(path, segment_index);
            if collided && self.disambiguate {
                warn!("Segment {} maps to an existing clip name, writing {}",
                      segment_index, output_path.display());
            } else if collided {
                warn!("Segment {} replaces an earlier clip at {}",
                      segment_index, output_path.display());
            }

            specs.push(ClipSpec {
                segment_index,
                start_time,
                end_time,
                start_frame: time_to_frame(start_time, fps),
                end_frame: time_to_frame(end_time, fps),
                source_path: source_path.to_path_buf(),
                output_path,
            });
        }

        if !self.disambiguate {
            specs = keep_last_per_path(specs);
        }
        Ok(specs)
    }

    /// Plan and write every segment
    pub fn export_segments(
        &self,
        source_path: &Path,
        fps: f64,
        samples: &[Sample],
        segments: &[Segment],
    ) -> Result<Vec<ExportedClip>> {
        let specs = self.plan(source_path, fps, samples, segments)?;
        self.export_all(&specs)
    }

    /// Write the given clips, concurrently when more than one worker is configured
    pub fn export_all(&self, specs: &[ClipSpec]) -> Result<Vec<ExportedClip>> {
        if specs.is_empty() {
            return Ok(Vec::new());
        }

        std::fs::create_dir_all(self.namer.dir()).map_err(|e| ExportError::WriteFailed {
            path: self.namer.dir().display().to_string(),
            reason: e.to_string(),
        })?;

        if self.workers <= 1 || specs.len() == 1 {
            return specs.iter().map(|spec| self.export_clip(spec)).collect();
        }

        info!("Exporting {} clips on {} workers", specs.len(), self.workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| ClipperError::generic(format!("Failed to start export workers: {}", e)))?;

        pool.install(|| specs.par_iter().map(|spec| self.export_clip(spec)).collect())
    }

    /// Write one clip: seek to its start frame and copy through the end frame
    ///
    /// The source ending first yields a short clip, not an error. Encoder and
    /// disk failures are returned.
    pub fn export_clip(&self, spec: &ClipSpec) -> Result<ExportedClip> {
        debug!("Clip {}: {:.2}s-{:.2}s, frames {}..={} -> {}",
               spec.segment_index, spec.start_time, spec.end_time,
               spec.start_frame, spec.end_frame, spec.output_path.display());

        let mut source = self.backend.open(&spec.source_path)?;
        let params = WriterParams::matching(source.metadata(), &self.codec);
        let mut sink = self.backend
            .create_writer(&spec.output_path, &params)
            .map_err(|e| write_failed(&spec.output_path, e))?;

        let frames_written = copy_range(source.as_mut(), spec, |frame| {
            sink.write_frame(frame).map_err(|e| write_failed(&spec.output_path, e))
        })?;

        sink.finish().map_err(|e| write_failed(&spec.output_path, e))?;
        source.close();

        let clip = ExportedClip { spec: spec.clone(), frames_written };
        if clip.is_short() {
            info!("Wrote {} ({} of {} frames, source ended early)",
                  spec.output_path.display(), frames_written, spec.frame_count());
        } else {
            info!("Wrote {} ({} frames)", spec.output_path.display(), frames_written);
        }
        Ok(clip)
    }

    /// Clip an explicit time range of `source_path` into `output_path`
    pub fn export_range(
        &self,
        source_path: &Path,
        start_time: f64,
        end_time: f64,
        output_path: &Path,
    ) -> Result<ExportedClip> {
        if !start_time.is_finite() || !end_time.is_finite() || start_time < 0.0 || end_time < start_time {
            return Err(ExportError::InvalidRange { start: start_time, end: end_time }.into());
        }

        let fps = {
            let source = self.backend.open(source_path)?;
            source.metadata().fps
        };

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ExportError::WriteFailed {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        self.export_clip(&ClipSpec {
            segment_index: 0,
            start_time,
            end_time,
            start_frame: time_to_frame(start_time, fps),
            end_frame: time_to_frame(end_time, fps),
            source_path: source_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
        })
    }
}

/// Drop every spec whose output path is claimed again by a later segment
///
/// Each remaining spec owns its file, so clips never share an encoder target
/// even when exported concurrently.
fn keep_last_per_path(specs: Vec<ClipSpec>) -> Vec<ClipSpec> {
    let last: HashMap<PathBuf, usize> = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| (spec.output_path.clone(), i))
        .collect();

    specs
        .into_iter()
        .enumerate()
        .filter(|(i, spec)| last.get(&spec.output_path) == Some(i))
        .map(|(_, spec)| spec)
        .collect()
}

/// Feed frames `start_frame..=end_frame` to `write`, returning how many were read
fn copy_range<F>(source: &mut dyn FrameSource, spec: &ClipSpec, mut write: F) -> Result<u64>
where
    F: FnMut(&Frame) -> Result<()>,
{
    let mut written = 0;
    let read_error = |position: u64, reason: &str| {
        warn!("Frame read failed at {} ({}), ending {} early",
              position, reason, spec.output_path.display());
    };

    match source.seek(spec.start_frame) {
        Ok(()) => {}
        Err(ClipperError::Video(VideoError::FrameRead { position, reason })) => {
            read_error(position, &reason);
            return Ok(0);
        }
        Err(e) => return Err(e),
    }

    for _ in spec.start_frame..=spec.end_frame {
        let frame = match source.read_next() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(ClipperError::Video(VideoError::FrameRead { position, reason })) => {
                read_error(position, &reason);
                break;
            }
            Err(e) => return Err(e),
        };
        write(&frame)?;
        written += 1;
    }

    Ok(written)
}

fn write_failed(path: &Path, error: ClipperError) -> ClipperError {
    ExportError::WriteFailed {
        path: path.display().to_string(),
        reason: error.to_string(),
    }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::memory::MemoryBackend;
    use tempfile::tempdir;

    /// Frame `i` carries its index in the first two channels
    fn indexed_frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::new_filled(2, 2, [(i % 256) as u8, (i / 256) as u8, 0]))
            .collect()
    }

    fn frame_index(frame: &Frame) -> usize {
        let bytes = frame.as_bytes();
        bytes[0] as usize + bytes[1] as usize * 256
    }

    /// One sample per second at 30 fps
    fn per_second_samples(n: usize) -> Vec<Sample> {
        (0..n).map(|i| Sample::new(i as u64 * 30, i as f64, 0.0)).collect()
    }

    fn export_config(dir: &Path) -> ExportConfig {
        ExportConfig {
            clip_dir: dir.to_path_buf(),
            prefix: "YH_".to_string(),
            ..ExportConfig::default()
        }
    }

    #[test]
    fn test_segment_maps_to_inclusive_frame_range() {
        let dir = tempdir().unwrap();
        let mut backend = MemoryBackend::new();
        backend.add_video("fish.mp4", 30.0, indexed_frames(900));

        let exporter = ClipExporter::new(&backend, &export_config(dir.path()));
        let clips = exporter
            .export_segments(Path::new("fish.mp4"), 30.0, &per_second_samples(30), &[Segment::new(10, 15)])
            .unwrap();

        assert_eq!(clips.len(), 1);
        let clip = &clips[0];
        assert_eq!((clip.spec.start_frame, clip.spec.end_frame), (300, 450));
        assert_eq!(clip.frames_written, 151);
        assert!(!clip.is_short());
        assert!(backend.seeks().contains(&(PathBuf::from("fish.mp4"), 300)));

        let written = backend.written();
        let output = &written[&clip.spec.output_path];
        assert!(output.finished);
        assert_eq!(output.frames.len(), 151);
        assert_eq!(frame_index(&output.frames[0]), 300);
        assert_eq!(frame_index(&output.frames[150]), 450);
        assert_eq!(output.params.fps, 30.0);
        assert_eq!((output.params.width, output.params.height), (2, 2));
    }

    #[test]
    fn test_output_path_uses_floored_times() {
        let dir = tempdir().unwrap();
        let mut backend = MemoryBackend::new();
        backend.add_video("data/fish.mp4", 30.0, indexed_frames(10));

        let samples = vec![
            Sample::new(0, 0.0, 0.0),
            Sample::new(37, 1.25, 0.0),
            Sample::new(74, 2.5, 0.0),
        ];
        let exporter = ClipExporter::new(&backend, &export_config(dir.path()));
        let specs = exporter
            .plan(Path::new("data/fish.mp4"), 30.0, &samples, &[Segment::new(1, 2)])
            .unwrap();

        assert_eq!(specs[0].output_path, dir.path().join("YH_").join("YH_fish_clip_1_2.mp4"));
        assert_eq!((specs[0].start_frame, specs[0].end_frame), (37, 75));
    }

    #[test]
    fn test_source_ending_early_gives_short_clip() {
        let dir = tempdir().unwrap();
        let mut backend = MemoryBackend::new();
        backend.add_video("fish.mp4", 30.0, indexed_frames(400));

        let exporter = ClipExporter::new(&backend, &export_config(dir.path()));
        let clips = exporter
            .export_segments(Path::new("fish.mp4"), 30.0, &per_second_samples(30), &[Segment::new(10, 15)])
            .unwrap();

        assert_eq!(clips[0].frames_written, 100);
        assert!(clips[0].is_short());
    }

    #[test]
    fn test_read_error_mid_clip_is_not_fatal() {
        let dir = tempdir().unwrap();
        let mut backend = MemoryBackend::new();
        backend.add_video("fish.mp4", 30.0, indexed_frames(900));
        backend.fail_reads_at("fish.mp4", 310);

        let exporter = ClipExporter::new(&backend, &export_config(dir.path()));
        let clips = exporter
            .export_segments(Path::new("fish.mp4"), 30.0, &per_second_samples(30), &[Segment::new(10, 15)])
            .unwrap();

        assert_eq!(clips[0].frames_written, 10);
    }

    #[test]
    fn test_write_failures_are_surfaced() {
        let dir = tempdir().unwrap();
        let mut backend = MemoryBackend::new();
        backend.add_video("fish.mp4", 30.0, indexed_frames(900));
        backend.fail_writes();

        let exporter = ClipExporter::new(&backend, &export_config(dir.path()));
        let err = exporter
            .export_segments(Path::new("fish.mp4"), 30.0, &per_second_samples(30), &[Segment::new(10, 15)])
            .unwrap_err();

        assert!(matches!(err, ClipperError::Export(ExportError::WriteFailed { .. })));
    }

    #[test]
    fn test_each_clip_gets_a_fresh_handle() {
        let dir = tempdir().unwrap();
        let mut backend = MemoryBackend::new();
        backend.add_video("fish.mp4", 30.0, indexed_frames(900));

        let exporter = ClipExporter::new(&backend, &export_config(dir.path()));
        exporter
            .export_segments(
                Path::new("fish.mp4"),
                30.0,
                &per_second_samples(30),
                &[Segment::new(2, 7), Segment::new(12, 18), Segment::new(22, 29)],
            )
            .unwrap();

        assert_eq!(backend.handle_counts(), (3, 3));
        assert_eq!(backend.written().len(), 3);
    }

    #[test]
    fn test_parallel_export_matches_sequential() {
        let dir = tempdir().unwrap();
        let mut backend = MemoryBackend::new();
        backend.add_video("fish.mp4", 30.0, indexed_frames(900));
        let segments = [Segment::new(2, 7), Segment::new(12, 18), Segment::new(22, 29)];

        let mut config = export_config(dir.path());
        config.workers = 3;
        let exporter = ClipExporter::new(&backend, &config);
        let clips = exporter
            .export_segments(Path::new("fish.mp4"), 30.0, &per_second_samples(30), &segments)
            .unwrap();

        let indices: Vec<usize> = clips.iter().map(|c| c.spec.segment_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        let frames: Vec<u64> = clips.iter().map(|c| c.frames_written).collect();
        assert_eq!(frames, vec![151, 181, 211]);
    }

    #[test]
    fn test_colliding_names_overwrite_or_disambiguate() {
        let dir = tempdir().unwrap();
        let mut backend = MemoryBackend::new();
        backend.add_video("fish.mp4", 30.0, indexed_frames(200));
        // Both segments floor to 1s..2s
        let samples: Vec<Sample> = (0..8)
            .map(|i| Sample::new(30 + i * 4, 1.0 + i as f64 * 0.125, 0.0))
            .collect();
        let segments = [Segment::new(0, 3), Segment::new(5, 7)];

        let exporter = ClipExporter::new(&backend, &export_config(dir.path()));
        let specs = exporter.plan(Path::new("fish.mp4"), 30.0, &samples, &segments).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].segment_index, 1);

        let mut config = export_config(dir.path());
        config.disambiguate_collisions = true;
        let exporter = ClipExporter::new(&backend, &config);
        let specs = exporter.plan(Path::new("fish.mp4"), 30.0, &samples, &segments).unwrap();
        assert_eq!(specs.len(), 2);
        assert_ne!(specs[0].output_path, specs[1].output_path);
        assert!(specs[1].output_path.to_string_lossy().ends_with("_clip_1_1_1.mp4"));
    }

    #[test]
    fn test_colliding_clip_holds_later_segment_with_parallel_workers() {
        let dir = tempdir().unwrap();
        let mut backend = MemoryBackend::new();
        backend.add_video("fish.mp4", 30.0, indexed_frames(200));
        let samples: Vec<Sample> = (0..8)
            .map(|i| Sample::new(30 + i * 4, 1.0 + i as f64 * 0.125, 0.0))
            .collect();
        let segments = [Segment::new(0, 3), Segment::new(5, 7)];

        let mut config = export_config(dir.path());
        config.workers = 2;
        let exporter = ClipExporter::new(&backend, &config);
        let clips = exporter
            .export_segments(Path::new("fish.mp4"), 30.0, &samples, &segments)
            .unwrap();

        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].spec.segment_index, 1);

        // 1.625s..=1.875s at 30 fps
        let written = backend.written();
        let output = &written[&clips[0].spec.output_path];
        assert_eq!(output.frames.len(), 9);
        assert_eq!(frame_index(&output.frames[0]), 48);
        assert_eq!(frame_index(&output.frames[8]), 56);
        assert_eq!(backend.handle_counts(), (1, 1));
    }

    #[test]
    fn test_export_range() {
        let dir = tempdir().unwrap();
        let mut backend = MemoryBackend::new();
        backend.add_video("fish.mp4", 30.0, indexed_frames(900));
        let output = dir.path().join("nested").join("range.mp4");

        let exporter = ClipExporter::new(&backend, &export_config(dir.path()));
        let clip = exporter.export_range(Path::new("fish.mp4"), 2.0, 3.0, &output).unwrap();

        assert_eq!((clip.spec.start_frame, clip.spec.end_frame), (60, 90));
        assert_eq!(clip.frames_written, 31);
        assert!(dir.path().join("nested").is_dir());

        assert!(exporter.export_range(Path::new("fish.mp4"), 5.0, 3.0, &output).is_err());
    }
}
