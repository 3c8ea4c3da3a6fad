use tracing::{debug, info, warn};

use crate::analysis::change;
use crate::analysis::types::Sample;
use crate::config::SamplingConfig;
use crate::error::{AnalysisError, ClipperError, Result, VideoError};
use crate::video::source::FrameSource;

/// Builds the activity series by scoring frames a fixed stride apart
///
/// Each score compares the frame at the current position with the frame at
/// the previous *sampled* position, not the physically preceding frame, so a
/// stride of 150 at 30 fps measures change over five seconds.
#[derive(Debug, Clone)]
pub struct Sampler {
    stride: u64,
    end_time: Option<f64>,
}

impl Sampler {
    pub fn new(stride: u64, end_time: Option<f64>) -> Self {
        Self { stride, end_time }
    }

    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(config.stride, config.end_time)
    }

    /// Scan the source from frame 0 to the end time (or end of stream)
    ///
    /// An unreadable first frame is an open error. Any later read failure
    /// ends the series; the samples gathered so far are returned.
    pub fn sample(&self, source: &mut dyn FrameSource) -> Result<Vec<Sample>> {
        if self.stride == 0 {
            return Err(AnalysisError::InvalidParameters {
                details: "stride must be at least 1".to_string(),
            }.into());
        }

        let metadata = source.metadata().clone();
        let end_time = self.end_time.unwrap_or_else(|| metadata.duration());
        // The stream may end long before a caller-supplied end time
        let frames_to_scan = (end_time * metadata.fps).min(metadata.frame_count as f64);
        let expected = (frames_to_scan / self.stride as f64).floor().max(0.0) as usize;

        info!("Sampling every {} frames up to {:.1}s (~{} samples)",
              self.stride, end_time, expected);

        source.seek(0)?;
        let mut previous = match source.read_next() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Err(first_frame_error(source, "stream ended before the first frame")),
            Err(e) => return Err(first_frame_error(source, &e.to_string())),
        };

        let mut samples = Vec::with_capacity(expected);
        let mut counter: u64 = 0;

        loop {
            counter = match counter.checked_add(self.stride) {
                Some(next) => next,
                None => break,
            };

            let timestamp = counter as f64 / metadata.fps;
            if timestamp > end_time {
                debug!("Reached end time {:.1}s", end_time);
                break;
            }

            let read = source.seek(counter).and_then(|()| source.read_next());
            let frame = match read {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!("End of stream at frame {}", counter);
                    break;
                }
                Err(ClipperError::Video(VideoError::FrameRead { position, reason })) => {
                    warn!("Frame read failed at {} ({}), ending sampling early", position, reason);
                    break;
                }
                Err(e) => return Err(e),
            };

            let score = change::score(&previous, &frame)?;
            samples.push(Sample::new(counter, timestamp, score));
            previous = frame;

            if samples.len() % 100 == 0 {
                info!("Processed {} frames ({} samples, {:.1}s)", counter, samples.len(), timestamp);
            }
        }

        info!("Sampling complete: {} samples", samples.len());
        Ok(samples)
    }
}

fn first_frame_error(source: &dyn FrameSource, reason: &str) -> ClipperError {
    VideoError::Open {
        path: source.path().display().to_string(),
        reason: format!("could not read first frame: {}", reason),
    }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::memory::MemoryBackend;
    use crate::video::source::VideoBackend;
    use crate::video::types::Frame;
    use std::path::Path;

    /// Frame `i` is filled with gray level `levels[i]`
    fn backend_with_levels(levels: &[u8]) -> MemoryBackend {
        let frames = levels.iter().map(|&l| Frame::new_filled(4, 4, [l, l, l])).collect();
        let mut backend = MemoryBackend::new();
        backend.add_video("clip.mp4", 10.0, frames);
        backend
    }

    #[test]
    fn test_samples_are_stride_spaced() {
        let backend = backend_with_levels(&[0; 50]);
        let mut source = backend.open(Path::new("clip.mp4")).unwrap();

        let samples = Sampler::new(10, None).sample(source.as_mut()).unwrap();

        let frames: Vec<u64> = samples.iter().map(|s| s.frame_index).collect();
        assert_eq!(frames, vec![10, 20, 30, 40]);
        let times: Vec<f64> = samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(samples.iter().all(|s| s.score == 0.0));
    }

    #[test]
    fn test_scores_compare_against_previous_sample() {
        // Frames 1 and 3 differ but are never sampled with stride 2
        let backend = backend_with_levels(&[0, 90, 10, 90, 40, 0, 0]);
        let mut source = backend.open(Path::new("clip.mp4")).unwrap();

        let samples = Sampler::new(2, None).sample(source.as_mut()).unwrap();

        let scores: Vec<f64> = samples.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![10.0, 30.0, 40.0]);
    }

    #[test]
    fn test_end_time_bounds_the_series() {
        let backend = backend_with_levels(&[0; 100]);
        let mut source = backend.open(Path::new("clip.mp4")).unwrap();

        let samples = Sampler::new(5, Some(2.0)).sample(source.as_mut()).unwrap();

        assert_eq!(samples.last().map(|s| s.timestamp), Some(2.0));
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let backend = backend_with_levels(&[7; 95]);
        let mut source = backend.open(Path::new("clip.mp4")).unwrap();

        let samples = Sampler::new(3, None).sample(source.as_mut()).unwrap();

        assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_read_failure_mid_stream_keeps_partial_series() {
        let mut backend = backend_with_levels(&[0; 60]);
        backend.fail_reads_at("clip.mp4", 30);
        let mut source = backend.open(Path::new("clip.mp4")).unwrap();

        let samples = Sampler::new(10, None).sample(source.as_mut()).unwrap();

        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_unreadable_first_frame_is_open_error() {
        let mut backend = backend_with_levels(&[0; 10]);
        backend.fail_reads_at("clip.mp4", 0);
        let mut source = backend.open(Path::new("clip.mp4")).unwrap();

        let err = Sampler::new(2, None).sample(source.as_mut()).unwrap_err();
        assert!(err.is_open_failure());
        assert!(err.user_message().contains("clip.mp4"));
    }

    #[test]
    fn test_end_time_past_the_stream_stops_at_end_of_stream() {
        let frames = (0..20).map(|_| Frame::new_black(4, 4)).collect();
        let mut backend = MemoryBackend::new();
        backend.add_video("clip.mp4", 30.0, frames);
        let mut source = backend.open(Path::new("clip.mp4")).unwrap();

        let samples = Sampler::new(1, Some(1e12)).sample(source.as_mut()).unwrap();
        assert_eq!(samples.len(), 19);

        source.seek(0).unwrap();
        let samples = Sampler::new(1, Some(f64::INFINITY)).sample(source.as_mut()).unwrap();
        assert_eq!(samples.len(), 19);
    }

    #[test]
    fn test_zero_stride_is_rejected() {
        let backend = backend_with_levels(&[0; 10]);
        let mut source = backend.open(Path::new("clip.mp4")).unwrap();
        assert!(Sampler::new(0, None).sample(source.as_mut()).is_err());
    }
}
