use tracing::{debug, info};

use crate::analysis::stats;
use crate::analysis::types::{ActivityAnalysis, Sample, Segment};
use crate::config::SegmentationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Outside,
    Inside { start: usize },
}

/// Turns an activity series into above-threshold segments
///
/// Interior runs must satisfy `end - start > min_run_length` or they are
/// dropped as noise. A run still open when the series ends is always kept,
/// however short.
#[derive(Debug, Clone)]
pub struct Segmenter {
    deviation_multiplier: f64,
    min_run_length: usize,
}

impl Segmenter {
    pub fn new(deviation_multiplier: f64, min_run_length: usize) -> Self {
        Self { deviation_multiplier, min_run_length }
    }

    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::new(config.deviation_multiplier, config.min_run_length)
    }

    /// Threshold the whole series, then scan it
    pub fn analyze(&self, samples: Vec<Sample>) -> ActivityAnalysis {
        let scores: Vec<f64> = samples.iter().map(|s| s.score).collect();
        let threshold = stats::threshold(&scores, self.deviation_multiplier);
        let segments = self.segment_scores(&scores, threshold.value);

        info!("Threshold {:.3} (mean {:.3} + {} x std {:.3}): {} segments from {} samples",
              threshold.value, threshold.mean, threshold.deviation_multiplier,
              threshold.std_dev, segments.len(), samples.len());

        ActivityAnalysis { samples, threshold, segments }
    }

    /// Two-state scan over `scores` against a fixed threshold
    pub fn segment_scores(&self, scores: &[f64], threshold: f64) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut state = RunState::Outside;

        for (i, &score) in scores.iter().enumerate() {
            state = match state {
                RunState::Outside if score > threshold => RunState::Inside { start: i },
                RunState::Outside => RunState::Outside,
                RunState::Inside { start } if score > threshold => RunState::Inside { start },
                RunState::Inside { start } => {
                    let run = Segment::new(start, i - 1);
                    if run.span() > self.min_run_length {
                        segments.push(run);
                    } else {
                        debug!("Discarding short run {}..={}", run.start_index, run.end_index);
                    }
                    RunState::Outside
                }
            };
        }

        if let RunState::Inside { start } = state {
            segments.push(Segment::new(start, scores.len() - 1));
        }

        segments
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::from_config(&SegmentationConfig::default())
    }
}
