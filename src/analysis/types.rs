use serde::{Deserialize, Serialize};

/// One point of the activity series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Source frame the score was measured at
    pub frame_index: u64,

    /// Seconds from the start of the video
    pub timestamp: f64,

    /// Mean absolute pixel change against the previous sample's frame
    pub score: f64,
}

impl Sample {
    pub fn new(frame_index: u64, timestamp: f64, score: f64) -> Self {
        Self { frame_index, timestamp, score }
    }
}

/// Inclusive range of sample indices whose scores exceed the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start_index: usize,
    pub end_index: usize,
}

impl Segment {
    pub fn new(start_index: usize, end_index: usize) -> Self {
        Self { start_index, end_index }
    }

    /// `end_index - start_index`, the quantity compared against the minimum run length
    pub fn span(&self) -> usize {
        self.end_index - self.start_index
    }

    /// Number of samples covered
    pub fn sample_count(&self) -> usize {
        self.span() + 1
    }

    /// Timestamps of the boundary samples, if both exist
    pub fn time_range(&self, samples: &[Sample]) -> Option<(f64, f64)> {
        let start = samples.get(self.start_index)?;
        let end = samples.get(self.end_index)?;
        Some((start.timestamp, end.timestamp))
    }
}

/// Batch activity threshold: `mean + k * stddev` over the whole series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub mean: f64,
    pub std_dev: f64,
    pub deviation_multiplier: f64,
    pub value: f64,
}

/// Everything the sampling and segmentation passes produced for one video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityAnalysis {
    pub samples: Vec<Sample>,
    pub threshold: Threshold,
    pub segments: Vec<Segment>,
}

impl ActivityAnalysis {
    /// Total seconds covered by the segments, boundary sample to boundary sample
    pub fn total_segment_duration(&self) -> f64 {
        self.segments
            .iter()
            .filter_map(|segment| segment.time_range(&self.samples))
            .map(|(start, end)| end - start)
            .sum()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.samples.iter().map(|sample| sample.score).collect()
    }
}
