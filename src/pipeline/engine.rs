use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    analysis::{ActivityAnalysis, Sampler, Segment, Segmenter, Threshold},
    config::Config,
    error::{ExportError, Result},
    export::{ClipExporter, ExportedClip},
    plot,
    video::{FfmpegBackend, VideoBackend, VideoMetadata},
};

/// Outcome of one pipeline run over one video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub source: PathBuf,
    pub metadata: VideoMetadata,
    pub sample_count: usize,
    pub threshold: Threshold,
    pub segments: Vec<Segment>,
    pub clips: Vec<ExportedClip>,

    /// Number of clips written
    pub segments_exported: usize,

    /// Sum of segment durations, boundary sample to boundary sample
    pub total_extracted_seconds: f64,

    pub plot_path: Option<PathBuf>,
    pub elapsed_seconds: f64,
}

impl PipelineReport {
    /// Write the report as pretty-printed JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|e| ExportError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Runs sampling, segmentation, plotting and clip export for one video
///
/// The pipeline follows a clear sequence:
/// 1. Sampling - score stride-spaced frames against each other
/// 2. Segmentation - threshold the series and find active runs
/// 3. Plot - render the activity distribution (optional)
/// 4. Export - cut every segment into its own file
pub struct ActivityPipeline {
    config: Config,
    backend: Box<dyn VideoBackend>,
}

impl ActivityPipeline {
    pub fn new(config: Config, backend: Box<dyn VideoBackend>) -> Self {
        Self { config, backend }
    }

    /// Pipeline backed by the ffmpeg binaries named in `config.video`
    pub fn with_ffmpeg(config: Config) -> Self {
        let backend = Box::new(FfmpegBackend::new(&config.video));
        Self::new(config, backend)
    }

    /// Process one video end to end
    pub fn run<P: AsRef<Path>>(&self, video_path: P) -> Result<PipelineReport> {
        let video_path = video_path.as_ref();
        let started = Instant::now();
        self.config.validate()?;

        info!("🎬 Starting activity scan");
        info!("   Video: {:?}", video_path);
        info!("   Backend: {}", self.backend.name());
        info!("   Stride: {} frames, k = {}",
              self.config.sampling.stride, self.config.segmentation.deviation_multiplier);

        // Steps 1 and 2
        let (metadata, analysis) = self.analyze(video_path)?;

        // Step 3
        let plot_path = self.render_plot(&analysis);

        // Step 4
        let clips = self.export_clips(video_path, &metadata, &analysis)?;

        let total_extracted_seconds = analysis.total_segment_duration();
        let elapsed_seconds = started.elapsed().as_secs_f64();

        info!("🎉 Scan complete in {:.1}s", elapsed_seconds);
        info!("   Clips written: {}", clips.len());
        info!("   Total extracted video time: {:.2} minutes", total_extracted_seconds / 60.0);

        Ok(PipelineReport {
            source: video_path.to_path_buf(),
            metadata,
            sample_count: analysis.samples.len(),
            threshold: analysis.threshold,
            segments_exported: clips.len(),
            segments: analysis.segments,
            clips,
            total_extracted_seconds,
            plot_path,
            elapsed_seconds,
        })
    }

    // ==========================================
    // STEPS 1-2: SAMPLING & SEGMENTATION
    // ==========================================

    /// Build the activity series and its segments without writing anything
    pub fn analyze(&self, video_path: &Path) -> Result<(VideoMetadata, ActivityAnalysis)> {
        info!("📈 Step 1: Sampling activity...");

        let mut source = self.backend.open(video_path)?;
        let metadata = source.metadata().clone();
        let samples = Sampler::from_config(&self.config.sampling).sample(source.as_mut());
        source.close();
        let samples = samples?;

        info!("   ✅ {} samples over {:.1}s", samples.len(),
              samples.last().map(|s| s.timestamp).unwrap_or(0.0));

        info!("✂️  Step 2: Segmenting...");
        let analysis = Segmenter::from_config(&self.config.segmentation).analyze(samples);
        for segment in &analysis.segments {
            if let Some((start, end)) = segment.time_range(&analysis.samples) {
                debug!("      Segment {}..={}: {:.1}s-{:.1}s",
                       segment.start_index, segment.end_index, start, end);
            }
        }

        Ok((metadata, analysis))
    }

    // ==========================================
    // STEP 3: ACTIVITY PLOT
    // ==========================================

    fn render_plot(&self, analysis: &ActivityAnalysis) -> Option<PathBuf> {
        if !self.config.plot.enabled {
            return None;
        }

        info!("📊 Step 3: Rendering activity plot...");
        match plot::save(analysis, &self.config.plot, &self.config.export.prefix) {
            Ok(path) => path,
            Err(e) => {
                warn!("Could not save activity plot: {}", e);
                None
            }
        }
    }

    // ==========================================
    // STEP 4: CLIP EXPORT
    // ==========================================

    fn export_clips(
        &self,
        video_path: &Path,
        metadata: &VideoMetadata,
        analysis: &ActivityAnalysis,
    ) -> Result<Vec<ExportedClip>> {
        info!("💾 Step 4: Exporting {} clips...", analysis.segments.len());

        let exporter = ClipExporter::new(self.backend.as_ref(), &self.config.export);
        exporter.export_segments(video_path, metadata.fps, &analysis.samples, &analysis.segments)
    }
}
