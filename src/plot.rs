//! Activity plot: score histogram on the left, score over time on the right.

use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb, RgbImage};
use tracing::info;

use crate::analysis::types::{ActivityAnalysis, Sample};
use crate::config::PlotConfig;
use crate::error::{ExportError, Result};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const HISTOGRAM: Rgb<u8> = Rgb([90, 110, 230]);
const SERIES: Rgb<u8> = Rgb([210, 40, 40]);
const THRESHOLD: Rgb<u8> = Rgb([30, 160, 60]);
const MARGIN: u32 = 40;

/// Pixel rectangle a panel draws into
#[derive(Debug, Clone, Copy)]
struct Area {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Area {
    fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Map a 0..=1 fraction up the panel onto a row
    fn row(&self, fraction: f64) -> u32 {
        let fraction = fraction.clamp(0.0, 1.0);
        self.bottom() - (fraction * self.height as f64).round() as u32
    }

    fn column(&self, fraction: f64) -> u32 {
        let fraction = fraction.clamp(0.0, 1.0);
        self.x + (fraction * self.width as f64).round() as u32
    }
}

/// Count scores into `bins` equal-width bins spanning min..=max
pub fn histogram(scores: &[f64], bins: usize) -> Vec<usize> {
    let mut counts = vec![0; bins.max(1)];
    let (min, max) = bounds(scores.iter().copied());
    let width = max - min;

    for &score in scores {
        let bin = if width > 0.0 {
            (((score - min) / width) * counts.len() as f64) as usize
        } else {
            0
        };
        let last = counts.len() - 1;
        counts[bin.min(last)] += 1;
    }
    counts
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min.is_finite() { (min, max) } else { (0.0, 0.0) }
}

/// Render the two-panel plot into an image
pub fn render(analysis: &ActivityAnalysis, config: &PlotConfig) -> RgbImage {
    let mut image = ImageBuffer::from_pixel(config.width, config.height, BACKGROUND);
    let panel_width = config.width.saturating_sub(3 * MARGIN) / 2;
    let panel_height = config.height.saturating_sub(2 * MARGIN);

    let left = Area { x: MARGIN, y: MARGIN, width: panel_width, height: panel_height };
    let right = Area { x: 2 * MARGIN + panel_width, y: MARGIN, width: panel_width, height: panel_height };

    let scores = analysis.scores();
    draw_histogram(&mut image, left, &histogram(&scores, config.bins));
    draw_series(&mut image, right, &analysis.samples, analysis.threshold.value);
    draw_axes(&mut image, left);
    draw_axes(&mut image, right);
    image
}

/// Render and save as `<dir>/<prefix><filename>`; `None` for an empty series
pub fn save(analysis: &ActivityAnalysis, config: &PlotConfig, prefix: &str) -> Result<Option<PathBuf>> {
    if analysis.samples.is_empty() {
        info!("No samples, skipping activity plot");
        return Ok(None);
    }

    std::fs::create_dir_all(&config.dir).map_err(|e| write_failed(&config.dir, e))?;
    let path = config.dir.join(format!("{}{}", prefix, config.filename));

    render(analysis, config)
        .save(&path)
        .map_err(|e| write_failed(&path, e))?;

    info!("Saved activity plot to {}", path.display());
    Ok(Some(path))
}

fn write_failed(path: &Path, error: impl std::fmt::Display) -> ExportError {
    ExportError::WriteFailed {
        path: path.display().to_string(),
        reason: error.to_string(),
    }
}

fn draw_histogram(image: &mut RgbImage, area: Area, counts: &[usize]) {
    let peak = counts.iter().copied().max().unwrap_or(0).max(1) as f64;
    let bar_width = area.width as f64 / counts.len().max(1) as f64;

    for fraction in [0.25, 0.5, 0.75, 1.0] {
        hline(image, area.x, area.x + area.width, area.row(fraction), GRID);
    }

    for (i, &count) in counts.iter().enumerate() {
        let x0 = area.x + (i as f64 * bar_width).round() as u32;
        let x1 = (area.x + ((i + 1) as f64 * bar_width).round() as u32).saturating_sub(1).max(x0);
        let top = area.row(count as f64 / peak);
        for x in x0..=x1 {
            vline(image, x, top, area.bottom(), HISTOGRAM);
        }
    }
}

fn draw_series(image: &mut RgbImage, area: Area, samples: &[Sample], threshold: f64) {
    let (t_min, t_max) = bounds(samples.iter().map(|s| s.timestamp));
    let (_, s_max) = bounds(samples.iter().map(|s| s.score).chain([threshold].into_iter().filter(|t| t.is_finite())));
    let t_span = (t_max - t_min).max(f64::EPSILON);
    let s_span = s_max.max(f64::EPSILON);

    for fraction in [0.25, 0.5, 0.75, 1.0] {
        hline(image, area.x, area.x + area.width, area.row(fraction), GRID);
    }

    if threshold.is_finite() {
        hline(image, area.x, area.x + area.width, area.row(threshold / s_span), THRESHOLD);
    }

    let points: Vec<(u32, u32)> = samples
        .iter()
        .map(|s| (area.column((s.timestamp - t_min) / t_span), area.row(s.score / s_span)))
        .collect();

    for pair in points.windows(2) {
        line(image, pair[0], pair[1], SERIES);
    }
    if let [only] = points.as_slice() {
        put(image, only.0, only.1, SERIES);
    }
}

fn draw_axes(image: &mut RgbImage, area: Area) {
    hline(image, area.x, area.x + area.width, area.bottom(), AXIS);
    vline(image, area.x, area.y, area.bottom(), AXIS);
}

fn put(image: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, color);
    }
}

fn hline(image: &mut RgbImage, x0: u32, x1: u32, y: u32, color: Rgb<u8>) {
    for x in x0..=x1 {
        put(image, x, y, color);
    }
}

fn vline(image: &mut RgbImage, x: u32, y0: u32, y1: u32, color: Rgb<u8>) {
    for y in y0.min(y1)..=y0.max(y1) {
        put(image, x, y, color);
    }
}

// Bresenham
fn line(image: &mut RgbImage, from: (u32, u32), to: (u32, u32), color: Rgb<u8>) {
    let (mut x, mut y) = (from.0 as i64, from.1 as i64);
    let (x1, y1) = (to.0 as i64, to.1 as i64);
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put(image, x as u32, y as u32, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Segmenter;
    use tempfile::tempdir;

    fn burst_analysis() -> ActivityAnalysis {
        let samples = (0..100)
            .map(|i| {
                let score = if (40..=46).contains(&i) { 100.0 } else { 0.0 };
                Sample::new(i * 150, i as f64 * 5.0, score)
            })
            .collect();
        Segmenter::default().analyze(samples)
    }

    #[test]
    fn test_histogram_counts_every_score() {
        let counts = histogram(&[0.0, 0.0, 5.0, 10.0], 2);
        assert_eq!(counts, vec![2, 2]);

        let counts = histogram(&[3.0; 7], 50);
        assert_eq!(counts.iter().sum::<usize>(), 7);
        assert_eq!(counts[0], 7);
    }

    #[test]
    fn test_render_draws_both_panels() {
        let config = PlotConfig::default();
        let image = render(&burst_analysis(), &config);

        assert_eq!(image.dimensions(), (config.width, config.height));
        let has = |color: Rgb<u8>| image.pixels().any(|p| *p == color);
        assert!(has(HISTOGRAM));
        assert!(has(SERIES));
        assert!(has(THRESHOLD));
    }

    #[test]
    fn test_render_tolerates_images_smaller_than_the_margins() {
        for (width, height) in [(100, 60), (10, 10), (1, 1)] {
            let config = PlotConfig { width, height, ..PlotConfig::default() };
            let image = render(&burst_analysis(), &config);
            assert_eq!(image.dimensions(), (width, height));
        }
    }

    #[test]
    fn test_save_writes_prefixed_png() {
        let dir = tempdir().unwrap();
        let config = PlotConfig { dir: dir.path().to_path_buf(), ..PlotConfig::default() };

        let path = save(&burst_analysis(), &config, "YH_").unwrap().unwrap();

        assert_eq!(path, dir.path().join("YH_avg_pixel_change_plot.png"));
        assert!(path.is_file());
    }

    #[test]
    fn test_empty_series_has_no_plot() {
        let dir = tempdir().unwrap();
        let config = PlotConfig { dir: dir.path().join("plots"), ..PlotConfig::default() };
        let analysis = Segmenter::default().analyze(Vec::new());

        assert_eq!(save(&analysis, &config, "YH_").unwrap(), None);
        assert!(!dir.path().join("plots").exists());
    }
}
