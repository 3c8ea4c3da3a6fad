use rayon::prelude::*;

use crate::error::{Result, VideoError};
use crate::video::types::Frame;

// Bytes per rayon work item
const CHUNK_BYTES: usize = 16 * 1024;

/// Mean absolute per-pixel, per-channel difference between two frames
///
/// Partial sums are integers, so the result does not depend on how the work
/// is split. Frames of different sizes are rejected.
pub fn score(a: &Frame, b: &Frame) -> Result<f64> {
    if a.dimensions() != b.dimensions() {
        return Err(VideoError::DimensionMismatch {
            expected: a.dimensions(),
            actual: b.dimensions(),
        }.into());
    }

    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.is_empty() {
        return Ok(0.0);
    }

    let total: u64 = a
        .par_chunks(CHUNK_BYTES)
        .zip(b.par_chunks(CHUNK_BYTES))
        .map(|(x, y)| {
            x.iter()
                .zip(y)
                .map(|(&p, &q)| u64::from(p.abs_diff(q)))
                .sum::<u64>()
        })
        .sum();

    Ok(total as f64 / a.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_frames_score_zero() {
        let frame = Frame::new_filled(64, 48, [12, 200, 77]);
        assert_eq!(score(&frame, &frame.clone()).unwrap(), 0.0);
    }

    #[test]
    fn test_uniform_difference() {
        let a = Frame::new_filled(8, 8, [10, 10, 10]);
        let b = Frame::new_filled(8, 8, [40, 0, 10]);
        // (30 + 10 + 0) / 3 per pixel
        let s = score(&a, &b).unwrap();
        assert!((s - 40.0 / 3.0).abs() < 1e-9);
        assert_eq!(s, score(&b, &a).unwrap());
    }

    #[test]
    fn test_partial_change_is_averaged_over_all_pixels() {
        let a = Frame::new_black(10, 10);
        let mut b = Frame::new_black(10, 10);
        for x in 0..10 {
            b.set_pixel(x, 0, [255, 255, 255]);
        }
        // One row of ten fully changed pixels out of a hundred
        assert!((score(&a, &b).unwrap() - 25.5).abs() < 1e-9);
    }

    #[test]
    fn test_large_frames_match_sequential_sum() {
        let a = Frame::new_filled(640, 360, [0, 0, 0]);
        let b = Frame::new_filled(640, 360, [1, 2, 3]);
        assert!((score(&a, &b).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let a = Frame::new_black(4, 4);
        let b = Frame::new_black(4, 5);
        let err = score(&a, &b).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ClipperError::Video(VideoError::DimensionMismatch { .. })
        ));
    }
}
