use image::imageops::FilterType;
use slidegrab_common::frame::Frame;

const NUM_BINS: usize = 64;
const DOWNSAMPLE_SIZE: u32 = 64;

/// Scores how different two frames of identical dimensions are.
///
/// Engines are pure: no state, no side effects. An engine defines its own
/// score space (bounded or not) and therefore also owns the question of
/// which thresholds make sense in that space.
pub trait SimilarityEngine: Send {
    /// Dissimilarity between `reference` and `candidate`. The identity
    /// value is 0: `difference(f, f)` must return it.
    fn difference(&self, reference: &Frame, candidate: &Frame) -> Result<f64, SimilarityError>;

    /// Whether `threshold` lies in this engine's valid score range.
    fn threshold_in_range(&self, threshold: f64) -> bool;

    /// Human-readable name for logging and config lookup.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimilarityError {
    #[error(
        "incompatible frame dimensions: reference is {expected_width}x{expected_height}, \
         candidate is {width}x{height}"
    )]
    IncompatibleFrames {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },
}

fn check_dimensions(reference: &Frame, candidate: &Frame) -> Result<(), SimilarityError> {
    if reference.dimensions() != candidate.dimensions() {
        let (expected_width, expected_height) = reference.dimensions();
        let (width, height) = candidate.dimensions();
        return Err(SimilarityError::IncompatibleFrames {
            expected_width,
            expected_height,
            width,
            height,
        });
    }
    Ok(())
}

/// Mean absolute grayscale difference, normalized to [0, 1].
///
/// Both frames are reduced to single-channel intensity at full resolution;
/// the score is the mean per-pixel absolute difference divided by 255.
/// Tolerant of single-pixel noise (a moving cursor barely registers) but
/// any broad content change moves the score well away from zero.
pub struct MeanAbsDiff;

impl SimilarityEngine for MeanAbsDiff {
    fn difference(&self, reference: &Frame, candidate: &Frame) -> Result<f64, SimilarityError> {
        check_dimensions(reference, candidate)?;

        let a = reference.to_luma();
        let b = candidate.to_luma();
        let pixels = a.pixels().len();
        if pixels == 0 {
            return Ok(0.0);
        }

        let total: u64 = a
            .pixels()
            .zip(b.pixels())
            .map(|(p, q)| (p.0[0] as i32 - q.0[0] as i32).unsigned_abs() as u64)
            .sum();

        Ok(total as f64 / (pixels as f64 * 255.0))
    }

    fn threshold_in_range(&self, threshold: f64) -> bool {
        threshold.is_finite() && (0.0..=1.0).contains(&threshold)
    }

    fn name(&self) -> &str {
        "mean-diff"
    }
}

/// Histogram-based engine for camera-recorded content.
///
/// Downsamples to 64x64 grayscale, computes a 64-bin normalized histogram,
/// then compares via chi-squared distance. The score is an unbounded
/// non-negative distance, not a [0, 1] ratio: it shrugs off exposure
/// flicker and compression noise that the pixel-wise metric would count.
pub struct HistogramChiSquared;

impl HistogramChiSquared {
    fn histogram(frame: &Frame) -> [f64; NUM_BINS] {
        let gray = frame
            .image()
            .resize_exact(DOWNSAMPLE_SIZE, DOWNSAMPLE_SIZE, FilterType::Nearest)
            .to_luma8();

        let mut bins = [0u64; NUM_BINS];
        let total_pixels = gray.pixels().len() as f64;

        for pixel in gray.pixels() {
            let bin = (pixel.0[0] as usize * NUM_BINS) / 256;
            bins[bin.min(NUM_BINS - 1)] += 1;
        }

        let mut hist = [0.0f64; NUM_BINS];
        for (i, &count) in bins.iter().enumerate() {
            hist[i] = count as f64 / total_pixels;
        }
        hist
    }

    /// Chi-squared distance between two histograms.
    fn chi_squared(a: &[f64; NUM_BINS], b: &[f64; NUM_BINS]) -> f64 {
        let mut sum = 0.0;
        for i in 0..NUM_BINS {
            let denom = a[i] + b[i];
            if denom > 1e-10 {
                let diff = a[i] - b[i];
                sum += (diff * diff) / denom;
            }
        }
        sum
    }
}

impl SimilarityEngine for HistogramChiSquared {
    fn difference(&self, reference: &Frame, candidate: &Frame) -> Result<f64, SimilarityError> {
        check_dimensions(reference, candidate)?;
        let a = Self::histogram(reference);
        let b = Self::histogram(candidate);
        Ok(Self::chi_squared(&a, &b))
    }

    fn threshold_in_range(&self, threshold: f64) -> bool {
        threshold.is_finite() && threshold >= 0.0
    }

    fn name(&self) -> &str {
        "histogram"
    }
}

/// Resolve a configured engine name to a boxed engine.
pub fn engine_by_name(name: &str) -> Option<Box<dyn SimilarityEngine>> {
    match name {
        "mean-diff" => Some(Box::new(MeanAbsDiff)),
        "histogram" => Some(Box::new(HistogramChiSquared)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};

    fn solid(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value]))),
            0,
        )
    }

    #[test]
    fn mean_diff_identity_is_zero() {
        let frame = solid(32, 32, 77);
        let score = MeanAbsDiff.difference(&frame, &frame).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn mean_diff_of_uniform_shift() {
        let a = solid(16, 16, 100);
        let b = solid(16, 16, 151);
        // |151 - 100| / 255 = 0.2 exactly.
        let score = MeanAbsDiff.difference(&a, &b).unwrap();
        assert!((score - 0.2).abs() < 1e-12);
    }

    #[test]
    fn mean_diff_monotone_in_shift() {
        let base = solid(16, 16, 100);
        let mut last = -1.0;
        for delta in [0u8, 5, 20, 80, 155] {
            let shifted = solid(16, 16, 100 + delta);
            let score = MeanAbsDiff.difference(&base, &shifted).unwrap();
            assert!(score >= last, "score regressed at delta {delta}");
            last = score;
        }
    }

    #[test]
    fn mean_diff_symmetric() {
        let a = solid(8, 8, 10);
        let b = solid(8, 8, 240);
        let ab = MeanAbsDiff.difference(&a, &b).unwrap();
        let ba = MeanAbsDiff.difference(&b, &a).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn mean_diff_rejects_dimension_mismatch() {
        let a = solid(8, 8, 0);
        let b = solid(8, 9, 0);
        let err = MeanAbsDiff.difference(&a, &b).unwrap_err();
        assert_eq!(
            err,
            SimilarityError::IncompatibleFrames {
                expected_width: 8,
                expected_height: 8,
                width: 8,
                height: 9,
            }
        );
    }

    #[test]
    fn mean_diff_threshold_range() {
        let engine = MeanAbsDiff;
        assert!(engine.threshold_in_range(0.0));
        assert!(engine.threshold_in_range(0.05));
        assert!(engine.threshold_in_range(1.0));
        assert!(!engine.threshold_in_range(1.5));
        assert!(!engine.threshold_in_range(-0.1));
        assert!(!engine.threshold_in_range(f64::NAN));
    }

    #[test]
    fn histogram_identity_is_zero() {
        let frame = solid(128, 128, 33);
        let score = HistogramChiSquared.difference(&frame, &frame).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn histogram_detects_intensity_change() {
        let a = solid(128, 128, 20);
        let b = solid(128, 128, 230);
        let score = HistogramChiSquared.difference(&a, &b).unwrap();
        assert!(score > 0.5, "disjoint histograms should score high, got {score}");
    }

    #[test]
    fn histogram_rejects_dimension_mismatch() {
        let a = solid(64, 64, 0);
        let b = solid(32, 32, 0);
        assert!(HistogramChiSquared.difference(&a, &b).is_err());
    }

    #[test]
    fn histogram_threshold_range_unbounded() {
        let engine = HistogramChiSquared;
        assert!(engine.threshold_in_range(0.0));
        assert!(engine.threshold_in_range(5.0));
        assert!(!engine.threshold_in_range(-1.0));
        assert!(!engine.threshold_in_range(f64::INFINITY));
    }

    #[test]
    fn engine_lookup() {
        assert_eq!(engine_by_name("mean-diff").unwrap().name(), "mean-diff");
        assert_eq!(engine_by_name("histogram").unwrap().name(), "histogram");
        assert!(engine_by_name("ssim").is_none());
    }
}
