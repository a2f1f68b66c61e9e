//! Tone mapping: exposure, brightness and sigmoid contrast on the
//! lightness channel.
//!
//! The target interval is the palette's gray segment scaled inward by the
//! dynamic-range option. When exposure or brightness is absent, both are
//! estimated from the 5th and 95th percentiles of the lightness histogram:
//! the correction strength scales with how little the source range overlaps
//! the target.

use crate::color::Oklab;
use crate::options::Options;
use crate::palette::{GraySegment, Palette};
use crate::raster::Raster;

const HISTOGRAM_BINS: usize = 256;
const PERCENTILE_OUTLIER: f64 = 0.05;

/// The tone target: `[gray.lo * d, gray.hi * (2 - d)]` for dynamic range d.
/// d = 1 maps the target exactly onto the gray segment.
pub(crate) fn target_interval(gray: GraySegment, dynamic_range: f32) -> GraySegment {
    GraySegment {
        lo: gray.lo * dynamic_range,
        hi: gray.hi * (2.0 - dynamic_range),
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Lightness value at the given cumulative fraction of the histogram.
fn percentile(histogram: &[u32], total: usize, fraction: f64, lo: f32, bin_width: f32) -> f32 {
    let threshold = fraction * total as f64;
    let mut prefix = 0u64;
    for (bin, &count) in histogram.iter().enumerate() {
        prefix += count as u64;
        if prefix as f64 >= threshold {
            return lo + bin as f32 * bin_width;
        }
    }
    lo + histogram.len() as f32 * bin_width
}

/// Estimate exposure and brightness from the lightness histogram.
///
/// Fields the caller already fixed are respected; only absent ones are
/// estimated. The exact bin count does not affect correctness since only
/// percentiles are consumed.
pub(crate) fn auto_exposure_and_brightness(
    raster: &Raster<Oklab>,
    target: GraySegment,
    exposure: Option<f32>,
    brightness: Option<f32>,
) -> (f32, f32) {
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for pixel in raster.pixels() {
        lo = lo.min(pixel.l);
        hi = hi.max(pixel.l);
    }

    let bin_width = (hi - lo).max(f32::MIN_POSITIVE) / HISTOGRAM_BINS as f32;
    let mut histogram = [0u32; HISTOGRAM_BINS];
    for pixel in raster.pixels() {
        let bin = (((pixel.l - lo) / bin_width) as usize).min(HISTOGRAM_BINS - 1);
        histogram[bin] += 1;
    }

    let source = GraySegment {
        lo: percentile(&histogram, raster.len(), PERCENTILE_OUTLIER, lo, bin_width),
        hi: percentile(
            &histogram,
            raster.len(),
            1.0 - PERCENTILE_OUTLIER,
            lo,
            bin_width,
        ),
    };

    let overlap_range = (source.hi.min(target.hi) - source.lo.max(target.lo)).max(0.0);
    let overlap = overlap_range / target.range();

    // Full overlap: the image already fits the target, no correction.
    if overlap >= 1.0 {
        return (
            exposure.unwrap_or(Options::NO_EXPOSURE_CHANGE),
            brightness.unwrap_or(Options::NO_BRIGHTNESS_CHANGE),
        );
    }

    // Stretch the histogram toward the target range, but never by more than
    // 25%, then fade the correction out as the overlap grows.
    let exposure = exposure.unwrap_or_else(|| {
        lerp(
            (target.range() / source.range()).clamp(0.75, 1.25),
            Options::NO_EXPOSURE_CHANGE,
            overlap,
        )
    });

    // Shift toward whichever target boundary is nearer.
    let brightness = brightness.unwrap_or_else(|| {
        let shift_lo = target.lo - exposure * source.lo;
        let shift_hi = target.hi - exposure * source.hi;
        let shift = if shift_lo.abs() < shift_hi.abs() {
            shift_lo
        } else {
            shift_hi
        };
        lerp(shift, Options::NO_BRIGHTNESS_CHANGE, overlap)
    });

    (exposure, brightness)
}

/// Sigmoid remap of (-inf, inf) onto the target interval.
#[inline]
pub(crate) fn tone_map(l: f32, target: GraySegment, contrast: f32) -> f32 {
    target.lo + target.range() / (1.0 + (contrast * (target.midpoint() - l)).exp())
}

/// Apply exposure, brightness and the sigmoid tone map to the lightness
/// channel. The a and b channels pass through untouched.
pub(crate) fn adjust_lightness(raster: &mut Raster<Oklab>, palette: &Palette, options: &Options) {
    let target = target_interval(palette.gray_line(), options.dynamic_range);

    let (exposure, brightness) = match (options.exposure, options.brightness) {
        (Some(exposure), Some(brightness)) => (exposure, brightness),
        (exposure, brightness) => {
            auto_exposure_and_brightness(raster, target, exposure, brightness)
        }
    };

    for pixel in raster.pixels_mut() {
        let l = pixel.l * exposure + brightness;
        pixel.l = tone_map(l, target, options.contrast);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_raster(l: f32, width: usize, height: usize) -> Raster<Oklab> {
        Raster::new(width, height, Oklab::new(l, 0.0, 0.0))
    }

    fn gradient_raster(lo: f32, hi: f32, count: usize) -> Raster<Oklab> {
        let data: Vec<Oklab> = (0..count)
            .map(|i| Oklab::new(lo + (hi - lo) * i as f32 / (count - 1) as f32, 0.0, 0.0))
            .collect();
        Raster::from_vec(count, 1, data)
    }

    const TARGET: GraySegment = GraySegment { lo: 30.0, hi: 70.0 };

    #[test]
    fn test_target_interval_identity_at_full_dynamic_range() {
        let gray = GraySegment { lo: 25.0, hi: 75.0 };
        let target = target_interval(gray, 1.0);
        assert!((target.lo - gray.lo).abs() < 1e-6);
        assert!((target.hi - gray.hi).abs() < 1e-6);
    }

    #[test]
    fn test_target_interval_widens_below_one() {
        let gray = GraySegment { lo: 25.0, hi: 75.0 };
        let target = target_interval(gray, 0.9);
        assert!((target.lo - 22.5).abs() < 1e-4);
        assert!((target.hi - 82.5).abs() < 1e-4);
    }

    #[test]
    fn test_full_overlap_means_no_correction() {
        // Gradient spanning exactly the middle of the target: overlap >= 1
        // needs source to cover the whole target interval.
        let raster = gradient_raster(25.0, 75.0, 1000);
        let (exposure, brightness) =
            auto_exposure_and_brightness(&raster, TARGET, None, None);
        assert!(
            (exposure - 1.0).abs() < 1e-6,
            "expected no exposure change, got {}",
            exposure
        );
        assert!(
            brightness.abs() < 1e-6,
            "expected no brightness change, got {}",
            brightness
        );
    }

    #[test]
    fn test_dark_image_gets_positive_brightness() {
        // Entire image far below the target interval: zero overlap, full
        // correction strength.
        let raster = constant_raster(5.0, 32, 32);
        let (_, brightness) = auto_exposure_and_brightness(&raster, TARGET, None, None);
        assert!(
            brightness > 0.0,
            "dark image should be shifted up, got {}",
            brightness
        );
    }

    #[test]
    fn test_bright_image_gets_negative_brightness() {
        let raster = constant_raster(95.0, 32, 32);
        let (_, brightness) = auto_exposure_and_brightness(&raster, TARGET, None, None);
        assert!(
            brightness < 0.0,
            "bright image should be shifted down, got {}",
            brightness
        );
    }

    #[test]
    fn test_exposure_clamped_to_25_percent() {
        // A nearly flat histogram far outside the target: the stretch wants
        // to be huge but is clamped at 1.25 (zero overlap keeps it there).
        let raster = gradient_raster(0.0, 4.0, 1000);
        let (exposure, _) = auto_exposure_and_brightness(&raster, TARGET, None, None);
        assert!(
            exposure <= 1.25 + 1e-6,
            "exposure should be clamped, got {}",
            exposure
        );
        assert!(exposure >= 0.75 - 1e-6);
    }

    #[test]
    fn test_fixed_exposure_is_respected() {
        let raster = constant_raster(5.0, 16, 16);
        let (exposure, brightness) =
            auto_exposure_and_brightness(&raster, TARGET, Some(1.1), None);
        assert!((exposure - 1.1).abs() < 1e-6);
        // Brightness is still estimated against the fixed exposure
        assert!(brightness > 0.0);
    }

    #[test]
    fn test_tone_map_midpoint_and_limits() {
        let target = GraySegment { lo: 20.0, hi: 80.0 };
        let mid = tone_map(50.0, target, 0.1);
        assert!((mid - 50.0).abs() < 1e-4, "midpoint maps to midpoint");

        let low = tone_map(-1e4, target, 0.1);
        assert!((low - 20.0).abs() < 1e-3, "far-dark maps to target.lo");

        let high = tone_map(1e4, target, 0.1);
        assert!((high - 80.0).abs() < 1e-3, "far-bright maps to target.hi");
    }

    #[test]
    fn test_tone_map_is_monotonic() {
        let target = GraySegment { lo: 20.0, hi: 80.0 };
        let mut previous = f32::NEG_INFINITY;
        for i in 0..200 {
            let l = -50.0 + i as f32;
            let mapped = tone_map(l, target, 0.065);
            assert!(mapped >= previous, "tone map must be monotonic");
            previous = mapped;
        }
    }

    #[test]
    fn test_infinite_contrast_is_a_step_function() {
        // contrast -> inf: everything above the midpoint lands on target.hi,
        // everything below on target.lo.
        let target = GraySegment { lo: 20.0, hi: 80.0 };
        let contrast = 1e6;
        assert!((tone_map(50.1, target, contrast) - 80.0).abs() < 1e-4);
        assert!((tone_map(49.9, target, contrast) - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_adjust_lightness_leaves_chroma_untouched() {
        let palette = Palette::waveshare_7_color();
        let mut raster = Raster::new(4, 4, Oklab::new(55.0, 7.5, -3.25));
        let options = Options::default();
        adjust_lightness(&mut raster, &palette, &options);
        for pixel in raster.pixels() {
            assert!((pixel.a - 7.5).abs() < 1e-6, "a channel must pass through");
            assert!((pixel.b + 3.25).abs() < 1e-6, "b channel must pass through");
        }
    }

    #[test]
    fn test_adjust_lightness_lands_in_target() {
        let palette = Palette::waveshare_7_color();
        let target = target_interval(palette.gray_line(), 0.95);
        let mut raster = gradient_raster(0.0, 100.0, 256);
        let options = Options::default();
        adjust_lightness(&mut raster, &palette, &options);
        for pixel in raster.pixels() {
            assert!(
                pixel.l >= target.lo - 1e-3 && pixel.l <= target.hi + 1e-3,
                "tone-mapped lightness {} should lie in [{}, {}]",
                pixel.l,
                target.lo,
                target.hi
            );
        }
    }
}
