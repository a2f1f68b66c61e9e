//! Error-diffusion dithering over the palette vertices.
//!
//! Strictly sequential in row-major scan order: every pixel reads the
//! diffused contributions of earlier pixels. The kernel is plain
//! Floyd-Steinberg; a sigmoid of the error magnitude damps the diffusion of
//! very large errors so colors far outside the palette cannot smear across
//! the image.

use crate::color::Oklab;
use crate::palette::Palette;
use crate::raster::Raster;

/// Floyd-Steinberg weights: right, down-left, down, down-right.
const WEIGHT_RIGHT: f32 = 7.0 / 16.0;
const WEIGHT_DOWN_LEFT: f32 = 3.0 / 16.0;
const WEIGHT_DOWN: f32 = 5.0 / 16.0;
const WEIGHT_DOWN_RIGHT: f32 = 1.0 / 16.0;

/// Index of the nearest palette vertex by squared Euclidean distance.
pub fn nearest_vertex(palette: &Palette, lab: Oklab) -> usize {
    let mut best_index = 0;
    let mut best_distance = f32::INFINITY;
    for (index, &vertex) in palette.gamut_vertices().iter().enumerate() {
        let distance = lab.distance_squared(vertex);
        if distance < best_distance {
            best_distance = distance;
            best_index = index;
        }
    }
    best_index
}

/// Sigmoid damping factor for an error of the given magnitude.
///
/// Near 1 for small errors; shrinks as `eta * magnitude` crosses the knee.
/// `eta = 0` disables attenuation entirely (the exponent is -inf, so the
/// factor is exactly 1).
#[inline]
fn attenuation(eta: f32, magnitude: f32) -> f32 {
    1.0 / (1.0 + (eta * magnitude - 1.0 / eta - 4.0).exp())
}

#[inline]
fn add_scaled(pixel: &mut Oklab, delta: (f32, f32, f32), weight: f32) {
    pixel.l += delta.0 * weight;
    pixel.a += delta.1 * weight;
    pixel.b += delta.2 * weight;
}

/// Dither a clamped Oklab raster into palette indices.
///
/// Each pixel is replaced by its nearest palette vertex (so later pixels
/// see the committed value) and the damped residual is diffused to the
/// unprocessed Floyd-Steinberg neighbors, clipped at the raster edges.
/// `output` must hold at least `raster.len()` entries.
pub(crate) fn dither_raster(
    raster: &mut Raster<Oklab>,
    palette: &Palette,
    error_attenuation: f32,
    output: &mut [u8],
) {
    let width = raster.width();
    let height = raster.height();

    for y in 0..height {
        for x in 0..width {
            let old = raster.pixel(x, y);
            let index = nearest_vertex(palette, old);
            let committed = palette.gamut_vertices()[index];

            output[y * width + x] = index as u8;
            *raster.pixel_mut(x, y) = committed;

            let error = (
                old.l - committed.l,
                old.a - committed.a,
                old.b - committed.b,
            );
            let magnitude =
                (error.0 * error.0 + error.1 * error.1 + error.2 * error.2).sqrt();
            let damping = attenuation(error_attenuation, magnitude);
            let delta = (error.0 * damping, error.1 * damping, error.2 * damping);

            if x + 1 < width {
                add_scaled(raster.pixel_mut(x + 1, y), delta, WEIGHT_RIGHT);
            }
            if y + 1 < height {
                if x > 0 {
                    add_scaled(raster.pixel_mut(x - 1, y + 1), delta, WEIGHT_DOWN_LEFT);
                }
                add_scaled(raster.pixel_mut(x, y + 1), delta, WEIGHT_DOWN);
                if x + 1 < width {
                    add_scaled(raster.pixel_mut(x + 1, y + 1), delta, WEIGHT_DOWN_RIGHT);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waveshare() -> Palette {
        Palette::waveshare_7_color()
    }

    #[test]
    fn test_nearest_vertex_exact_match() {
        let palette = waveshare();
        for (index, &vertex) in palette.gamut_vertices().iter().enumerate() {
            assert_eq!(
                nearest_vertex(&palette, vertex),
                index,
                "a palette vertex must be its own nearest color"
            );
        }
    }

    #[test]
    fn test_attenuation_is_one_for_zero_eta() {
        for magnitude in [0.0, 1.0, 50.0, 1000.0] {
            let k = attenuation(0.0, magnitude);
            assert!(
                (k - 1.0).abs() < 1e-6,
                "eta = 0 must disable attenuation, got {} at magnitude {}",
                k,
                magnitude
            );
        }
    }

    #[test]
    fn test_attenuation_shrinks_for_large_errors() {
        let eta = 0.5;
        let small = attenuation(eta, 1.0);
        let large = attenuation(eta, 100.0);
        assert!(small > 0.9, "small errors should pass nearly unscathed");
        assert!(large < small, "large errors must be damped harder");
        assert!(large < 0.5);
    }

    #[test]
    fn test_attenuation_is_monotonically_decreasing() {
        let eta = 0.3;
        let mut previous = f32::INFINITY;
        for i in 0..100 {
            let k = attenuation(eta, i as f32);
            assert!(k <= previous);
            previous = k;
        }
    }

    #[test]
    fn test_all_indices_are_in_range() {
        let palette = waveshare();
        let mut raster = Raster::new(16, 16, Oklab::new(55.0, 2.0, 1.0));
        let mut output = vec![0u8; 256];
        dither_raster(&mut raster, &palette, 0.1, &mut output);
        for &index in &output {
            assert!(
                (index as usize) < palette.len(),
                "index {} out of range for palette of {}",
                index,
                palette.len()
            );
        }
    }

    #[test]
    fn test_single_pixel_raster() {
        // 1x1 must not touch any diffusion neighbor.
        let palette = waveshare();
        let mut raster = Raster::new(1, 1, Oklab::new(55.0, 2.0, 1.0));
        let mut output = vec![0u8; 1];
        dither_raster(&mut raster, &palette, 0.1, &mut output);
        assert!((output[0] as usize) < palette.len());
    }

    #[test]
    fn test_single_row_and_single_column() {
        let palette = waveshare();

        let mut row = Raster::new(8, 1, Oklab::new(55.0, 2.0, 1.0));
        let mut output = vec![0u8; 8];
        dither_raster(&mut row, &palette, 0.1, &mut output);

        let mut column = Raster::new(1, 8, Oklab::new(55.0, 2.0, 1.0));
        let mut output = vec![0u8; 8];
        dither_raster(&mut column, &palette, 0.1, &mut output);
    }

    #[test]
    fn test_pixels_are_overwritten_with_committed_colors() {
        let palette = waveshare();
        let mut raster = Raster::new(4, 4, Oklab::new(55.0, 2.0, 1.0));
        let mut output = vec![0u8; 16];
        dither_raster(&mut raster, &palette, 0.1, &mut output);
        for (pixel, &index) in raster.pixels().iter().zip(&output) {
            assert_eq!(
                *pixel,
                palette.gamut_vertices()[index as usize],
                "raster must hold the committed palette colors after dithering"
            );
        }
    }

    #[test]
    fn test_exact_palette_color_emits_single_index() {
        let palette = waveshare();
        let vertex = palette.gamut_vertices()[2];
        let mut raster = Raster::new(6, 6, vertex);
        let mut output = vec![0u8; 36];
        dither_raster(&mut raster, &palette, 0.1, &mut output);
        assert!(
            output.iter().all(|&i| i == 2),
            "a raster of an exact palette color must dither to that color only"
        );
    }

    #[test]
    fn test_dithering_is_deterministic() {
        let palette = waveshare();
        let pixels: Vec<Oklab> = (0..64)
            .map(|i| Oklab::new(40.0 + (i % 9) as f32 * 4.0, (i % 5) as f32, (i % 3) as f32))
            .collect();

        let mut first_raster = Raster::from_vec(8, 8, pixels.clone());
        let mut first = vec![0u8; 64];
        dither_raster(&mut first_raster, &palette, 0.1, &mut first);

        let mut second_raster = Raster::from_vec(8, 8, pixels);
        let mut second = vec![0u8; 64];
        dither_raster(&mut second_raster, &palette, 0.1, &mut second);

        assert_eq!(first, second);
    }

    #[test]
    fn test_error_diffusion_mixes_indices_for_in_between_colors() {
        // A mid-gray between the darkest and brightest gray-segment
        // endpoints cannot be represented exactly; diffusion must produce
        // more than one index over a large area.
        let palette = waveshare();
        let gray = palette.gray_line();
        let mid = Oklab::new(gray.midpoint(), 0.0, 0.0);
        let mut raster = Raster::new(32, 32, mid);
        let mut output = vec![0u8; 32 * 32];
        dither_raster(&mut raster, &palette, 0.1, &mut output);

        let first = output[0];
        assert!(
            output.iter().any(|&i| i != first),
            "mid-gray should dither into a mix of palette colors"
        );
    }
}
