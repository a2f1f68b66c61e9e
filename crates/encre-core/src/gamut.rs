//! Hue-preserving gamut clamping.
//!
//! Out-of-gamut pixels are projected onto the hull along the direction
//! toward an achromatic target point chosen by Ottosson's adaptive,
//! hue-independent formula: low-chroma pixels desaturate toward gray while
//! saturated pixels trade lightness to keep chroma.
//!
//! The routine is a pure function of (palette, alpha, pixel) and is
//! data-parallel across rows.

use rayon::prelude::*;

use crate::color::Oklab;
use crate::palette::Palette;
use crate::raster::Raster;

const EPSILON: f64 = 1e-5;

/// Whether a color sits inside the gamut (within tolerance).
pub fn is_inside_gamut(palette: &Palette, lab: Oklab) -> bool {
    palette.gamut_planes().iter().all(|plane| {
        let d = plane.normal[0] as f64 * lab.l as f64
            + plane.normal[1] as f64 * lab.a as f64
            + plane.normal[2] as f64 * lab.b as f64
            + plane.offset as f64;
        d < EPSILON
    })
}

/// Achromatic projection target (L_t, 0, 0) for the adaptive,
/// hue-independent clamp.
///
/// The lightness is normalized across the gray segment; the further it sits
/// from the middle and the more chroma the pixel carries (weighted by
/// alpha), the closer the target stays to the pixel's own lightness.
fn clamp_target(palette: &Palette, alpha: f64, l: f64, chroma: f64) -> [f64; 3] {
    let gray = palette.gray_line();
    let range = (gray.hi - gray.lo) as f64;

    let l_norm = (l - gray.lo as f64) / range;
    let l_diff = l_norm - 0.5;
    let e1 = 0.5 + l_diff.abs() + alpha * chroma * 0.01;
    let l_target = (1.0
        + l_diff.signum() * (e1 - (e1 * e1 - 2.0 * l_diff.abs()).max(0.0).sqrt()))
        * 0.5;

    [l_target * range + gray.lo as f64, 0.0, 0.0]
}

/// Clamp a single color into the gamut.
///
/// Colors already inside pass through. Achromatic colors (and everything
/// when alpha is zero and the lightness has left the gray segment) clamp
/// straight onto the gray segment. Everything else projects onto the
/// nearest hull face along the hue-preserving direction toward the
/// adaptive target.
pub fn clamp_to_gamut(palette: &Palette, alpha: f32, lab: Oklab) -> Oklab {
    let gray = palette.gray_line();

    if !lab.is_finite() {
        // A non-finite pixel is a programmer error upstream; recover with
        // mid-gray in release builds.
        debug_assert!(false, "non-finite color reached the gamut clamp: {lab:?}");
        return Oklab::new(gray.midpoint(), 0.0, 0.0);
    }

    if is_inside_gamut(palette, lab) {
        return lab;
    }

    let alpha = alpha as f64;
    let p = [lab.l as f64, lab.a as f64, lab.b as f64];
    let chroma = (p[1] * p[1] + p[2] * p[2]).sqrt();

    let lightness_outside =
        p[0] < (gray.lo as f64) + EPSILON || p[0] > (gray.hi as f64) - EPSILON;
    if chroma < EPSILON || (alpha < EPSILON && lightness_outside) {
        return Oklab::new(gray.clamp(lab.l), 0.0, 0.0);
    }

    let target = clamp_target(palette, alpha, p[0], chroma);
    let to_target = [target[0] - p[0], target[1] - p[1], target[2] - p[2]];
    let to_target_len =
        (to_target[0] * to_target[0] + to_target[1] * to_target[1] + to_target[2] * to_target[2])
            .sqrt();
    if to_target_len < EPSILON {
        return Oklab::new(gray.clamp(lab.l), 0.0, 0.0);
    }
    let direction = [
        to_target[0] / to_target_len,
        to_target[1] / to_target_len,
        to_target[2] / to_target_len,
    ];
    let hue = [p[1] / chroma, p[2] / chroma];

    let mut best: Option<[f64; 3]> = None;
    let mut best_distance = f64::INFINITY;
    for plane in palette.gamut_planes() {
        let normal = [
            plane.normal[0] as f64,
            plane.normal[1] as f64,
            plane.normal[2] as f64,
        ];
        let offset = plane.offset as f64;

        // Only faces the ray approaches from outside.
        let denominator = direction[0] * normal[0] + direction[1] * normal[1] + direction[2] * normal[2];
        if denominator > -EPSILON {
            continue;
        }

        let distance_to_plane = normal[0] * p[0] + normal[1] * p[1] + normal[2] * p[2] + offset;
        let t = -distance_to_plane / denominator;
        let q = [
            p[0] + t * direction[0],
            p[1] + t * direction[1],
            p[2] + t * direction[2],
        ];

        // Reject projections that crossed the gray axis: the chroma
        // direction must not flip.
        if hue[0] * q[1] + hue[1] * q[2] < -EPSILON {
            continue;
        }

        let dq = [q[0] - target[0], q[1] - target[1], q[2] - target[2]];
        let distance_to_target = (dq[0] * dq[0] + dq[1] * dq[1] + dq[2] * dq[2]).sqrt();
        if distance_to_target < best_distance {
            best = Some(q);
            best_distance = distance_to_target;
        }
    }

    match best {
        Some(q) => Oklab::new(q[0] as f32, q[1] as f32, q[2] as f32),
        // Numerical corner: no face accepted the ray. Fall back to the
        // achromatic segment.
        None => Oklab::new(gray.clamp(lab.l), 0.0, 0.0),
    }
}

/// Clamp every pixel of a raster into the gamut, in parallel across rows.
pub(crate) fn clamp_raster(raster: &mut Raster<Oklab>, palette: &Palette, alpha: f32) {
    let width = raster.width().max(1);
    raster
        .pixels_mut()
        .par_chunks_mut(width)
        .for_each(|row| {
            for pixel in row {
                *pixel = clamp_to_gamut(palette, alpha, *pixel);
            }
        });
}
