//! Device palettes: reference colors, gamut geometry and the gray segment.
//!
//! A [`Palette`] is built once from measured device colors (expensive: the
//! convex-hull routine runs), is immutable afterwards, and may be shared
//! freely across concurrent conversions.

mod hull;

use crate::color::{cielab_to_xyz, xyz_to_oklab, CieLab, Oklab, Xyz};
use crate::error::EncreError;

/// An oriented half-space in Oklab.
///
/// A point p is outside the plane when `normal . p + offset > 0`. The
/// gamut is the intersection of the negative half-spaces of all faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Outward unit normal (L, a, b components)
    pub normal: [f32; 3],
    /// Signed offset
    pub offset: f32,
}

impl Plane {
    /// Signed distance of a color from the plane (positive = outside).
    #[inline]
    pub fn signed_distance(&self, lab: Oklab) -> f32 {
        self.normal[0] * lab.l + self.normal[1] * lab.a + self.normal[2] * lab.b + self.offset
    }
}

/// The achromatic segment of the gamut: the lightness interval for which
/// the pure gray point (L, 0, 0) lies inside the hull.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraySegment {
    /// Darkest in-gamut gray lightness
    pub lo: f32,
    /// Brightest in-gamut gray lightness
    pub hi: f32,
}

impl GraySegment {
    /// Interval length.
    #[inline]
    pub fn range(&self) -> f32 {
        self.hi - self.lo
    }

    /// Interval midpoint.
    #[inline]
    pub fn midpoint(&self) -> f32 {
        (self.lo + self.hi) / 2.0
    }

    /// Clamp a lightness value into the segment.
    #[inline]
    pub fn clamp(&self, l: f32) -> f32 {
        l.clamp(self.lo, self.hi)
    }
}

/// A display gamut in Oklab: reference colors, hull geometry and scalar
/// summaries. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Palette {
    points: Vec<Oklab>,
    gamut_vertices: Vec<Oklab>,
    gamut_planes: Vec<Plane>,
    gray_line: GraySegment,
    lightness_range: f32,
    max_chroma: f32,
}

impl Palette {
    /// Default lightness the brightest reference color is rescaled to.
    pub const DEFAULT_TARGET_LIGHTNESS: f32 = 80.0;

    /// Build a palette from measured CIE XYZ colors.
    ///
    /// The colors are lifted to Oklab and every lightness is multiplied by
    /// `target_lightness / L_max`, renormalizing the display's brightest
    /// color to a known value (default 80). The a and b channels are left
    /// unchanged.
    ///
    /// # Errors
    ///
    /// [`EncreError::TooFewColors`] for fewer than 4 colors;
    /// [`EncreError::DegenerateGamut`] when the point cloud is flat and no
    /// 3-D hull exists.
    pub fn from_xyz(colors: &[Xyz], target_lightness: Option<f32>) -> Result<Self, EncreError> {
        let points: Vec<Oklab> = colors.iter().map(|&xyz| xyz_to_oklab(xyz)).collect();
        Self::from_oklab_points(points, target_lightness)
    }

    /// Build a palette from measured CIE Lab colors (datasheet values).
    pub fn from_cielab(
        colors: &[CieLab],
        target_lightness: Option<f32>,
    ) -> Result<Self, EncreError> {
        let points: Vec<Oklab> = colors
            .iter()
            .map(|&lab| xyz_to_oklab(cielab_to_xyz(lab)))
            .collect();
        Self::from_oklab_points(points, target_lightness)
    }

    fn from_oklab_points(
        mut points: Vec<Oklab>,
        target_lightness: Option<f32>,
    ) -> Result<Self, EncreError> {
        if points.len() < 4 {
            return Err(EncreError::TooFewColors {
                count: points.len(),
            });
        }

        let target = target_lightness.unwrap_or(Self::DEFAULT_TARGET_LIGHTNESS);
        let l_max = points.iter().fold(f32::NEG_INFINITY, |acc, p| acc.max(p.l));
        if !(l_max > 0.0) {
            return Err(EncreError::DegenerateGamut);
        }
        let l_scale = target / l_max;
        for point in &mut points {
            point.l *= l_scale;
        }

        let flattened: Vec<[f64; 3]> = points
            .iter()
            .map(|p| [p.l as f64, p.a as f64, p.b as f64])
            .collect();
        let (vertex_indices, faces) =
            hull::convex_hull(&flattened).map_err(|_| EncreError::DegenerateGamut)?;

        let gamut_vertices: Vec<Oklab> = vertex_indices.iter().map(|&i| points[i]).collect();
        let gamut_planes: Vec<Plane> = faces
            .iter()
            .map(|face| Plane {
                normal: [
                    face.normal[0] as f32,
                    face.normal[1] as f32,
                    face.normal[2] as f32,
                ],
                offset: face.offset as f32,
            })
            .collect();

        // Tightest intersection of the achromatic line a = b = 0 with the
        // face planes. A face crossing the line at L = -offset / n_l bounds
        // the segment from above when n_l > 0 and from below when n_l < 0;
        // faces parallel to the L axis do not constrain it.
        let mut gray_lo = f64::NEG_INFINITY;
        let mut gray_hi = f64::INFINITY;
        for face in &faces {
            if face.normal[0].abs() < 1e-9 {
                continue;
            }
            let l = -face.offset / face.normal[0];
            if face.normal[0] < 0.0 {
                gray_lo = gray_lo.max(l);
            } else {
                gray_hi = gray_hi.min(l);
            }
        }
        if !gray_lo.is_finite() || !gray_hi.is_finite() || gray_lo > gray_hi {
            return Err(EncreError::DegenerateGamut);
        }

        let l_min = points.iter().fold(f32::INFINITY, |acc, p| acc.min(p.l));
        let max_chroma = points.iter().fold(0.0f32, |acc, p| acc.max(p.chroma()));

        Ok(Self {
            points,
            gamut_vertices,
            gamut_planes,
            gray_line: GraySegment {
                lo: gray_lo as f32,
                hi: gray_hi as f32,
            },
            lightness_range: target - l_min,
            max_chroma,
        })
    }

    /// The measured palette for the Waveshare 7.3" ACeP (F) panel,
    /// datasheet section 8-1, at the default target lightness.
    pub fn waveshare_7_color() -> Palette {
        Palette::from_cielab(
            &[
                CieLab::new(17.6, 8.3, -8.9),
                CieLab::new(70.6, -0.4, 2.4),
                CieLab::new(38.3, -26.0, 13.4),
                CieLab::new(28.0, 9.2, -25.0),
                CieLab::new(37.6, 35.9, 17.4),
                CieLab::new(65.5, -6.7, 46.4),
                CieLab::new(44.4, 24.9, 30.0),
            ],
            None,
        )
        .expect("builtin palette measurements form a valid gamut")
    }

    /// All reference colors after lightness rescaling.
    #[inline]
    pub fn points(&self) -> &[Oklab] {
        &self.points
    }

    /// The hull vertices, used as quantization targets. A subset of
    /// [`points`](Self::points), in input order.
    #[inline]
    pub fn gamut_vertices(&self) -> &[Oklab] {
        &self.gamut_vertices
    }

    /// The oriented faces of the gamut hull.
    #[inline]
    pub fn gamut_planes(&self) -> &[Plane] {
        &self.gamut_planes
    }

    /// The achromatic lightness segment.
    #[inline]
    pub fn gray_line(&self) -> GraySegment {
        self.gray_line
    }

    /// Lightness span of the reference colors after rescaling.
    #[inline]
    pub fn lightness_range(&self) -> f32 {
        self.lightness_range
    }

    /// Largest chroma magnitude among the reference colors.
    #[inline]
    pub fn max_chroma(&self) -> f32 {
        self.max_chroma
    }

    /// Number of quantization targets.
    #[inline]
    pub fn len(&self) -> usize {
        self.gamut_vertices.len()
    }

    /// Whether the palette has no quantization targets. Construction
    /// guarantees at least four, so this is always false.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.gamut_vertices.is_empty()
    }

    /// Largest signed plane distance of a color over all faces. Negative or
    /// near-zero means the color is inside the gamut.
    pub fn max_plane_distance(&self, lab: Oklab) -> f32 {
        self.gamut_planes
            .iter()
            .map(|plane| plane.signed_distance(lab))
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waveshare() -> Palette {
        Palette::waveshare_7_color()
    }

    #[test]
    fn test_too_few_colors() {
        let colors = [
            CieLab::new(10.0, 0.0, 0.0),
            CieLab::new(50.0, 5.0, 0.0),
            CieLab::new(90.0, 0.0, 5.0),
        ];
        let result = Palette::from_cielab(&colors, None);
        assert!(matches!(result, Err(EncreError::TooFewColors { count: 3 })));
    }

    #[test]
    fn test_coplanar_colors_are_degenerate() {
        // Four grays: collinear in Oklab (a = b = 0)
        let colors = [
            CieLab::new(10.0, 0.0, 0.0),
            CieLab::new(40.0, 0.0, 0.0),
            CieLab::new(70.0, 0.0, 0.0),
            CieLab::new(95.0, 0.0, 0.0),
        ];
        let result = Palette::from_cielab(&colors, None);
        assert!(matches!(result, Err(EncreError::DegenerateGamut)));
    }

    #[test]
    fn test_brightest_color_rescales_to_target() {
        let palette = waveshare();
        let l_max = palette
            .points()
            .iter()
            .fold(f32::NEG_INFINITY, |acc, p| acc.max(p.l));
        assert!(
            (l_max - 80.0).abs() < 1e-3,
            "brightest point should hit the target lightness, got {}",
            l_max
        );
    }

    #[test]
    fn test_custom_target_lightness() {
        let palette = Palette::from_cielab(
            &[
                CieLab::new(17.6, 8.3, -8.9),
                CieLab::new(70.6, -0.4, 2.4),
                CieLab::new(38.3, -26.0, 13.4),
                CieLab::new(28.0, 9.2, -25.0),
            ],
            Some(60.0),
        )
        .unwrap();
        let l_max = palette
            .points()
            .iter()
            .fold(f32::NEG_INFINITY, |acc, p| acc.max(p.l));
        assert!((l_max - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_vertices_are_subset_of_points() {
        let palette = waveshare();
        for vertex in palette.gamut_vertices() {
            assert!(
                palette.points().iter().any(|p| p == vertex),
                "vertex {:?} is not one of the reference points",
                vertex
            );
        }
    }

    #[test]
    fn test_vertices_lie_on_the_hull() {
        let palette = waveshare();
        for vertex in palette.gamut_vertices() {
            let max_distance = palette.max_plane_distance(*vertex);
            assert!(
                max_distance <= 5e-3,
                "vertex {:?} should be inside or on the hull, distance {}",
                vertex,
                max_distance
            );
            assert!(
                max_distance >= -5e-2,
                "vertex {:?} should sit on at least one face, distance {}",
                vertex,
                max_distance
            );
        }
    }

    #[test]
    fn test_gray_line_is_inside_the_gamut() {
        let palette = waveshare();
        let gray = palette.gray_line();
        assert!(gray.lo < gray.hi);
        for t in 0..=10 {
            let l = gray.lo + gray.range() * t as f32 / 10.0;
            // Nudge endpoints inward: they lie exactly on a face
            let l = l.clamp(gray.lo + 1e-3, gray.hi - 1e-3);
            assert!(
                palette.max_plane_distance(Oklab::new(l, 0.0, 0.0)) <= 1e-3,
                "gray point at L = {} should be in gamut",
                l
            );
        }
    }

    #[test]
    fn test_gray_line_endpoints_are_tight() {
        let palette = waveshare();
        let gray = palette.gray_line();
        assert!(
            palette.max_plane_distance(Oklab::new(gray.hi + 0.1, 0.0, 0.0)) > 0.0,
            "just above the gray segment should be out of gamut"
        );
        assert!(
            palette.max_plane_distance(Oklab::new(gray.lo - 0.1, 0.0, 0.0)) > 0.0,
            "just below the gray segment should be out of gamut"
        );
    }

    #[test]
    fn test_summaries() {
        let palette = waveshare();
        assert!(palette.lightness_range() > 0.0);
        assert!(palette.max_chroma() > 0.0);
        assert!(palette.lightness_range() <= 80.0);
    }
}
