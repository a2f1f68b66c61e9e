//! CIE L*a*b* to CIE XYZ, for lifting datasheet palette measurements.

use super::{CieLab, Xyz};

// D65 reference white, Y = 100 scale.
const WHITE_X: f32 = 95.047;
const WHITE_Y: f32 = 100.0;
const WHITE_Z: f32 = 108.883;

// CIE standard constants, exact rational forms.
const EPSILON: f32 = 216.0 / 24389.0;
const KAPPA: f32 = 24389.0 / 27.0;

/// Convert a CIE Lab color to XYZ (D65 white, Y = 100 at diffuse white).
pub fn cielab_to_xyz(lab: CieLab) -> Xyz {
    let fy = (lab.l + 16.0) / 116.0;
    let fx = fy + lab.a / 500.0;
    let fz = fy - lab.b / 200.0;

    let xr = if fx * fx * fx > EPSILON {
        fx * fx * fx
    } else {
        (116.0 * fx - 16.0) / KAPPA
    };
    let yr = if lab.l > KAPPA * EPSILON {
        fy * fy * fy
    } else {
        lab.l / KAPPA
    };
    let zr = if fz * fz * fz > EPSILON {
        fz * fz * fz
    } else {
        (116.0 * fz - 16.0) / KAPPA
    };

    Xyz::new(xr * WHITE_X, yr * WHITE_Y, zr * WHITE_Z)
}
