//! CIE XYZ to Oklab conversion and its exact inverse.

use super::{Oklab, Xyz};

// Ottosson's M1: CIE XYZ (D65, unit scale) to cone responses.
const XYZ_TO_LMS: [[f32; 3]; 3] = [
    [0.8189330101, 0.3618667424, -0.1288597137],
    [0.0329845436, 0.9293118715, 0.0361456387],
    [0.0482003018, 0.2643662691, 0.6338517070],
];

// Inverse of M1.
const LMS_TO_XYZ: [[f32; 3]; 3] = [
    [1.2270138511, -0.5577999807, 0.2812561490],
    [-0.0405801784, 1.1122568696, -0.0716766787],
    [-0.0763812845, -0.4214819784, 1.5861632204],
];

// Ottosson's M2: nonlinear cone responses to Lab.
const LMS_P_TO_LAB: [[f32; 3]; 3] = [
    [0.2104542553, 0.7936177850, -0.0040720468],
    [1.9779984951, -2.4285922050, 0.4505937099],
    [0.0259040371, 0.7827717662, -0.8086757660],
];

// Inverse of M2.
const LAB_TO_LMS_P: [[f32; 3]; 3] = [
    [1.0, 0.3963377774, 0.2158037573],
    [1.0, -0.1055613458, -0.0638541728],
    [1.0, -0.0894841775, -1.2914855480],
];

#[inline]
fn mul(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Convert CIE XYZ (Y = 100 at white) to Oklab (L in [0, 100]).
///
/// The cube root is `f32::cbrt`, which preserves sign: tone-mapped values
/// can fall outside the original color domain and must not produce NaN.
pub fn xyz_to_oklab(xyz: Xyz) -> Oklab {
    let lms = mul(
        &XYZ_TO_LMS,
        [xyz.x / 100.0, xyz.y / 100.0, xyz.z / 100.0],
    );
    let lms_p = [lms[0].cbrt(), lms[1].cbrt(), lms[2].cbrt()];
    let lab = mul(&LMS_P_TO_LAB, lms_p);
    Oklab::new(lab[0] * 100.0, lab[1] * 100.0, lab[2] * 100.0)
}

/// Convert Oklab (L in [0, 100]) back to CIE XYZ (Y = 100 at white).
pub fn oklab_to_xyz(lab: Oklab) -> Xyz {
    let lms_p = mul(&LAB_TO_LMS_P, [lab.l / 100.0, lab.a / 100.0, lab.b / 100.0]);
    let lms = [
        lms_p[0] * lms_p[0] * lms_p[0],
        lms_p[1] * lms_p[1] * lms_p[1],
        lms_p[2] * lms_p[2] * lms_p[2],
    ];
    let xyz = mul(&LMS_TO_XYZ, lms);
    Xyz::new(xyz[0] * 100.0, xyz[1] * 100.0, xyz[2] * 100.0)
}
