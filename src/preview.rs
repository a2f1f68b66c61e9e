//! Preview writer: renders the committed Oklab raster back to an sRGB PNG.

use anyhow::Context;
use encre_core::{oklab_to_xyz, Oklab, Raster};
use image::RgbImage;
use std::path::Path;

// CIE XYZ (D65, unit scale) to linear sRGB.
const XYZ_TO_LINEAR_SRGB: [[f32; 3]; 3] = [
    [3.2404542, -1.5371385, -0.4985314],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0556434, -0.2040259, 1.0572252],
];

/// IEC 61966-2-1 sRGB encode.
fn linear_to_srgb(linear: f32) -> f32 {
    if linear <= 0.0031308 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

fn to_srgb_bytes(lab: Oklab) -> [u8; 3] {
    let xyz = oklab_to_xyz(lab);
    let v = [xyz.x / 100.0, xyz.y / 100.0, xyz.z / 100.0];
    let m = &XYZ_TO_LINEAR_SRGB;
    let linear = [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ];
    let mut bytes = [0u8; 3];
    for (byte, channel) in bytes.iter_mut().zip(linear) {
        *byte = (linear_to_srgb(channel.clamp(0.0, 1.0)) * 255.0).round() as u8;
    }
    bytes
}

/// Write the committed raster as a PNG preview.
pub fn write_preview(path: &Path, raster: &Raster<Oklab>) -> anyhow::Result<()> {
    let image = RgbImage::from_fn(raster.width() as u32, raster.height() as u32, |x, y| {
        image::Rgb(to_srgb_bytes(raster.pixel(x as usize, y as usize)))
    });
    image
        .save(path)
        .with_context(|| format!("writing preview to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_stays_gray() {
        // An achromatic Oklab color must encode to (nearly) equal RGB.
        let bytes = to_srgb_bytes(Oklab::new(60.0, 0.0, 0.0));
        let spread = bytes.iter().max().unwrap() - bytes.iter().min().unwrap();
        assert!(spread <= 1, "achromatic color spread {spread} too large");
    }

    #[test]
    fn test_extremes_clamp_without_overflow() {
        let white = to_srgb_bytes(Oklab::new(120.0, 0.0, 0.0));
        assert_eq!(white, [255, 255, 255]);
        let black = to_srgb_bytes(Oklab::new(-20.0, 0.0, 0.0));
        assert_eq!(black, [0, 0, 0]);
    }
}
