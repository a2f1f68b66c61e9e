//! The raster loader: decodes an image file into the linear CIE-XYZ raster
//! the core consumes.
//!
//! Responsibilities delegated here by the core: format decoding, rotation,
//! aspect-fit resizing, alpha flattening, and the unsharp mask. The loader
//! hands back the fitted raster at its own size; the core centers it on the
//! output canvas after tone mapping.

use encre_core::{oklab_to_xyz, xyz_to_oklab, EncreError, Options, Raster, Rotation, Xyz};
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::Path;

// Linear sRGB to CIE XYZ (D65), scaled so Y = 100 at diffuse white.
const LINEAR_SRGB_TO_XYZ: [[f32; 3]; 3] = [
    [41.24564, 35.75761, 18.04375],
    [21.26729, 71.51522, 7.21750],
    [1.93339, 11.91920, 95.03041],
];

/// IEC 61966-2-1 sRGB decode.
fn srgb_to_linear(srgb: f32) -> f32 {
    if srgb <= 0.04045 {
        srgb / 12.92
    } else {
        ((srgb + 0.055) / 1.055).powf(2.4)
    }
}

/// Amount divisor: the default sharpening option (4) maps to a plain
/// unsharp mask of strength 1.
const SHARPEN_AMOUNT_DIVISOR: f32 = 4.0;

/// Load an image file and produce the fitted XYZ raster.
///
/// The image is rotated per the resolved rotation option, resized to fit
/// within the target while keeping its aspect ratio, flattened over black
/// where it carries alpha, and optionally sharpened on the Oklab lightness
/// channel. The returned raster keeps the fitted size, which may be
/// smaller than the target in one dimension.
pub fn load_image(
    path: &Path,
    target_width: u32,
    target_height: u32,
    options: &Options,
) -> Result<(Raster<Xyz>, Rotation), EncreError> {
    let decoded =
        image::open(path).map_err(|err| EncreError::LoaderFailure(err.to_string()))?;

    let rotation = options.rotation.resolve(decoded.width(), decoded.height());
    let oriented = apply_rotation(decoded, rotation);

    let resized = oriented.resize(target_width, target_height, FilterType::Lanczos3);
    let rgba = resized.to_rgba8();

    let mut raster = Raster::new(
        rgba.width() as usize,
        rgba.height() as usize,
        Xyz::new(0.0, 0.0, 0.0),
    );
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as f32 / 255.0;
        let linear = [
            srgb_to_linear(pixel[0] as f32 / 255.0) * alpha,
            srgb_to_linear(pixel[1] as f32 / 255.0) * alpha,
            srgb_to_linear(pixel[2] as f32 / 255.0) * alpha,
        ];
        let m = &LINEAR_SRGB_TO_XYZ;
        *raster.pixel_mut(x as usize, y as usize) = Xyz::new(
            m[0][0] * linear[0] + m[0][1] * linear[1] + m[0][2] * linear[2],
            m[1][0] * linear[0] + m[1][1] * linear[1] + m[1][2] * linear[2],
            m[2][0] * linear[0] + m[2][1] * linear[1] + m[2][2] * linear[2],
        );
    }

    if options.sharpening > 0.0 {
        sharpen_lightness(&mut raster, options.sharpening / SHARPEN_AMOUNT_DIVISOR);
    }

    Ok((raster, rotation))
}

fn apply_rotation(image: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::Automatic | Rotation::Landscape => image,
        Rotation::Portrait => image.rotate90(),
        Rotation::LandscapeUpsideDown => image.rotate180(),
        Rotation::PortraitUpsideDown => image.rotate270(),
    }
}

/// Unsharp mask on the Oklab lightness channel: L gains
/// `amount * (L - blur(L))` while a and b stay fixed.
fn sharpen_lightness(raster: &mut Raster<Xyz>, amount: f32) {
    let width = raster.width();
    let height = raster.height();

    let mut lab: Vec<_> = raster.pixels().iter().map(|&p| xyz_to_oklab(p)).collect();
    let lightness: Vec<f32> = lab.iter().map(|p| p.l).collect();

    // 3x3 binomial blur, edge-clamped.
    let mut blurred = vec![0.0f32; lightness.len()];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            let mut weight_sum = 0.0;
            for (dy, row_weight) in [(-1i32, 1.0f32), (0, 2.0), (1, 1.0)] {
                for (dx, column_weight) in [(-1i32, 1.0f32), (0, 2.0), (1, 1.0)] {
                    let sx = x as i32 + dx;
                    let sy = y as i32 + dy;
                    if sx >= 0 && sx < width as i32 && sy >= 0 && sy < height as i32 {
                        let weight = row_weight * column_weight;
                        sum += lightness[sy as usize * width + sx as usize] * weight;
                        weight_sum += weight;
                    }
                }
            }
            blurred[y * width + x] = sum / weight_sum;
        }
    }

    for (pixel, (&l_original, &l_blurred)) in
        lab.iter_mut().zip(lightness.iter().zip(&blurred))
    {
        pixel.l = l_original + amount * (l_original - l_blurred);
    }

    for (xyz, &lab_pixel) in raster.pixels_mut().iter_mut().zip(&lab) {
        *xyz = oklab_to_xyz(lab_pixel);
    }
}
