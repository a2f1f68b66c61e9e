//! encre-core: color pipeline and dithering engine for multi-color e-paper.
//!
//! Converts arbitrary input rasters into compact palette-indexed rasters
//! for electronic-paper displays whose reproducible colors form a small,
//! irregular gamut in a perceptual color space.
//!
//! # Pipeline
//!
//! ```text
//! linear CIE-XYZ raster        (from the external raster loader)
//!     |
//!     v
//! Oklab raster                 (color::xyz_to_oklab)
//!     |
//!     v
//! tone-mapped Oklab            (exposure/brightness + sigmoid, tone mapper)
//!     |
//!     v
//! in-gamut Oklab               (hue-preserving clamp onto the gamut hull)
//!     |
//!     v
//! palette-index raster         (Floyd-Steinberg error diffusion)
//!     |
//!     +--> encre file          (codec: header + palette + packed indices)
//!     +--> controller bytes    (display: 4-bit codes, command sequences)
//! ```
//!
//! The [`Palette`] is built once from measured device colors (the convex
//! hull of their Oklab positions) and shared read-only by the tone mapper,
//! the gamut clamper and the dither engine.
//!
//! # Quick start
//!
//! ```
//! use encre_core::{convert, Options, Palette, Raster, Xyz};
//!
//! let palette = Palette::waveshare_7_color();
//! let image = Raster::new(4, 4, Xyz::new(50.0, 50.0, 50.0));
//! let mut indices = vec![0u8; 16];
//! let committed = convert(&image, 4, 4, &palette, &Options::default(), &mut indices).unwrap();
//! assert_eq!(committed.len(), 16);
//! ```
//!
//! # What lives elsewhere
//!
//! Image decoding, ICC transforms, resizing, EXIF, the CLI parser, network
//! endpoints and the SPI transport are external collaborators. The core
//! consumes a linear CIE-XYZ floating-point raster and emits a
//! palette-index raster; it owes them nothing else.

use std::sync::atomic::{AtomicBool, Ordering};

pub mod codec;
pub mod color;
pub mod convert;
pub mod display;
pub mod dither;
pub mod error;
pub mod gamut;
pub mod options;
pub mod palette;
pub mod raster;
pub mod tone;


pub use codec::{
    bits_per_color, read_compatible_encre_file, read_encre, read_encre_file, write_encre,
    write_encre_file, EncreFile, ENCRE_MAGIC,
};
pub use color::{cielab_to_xyz, oklab_to_xyz, xyz_to_oklab, CieLab, Oklab, Xyz};
pub use convert::convert;
pub use display::{DisplayBus, Gdep073e01};
pub use error::EncreError;
pub use options::{Options, Rotation};
pub use palette::{GraySegment, Palette, Plane};
pub use raster::Raster;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Bracket the start of core use.
///
/// The core itself holds no process-wide state; the pair exists so callers
/// can bracket use uniformly with raster loaders that do (the external
/// loader initializes and shuts down a process-wide resource).
pub fn initialize() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("core already initialized");
    }
}

/// Bracket the end of core use. See [`initialize`].
pub fn uninitialize() {
    INITIALIZED.store(false, Ordering::SeqCst);
}
