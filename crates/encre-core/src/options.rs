//! Conversion options and output rotation.

/// Output orientation stored in the encre file header.
///
/// The numeric codes are part of the on-disk format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Rotation {
    /// Pick portrait when the input is taller than wide, landscape otherwise.
    #[default]
    Automatic = 0,
    /// No rotation.
    Landscape = 1,
    /// Quarter turn clockwise.
    Portrait = 2,
    /// Half turn.
    LandscapeUpsideDown = 3,
    /// Quarter turn counter-clockwise.
    PortraitUpsideDown = 4,
}

impl Rotation {
    /// All rotations, in header-code order.
    pub const ALL: [Rotation; 5] = [
        Rotation::Automatic,
        Rotation::Landscape,
        Rotation::Portrait,
        Rotation::LandscapeUpsideDown,
        Rotation::PortraitUpsideDown,
    ];

    /// The header code for this rotation.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a header code.
    pub fn from_code(code: u8) -> Option<Rotation> {
        Rotation::ALL.get(code as usize).copied()
    }

    /// The canonical name, as accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Rotation::Automatic => "automatic",
            Rotation::Landscape => "landscape",
            Rotation::Portrait => "portrait",
            Rotation::LandscapeUpsideDown => "landscape_upside_down",
            Rotation::PortraitUpsideDown => "portrait_upside_down",
        }
    }

    /// Look up a rotation by its canonical name.
    pub fn from_name(name: &str) -> Option<Rotation> {
        Rotation::ALL.into_iter().find(|r| r.name() == name)
    }

    /// Resolve `Automatic` against the input dimensions: portrait when the
    /// image is taller than wide, landscape otherwise. Explicit rotations
    /// pass through unchanged.
    pub fn resolve(self, input_width: u32, input_height: u32) -> Rotation {
        match self {
            Rotation::Automatic => {
                if input_height > input_width {
                    Rotation::Portrait
                } else {
                    Rotation::Landscape
                }
            }
            explicit => explicit,
        }
    }
}

/// Configuration for a conversion call.
///
/// All fields have documented defaults; `exposure` and `brightness` default
/// to absent, which enables the histogram-based auto estimation in the tone
/// mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Output orientation. Default: [`Rotation::Automatic`].
    pub rotation: Rotation,

    /// Fraction (0, 1] of the gray segment used as the tone target: the
    /// target interval is `[gray.lo * d, gray.hi * (2 - d)]`. 1 maps the
    /// target exactly onto the gray segment. Default: 0.95.
    pub dynamic_range: f32,

    /// Multiplier on lightness. Absent means auto-compute from the
    /// luminance histogram. Default: absent.
    pub exposure: Option<f32>,

    /// Additive offset on lightness. Absent means auto-compute. Default:
    /// absent.
    pub brightness: Option<f32>,

    /// Steepness of the sigmoid tone map. Default: 0.065.
    pub contrast: f32,

    /// Unsharp-mask amount applied by the raster loader to the luminance
    /// channel before hand-off. The core itself never sharpens. Default: 4.
    pub sharpening: f32,

    /// Clipped-chroma recovery factor for the gamut clamp. 0 desaturates
    /// out-of-gamut pixels straight to gray; larger values preserve chroma
    /// by shifting lightness instead. Default: 1.
    pub clipped_chroma_recovery: f32,

    /// Steepness of the sigmoid that damps large dither errors. 0 disables
    /// the attenuation entirely (classic Floyd-Steinberg). Default: 0.1.
    pub error_attenuation: f32,
}

impl Options {
    /// Default tone-target coverage of the gray segment.
    pub const DEFAULT_DYNAMIC_RANGE: f32 = 0.95;
    /// Default sigmoid steepness for the tone map.
    pub const DEFAULT_CONTRAST: f32 = 0.065;
    /// Default unsharp-mask amount.
    pub const DEFAULT_SHARPENING: f32 = 4.0;
    /// Default clipped-chroma recovery factor.
    pub const DEFAULT_CLIPPED_CHROMA_RECOVERY: f32 = 1.0;
    /// Default dither error attenuation.
    pub const DEFAULT_ERROR_ATTENUATION: f32 = 0.1;
    /// Exposure value meaning "leave lightness untouched".
    pub const NO_EXPOSURE_CHANGE: f32 = 1.0;
    /// Brightness value meaning "leave lightness untouched".
    pub const NO_BRIGHTNESS_CHANGE: f32 = 0.0;

    /// Create options with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output rotation.
    #[inline]
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the tone-target coverage of the gray segment.
    #[inline]
    pub fn dynamic_range(mut self, dynamic_range: f32) -> Self {
        self.dynamic_range = dynamic_range;
        self
    }

    /// Fix the exposure instead of auto-computing it.
    #[inline]
    pub fn exposure(mut self, exposure: f32) -> Self {
        self.exposure = Some(exposure);
        self
    }

    /// Fix the brightness instead of auto-computing it.
    #[inline]
    pub fn brightness(mut self, brightness: f32) -> Self {
        self.brightness = Some(brightness);
        self
    }

    /// Set the sigmoid tone-map steepness.
    #[inline]
    pub fn contrast(mut self, contrast: f32) -> Self {
        self.contrast = contrast;
        self
    }

    /// Set the loader-side unsharp-mask amount.
    #[inline]
    pub fn sharpening(mut self, sharpening: f32) -> Self {
        self.sharpening = sharpening;
        self
    }

    /// Set the clipped-chroma recovery factor.
    #[inline]
    pub fn clipped_chroma_recovery(mut self, alpha: f32) -> Self {
        self.clipped_chroma_recovery = alpha;
        self
    }

    /// Set the dither error attenuation.
    #[inline]
    pub fn error_attenuation(mut self, eta: f32) -> Self {
        self.error_attenuation = eta;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rotation: Rotation::Automatic,
            dynamic_range: Self::DEFAULT_DYNAMIC_RANGE,
            exposure: None,
            brightness: None,
            contrast: Self::DEFAULT_CONTRAST,
            sharpening: Self::DEFAULT_SHARPENING,
            clipped_chroma_recovery: Self::DEFAULT_CLIPPED_CHROMA_RECOVERY,
            error_attenuation: Self::DEFAULT_ERROR_ATTENUATION,
        }
    }
}
