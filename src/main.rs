use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use encre_core::{write_encre_file, Options, Palette, Rotation};

mod loader;
mod preview;

/// Convert an image into a palette-indexed raster for a multi-color
/// e-paper display.
#[derive(Parser)]
#[command(
    name = "encrier",
    version,
    about = "Convert images to palette-indexed rasters for multi-color e-paper",
    disable_help_flag = true
)]
struct Cli {
    /// Input image path
    input_image: PathBuf,

    /// Output width in pixels
    #[arg(short = 'w', long, default_value_t = 800)]
    width: u32,

    /// Output height in pixels
    #[arg(short = 'h', long, default_value_t = 480)]
    height: u32,

    /// Output file path ("-" derives it from the input name)
    #[arg(short = 'o', long, default_value = "-")]
    out: PathBuf,

    /// Preview PNG path ("-" derives it from the output name)
    #[arg(short = 'p', long)]
    preview: Option<PathBuf>,

    /// Fraction (0, 1] of the gray segment used as the tone target
    #[arg(short = 'v', long)]
    dynamic_range: Option<f32>,

    /// Lightness multiplier (omit for automatic)
    #[arg(short = 'e', long)]
    exposure: Option<f32>,

    /// Lightness offset (omit for automatic)
    #[arg(short = 'b', long)]
    brightness: Option<f32>,

    /// Sigmoid tone-map steepness
    #[arg(short = 'c', long)]
    contrast: Option<f32>,

    /// Unsharp-mask amount on the lightness channel
    #[arg(short = 's', long)]
    sharpening: Option<f32>,

    /// Chroma recovery for out-of-gamut colors (0 desaturates to gray)
    #[arg(short = 'g', long)]
    clipped_chroma_recovery: Option<f32>,

    /// Image rotation: automatic, landscape, portrait,
    /// landscape_upside_down or portrait_upside_down
    #[arg(short = 'r', long, value_parser = parse_rotation)]
    rotation: Option<Rotation>,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

fn parse_rotation(name: &str) -> Result<Rotation, String> {
    Rotation::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = Rotation::ALL.iter().map(|r| r.name()).collect();
        format!(
            "unknown rotation '{name}' (expected one of: {})",
            known.join(", ")
        )
    })
}

impl Cli {
    fn to_options(&self) -> Options {
        let mut options = Options::new();
        if let Some(rotation) = self.rotation {
            options = options.rotation(rotation);
        }
        if let Some(dynamic_range) = self.dynamic_range {
            options = options.dynamic_range(dynamic_range);
        }
        if let Some(exposure) = self.exposure {
            options = options.exposure(exposure);
        }
        if let Some(brightness) = self.brightness {
            options = options.brightness(brightness);
        }
        if let Some(contrast) = self.contrast {
            options = options.contrast(contrast);
        }
        if let Some(sharpening) = self.sharpening {
            options = options.sharpening(sharpening);
        }
        if let Some(alpha) = self.clipped_chroma_recovery {
            options = options.clipped_chroma_recovery(alpha);
        }
        options
    }

    fn output_path(&self) -> PathBuf {
        if self.out.as_os_str() == "-" {
            self.input_image.with_extension("encre")
        } else {
            self.out.clone()
        }
    }

    fn preview_path(&self, output: &PathBuf) -> Option<PathBuf> {
        let preview = self.preview.as_ref()?;
        if preview.as_os_str() == "-" {
            let stem = output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "out".to_string());
            Some(output.with_file_name(format!("{stem}_preview.png")))
        } else {
            Some(preview.clone())
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encrier=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let cli = Cli::parse();
    let options = cli.to_options();

    encre_core::initialize();

    let palette = Palette::waveshare_7_color();

    let (raster, rotation) =
        loader::load_image(&cli.input_image, cli.width, cli.height, &options)?;

    let mut indices = vec![0u8; (cli.width * cli.height) as usize];
    let committed = encre_core::convert(
        &raster,
        cli.width,
        cli.height,
        &palette,
        &options,
        &mut indices,
    )?;

    let output_path = cli.output_path();
    write_encre_file(
        &output_path,
        &indices,
        cli.width,
        palette.gamut_vertices(),
        rotation,
    )?;
    tracing::info!(path = %output_path.display(), "wrote encre file");

    if let Some(preview_path) = cli.preview_path(&output_path) {
        preview::write_preview(&preview_path, &committed)?;
        tracing::info!(path = %preview_path.display(), "wrote preview");
    }

    encre_core::uninitialize();

    Ok(())
}
