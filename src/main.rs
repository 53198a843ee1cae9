//! glyphrank CLI - ASCII art and SVD compression for images

use clap::{Parser, Subcommand};
use glyphrank::ramp::DETAILED_RAMP;
use glyphrank::{
    compress_gray, mean_absolute_error, to_gray, AsciiArt, AsciiRenderer,
    GlyphrankError, Normalization, Settings, TrueTypeFont,
};
use image::{DynamicImage, GrayImage};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "glyphrank", about = "Convert images to ASCII art or low-rank grayscale")]
struct Args {
    /// JSON settings file; command-line flags override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render an image as ASCII art
    Ascii {
        /// Input image file
        input: PathBuf,
        #[command(flatten)]
        ascii: AsciiOpts,
        /// Invert the image first
        #[arg(short, long)]
        invert: bool,
    },
    /// Keep the top-k singular values of the grayscale image
    Compress {
        /// Input image file
        input: PathBuf,
        /// Output image file
        output: PathBuf,
        #[command(flatten)]
        compress: CompressOpts,
        /// Invert the image first
        #[arg(short, long)]
        invert: bool,
    },
    /// Compress, then render the compressed image as ASCII art
    Both {
        /// Input image file
        input: PathBuf,
        /// Also save the compressed image
        #[arg(long)]
        compressed_out: Option<PathBuf>,
        #[command(flatten)]
        ascii: AsciiOpts,
        #[command(flatten)]
        compress: CompressOpts,
        /// Invert the image first
        #[arg(short, long)]
        invert: bool,
    },
}

#[derive(clap::Args)]
struct AsciiOpts {
    /// Source pixels per character
    #[arg(short, long)]
    block_size: Option<u32>,
    /// Characters from darkest to brightest
    #[arg(short, long, conflicts_with = "detailed")]
    ramp: Option<String>,
    /// Use the long 69-character ramp
    #[arg(long)]
    detailed: bool,
    /// TrueType font for the glyph raster (default: built-in 8x8 bitmap)
    #[arg(short, long)]
    font: Option<PathBuf>,
    /// Write the text here instead of stdout
    #[arg(long)]
    text_out: Option<PathBuf>,
    /// Write the glyph raster image here
    #[arg(long)]
    raster_out: Option<PathBuf>,
}

#[derive(clap::Args)]
struct CompressOpts {
    /// Number of singular values to keep
    #[arg(short)]
    k: Option<usize>,
    /// Round and clamp instead of min-max normalizing
    #[arg(long)]
    clamp: bool,
}

impl AsciiOpts {
    fn apply(&self, settings: &mut Settings) {
        if let Some(block_size) = self.block_size {
            settings.block_size = block_size;
        }
        if let Some(ramp) = &self.ramp {
            settings.ramp = ramp.clone();
        }
        if self.detailed {
            settings.ramp = DETAILED_RAMP.to_string();
        }
        if let Some(font) = &self.font {
            settings.font = Some(font.clone());
        }
    }
}

impl CompressOpts {
    fn apply(&self, settings: &mut Settings) {
        if let Some(k) = self.k {
            settings.k = k;
        }
        if self.clamp {
            settings.normalization = Normalization::Clamp;
        }
    }
}

fn main() -> Result<(), GlyphrankError> {
    env_logger::init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => {
            log::info!("settings from {}", path.display());
            Settings::from_json_file(path)?
        }
        None => Settings::default(),
    };

    match args.command {
        Command::Ascii { input, ascii, invert } => {
            ascii.apply(&mut settings);
            let gray = load_gray(&input, invert)?;
            let art = build_renderer(&settings)?.render_gray(&gray)?;
            emit_ascii(&art, &ascii)?;
        }
        Command::Compress { input, output, compress, invert } => {
            compress.apply(&mut settings);
            let gray = load_gray(&input, invert)?;
            let compressed = compress_logged(&gray, &settings)?;
            compressed.save(&output)?;
            log::info!("wrote {}", output.display());
        }
        Command::Both { input, compressed_out, ascii, compress, invert } => {
            ascii.apply(&mut settings);
            compress.apply(&mut settings);
            let renderer = build_renderer(&settings)?;
            let gray = load_gray(&input, invert)?;
            let compressed = compress_logged(&gray, &settings)?;
            if let Some(path) = &compressed_out {
                compressed.save(path)?;
                log::info!("wrote {}", path.display());
            }
            let art = renderer.render_gray(&compressed)?;
            emit_ascii(&art, &ascii)?;
        }
    }

    Ok(())
}

fn load_gray(path: &Path, invert: bool) -> Result<GrayImage, GlyphrankError> {
    let mut image: DynamicImage = image::open(path)?;
    if invert {
        image.invert();
    }
    log::info!("loaded {} ({}x{})", path.display(), image.width(), image.height());
    to_gray(&image)
}

fn build_renderer(settings: &Settings) -> Result<AsciiRenderer, GlyphrankError> {
    let renderer = settings.renderer()?;
    Ok(match &settings.font {
        Some(path) => renderer.with_glyphs(TrueTypeFont::open(path)?),
        None => renderer,
    })
}

fn compress_logged(gray: &GrayImage, settings: &Settings) -> Result<GrayImage, GlyphrankError> {
    let compressed = compress_gray(gray, settings.k, settings.normalization)?;
    log::info!(
        "kept {} singular values, mean abs error {:.2}",
        settings.k,
        mean_absolute_error(gray, &compressed)?
    );
    Ok(compressed)
}

fn emit_ascii(art: &AsciiArt, opts: &AsciiOpts) -> Result<(), GlyphrankError> {
    match &opts.text_out {
        Some(path) => {
            std::fs::write(path, art.text())?;
            log::info!("wrote {}", path.display());
        }
        None => print!("{}", art.text()),
    }
    if let Some(path) = &opts.raster_out {
        art.raster.save(path)?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}
