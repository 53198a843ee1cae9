//! Image to ASCII art and low-rank grayscale compression.

pub mod average;
pub mod compress;
pub mod config;
pub mod glyph;
pub mod ramp;
pub mod render;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use average::block_average;
pub use compress::{compress, compress_gray, mean_absolute_error, ImageSvd, Normalization};
pub use config::Settings;
pub use glyph::{BitmapFont, GlyphMetrics, GlyphSource};
#[cfg(not(target_arch = "wasm32"))]
pub use glyph::TrueTypeFont;
pub use ramp::AsciiRamp;
pub use render::{AsciiArt, AsciiRenderer};

use image::{DynamicImage, GrayImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlyphrankError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Parameter `{name}` out of range: got {value}, expected {expected}")]
    OutOfRange {
        name: &'static str,
        value: String,
        expected: String,
    },
    #[error("Decomposition failed: {0}")]
    Decomposition(String),
    #[error("Font error: {0}")]
    Font(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GlyphrankError {
    pub(crate) fn out_of_range(
        name: &'static str,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        Self::OutOfRange {
            name,
            value: value.to_string(),
            expected: expected.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GlyphrankError>;

/// Single-channel view of `image`, rejecting zero-sized input.
///
/// Luma images are copied as-is; anything else goes through the `image`
/// crate's luminance conversion.
pub fn to_gray(image: &DynamicImage) -> Result<GrayImage> {
    let gray = match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => other.to_luma8(),
    };
    ensure_non_empty(&gray)?;
    Ok(gray)
}

pub(crate) fn ensure_non_empty(gray: &GrayImage) -> Result<()> {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return Err(GlyphrankError::InvalidInput(format!(
            "image is empty ({w}x{h})"
        )));
    }
    Ok(())
}
