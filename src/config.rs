//! Tunable parameters with documented defaults, optionally read from JSON.

use crate::compress::Normalization;
use crate::ramp::{AsciiRamp, STANDARD_RAMP};
use crate::render::AsciiRenderer;
use crate::{GlyphrankError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Source pixels per character cell.
    pub block_size: u32,
    /// Characters from darkest to brightest.
    pub ramp: String,
    /// Singular values kept when compressing.
    pub k: usize,
    pub normalization: Normalization,
    /// TrueType font for the glyph raster; the built-in bitmap font otherwise.
    pub font: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            block_size: AsciiRenderer::DEFAULT_BLOCK_SIZE,
            ramp: STANDARD_RAMP.to_string(),
            k: 70,
            normalization: Normalization::default(),
            font: None,
        }
    }
}

impl Settings {
    pub fn from_json(raw: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Checks that do not depend on the image; `k` is checked against the
    /// image once it is known.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(GlyphrankError::out_of_range("block size", self.block_size, ">= 1"));
        }
        self.ascii_ramp()?;
        Ok(())
    }

    pub fn ascii_ramp(&self) -> Result<AsciiRamp> {
        AsciiRamp::new(&self.ramp)
    }

    /// Renderer using the block size and ramp, with the built-in font.
    pub fn renderer(&self) -> Result<AsciiRenderer> {
        self.validate()?;
        Ok(AsciiRenderer::new()
            .with_block_size(self.block_size)
            .with_ramp(self.ascii_ramp()?))
    }
}
