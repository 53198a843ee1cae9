//! Glyph sources: measuring and rasterizing ramp characters.
//!
//! Glyphs are drawn as white coverage on a black background, one cell per
//! character. A source reports the cell size at a given scale so the
//! renderer can fit one glyph to one block of source pixels.

use crate::{GlyphrankError, Result};
use image::{GrayImage, Luma};

/// Pixel size of one rendered glyph cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphMetrics {
    pub width: u32,
    pub height: u32,
}

pub trait GlyphSource {
    /// Cell size of `ch` at `scale` (1.0 is the source's natural size).
    fn metrics(&self, ch: char, scale: f32) -> GlyphMetrics;

    /// Render `ch` into a fresh `cell`-sized image.
    fn rasterize(&self, ch: char, scale: f32, cell: GlyphMetrics) -> GrayImage;
}

/// Measure `reference` at scale 1.0, pick the scale at which it fits a
/// `block`×`block` square, and measure again at that scale.
pub fn fit_to_block(
    source: &dyn GlyphSource,
    reference: char,
    block: u32,
) -> Result<(f32, GlyphMetrics)> {
    let natural = source.metrics(reference, 1.0);
    if natural.width == 0 || natural.height == 0 {
        return Err(GlyphrankError::Font(format!(
            "reference glyph {reference:?} has no extent"
        )));
    }

    let scale = (block as f32 / natural.width as f32).min(block as f32 / natural.height as f32);
    if !scale.is_finite() || scale <= 0.0 {
        return Err(GlyphrankError::out_of_range("glyph scale", scale, "finite and > 0"));
    }

    let fitted = source.metrics(reference, scale);
    let fitted = GlyphMetrics {
        width: fitted.width.max(1),
        height: fitted.height.max(1),
    };
    log::debug!(
        "glyph {reference:?}: natural {}x{}, scale {scale:.3}, cell {}x{}",
        natural.width,
        natural.height,
        fitted.width,
        fitted.height
    );
    Ok((scale, fitted))
}

const BITMAP_SIZE: u32 = 8;

/// Built-in 8×8 monospace bitmap font covering printable ASCII.
///
/// Rows are top to bottom, most significant bit is the leftmost pixel.
/// Scaling samples the bitmap nearest-neighbor so edges stay hard.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitmapFont;

impl BitmapFont {
    fn pattern(ch: char) -> [u8; 8] {
        match ch {
            ' '..='~' => FONT8X8_ASCII[(ch as u32 - 0x20) as usize],
            _ => MISSING_GLYPH,
        }
    }

    /// Lit pixels at natural size.
    pub fn coverage(ch: char) -> u32 {
        Self::pattern(ch).iter().map(|row| row.count_ones()).sum()
    }
}

impl GlyphSource for BitmapFont {
    fn metrics(&self, _ch: char, scale: f32) -> GlyphMetrics {
        let side = (BITMAP_SIZE as f32 * scale).round().max(1.0) as u32;
        GlyphMetrics { width: side, height: side }
    }

    fn rasterize(&self, ch: char, _scale: f32, cell: GlyphMetrics) -> GrayImage {
        let pattern = Self::pattern(ch);
        GrayImage::from_fn(cell.width, cell.height, |x, y| {
            let sx = x * BITMAP_SIZE / cell.width;
            let sy = y * BITMAP_SIZE / cell.height;
            let lit = pattern[sy as usize] & (0x80 >> sx) != 0;
            Luma([if lit { 255 } else { 0 }])
        })
    }
}

/// TrueType/OpenType glyphs rasterized with fontdue.
///
/// Scale 1.0 renders at [`TrueTypeFont::BASE_PX`] pixels per em; the cell
/// is one advance wide and one ascent-to-descent line tall.
#[cfg(not(target_arch = "wasm32"))]
pub struct TrueTypeFont {
    font: fontdue::Font,
}

#[cfg(not(target_arch = "wasm32"))]
impl TrueTypeFont {
    pub const BASE_PX: f32 = 16.0;

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font = fontdue::Font::from_bytes(data, fontdue::FontSettings::default())
            .map_err(|e| GlyphrankError::Font(e.to_string()))?;
        Ok(Self { font })
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl GlyphSource for TrueTypeFont {
    fn metrics(&self, ch: char, scale: f32) -> GlyphMetrics {
        let px = Self::BASE_PX * scale;
        let glyph = self.font.metrics(ch, px);
        let height = match self.font.horizontal_line_metrics(px) {
            Some(line) => line.ascent - line.descent,
            None => glyph.height as f32,
        };
        GlyphMetrics {
            width: glyph.advance_width.ceil().max(0.0) as u32,
            height: height.ceil().max(0.0) as u32,
        }
    }

    fn rasterize(&self, ch: char, scale: f32, cell: GlyphMetrics) -> GrayImage {
        let px = Self::BASE_PX * scale;
        let mut img = GrayImage::new(cell.width, cell.height);

        let (metrics, bitmap) = self.font.rasterize(ch, px);
        if metrics.width == 0 || metrics.height == 0 {
            return img;
        }

        let baseline_y = match self.font.horizontal_line_metrics(px) {
            Some(line) => line.ascent.round() as i32,
            None => cell.height as i32,
        };
        let y_offset = baseline_y - metrics.height as i32 - metrics.ymin;
        let x_offset = metrics.xmin;

        for sy in 0..metrics.height {
            for sx in 0..metrics.width {
                let tx = x_offset + sx as i32;
                let ty = y_offset + sy as i32;
                if tx >= 0 && tx < cell.width as i32 && ty >= 0 && ty < cell.height as i32 {
                    let val = bitmap[sy * metrics.width + sx];
                    img.put_pixel(tx as u32, ty as u32, Luma([val]));
                }
            }
        }

        img
    }
}

const MISSING_GLYPH: [u8; 8] = [0x7E, 0x81, 0xA5, 0x81, 0xBD, 0x99, 0x81, 0x7E];

/// font8x8 "basic" set (Daniel Hepper, public domain), U+0020..=U+007E.
const FONT8X8_ASCII: [[u8; 8]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // space
    [0x18, 0x3C, 0x3C, 0x18, 0x18, 0x00, 0x18, 0x00], // !
    [0x6C, 0x6C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // "
    [0x6C, 0x6C, 0xFE, 0x6C, 0xFE, 0x6C, 0x6C, 0x00], // #
    [0x30, 0x7C, 0xC0, 0x78, 0x0C, 0xF8, 0x30, 0x00], // $
    [0x00, 0xC6, 0xCC, 0x18, 0x30, 0x66, 0xC6, 0x00], // %
    [0x38, 0x6C, 0x38, 0x76, 0xDC, 0xCC, 0x76, 0x00], // &
    [0x60, 0x60, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00], // '
    [0x18, 0x30, 0x60, 0x60, 0x60, 0x30, 0x18, 0x00], // (
    [0x60, 0x30, 0x18, 0x18, 0x18, 0x30, 0x60, 0x00], // )
    [0x00, 0x66, 0x3C, 0xFF, 0x3C, 0x66, 0x00, 0x00], // *
    [0x00, 0x30, 0x30, 0xFC, 0x30, 0x30, 0x00, 0x00], // +
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x30, 0x30, 0x60], // ,
    [0x00, 0x00, 0x00, 0xFC, 0x00, 0x00, 0x00, 0x00], // -
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x30, 0x30, 0x00], // .
    [0x06, 0x0C, 0x18, 0x30, 0x60, 0xC0, 0x80, 0x00], // /
    [0x7C, 0xC6, 0xCE, 0xDE, 0xF6, 0xE6, 0x7C, 0x00], // 0
    [0x30, 0x70, 0x30, 0x30, 0x30, 0x30, 0xFC, 0x00], // 1
    [0x78, 0xCC, 0x0C, 0x38, 0x60, 0xCC, 0xFC, 0x00], // 2
    [0x78, 0xCC, 0x0C, 0x38, 0x0C, 0xCC, 0x78, 0x00], // 3
    [0x1C, 0x3C, 0x6C, 0xCC, 0xFE, 0x0C, 0x1E, 0x00], // 4
    [0xFC, 0xC0, 0xF8, 0x0C, 0x0C, 0xCC, 0x78, 0x00], // 5
    [0x38, 0x60, 0xC0, 0xF8, 0xCC, 0xCC, 0x78, 0x00], // 6
    [0xFC, 0xCC, 0x0C, 0x18, 0x30, 0x30, 0x30, 0x00], // 7
    [0x78, 0xCC, 0xCC, 0x78, 0xCC, 0xCC, 0x78, 0x00], // 8
    [0x78, 0xCC, 0xCC, 0x7C, 0x0C, 0x18, 0x70, 0x00], // 9
    [0x00, 0x30, 0x30, 0x00, 0x00, 0x30, 0x30, 0x00], // :
    [0x00, 0x30, 0x30, 0x00, 0x00, 0x30, 0x30, 0x60], // ;
    [0x18, 0x30, 0x60, 0xC0, 0x60, 0x30, 0x18, 0x00], // <
    [0x00, 0x00, 0xFC, 0x00, 0x00, 0xFC, 0x00, 0x00], // =
    [0x60, 0x30, 0x18, 0x0C, 0x18, 0x30, 0x60, 0x00], // >
    [0x78, 0xCC, 0x0C, 0x18, 0x30, 0x00, 0x30, 0x00], // ?
    [0x7C, 0xC6, 0x8C, 0x18, 0x32, 0x66, 0xFE, 0x00], // @
    [0x30, 0x78, 0xCC, 0xCC, 0xFC, 0xCC, 0xCC, 0x00], // A
    [0xFC, 0x66, 0x66, 0x7C, 0x66, 0x66, 0xFC, 0x00], // B
    [0x3C, 0x66, 0xC0, 0xC0, 0xC0, 0x66, 0x3C, 0x00], // C
    [0x78, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0x78, 0x00], // D
    [0xFE, 0x62, 0x68, 0x78, 0x68, 0x62, 0xFE, 0x00], // E
    [0xFE, 0x62, 0x68, 0x78, 0x68, 0x60, 0xF0, 0x00], // F
    [0x3C, 0x66, 0xC0, 0xC0, 0xCE, 0x66, 0x3E, 0x00], // G
    [0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0x00], // H
    [0x78, 0x30, 0x30, 0x30, 0x30, 0x30, 0x78, 0x00], // I
    [0x1E, 0x0C, 0x0C, 0x0C, 0xCC, 0xCC, 0x78, 0x00], // J
    [0xE6, 0x66, 0x6C, 0x78, 0x6C, 0x66, 0xE6, 0x00], // K
    [0xF0, 0x60, 0x60, 0x60, 0x62, 0x66, 0xFE, 0x00], // L
    [0xC6, 0xEE, 0xFE, 0xFE, 0xD6, 0xC6, 0xC6, 0x00], // M
    [0xC6, 0xE6, 0xF6, 0xDE, 0xCE, 0xC6, 0xC6, 0x00], // N
    [0x38, 0x6C, 0xC6, 0xC6, 0xC6, 0x6C, 0x38, 0x00], // O
    [0xFC, 0x66, 0x66, 0x7C, 0x60, 0x60, 0xF0, 0x00], // P
    [0x78, 0xCC, 0xCC, 0xCC, 0xDC, 0x78, 0x1C, 0x00], // Q
    [0xFC, 0x66, 0x66, 0x7C, 0x6C, 0x66, 0xE6, 0x00], // R
    [0x78, 0xCC, 0xE0, 0x70, 0x1C, 0xCC, 0x78, 0x00], // S
    [0xFC, 0xB4, 0x30, 0x30, 0x30, 0x30, 0x78, 0x00], // T
    [0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0xFC, 0x00], // U
    [0xCC, 0xCC, 0xCC, 0xCC, 0xCC, 0x78, 0x30, 0x00], // V
    [0xC6, 0xC6, 0xC6, 0xD6, 0xFE, 0xEE, 0xC6, 0x00], // W
    [0xC6, 0xC6, 0x6C, 0x38, 0x38, 0x6C, 0xC6, 0x00], // X
    [0xCC, 0xCC, 0xCC, 0x78, 0x30, 0x30, 0x78, 0x00], // Y
    [0xFE, 0xC6, 0x8C, 0x18, 0x32, 0x66, 0xFE, 0x00], // Z
    [0x78, 0x60, 0x60, 0x60, 0x60, 0x60, 0x78, 0x00], // [
    [0xC0, 0x60, 0x30, 0x18, 0x0C, 0x06, 0x02, 0x00], // \
    [0x78, 0x18, 0x18, 0x18, 0x18, 0x18, 0x78, 0x00], // ]
    [0x10, 0x38, 0x6C, 0xC6, 0x00, 0x00, 0x00, 0x00], // ^
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF], // _
    [0x30, 0x30, 0x18, 0x00, 0x00, 0x00, 0x00, 0x00], // `
    [0x00, 0x00, 0x78, 0x0C, 0x7C, 0xCC, 0x76, 0x00], // a
    [0xE0, 0x60, 0x60, 0x7C, 0x66, 0x66, 0xDC, 0x00], // b
    [0x00, 0x00, 0x78, 0xCC, 0xC0, 0xCC, 0x78, 0x00], // c
    [0x1C, 0x0C, 0x0C, 0x7C, 0xCC, 0xCC, 0x76, 0x00], // d
    [0x00, 0x00, 0x78, 0xCC, 0xFC, 0xC0, 0x78, 0x00], // e
    [0x38, 0x6C, 0x60, 0xF0, 0x60, 0x60, 0xF0, 0x00], // f
    [0x00, 0x00, 0x76, 0xCC, 0xCC, 0x7C, 0x0C, 0xF8], // g
    [0xE0, 0x60, 0x6C, 0x76, 0x66, 0x66, 0xE6, 0x00], // h
    [0x30, 0x00, 0x70, 0x30, 0x30, 0x30, 0x78, 0x00], // i
    [0x0C, 0x00, 0x0C, 0x0C, 0x0C, 0xCC, 0xCC, 0x78], // j
    [0xE0, 0x60, 0x66, 0x6C, 0x78, 0x6C, 0xE6, 0x00], // k
    [0x70, 0x30, 0x30, 0x30, 0x30, 0x30, 0x78, 0x00], // l
    [0x00, 0x00, 0xCC, 0xFE, 0xFE, 0xD6, 0xC6, 0x00], // m
    [0x00, 0x00, 0xF8, 0xCC, 0xCC, 0xCC, 0xCC, 0x00], // n
    [0x00, 0x00, 0x78, 0xCC, 0xCC, 0xCC, 0x78, 0x00], // o
    [0x00, 0x00, 0xDC, 0x66, 0x66, 0x7C, 0x60, 0xF0], // p
    [0x00, 0x00, 0x76, 0xCC, 0xCC, 0x7C, 0x0C, 0x1E], // q
    [0x00, 0x00, 0xDC, 0x76, 0x66, 0x60, 0xF0, 0x00], // r
    [0x00, 0x00, 0x7C, 0xC0, 0x78, 0x0C, 0xF8, 0x00], // s
    [0x10, 0x30, 0x7C, 0x30, 0x30, 0x34, 0x18, 0x00], // t
    [0x00, 0x00, 0xCC, 0xCC, 0xCC, 0xCC, 0x76, 0x00], // u
    [0x00, 0x00, 0xCC, 0xCC, 0xCC, 0x78, 0x30, 0x00], // v
    [0x00, 0x00, 0xC6, 0xD6, 0xFE, 0xFE, 0x6C, 0x00], // w
    [0x00, 0x00, 0xC6, 0x6C, 0x38, 0x6C, 0xC6, 0x00], // x
    [0x00, 0x00, 0xCC, 0xCC, 0xCC, 0x7C, 0x0C, 0xF8], // y
    [0x00, 0x00, 0xFC, 0x98, 0x30, 0x64, 0xFC, 0x00], // z
    [0x1C, 0x30, 0x30, 0xE0, 0x30, 0x30, 0x1C, 0x00], // {
    [0x18, 0x18, 0x18, 0x00, 0x18, 0x18, 0x18, 0x00], // |
    [0xE0, 0x30, 0x30, 0x1C, 0x30, 0x30, 0xE0, 0x00], // }
    [0x76, 0xDC, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // ~
];
