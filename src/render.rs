//! Block-wise ASCII rendering: text grid plus a raster of drawn glyphs.

use crate::average::block_average;
use crate::glyph::{fit_to_block, BitmapFont, GlyphMetrics, GlyphSource};
use crate::ramp::AsciiRamp;
use crate::{ensure_non_empty, to_gray, GlyphrankError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

/// Output of one rendering pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiArt {
    /// One line per block row, one character per block.
    pub lines: Vec<String>,
    /// Glyphs drawn white on black, resized to the source dimensions.
    pub raster: GrayImage,
    /// Glyph cell size used before resizing.
    pub cell: GlyphMetrics,
}

impl AsciiArt {
    pub fn text(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

pub struct AsciiRenderer {
    ramp: AsciiRamp,
    block_size: u32,
    glyphs: Box<dyn GlyphSource>,
    reference: char,
}

impl Default for AsciiRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl AsciiRenderer {
    pub const DEFAULT_BLOCK_SIZE: u32 = 4;

    pub fn new() -> Self {
        Self {
            ramp: AsciiRamp::default(),
            block_size: Self::DEFAULT_BLOCK_SIZE,
            glyphs: Box::new(BitmapFont),
            reference: '@',
        }
    }

    /// Source pixels per character cell, in both axes.
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_ramp(mut self, ramp: AsciiRamp) -> Self {
        self.ramp = ramp;
        self
    }

    pub fn with_glyphs(mut self, glyphs: impl GlyphSource + 'static) -> Self {
        self.glyphs = Box::new(glyphs);
        self
    }

    /// Glyph measured to size the character cells.
    pub fn with_reference_glyph(mut self, reference: char) -> Self {
        self.reference = reference;
        self
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn ramp(&self) -> &AsciiRamp {
        &self.ramp
    }

    pub fn render(&self, image: &DynamicImage) -> Result<AsciiArt> {
        let gray = to_gray(image)?;
        self.render_gray(&gray)
    }

    pub fn render_gray(&self, gray: &GrayImage) -> Result<AsciiArt> {
        ensure_non_empty(gray)?;
        let block = self.block_size;
        if block == 0 {
            return Err(GlyphrankError::out_of_range("block size", block, ">= 1"));
        }

        let (img_w, img_h) = gray.dimensions();
        let cols = img_w.div_ceil(block);
        let rows = img_h.div_ceil(block);

        let (scale, cell) = fit_to_block(self.glyphs.as_ref(), self.reference, block)?;
        let canvas_w = cols * cell.width;
        let canvas_h = rows * cell.height;
        log::debug!(
            "ascii: {img_w}x{img_h} -> {cols}x{rows} blocks of {block}px, canvas {canvas_w}x{canvas_h}"
        );

        // Each ramp character is rasterized once and copied per block
        let tiles = self
            .ramp
            .chars()
            .iter()
            .map(|&ch| {
                let tile = self.glyphs.rasterize(ch, scale, cell);
                if tile.dimensions() != (cell.width, cell.height) {
                    return Err(GlyphrankError::Font(format!(
                        "glyph {ch:?} rasterized to {:?}, expected {}x{} cell",
                        tile.dimensions(),
                        cell.width,
                        cell.height
                    )));
                }
                Ok(tile)
            })
            .collect::<Result<Vec<GrayImage>>>()?;

        let ramp = &self.ramp;
        let tiles = &tiles;
        let render_band = |(block_row, band): (usize, &mut [u8])| -> String {
            let y = block_row as u32 * block;
            let mut line = String::with_capacity(cols as usize);
            for col in 0..cols {
                let intensity = block_average(gray, y, col * block, block);
                let idx = ramp.index_for(intensity);
                line.push(ramp.chars()[idx]);
                blit(&tiles[idx], band, canvas_w, col * cell.width);
            }
            line
        };

        let mut canvas = GrayImage::new(canvas_w, canvas_h);
        let band_len = (canvas_w * cell.height) as usize;

        #[cfg(not(target_arch = "wasm32"))]
        let lines: Vec<String> = canvas
            .par_chunks_mut(band_len)
            .enumerate()
            .map(render_band)
            .collect();
        #[cfg(target_arch = "wasm32")]
        let lines: Vec<String> = canvas
            .chunks_mut(band_len)
            .enumerate()
            .map(render_band)
            .collect();

        let raster = if canvas.dimensions() == (img_w, img_h) {
            canvas
        } else {
            imageops::resize(&canvas, img_w, img_h, FilterType::Nearest)
        };

        Ok(AsciiArt { lines, raster, cell })
    }
}

/// Copy `tile` into a band `stride` pixels wide, starting at column `x0`.
fn blit(tile: &GrayImage, band: &mut [u8], stride: u32, x0: u32) {
    let w = tile.width() as usize;
    for (ty, row) in tile.as_raw().chunks_exact(w).enumerate() {
        let start = ty * stride as usize + x0 as usize;
        band[start..start + w].copy_from_slice(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    struct MisfitGlyphs;

    impl GlyphSource for MisfitGlyphs {
        fn metrics(&self, _ch: char, scale: f32) -> GlyphMetrics {
            let side = (8.0 * scale).ceil() as u32;
            GlyphMetrics { width: side, height: side }
        }

        fn rasterize(&self, _ch: char, _scale: f32, cell: GlyphMetrics) -> GrayImage {
            GrayImage::new(cell.width + 1, cell.height)
        }
    }

    #[test]
    fn mis_sized_glyph_tiles_are_a_font_error() {
        let img = GrayImage::from_pixel(8, 8, Luma([90]));
        let result = AsciiRenderer::new().with_glyphs(MisfitGlyphs).render_gray(&img);
        assert!(matches!(result, Err(GlyphrankError::Font(_))));
    }

    #[test]
    fn uniform_mid_gray_scenario() {
        let img = GrayImage::from_pixel(10, 10, Luma([128]));
        let art = AsciiRenderer::new().with_block_size(5).render_gray(&img).unwrap();
        assert_eq!(art.lines, vec!["++".to_string(), "++".to_string()]);
        assert_eq!(art.text(), "++\n++\n");
        assert_eq!(art.raster.dimensions(), (10, 10));
    }

    #[test]
    fn grid_shape_rounds_up() {
        let img = GrayImage::from_pixel(11, 7, Luma([40]));
        let art = AsciiRenderer::new().render_gray(&img).unwrap();
        assert_eq!(art.lines.len(), 2);
        assert!(art.lines.iter().all(|l| l.chars().count() == 3));
        assert_eq!(art.raster.dimensions(), (11, 7));
    }

    #[test]
    fn uniform_grid_maps_to_single_character() {
        for v in [0u8, 17, 128, 200, 255] {
            let img = GrayImage::from_pixel(13, 9, Luma([v]));
            let art = AsciiRenderer::new().render_gray(&img).unwrap();
            let expected = AsciiRamp::default().char_for(v);
            assert!(art.lines.iter().flat_map(|l| l.chars()).all(|c| c == expected));
        }
    }

    #[test]
    fn two_columns_hit_ramp_ends() {
        let img = GrayImage::from_raw(2, 1, vec![0, 255]).unwrap();
        let ramp = AsciiRamp::default();
        let art = AsciiRenderer::new()
            .with_block_size(1)
            .render_gray(&img)
            .unwrap();
        let expected: String = [ramp.chars()[0], ramp.chars()[ramp.len() - 1]].iter().collect();
        assert_eq!(art.lines, vec![expected]);
    }

    #[test]
    fn black_image_renders_blank_raster() {
        let img = GrayImage::new(16, 16);
        let art = AsciiRenderer::new().render_gray(&img).unwrap();
        assert!(art.raster.pixels().all(|p| p.0[0] == 0));
        assert!(art.lines.iter().all(|l| l == "    "));
    }

    #[test]
    fn raster_matches_glyph_when_cell_equals_block() {
        let img = GrayImage::from_pixel(8, 8, Luma([255]));
        let art = AsciiRenderer::new().with_block_size(8).render_gray(&img).unwrap();
        let cell = GlyphMetrics { width: 8, height: 8 };
        assert_eq!(art.cell, cell);
        assert_eq!(art.raster, BitmapFont.rasterize('@', 1.0, cell));
    }

    #[test]
    fn glyphs_land_in_their_own_cells() {
        // left half black, right half white
        let img = GrayImage::from_fn(16, 8, |x, _| Luma([if x < 8 { 0 } else { 255 }]));
        let art = AsciiRenderer::new().with_block_size(8).render_gray(&img).unwrap();
        assert_eq!(art.lines, vec![" @".to_string()]);
        for (x, _, p) in art.raster.enumerate_pixels() {
            if x < 8 {
                assert_eq!(p.0[0], 0);
            }
        }
        assert!(art.raster.enumerate_pixels().any(|(x, _, p)| x >= 8 && p.0[0] == 255));
    }

    #[test]
    fn rendering_is_deterministic() {
        let img = GrayImage::from_fn(37, 23, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
        let renderer = AsciiRenderer::new().with_block_size(3);
        assert_eq!(renderer.render_gray(&img).unwrap(), renderer.render_gray(&img).unwrap());
    }

    #[test]
    fn rejects_zero_block_size() {
        let img = GrayImage::from_pixel(4, 4, Luma([1]));
        assert!(matches!(
            AsciiRenderer::new().with_block_size(0).render_gray(&img),
            Err(GlyphrankError::OutOfRange { name: "block size", .. })
        ));
    }

    #[test]
    fn rejects_empty_image() {
        let img = GrayImage::new(0, 0);
        assert!(matches!(
            AsciiRenderer::new().render_gray(&img),
            Err(GlyphrankError::InvalidInput(_))
        ));
    }

    #[test]
    fn color_input_is_converted() {
        let rgb = image::RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]));
        let art = AsciiRenderer::new()
            .render(&DynamicImage::ImageRgb8(rgb))
            .unwrap();
        assert_eq!(art.lines, vec!["@@".to_string(), "@@".to_string()]);
    }
}
