//! WebAssembly bindings for glyphrank

use crate::compress::{compress_gray, Normalization};
use crate::ramp::AsciiRamp;
use crate::render::AsciiRenderer;
use crate::{to_gray, GlyphrankError};
use image::DynamicImage;
use wasm_bindgen::prelude::*;

fn to_js(err: GlyphrankError) -> JsValue {
    web_sys::console::warn_1(&JsValue::from_str(&err.to_string()));
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct WasmProcessor {
    block_size: u32,
    ramp: AsciiRamp,
    k: usize,
    clamp: bool,
}

#[wasm_bindgen]
impl WasmProcessor {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmProcessor {
        WasmProcessor {
            block_size: AsciiRenderer::DEFAULT_BLOCK_SIZE,
            ramp: AsciiRamp::default(),
            k: 70,
            clamp: false,
        }
    }

    #[wasm_bindgen]
    pub fn set_block_size(&mut self, block_size: u32) {
        self.block_size = block_size;
    }

    #[wasm_bindgen]
    pub fn set_ramp(&mut self, ramp: &str) -> Result<(), JsValue> {
        self.ramp = AsciiRamp::new(ramp).map_err(to_js)?;
        Ok(())
    }

    #[wasm_bindgen]
    pub fn set_k(&mut self, k: usize) {
        self.k = k;
    }

    #[wasm_bindgen]
    pub fn set_clamp(&mut self, enabled: bool) {
        self.clamp = enabled;
    }

    /// Render RGBA pixels as ASCII art.
    ///
    /// Returns an object with `text` (newline-separated rows) and `raster`
    /// (grayscale bytes, `width`×`height`, glyphs white on black).
    #[wasm_bindgen]
    pub fn render_ascii(&self, image_data: &[u8], width: u32, height: u32) -> Result<js_sys::Object, JsValue> {
        let image = rgba_image(image_data, width, height)?;
        let art = AsciiRenderer::new()
            .with_block_size(self.block_size)
            .with_ramp(self.ramp.clone())
            .render(&image)
            .map_err(to_js)?;

        let result = js_sys::Object::new();
        js_sys::Reflect::set(&result, &"text".into(), &art.text().into())?;
        js_sys::Reflect::set(
            &result,
            &"raster".into(),
            &js_sys::Uint8Array::from(art.raster.as_raw().as_slice()),
        )?;
        let columns = art.lines.first().map_or(0, |l| l.chars().count()) as u32;
        js_sys::Reflect::set(&result, &"columns".into(), &columns.into())?;
        js_sys::Reflect::set(&result, &"rows".into(), &(art.lines.len() as u32).into())?;
        Ok(result)
    }

    /// Low-rank grayscale reconstruction of RGBA pixels, `width`×`height` bytes.
    #[wasm_bindgen]
    pub fn compress(&self, image_data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, JsValue> {
        let image = rgba_image(image_data, width, height)?;
        let gray = to_gray(&image).map_err(to_js)?;
        let normalization = if self.clamp { Normalization::Clamp } else { Normalization::MinMax };
        let compressed = compress_gray(&gray, self.k, normalization).map_err(to_js)?;
        Ok(compressed.into_raw())
    }
}

impl Default for WasmProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn rgba_image(image_data: &[u8], width: u32, height: u32) -> Result<DynamicImage, JsValue> {
    let img = image::RgbaImage::from_raw(width, height, image_data.to_vec())
        .ok_or_else(|| JsValue::from_str("Invalid image dimensions"))?;
    Ok(DynamicImage::ImageRgba8(img))
}
