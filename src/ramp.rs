//! Character ramps mapping block intensity to a glyph.

use crate::{GlyphrankError, Result};

/// Ten-step ramp, darkest first.
pub const STANDARD_RAMP: &str = " .:-=+*#%@";

/// Long ramp for large outputs, darkest first.
pub const DETAILED_RAMP: &str =
    r#" .'`^",:;I!i><~+_-?][}{1)(|\/tfjrxnuvczXYUJCLQ0OZmwqpdkbhao*#MW&8%B@$"#;

/// Ordered characters from darkest to brightest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiRamp {
    chars: Vec<char>,
}

impl AsciiRamp {
    pub fn new(ramp: &str) -> Result<Self> {
        let chars: Vec<char> = ramp.chars().collect();
        if chars.len() < 2 {
            return Err(GlyphrankError::out_of_range(
                "ramp",
                format!("{} characters", chars.len()),
                "at least 2 characters",
            ));
        }
        Ok(Self { chars })
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Always false: [`AsciiRamp::new`] requires at least two characters.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// `ceil((len - 1) * intensity / 255)`, computed exactly in integers.
    pub fn index_for(&self, intensity: u8) -> usize {
        let steps = (self.chars.len() - 1) as u32;
        let idx = (steps * intensity as u32 + 254) / 255;
        (idx as usize).min(self.chars.len() - 1)
    }

    pub fn char_for(&self, intensity: u8) -> char {
        self.chars[self.index_for(intensity)]
    }
}

impl Default for AsciiRamp {
    fn default() -> Self {
        Self {
            chars: STANDARD_RAMP.chars().collect(),
        }
    }
}
