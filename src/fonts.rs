//! Font loading and text measurement using `ttf-parser`.
//!
//! Without loaded faces we fall back to Helvetica-like synthetic metrics so
//! that measurement stays deterministic. Loaded TTF/OTF faces feed both glyph
//! advances (layout) and glyph outlines (rasterisation).

use std::collections::HashMap;

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API). Empty for
    /// synthetic faces.
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
    pub line_gap: f32,
}

impl FontData {
    fn synthetic() -> Self {
        Self {
            bytes: Vec::new(),
            units_per_em: 1000.0,
            ascender: 750.0,
            descender: -250.0,
            line_gap: 0.0,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Manages loaded fonts.
#[derive(Clone)]
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
    default_key: FontKey,
    synthetic: FontData,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub fn new(family: &str, bold: bool, italic: bool) -> Self {
        Self {
            family: family.to_string(),
            bold,
            italic,
        }
    }
}

impl FontManager {
    pub fn new() -> Self {
        Self {
            fonts: HashMap::new(),
            default_key: FontKey::new("Helvetica", false, false),
            synthetic: FontData::synthetic(),
        }
    }

    /// Load a TTF/OTF font from bytes. The first loaded face becomes the
    /// fallback for families that are not loaded.
    pub fn load_font(
        &mut self,
        family: &str,
        bold: bool,
        italic: bool,
        bytes: Vec<u8>,
    ) -> Result<(), String> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| format!("Failed to parse font: {e}"))?;

        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            line_gap: face.line_gap() as f32,
            bytes,
        };

        let key = FontKey::new(family, bold, italic);
        if !self.fonts.values().any(|d| !d.is_synthetic()) {
            self.default_key = key.clone();
        }
        self.fonts.insert(key, data);
        Ok(())
    }

    /// Get font data for a key, falling back to the regular face of the same
    /// family, then the default face, then synthetic metrics.
    pub fn get(&self, key: &FontKey) -> &FontData {
        self.fonts
            .get(key)
            .or_else(|| self.fonts.get(&FontKey::new(&key.family, false, false)))
            .or_else(|| self.fonts.get(&self.default_key))
            .unwrap_or(&self.synthetic)
    }

    /// Measure the width of a string at a given font size (in px).
    /// If we have actual font bytes, we parse glyph advances. Otherwise we
    /// use an average character width heuristic (0.5 × font_size per char,
    /// 0.6 for monospace).
    pub fn measure_text_width(
        &self,
        text: &str,
        font_size: f32,
        bold: bool,
        italic: bool,
        family: &str,
    ) -> f32 {
        let data = self.get(&FontKey::new(family, bold, italic));

        if data.is_synthetic() {
            let avg = if is_monospace(family) {
                0.6
            } else if bold {
                // Bold is ~10 % wider.
                0.55
            } else {
                0.5
            };
            return text.chars().count() as f32 * font_size * avg;
        }

        // Parse the font and sum horizontal advances
        match ttf_parser::Face::parse(&data.bytes, 0) {
            Ok(face) => {
                let scale = font_size / data.units_per_em;
                text.chars()
                    .map(|ch| match face.glyph_index(ch) {
                        Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                        // Fallback for missing glyph
                        None => font_size * 0.5,
                    })
                    .sum()
            }
            Err(_) => text.chars().count() as f32 * font_size * 0.5,
        }
    }

    /// Measure the line height in px.
    pub fn line_height_px(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }

    /// Get the ascender in px for the given font.
    pub fn ascender_px(&self, font_size: f32, bold: bool, italic: bool, family: &str) -> f32 {
        let data = self.get(&FontKey::new(family, bold, italic));
        let scale = font_size / data.units_per_em;
        data.ascender * scale
    }

    /// Check if real font bytes are loaded for the default font.
    pub fn has_real_fonts(&self) -> bool {
        self.fonts
            .get(&self.default_key)
            .is_some_and(|d| !d.is_synthetic())
    }

    /// Font bytes used to draw text in the given face, if a real face backs it.
    pub fn font_bytes(&self, key: &FontKey) -> Option<&[u8]> {
        let data = self.get(key);
        (!data.is_synthetic()).then_some(data.bytes.as_slice())
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}

fn is_monospace(family: &str) -> bool {
    let f = family.to_ascii_lowercase();
    f.contains("mono") || f.contains("courier") || f.contains("consol")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        let w = mgr.measure_text_width("Hello", 16.0, false, false, "Helvetica");
        // 5 chars × 16 × 0.5 = 40
        assert!((w - 40.0).abs() < 0.1);
        let mono = mgr.measure_text_width("Hello", 10.0, false, false, "Courier");
        assert!((mono - 30.0).abs() < 0.1);
    }

    #[test]
    fn unloaded_faces_fall_back_to_synthetic_metrics() {
        let mgr = FontManager::new();
        assert!(!mgr.has_real_fonts());
        assert!(mgr.font_bytes(&FontKey::new("Inter", true, false)).is_none());
        assert!(mgr.get(&FontKey::new("Inter", true, false)).is_synthetic());
    }

    #[test]
    fn garbage_font_bytes_are_rejected() {
        let mut mgr = FontManager::new();
        assert!(mgr.load_font("Broken", false, false, vec![0, 1, 2, 3]).is_err());
    }
}
