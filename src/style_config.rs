//! Style configuration – the passive description of paper, margins and font
//! that every later stage derives its physical constants from.

use serde::{Deserialize, Serialize};

/// CSS reference resolution (px per inch).
pub const CSS_PX_PER_INCH: f32 = 96.0;
/// PDF user-space resolution (pt per inch).
pub const PT_PER_INCH: f32 = 72.0;
pub const MM_PER_INCH: f32 = 25.4;

/// Supported paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    #[default]
    A4,
    Letter,
    Legal,
}

impl PaperSize {
    /// Physical size in millimetres, portrait.
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PaperSize::A4 => (210.0, 297.0),
            PaperSize::Letter => (215.9, 279.4),
            PaperSize::Legal => (215.9, 355.6),
        }
    }

    pub fn width_px(self) -> f32 {
        mm_to_px(self.dimensions_mm().0)
    }

    pub fn height_px(self) -> f32 {
        mm_to_px(self.dimensions_mm().1)
    }

    pub fn width_pt(self) -> f32 {
        mm_to_pt(self.dimensions_mm().0)
    }

    pub fn height_pt(self) -> f32 {
        mm_to_pt(self.dimensions_mm().1)
    }

    /// Name used in the CSS `@page { size: … }` rule.
    pub fn css_name(self) -> &'static str {
        match self {
            PaperSize::A4 => "A4",
            PaperSize::Letter => "letter",
            PaperSize::Legal => "legal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Some(PaperSize::A4),
            "letter" | "us-letter" => Some(PaperSize::Letter),
            "legal" => Some(PaperSize::Legal),
            _ => None,
        }
    }
}

pub fn mm_to_px(mm: f32) -> f32 {
    mm / MM_PER_INCH * CSS_PX_PER_INCH
}

pub fn mm_to_pt(mm: f32) -> f32 {
    mm / MM_PER_INCH * PT_PER_INCH
}

/// Paper, margin and font settings for one render.
///
/// Immutable per render: a changed config invalidates derived pages and the
/// injected scoped CSS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleConfig {
    pub paper_size: PaperSize,
    /// Horizontal page margin in CSS px.
    pub margin_h: f32,
    /// Vertical page margin in CSS px.
    pub margin_v: f32,
    /// Base font size in CSS px.
    pub font_size: f32,
    /// Line height multiplier.
    pub line_height: f32,
    pub font_family: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            paper_size: PaperSize::A4,
            margin_h: 48.0,
            margin_v: 40.0,
            font_size: 14.0,
            line_height: 1.5,
            font_family: "Helvetica".to_string(),
        }
    }
}

impl StyleConfig {
    pub fn letter() -> Self {
        Self {
            paper_size: PaperSize::Letter,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_in_css_pixels() {
        assert!((PaperSize::A4.width_px() - 793.7).abs() < 0.1);
        assert!((PaperSize::A4.height_px() - 1122.5).abs() < 0.1);
    }

    #[test]
    fn letter_in_points() {
        assert!((PaperSize::Letter.width_pt() - 612.0).abs() < 0.01);
        assert!((PaperSize::Letter.height_pt() - 792.0).abs() < 0.01);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = StyleConfig::from_json(r#"{"paperSize":"letter","marginV":20}"#).unwrap();
        assert_eq!(cfg.paper_size, PaperSize::Letter);
        assert_eq!(cfg.margin_v, 20.0);
        assert_eq!(cfg.font_size, StyleConfig::default().font_size);
    }
}
