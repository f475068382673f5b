//! Page geometry and layout tunables.
//!
//! All lengths are in layout units (points for the built-in paper formats). The
//! rendering backend measures nodes in the same units, so the engine never
//! converts between them.
//!
//! `usable_height` is the page budget: paper height minus top/bottom margins and
//! the header/footer bands. Bands are reserved here, before any break is
//! computed, so every downstream stage sees the same budget.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::layout::classifier::SectionType;
use crate::layout::diagnostics::LayoutError;

/// Tolerance for offset comparisons.
pub(crate) const EPSILON: f32 = 1e-3;

// ────────────────────────────────────────────────────────────────────────────
// Page format
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFormat {
    /// US letter, 8.5" × 11".
    Letter,
    /// ISO A4, 210mm × 297mm.
    A4,
    /// US legal, 8.5" × 14".
    Legal,
    Custom { width: f32, height: f32 },
}

impl PageFormat {
    /// Returns `(width, height)` in points.
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            PageFormat::Letter => (612.0, 792.0),
            PageFormat::A4 => (595.0, 842.0),
            PageFormat::Legal => (612.0, 1008.0),
            PageFormat::Custom { width, height } => (*width, *height),
        }
    }
}

impl FromStr for PageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "letter" => Ok(PageFormat::Letter),
            "a4" => Ok(PageFormat::A4),
            "legal" => Ok(PageFormat::Legal),
            other => Err(format!(
                "unknown page format '{other}' (expected letter, a4 or legal)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn uniform(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Layout configuration
// ────────────────────────────────────────────────────────────────────────────

/// Explicit per-request layout parameters. The engine never reads globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub page_format: PageFormat,
    pub margins: Margins,
    /// Fixed running-header band, subtracted from the usable height.
    #[serde(default)]
    pub header_height: f32,
    /// Fixed running-footer band, subtracted from the usable height.
    #[serde(default)]
    pub footer_height: f32,
    /// Orphan/widow threshold: a stranded fragment shorter than this is a violation.
    pub min_section_height: f32,
    /// Nodes shorter than this are atomic.
    pub min_atomic_height: f32,
    /// Half-width of the window the optimizer searches for a replacement break.
    pub search_radius: f32,
    /// Preferred-break selectors. Position in the list is the break priority.
    #[serde(default)]
    pub preferred_breaks: Vec<String>,
    /// Nodes matching these selectors are never split.
    #[serde(default)]
    pub avoid_breaks: Vec<String>,
    /// A natural break is only taken once the page is at least this full (0.0 – 1.0).
    pub natural_break_min_fill: f32,
    /// Shrink factor used by the scale overflow strategy.
    pub scale_factor: f32,
    /// Spacing floor the compress strategy will not go below.
    pub min_node_spacing: f32,
}

/// Returns the default layout config for a paper format.
///
/// Assumes 0.75" (54pt) margins, no header/footer bands, a 50pt orphan/widow
/// threshold and a ±100pt optimizer window.
pub fn default_layout_config(page_format: PageFormat) -> LayoutConfig {
    LayoutConfig {
        page_format,
        margins: Margins::uniform(54.0),
        header_height: 0.0,
        footer_height: 0.0,
        min_section_height: 50.0,
        min_atomic_height: 50.0,
        search_radius: 100.0,
        preferred_breaks: [
            SectionType::Experience,
            SectionType::Education,
            SectionType::Certifications,
            SectionType::Skills,
            SectionType::Summary,
        ]
        .iter()
        .map(|t| t.as_str().to_string())
        .collect(),
        avoid_breaks: vec!["table".to_string(), "figure".to_string()],
        natural_break_min_fill: 0.6,
        scale_factor: 0.9,
        min_node_spacing: 4.0,
    }
}

impl LayoutConfig {
    /// Page height available to flow content once margins and bands are reserved.
    pub fn usable_height(&self) -> f32 {
        let (_, height) = self.page_format.dimensions();
        height - self.margins.top - self.margins.bottom - self.header_height - self.footer_height
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let (width, height) = self.page_format.dimensions();
        if !(width > 0.0 && height > 0.0) {
            return Err(LayoutError::InvalidConfig(format!(
                "page dimensions must be positive, got {width}×{height}"
            )));
        }
        let lengths = [
            ("margins.top", self.margins.top),
            ("margins.bottom", self.margins.bottom),
            ("header_height", self.header_height),
            ("footer_height", self.footer_height),
            ("min_section_height", self.min_section_height),
            ("min_atomic_height", self.min_atomic_height),
            ("search_radius", self.search_radius),
            ("min_node_spacing", self.min_node_spacing),
        ];
        if let Some((name, value)) = lengths.iter().find(|(_, v)| !(*v >= 0.0)) {
            return Err(LayoutError::InvalidConfig(format!(
                "{name} must be a non-negative number, got {value}"
            )));
        }
        if self.usable_height() <= 0.0 {
            return Err(LayoutError::InvalidConfig(format!(
                "margins and bands leave no usable page height ({:.0})",
                self.usable_height()
            )));
        }
        if !(self.scale_factor > 0.0 && self.scale_factor <= 1.0) {
            return Err(LayoutError::InvalidConfig(format!(
                "scale_factor must be in (0, 1], got {}",
                self.scale_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.natural_break_min_fill) {
            return Err(LayoutError::InvalidConfig(format!(
                "natural_break_min_fill must be in [0, 1], got {}",
                self.natural_break_min_fill
            )));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_usable_height_subtracts_margins() {
        let config = default_layout_config(PageFormat::Letter);
        assert!((config.usable_height() - (792.0 - 108.0)).abs() < EPSILON);
    }

    #[test]
    fn test_bands_reduce_usable_height() {
        let mut config = default_layout_config(PageFormat::A4);
        let before = config.usable_height();
        config.header_height = 30.0;
        config.footer_height = 20.0;
        assert!((before - config.usable_height() - 50.0).abs() < EPSILON);
    }

    #[test]
    fn test_page_format_from_str() {
        assert_eq!("A4".parse::<PageFormat>(), Ok(PageFormat::A4));
        assert_eq!(" letter ".parse::<PageFormat>(), Ok(PageFormat::Letter));
        assert!("tabloid".parse::<PageFormat>().is_err());
    }

    #[test]
    fn test_default_config_validates() {
        for format in [PageFormat::Letter, PageFormat::A4, PageFormat::Legal] {
            assert!(default_layout_config(format).validate().is_ok());
        }
    }

    #[test]
    fn test_bands_consuming_page_rejected() {
        let mut config = default_layout_config(PageFormat::Letter);
        config.header_height = 400.0;
        config.footer_height = 400.0;
        assert!(matches!(
            config.validate(),
            Err(LayoutError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_scale_factor_out_of_range_rejected() {
        let mut config = default_layout_config(PageFormat::Letter);
        config.scale_factor = 1.5;
        assert!(config.validate().is_err());
        config.scale_factor = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_radius_rejected() {
        let mut config = default_layout_config(PageFormat::Letter);
        config.search_radius = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_preferred_breaks_follow_section_order() {
        let config = default_layout_config(PageFormat::Letter);
        assert_eq!(config.preferred_breaks[0], "experience");
        assert_eq!(config.preferred_breaks[1], "education");
    }
}
