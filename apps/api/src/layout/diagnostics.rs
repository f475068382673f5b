//! Engine errors and human-readable layout diagnostics.
//!
//! Only `LayoutError` aborts a request. Everything else is a `LayoutWarning`:
//! the pipeline keeps going with a best-effort layout and the warning's
//! `Display` text is surfaced to the host.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Fatal engine failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// The content tree has nothing measurable. The caller must resupply it.
    #[error("structure error: {0}")]
    Structure(String),

    #[error("invalid layout config: {0}")]
    InvalidConfig(String),
}

/// Which side of a break the stranded fragment sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stranding {
    /// Short fragment at the top of the following page.
    Orphan,
    /// Short fragment at the bottom of the preceding page.
    Widow,
}

impl std::fmt::Display for Stranding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stranding::Orphan => f.write_str("orphan"),
            Stranding::Widow => f.write_str("widow"),
        }
    }
}

/// Non-fatal findings. `Display` is the user-facing warning string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutWarning {
    /// Break optimization could not repair an orphan/widow inside the search window.
    #[error(
        "break at {offset:.0} leaves a {kind} of {height:.0} units (minimum {minimum:.0}); \
         no alternative within ±{radius:.0}, original break kept"
    )]
    BreakUnrepaired {
        offset: f32,
        kind: Stranding,
        height: f32,
        minimum: f32,
        radius: f32,
    },

    /// A page still exceeds its budget after one resolution pass.
    #[error("page {page} overflows its budget ({height:.0} > {budget:.0}); oversized page accepted")]
    OverflowUnresolved { page: u32, height: f32, budget: f32 },

    #[error("page {page} starts with orphaned content shorter than {minimum:.0} units")]
    OrphanedPage { page: u32, minimum: f32 },

    #[error("page {page} ends with widowed content shorter than {minimum:.0} units")]
    WidowedPage { page: u32, minimum: f32 },

    /// A caller-supplied break was discarded during sanitization.
    #[error("discarded break at {offset:.0}: {reason}")]
    InvalidBreak { offset: f32, reason: String },

    /// A stage produced an unusable result and the controller fell back.
    #[error("{stage} degraded to fallback: {detail}")]
    StageDegraded { stage: &'static str, detail: String },
}

/// Aggregated warnings and optimization notes for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub warnings: Vec<String>,
    pub optimizations: Vec<String>,
}

impl Diagnostics {
    pub fn warn(&mut self, warning: LayoutWarning) {
        warn!(%warning, "layout warning");
        self.warnings.push(warning.to_string());
    }

    pub fn note(&mut self, optimization: String) {
        self.optimizations.push(optimization);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
        self.optimizations.extend(other.optimizations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_warning_text() {
        let w = LayoutWarning::OverflowUnresolved {
            page: 2,
            height: 1200.0,
            budget: 1000.0,
        };
        assert_eq!(
            w.to_string(),
            "page 2 overflows its budget (1200 > 1000); oversized page accepted"
        );
    }

    #[test]
    fn test_unrepaired_warning_names_kind() {
        let w = LayoutWarning::BreakUnrepaired {
            offset: 980.0,
            kind: Stranding::Widow,
            height: 30.0,
            minimum: 50.0,
            radius: 100.0,
        };
        let text = w.to_string();
        assert!(text.contains("widow"), "got: {text}");
        assert!(text.contains("±100"), "got: {text}");
    }

    #[test]
    fn test_diagnostics_collects_strings() {
        let mut d = Diagnostics::default();
        d.warn(LayoutWarning::OrphanedPage {
            page: 3,
            minimum: 50.0,
        });
        d.note("moved break".to_string());
        assert_eq!(d.warnings.len(), 1);
        assert!(d.warnings[0].starts_with("page 3"));
        assert_eq!(d.optimizations, vec!["moved break".to_string()]);
    }
}
