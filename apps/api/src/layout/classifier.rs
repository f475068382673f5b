//! Node Classification: pluggable, trait-based section typing for content nodes.
//!
//! Default: `MarkerClassifier` (structural markers only: type hints, ids,
//! classes, tags). Alternative: `KeywordClassifier` (heading-text keywords,
//! falling back to markers). Both are deterministic and stateless.
//!
//! `AppState` holds an `Arc<dyn NodeClassifier>`, swapped at startup via the
//! `CLASSIFIER` env var.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::layout::tree::ContentNode;

// ────────────────────────────────────────────────────────────────────────────
// Section types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Header,
    Summary,
    Experience,
    Education,
    Skills,
    Certifications,
    Other,
}

impl SectionType {
    /// Fixed matching order. Earlier types win when a node carries several markers.
    pub const MATCH_ORDER: [SectionType; 6] = [
        SectionType::Header,
        SectionType::Summary,
        SectionType::Experience,
        SectionType::Education,
        SectionType::Skills,
        SectionType::Certifications,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionType::Header => "header",
            SectionType::Summary => "summary",
            SectionType::Experience => "experience",
            SectionType::Education => "education",
            SectionType::Skills => "skills",
            SectionType::Certifications => "certifications",
            SectionType::Other => "other",
        }
    }

    pub fn from_name(name: &str) -> Option<SectionType> {
        let name = name.trim().to_ascii_lowercase();
        Self::MATCH_ORDER
            .into_iter()
            .chain(std::iter::once(SectionType::Other))
            .find(|t| t.as_str() == name)
    }

    /// Break priority of a node of this type. Lower = stronger candidate to
    /// start a new page before it.
    pub fn priority(self) -> u32 {
        match self {
            SectionType::Experience => 1,
            SectionType::Education => 2,
            SectionType::Certifications => 3,
            SectionType::Skills => 4,
            SectionType::Summary => 5,
            SectionType::Header => 6,
            SectionType::Other => 9,
        }
    }

    /// Heading phrases used by `KeywordClassifier`.
    fn keywords(self) -> &'static [&'static str] {
        match self {
            SectionType::Header => &["contact", "curriculum vitae"],
            SectionType::Summary => &["summary", "profile", "objective", "about me"],
            SectionType::Experience => &[
                "experience",
                "employment",
                "work history",
                "professional background",
            ],
            SectionType::Education => &["education", "academic", "degree"],
            SectionType::Skills => &["skills", "technologies", "tech stack", "competencies"],
            SectionType::Certifications => &["certification", "licenses", "credentials"],
            SectionType::Other => &[],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// The classifier trait. Implement this to swap heuristics without touching
/// the analyzer, handlers, or pagination code.
pub trait NodeClassifier: Send + Sync {
    /// Short backend name, reported in logs.
    fn name(&self) -> &'static str;

    /// Returns the node's own section type, or `Other` when nothing matches.
    /// Inheritance from ancestors is the analyzer's job.
    fn classify(&self, node: &ContentNode) -> SectionType;
}

// ────────────────────────────────────────────────────────────────────────────
// MarkerClassifier: default
// ────────────────────────────────────────────────────────────────────────────

/// Matches explicit structural markers, in `MATCH_ORDER`:
/// 1. `type_hint` equal to the type name
/// 2. an id or class containing the type name (`"work-experience"`)
/// 3. a `<header>` tag → `Header`
pub struct MarkerClassifier;

impl NodeClassifier for MarkerClassifier {
    fn name(&self) -> &'static str {
        "marker"
    }

    fn classify(&self, node: &ContentNode) -> SectionType {
        if let Some(hint) = node.type_hint.as_deref().and_then(SectionType::from_name) {
            return hint;
        }

        let id = node.id.to_ascii_lowercase();
        let classes: Vec<String> = node
            .classes
            .iter()
            .map(|c| c.to_ascii_lowercase())
            .collect();

        SectionType::MATCH_ORDER
            .into_iter()
            .find(|t| {
                let marker = t.as_str();
                id.contains(marker) || classes.iter().any(|c| c.contains(marker))
            })
            .or_else(|| node.has_tag("header").then_some(SectionType::Header))
            .unwrap_or(SectionType::Other)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordClassifier: text heuristic
// ────────────────────────────────────────────────────────────────────────────

/// Fuzzy classifier for producers that emit no structural markers.
///
/// Looks at the node's own text, or at its first child's text when the node is
/// a container (section title), for any keyword of a type in `MATCH_ORDER`.
/// Falls back to `MarkerClassifier` when no keyword matches.
pub struct KeywordClassifier;

/// Keyword matching only considers short, heading-like text.
const MAX_HEADING_CHARS: usize = 60;

impl NodeClassifier for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn classify(&self, node: &ContentNode) -> SectionType {
        let heading = node
            .text
            .as_deref()
            .or_else(|| node.children.first().and_then(|c| c.text.as_deref()))
            .filter(|t| t.chars().count() <= MAX_HEADING_CHARS)
            .map(str::to_lowercase);

        heading
            .and_then(|text| {
                SectionType::MATCH_ORDER
                    .into_iter()
                    .find(|t| t.keywords().iter().any(|kw| text.contains(kw)))
            })
            .unwrap_or_else(|| MarkerClassifier.classify(node))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Backend selection
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    Marker,
    Keyword,
}

impl ClassifierKind {
    pub fn build(self) -> Arc<dyn NodeClassifier> {
        match self {
            ClassifierKind::Marker => Arc::new(MarkerClassifier),
            ClassifierKind::Keyword => Arc::new(KeywordClassifier),
        }
    }
}

impl FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "marker" => Ok(ClassifierKind::Marker),
            "keyword" => Ok(ClassifierKind::Keyword),
            other => Err(format!(
                "unknown classifier '{other}' (expected marker or keyword)"
            )),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
