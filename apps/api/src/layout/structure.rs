//! Structure Analyzer: flattens the content tree into typed, measured flow nodes.
//!
//! # Flattening rules
//! - Walk depth-first. A node becomes a `DocumentNode` when it is a leaf or atomic;
//!   atomic containers are never descended into.
//! - Children classified as `Other` inherit their ancestor's section type.
//! - A lone top-level container taller than a page is a wrapper; its children
//!   are the sections.
//! - Atomic: headings, the top-level header block, single-entry containers that
//!   fit on a page, nodes shorter than `min_atomic_height`, and nodes matching
//!   an avoid selector.
//! - Flow node ids must be unique; render directives are keyed by them.
//! - Nodes without a positive, finite height are not measurable and are skipped
//!   (their children are still visited).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::classifier::{NodeClassifier, SectionType};
use crate::layout::diagnostics::LayoutError;
use crate::layout::geometry::{LayoutConfig, EPSILON};
use crate::layout::selector::{Selector, SelectorTarget};
use crate::layout::tree::{ContentNode, ContentTree};

// ────────────────────────────────────────────────────────────────────────────
// Output types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: String,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub offset: f32,
    pub height: f32,
    /// Lower = stronger candidate to start a new page before this node.
    pub priority: u32,
    /// Never split; never stands alone at a page edge.
    pub atomic: bool,
    /// Title-like node that must stay with the content after it.
    pub heading: bool,
    /// Index of the top-level section that owns this node.
    pub section: usize,
    /// First node (in flow order) of its section.
    pub section_start: bool,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
}

impl DocumentNode {
    pub fn end(&self) -> f32 {
        self.offset + self.height
    }

    pub fn selector_target(&self) -> SelectorTarget<'_> {
        SelectorTarget {
            id: &self.id,
            tag: self.tag.as_deref(),
            classes: &self.classes,
            section_type: self.section_type,
            section_start: self.section_start,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    /// Flow nodes sorted by offset.
    pub nodes: Vec<DocumentNode>,
    pub total_height: f32,
    pub estimated_pages: u32,
    pub has_images: bool,
    pub has_complex_layout: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Analysis
// ────────────────────────────────────────────────────────────────────────────

/// Builds the `DocumentStructure` for a content tree.
///
/// Fails with `LayoutError::Structure` when nothing in the tree is measurable
/// or two flow nodes share an id.
pub fn analyze_structure(
    tree: &ContentTree,
    classifier: &dyn NodeClassifier,
    config: &LayoutConfig,
) -> Result<DocumentStructure, LayoutError> {
    let avoid = Selector::parse_list(&config.avoid_breaks);
    let (roots, inherited) = section_roots(tree, classifier, config, &avoid);
    let mut nodes = Vec::new();

    for (section, top) in roots.iter().enumerate() {
        let mut walker = Walker {
            classifier,
            config,
            avoid: &avoid,
            section,
            section_started: false,
            out: &mut nodes,
        };
        walker.visit(top, inherited, 0);
    }

    if nodes.is_empty() {
        return Err(LayoutError::Structure(format!(
            "content tree has no measurable nodes ({} top-level nodes supplied)",
            tree.nodes.len()
        )));
    }

    let has_images = tree_has(tree, |n| {
        n.has_tag("img")
            || n.has_tag("svg")
            || n.has_tag("figure")
            || n.type_hint
                .as_deref()
                .is_some_and(|h| h.eq_ignore_ascii_case("image"))
    });

    let structure = normalize_structure(
        DocumentStructure {
            nodes,
            total_height: tree.total_height.unwrap_or(0.0),
            estimated_pages: 1,
            has_images,
            has_complex_layout: tree_has(tree, |n| n.has_tag("table")),
        },
        config,
    )?;

    debug!(
        nodes = structure.nodes.len(),
        total_height = structure.total_height,
        estimated_pages = structure.estimated_pages,
        classifier = classifier.name(),
        "document structure analyzed"
    );
    Ok(structure)
}

/// Brings a flattened flow into the shape every later stage relies on.
///
/// Unmeasurable nodes are dropped, the rest sorted by offset and shifted so the
/// flow starts at 0. `section_start`, `total_height` and `estimated_pages` are
/// recomputed; the reported height only ever raises `total_height`.
/// Fails with `LayoutError::Structure` when no node is left or two nodes share
/// an id.
pub fn normalize_structure(
    mut structure: DocumentStructure,
    config: &LayoutConfig,
) -> Result<DocumentStructure, LayoutError> {
    let supplied = structure.nodes.len();
    structure
        .nodes
        .retain(|n| n.offset.is_finite() && n.height.is_finite() && n.height > 0.0);
    if structure.nodes.is_empty() {
        return Err(LayoutError::Structure(format!(
            "no measurable nodes in the content flow ({supplied} supplied)"
        )));
    }

    {
        let mut ids = HashSet::new();
        if let Some(dup) = structure.nodes.iter().find(|n| !ids.insert(n.id.as_str())) {
            return Err(LayoutError::Structure(format!(
                "node id '{}' appears more than once in the content flow",
                dup.id
            )));
        }
    }

    let nodes = &mut structure.nodes;
    nodes.sort_by(|a, b| a.offset.total_cmp(&b.offset));

    // The flow starts at 0; shift producers that measure from a negative origin.
    let shift = nodes[0].offset.min(0.0);
    if shift < 0.0 {
        for node in nodes.iter_mut() {
            node.offset -= shift;
        }
    }

    let mut seen_sections = HashSet::new();
    for node in nodes.iter_mut() {
        node.section_start = seen_sections.insert(node.section);
    }

    let content_end = nodes.iter().map(DocumentNode::end).fold(0.0_f32, f32::max);
    let reported = Some(structure.total_height)
        .filter(|h| h.is_finite())
        .map_or(0.0, |h| h - shift);
    structure.total_height = content_end.max(reported);
    structure.estimated_pages =
        (structure.total_height / config.usable_height()).ceil().max(1.0) as u32;
    structure.has_complex_layout |= has_overlap(&structure.nodes);

    Ok(structure)
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

struct Walker<'a> {
    classifier: &'a dyn NodeClassifier,
    config: &'a LayoutConfig,
    avoid: &'a [Selector],
    section: usize,
    section_started: bool,
    out: &'a mut Vec<DocumentNode>,
}

impl Walker<'_> {
    fn visit(&mut self, node: &ContentNode, inherited: SectionType, depth: usize) {
        let own = self.classifier.classify(node);
        let section_type = if own == SectionType::Other {
            inherited
        } else {
            own
        };

        let height = node.bounds.height;
        let measurable = height.is_finite() && height > 0.0 && node.bounds.offset.is_finite();
        let heading = is_heading(node);
        let target = SelectorTarget {
            id: &node.id,
            tag: node.tag.as_deref(),
            classes: &node.classes,
            section_type,
            section_start: !self.section_started,
        };

        let atomic = heading
            || (depth == 0 && section_type == SectionType::Header)
            || (node.children.len() == 1
                && measurable
                && height <= self.config.usable_height() + EPSILON)
            || (measurable && height < self.config.min_atomic_height)
            || self.avoid.iter().any(|s| s.matches(&target));

        if node.children.is_empty() || (atomic && measurable) {
            if measurable {
                self.out.push(DocumentNode {
                    id: node.id.clone(),
                    section_type,
                    offset: node.bounds.offset,
                    height,
                    priority: section_type.priority(),
                    atomic,
                    heading,
                    section: self.section,
                    section_start: !self.section_started,
                    tag: node.tag.clone(),
                    classes: node.classes.clone(),
                });
                self.section_started = true;
            }
            return;
        }

        for child in &node.children {
            self.visit(child, section_type, depth + 1);
        }
    }
}

/// Top-level sections of the tree. A lone top-level container taller than a
/// page is only a wrapper: its children are the sections, and its own type
/// passes down to them.
fn section_roots<'t>(
    tree: &'t ContentTree,
    classifier: &dyn NodeClassifier,
    config: &LayoutConfig,
    avoid: &[Selector],
) -> (&'t [ContentNode], SectionType) {
    let mut roots = tree.nodes.as_slice();
    let mut inherited = SectionType::Other;

    while let [only] = roots {
        let own = classifier.classify(only);
        let height = only.bounds.height;
        let fits =
            height.is_finite() && height > 0.0 && height <= config.usable_height() + EPSILON;
        let target = SelectorTarget {
            id: &only.id,
            tag: only.tag.as_deref(),
            classes: &only.classes,
            section_type: own,
            section_start: true,
        };
        let kept_whole = is_heading(only)
            || own == SectionType::Header
            || avoid.iter().any(|s| s.matches(&target));
        if only.children.is_empty() || fits || kept_whole {
            break;
        }
        if own != SectionType::Other {
            inherited = own;
        }
        roots = &only.children;
    }

    (roots, inherited)
}

fn is_heading(node: &ContentNode) -> bool {
    const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];
    HEADING_TAGS.iter().any(|t| node.has_tag(t))
        || node.classes.iter().any(|c| {
            let c = c.to_ascii_lowercase();
            c.contains("title") || c.contains("heading")
        })
        || node
            .type_hint
            .as_deref()
            .is_some_and(|h| h.eq_ignore_ascii_case("title") || h.eq_ignore_ascii_case("heading"))
}

fn tree_has(tree: &ContentTree, predicate: impl Fn(&ContentNode) -> bool) -> bool {
    let mut found = false;
    tree.visit(&mut |n| found |= predicate(n));
    found
}

/// True when flow nodes overlap vertically (side-by-side columns).
fn has_overlap(nodes: &[DocumentNode]) -> bool {
    let mut max_end = f32::NEG_INFINITY;
    for node in nodes {
        if node.offset < max_end - EPSILON {
            return true;
        }
        max_end = max_end.max(node.end());
    }
    false
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::classifier::MarkerClassifier;
    use crate::layout::geometry::{default_layout_config, PageFormat};

    fn make_config() -> LayoutConfig {
        default_layout_config(PageFormat::Letter)
    }

    fn analyze(tree: &ContentTree) -> DocumentStructure {
        analyze_structure(tree, &MarkerClassifier, &make_config()).unwrap()
    }

    fn experience_section(offset: f32) -> ContentNode {
        ContentNode::new("experience", offset, 300.0).with_children(vec![
            ContentNode::new("exp-title", offset, 30.0).with_tag("h2"),
            ContentNode::new("job-1", offset + 30.0, 150.0),
            ContentNode::new("job-2", offset + 180.0, 120.0),
        ])
    }

    #[test]
    fn test_empty_tree_is_structure_error() {
        let result = analyze_structure(&ContentTree::new(vec![]), &MarkerClassifier, &make_config());
        assert!(matches!(result, Err(LayoutError::Structure(_))));
    }

    #[test]
    fn test_zero_height_tree_is_structure_error() {
        let tree = ContentTree::new(vec![ContentNode::new("empty", 0.0, 0.0)]);
        let result = analyze_structure(&tree, &MarkerClassifier, &make_config());
        assert!(matches!(result, Err(LayoutError::Structure(_))));
    }

    #[test]
    fn test_children_inherit_section_type() {
        let s = analyze(&ContentTree::new(vec![experience_section(0.0)]));
        assert_eq!(s.nodes.len(), 3);
        assert!(s
            .nodes
            .iter()
            .all(|n| n.section_type == SectionType::Experience));
        assert_eq!(s.nodes[1].priority, SectionType::Experience.priority());
    }

    #[test]
    fn test_heading_is_atomic_and_flagged() {
        let s = analyze(&ContentTree::new(vec![experience_section(0.0)]));
        let title = &s.nodes[0];
        assert!(title.heading);
        assert!(title.atomic);
        assert!(!s.nodes[1].atomic, "150-unit job entry is splittable");
    }

    #[test]
    fn test_short_node_is_atomic() {
        let tree = ContentTree::new(vec![
            ContentNode::new("a", 0.0, 40.0),
            ContentNode::new("b", 40.0, 200.0),
        ]);
        let s = analyze(&tree);
        assert!(s.nodes[0].atomic);
        assert!(!s.nodes[1].atomic);
    }

    #[test]
    fn test_single_entry_container_kept_whole() {
        let tree = ContentTree::new(vec![ContentNode::new("certifications", 0.0, 120.0)
            .with_children(vec![ContentNode::new("cert-1", 0.0, 120.0)])]);
        let s = analyze(&tree);
        assert_eq!(s.nodes.len(), 1);
        assert_eq!(s.nodes[0].id, "certifications");
        assert!(s.nodes[0].atomic);
    }

    #[test]
    fn test_tall_single_entry_container_is_descended() {
        let tree = ContentTree::new(vec![
            ContentNode::new("intro", 0.0, 100.0),
            ContentNode::new("wrapper", 100.0, 1500.0).with_children(vec![ContentNode::new(
                "body", 100.0, 1500.0,
            )
            .with_children(vec![
                ContentNode::new("p1", 100.0, 750.0),
                ContentNode::new("p2", 850.0, 750.0),
            ])]),
        ]);
        let s = analyze(&tree);
        let ids: Vec<&str> = s.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["intro", "p1", "p2"]);
        assert!(s.nodes.iter().all(|n| !n.atomic));
    }

    #[test]
    fn test_lone_wrapper_children_become_sections() {
        let leaves: Vec<ContentNode> = (0..24)
            .map(|i| ContentNode::new(format!("n{i}"), i as f32 * 100.0, 100.0))
            .collect();
        let tree = ContentTree::new(vec![ContentNode::new("root", 0.0, 2400.0)
            .with_children(vec![ContentNode::new("main", 0.0, 2400.0).with_children(leaves)])]);
        let s = analyze(&tree);
        assert_eq!(s.nodes.len(), 24);
        assert_eq!(s.nodes[23].section, 23);
        assert!(s.nodes.iter().all(|n| n.section_start && !n.atomic));
    }

    #[test]
    fn test_duplicate_flow_ids_are_structure_error() {
        let tree = ContentTree::new(vec![
            ContentNode::new("item", 0.0, 100.0),
            ContentNode::new("item", 100.0, 100.0),
        ]);
        let result = analyze_structure(&tree, &MarkerClassifier, &make_config());
        match result {
            Err(LayoutError::Structure(msg)) => assert!(msg.contains("'item'")),
            other => panic!("expected structure error, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_supplied_structure() {
        let mut s = analyze(&ContentTree::new(vec![experience_section(0.0)]));
        for node in &mut s.nodes {
            node.offset -= 100.0;
        }
        s.nodes[2].height = f32::NAN;
        s.nodes.reverse();
        s.total_height = 0.0;

        let n = normalize_structure(s, &make_config()).unwrap();
        let ids: Vec<&str> = n.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["exp-title", "job-1"]);
        assert!((n.nodes[0].offset - 0.0).abs() < EPSILON);
        assert!(n.nodes[0].section_start);
        assert!((n.total_height - 180.0).abs() < EPSILON);
    }

    #[test]
    fn test_normalize_rejects_unmeasurable_structure() {
        let mut s = analyze(&ContentTree::new(vec![ContentNode::new("a", 0.0, 100.0)]));
        s.nodes[0].height = 0.0;
        let result = normalize_structure(s, &make_config());
        assert!(matches!(result, Err(LayoutError::Structure(_))));
    }

    #[test]
    fn test_top_level_header_is_atomic() {
        let tree = ContentTree::new(vec![
            ContentNode::new("contact", 0.0, 90.0)
                .with_tag("header")
                .with_children(vec![
                    ContentNode::new("name", 0.0, 50.0),
                    ContentNode::new("email", 50.0, 40.0),
                ]),
            experience_section(90.0),
        ]);
        let s = analyze(&tree);
        assert_eq!(s.nodes[0].id, "contact");
        assert_eq!(s.nodes[0].section_type, SectionType::Header);
        assert!(s.nodes[0].atomic);
    }

    #[test]
    fn test_avoid_selector_marks_atomic() {
        let tree = ContentTree::new(vec![ContentNode::new("grid", 0.0, 400.0)
            .with_tag("table")
            .with_children(vec![
                ContentNode::new("row-1", 0.0, 200.0),
                ContentNode::new("row-2", 200.0, 200.0),
            ])]);
        let s = analyze(&tree);
        assert_eq!(s.nodes.len(), 1, "table kept whole");
        assert!(s.nodes[0].atomic);
        assert!(s.has_complex_layout);
    }

    #[test]
    fn test_nodes_sorted_and_section_start_recomputed() {
        let tree = ContentTree::new(vec![
            ContentNode::new("late", 500.0, 100.0),
            ContentNode::new("early", 0.0, 100.0),
        ]);
        let s = analyze(&tree);
        assert_eq!(s.nodes[0].id, "early");
        assert_eq!(s.nodes[0].section, 1);
        assert!(s.nodes.iter().all(|n| n.section_start));
    }

    #[test]
    fn test_negative_offsets_shifted_to_zero() {
        let tree = ContentTree::new(vec![
            ContentNode::new("a", -20.0, 100.0),
            ContentNode::new("b", 80.0, 100.0),
        ]);
        let s = analyze(&tree);
        assert!((s.nodes[0].offset - 0.0).abs() < EPSILON);
        assert!((s.nodes[1].offset - 100.0).abs() < EPSILON);
        assert!((s.total_height - 200.0).abs() < EPSILON);
    }

    #[test]
    fn test_total_height_uses_reported_when_larger() {
        let mut tree = ContentTree::new(vec![ContentNode::new("a", 0.0, 100.0)]);
        tree.total_height = Some(150.0);
        assert!((analyze(&tree).total_height - 150.0).abs() < EPSILON);
    }

    #[test]
    fn test_estimated_pages_from_usable_height() {
        // Letter usable height = 684
        let tree = ContentTree::new(vec![ContentNode::new("a", 0.0, 1400.0)]);
        assert_eq!(analyze(&tree).estimated_pages, 3);
    }

    #[test]
    fn test_advisory_flags() {
        let tree = ContentTree::new(vec![
            ContentNode::new("photo", 0.0, 100.0).with_tag("img"),
            ContentNode::new("left", 100.0, 200.0),
            ContentNode::new("right", 120.0, 200.0),
        ]);
        let s = analyze(&tree);
        assert!(s.has_images);
        assert!(s.has_complex_layout, "overlapping columns");

        let plain = analyze(&ContentTree::new(vec![experience_section(0.0)]));
        assert!(!plain.has_images);
        assert!(!plain.has_complex_layout);
    }
}
