//! Break Optimizer: local orphan/widow repair.
//!
//! Stranded content is measured per break as a *fragment*: the run of nodes from
//! the section split by the break, on one side of it, clipped to the
//! neighbouring breaks.
//!
//! - Widow: the fragment left at the bottom of the page before the break.
//! - Orphan: the fragment carried to the top of the page after the break.
//!
//! A break on a section boundary strands nothing, except that a heading directly
//! before a break is always a widow (it must stay with what follows).
//!
//! Violating breaks are moved to the nearest clean legal boundary within
//! `search_radius` that keeps both neighbouring pages within budget. When no
//! such boundary exists the break is kept and a warning is emitted. Breaks are
//! never dropped.

use serde::Serialize;
use tracing::debug;

use crate::layout::breaks::{BreakOrigin, BreakPoint};
use crate::layout::diagnostics::{Diagnostics, LayoutWarning, Stranding};
use crate::layout::geometry::{LayoutConfig, EPSILON};
use crate::layout::index::FlowIndex;
use crate::layout::structure::DocumentStructure;

/// Fragment heights that fall below the threshold on either side of a break.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BreakViolations {
    pub orphan: Option<f32>,
    pub widow: Option<f32>,
}

impl BreakViolations {
    pub fn is_clean(&self) -> bool {
        self.orphan.is_none() && self.widow.is_none()
    }

    /// The violation to report, widows first.
    fn worst(&self) -> Option<(Stranding, f32)> {
        self.widow
            .map(|h| (Stranding::Widow, h))
            .or_else(|| self.orphan.map(|h| (Stranding::Orphan, h)))
    }
}

/// Evaluates the break at `at` on the page sequence `[prev, at)`, `[at, next)`.
pub fn break_violations(
    structure: &DocumentStructure,
    index: &FlowIndex,
    prev: f32,
    at: f32,
    next: f32,
    min_height: f32,
) -> BreakViolations {
    let nodes = &structure.nodes;
    let above = index.node_range(prev, at);
    let below = index.node_range(at, next);

    let (Some(last), Some(first)) = (above.clone().last(), below.clone().next()) else {
        return BreakViolations::default();
    };
    let before = &nodes[last];
    let after = &nodes[first];

    let mut violations = BreakViolations::default();

    if before.heading {
        violations.widow = Some(before.height);
    }
    if before.section != after.section {
        return violations;
    }

    if violations.widow.is_none() {
        let run_start = above
            .clone()
            .rev()
            .take_while(|&i| nodes[i].section == before.section)
            .last()
            .unwrap_or(last);
        let fragment = at - nodes[run_start].offset;
        if fragment < min_height - EPSILON {
            violations.widow = Some(fragment);
        }
    }

    let run_end = below
        .take_while(|&i| nodes[i].section == after.section)
        .map(|i| nodes[i].end())
        .fold(at, f32::max);
    let fragment = run_end - at;
    if fragment < min_height - EPSILON {
        violations.orphan = Some(fragment);
    }

    violations
}

#[derive(Debug, Clone, Default)]
pub struct OptimizedBreaks {
    pub breaks: Vec<BreakPoint>,
    pub diagnostics: Diagnostics,
}

/// Repairs orphans and widows, left to right.
///
/// Each break is judged against the already-final break before it and the
/// original break after it. A replacement must lie strictly between the two, be
/// clean, and not push either neighbouring page over `budget` (unless that page
/// was already over budget with the original break).
pub fn optimize_breaks(
    breaks: &[BreakPoint],
    structure: &DocumentStructure,
    index: &FlowIndex,
    config: &LayoutConfig,
) -> OptimizedBreaks {
    let budget = config.usable_height();
    let min_height = config.min_section_height;
    let radius = config.search_radius;
    let mut out = OptimizedBreaks::default();

    for (i, bp) in breaks.iter().enumerate() {
        let prev = out.breaks.last().map_or(0.0, |b: &BreakPoint| b.offset);
        let next = breaks
            .get(i + 1)
            .map_or(index.content_end(), |b| b.offset);
        let at = bp.offset;

        let violations = break_violations(structure, index, prev, at, next, min_height);
        let Some((kind, height)) = violations.worst() else {
            out.breaks.push(bp.clone());
            continue;
        };

        let fits = |alt: f32| {
            (alt - prev <= budget + EPSILON || at - prev > budget + EPSILON)
                && (next - alt <= budget + EPSILON || next - at > budget + EPSILON)
        };

        let mut alternatives: Vec<f32> = index
            .boundaries_in(at - radius, at + radius)
            .iter()
            .copied()
            .filter(|&alt| alt > prev + EPSILON && alt < next - EPSILON)
            .filter(|&alt| (alt - at).abs() > EPSILON)
            .filter(|&alt| fits(alt))
            .collect();
        alternatives.sort_by(|a, b| {
            (a - at)
                .abs()
                .total_cmp(&(b - at).abs())
                .then_with(|| a.total_cmp(b))
        });

        let replacement = alternatives.into_iter().find(|&alt| {
            break_violations(structure, index, prev, alt, next, min_height).is_clean()
        });

        match replacement.and_then(|alt| relocated(structure, index, bp, alt, kind)) {
            Some(moved) => {
                debug!(from = at, to = moved.offset, %kind, "break relocated");
                out.diagnostics.note(format!(
                    "moved break from {at:.0} to {:.0} to avoid a {height:.0}-unit {kind}",
                    moved.offset
                ));
                out.breaks.push(moved);
            }
            None => {
                out.diagnostics.warn(LayoutWarning::BreakUnrepaired {
                    offset: at,
                    kind,
                    height,
                    minimum: min_height,
                    radius,
                });
                out.breaks.push(bp.clone());
            }
        }
    }

    out
}

fn relocated(
    structure: &DocumentStructure,
    index: &FlowIndex,
    original: &BreakPoint,
    offset: f32,
    kind: Stranding,
) -> Option<BreakPoint> {
    let node = &structure.nodes[index.node_starting_at(offset)?];
    Some(BreakPoint {
        node_id: node.id.clone(),
        offset: node.offset,
        origin: BreakOrigin::Optimized,
        reason: format!(
            "moved from {:.0} to avoid {kind} ({})",
            original.offset, original.reason
        ),
        priority: original.priority,
        resolution: original.resolution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::breaks::{find_break_points, select_breaks, FORCED_PRIORITY};
    use crate::layout::classifier::MarkerClassifier;
    use crate::layout::geometry::{default_layout_config, Margins, PageFormat};
    use crate::layout::structure::analyze_structure;
    use crate::layout::tree::{ContentNode, ContentTree};

    fn config_with_budget(budget: f32) -> LayoutConfig {
        let mut config = default_layout_config(PageFormat::Custom {
            width: 600.0,
            height: budget,
        });
        config.margins = Margins::uniform(0.0);
        config
    }

    /// Eight 120-unit sections, a 40+60 section straddling 1000, then five more.
    fn straddling_tree() -> ContentTree {
        let mut nodes: Vec<ContentNode> = (0..8)
            .map(|i| ContentNode::new(format!("s{i}"), i as f32 * 120.0, 120.0))
            .collect();
        nodes.push(
            ContentNode::new("split", 960.0, 100.0).with_children(vec![
                ContentNode::new("short", 960.0, 40.0),
                ContentNode::new("rest", 1000.0, 60.0),
            ]),
        );
        nodes.extend(
            (0..5).map(|i| ContentNode::new(format!("t{i}"), 1060.0 + i as f32 * 120.0, 120.0)),
        );
        ContentTree::new(nodes)
    }

    fn prepare(tree: &ContentTree, config: &LayoutConfig) -> (DocumentStructure, FlowIndex) {
        let structure = analyze_structure(tree, &MarkerClassifier, config).unwrap();
        let index = FlowIndex::build(&structure);
        (structure, index)
    }

    fn forced_at(offset: f32) -> BreakPoint {
        BreakPoint {
            node_id: String::new(),
            offset,
            origin: BreakOrigin::Forced,
            reason: "test".into(),
            priority: FORCED_PRIORITY,
            resolution: None,
        }
    }

    #[test]
    fn test_widow_relocated_before_short_node() {
        let config = config_with_budget(1000.0);
        let (structure, index) = prepare(&straddling_tree(), &config);
        let candidates = find_break_points(&structure, &index, &config);
        let naive = select_breaks(&candidates, &structure, &index, &config);
        assert_eq!(naive.len(), 1);
        assert!((naive[0].offset - 1000.0).abs() < EPSILON);

        let optimized = optimize_breaks(&naive, &structure, &index, &config);
        assert_eq!(optimized.breaks.len(), 1);
        let moved = &optimized.breaks[0];
        assert!((moved.offset - 960.0).abs() < EPSILON);
        assert_eq!(moved.origin, BreakOrigin::Optimized);
        assert_eq!(moved.node_id, "short");
        assert!(optimized.diagnostics.warnings.is_empty());
        assert_eq!(optimized.diagnostics.optimizations.len(), 1);
    }

    #[test]
    fn test_violations_measure_fragments() {
        let config = config_with_budget(1000.0);
        let (structure, index) = prepare(&straddling_tree(), &config);
        let total = index.content_end();

        let at_1000 = break_violations(&structure, &index, 0.0, 1000.0, total, 50.0);
        assert_eq!(at_1000.widow, Some(40.0));
        assert_eq!(at_1000.orphan, None, "60-unit fragment meets the minimum");

        let at_960 = break_violations(&structure, &index, 0.0, 960.0, total, 50.0);
        assert!(at_960.is_clean(), "section boundary strands nothing");
    }

    #[test]
    fn test_orphan_detected_on_following_page() {
        let config = config_with_budget(1000.0);
        let tree = ContentTree::new(vec![ContentNode::new("s", 0.0, 1130.0).with_children(
            vec![
                ContentNode::new("a", 0.0, 500.0),
                ContentNode::new("b", 500.0, 500.0),
                ContentNode::new("tail", 1000.0, 30.0),
                ContentNode::new("more", 1030.0, 100.0),
            ],
        )]);
        let (structure, index) = prepare(&tree, &config);
        let v = break_violations(&structure, &index, 0.0, 1030.0, 1130.0, 150.0);
        assert_eq!(v.orphan, Some(100.0));
        assert_eq!(v.widow, None);
    }

    #[test]
    fn test_heading_before_break_is_widow() {
        let config = config_with_budget(1000.0);
        let tree = ContentTree::new(vec![
            ContentNode::new("body", 0.0, 900.0),
            ContentNode::new("title", 900.0, 30.0).with_tag("h2"),
            ContentNode::new("next", 930.0, 400.0),
        ]);
        let (structure, index) = prepare(&tree, &config);
        let v = break_violations(&structure, &index, 0.0, 930.0, 1330.0, 20.0);
        assert_eq!(v.widow, Some(30.0));
    }

    #[test]
    fn test_unrepairable_break_kept_with_warning() {
        // Only boundary within reach is the violating one.
        let mut config = config_with_budget(1000.0);
        config.search_radius = 10.0;
        let (structure, index) = prepare(&straddling_tree(), &config);
        let out = optimize_breaks(&[forced_at(1000.0)], &structure, &index, &config);
        assert_eq!(out.breaks.len(), 1);
        assert!((out.breaks[0].offset - 1000.0).abs() < EPSILON);
        assert_eq!(out.breaks[0].origin, BreakOrigin::Forced);
        assert_eq!(out.diagnostics.warnings.len(), 1);
        assert!(out.diagnostics.warnings[0].contains("widow"));
    }

    #[test]
    fn test_replacement_never_overfills_page() {
        // 1300 is the only later option and is not a boundary; 990 keeps page one in budget.
        let config = config_with_budget(1000.0);
        let tree = ContentTree::new(vec![
            ContentNode::new("a", 0.0, 990.0),
            ContentNode::new("s", 990.0, 310.0).with_children(vec![
                ContentNode::new("s1", 990.0, 10.0),
                ContentNode::new("s2", 1000.0, 300.0),
            ]),
        ]);
        let (structure, index) = prepare(&tree, &config);
        let out = optimize_breaks(&[forced_at(1000.0)], &structure, &index, &config);
        assert!((out.breaks[0].offset - 990.0).abs() < EPSILON);
        for b in &out.breaks {
            assert!(b.offset <= 1000.0 + EPSILON);
        }
    }

    #[test]
    fn test_clean_breaks_pass_through_untouched() {
        let config = config_with_budget(1000.0);
        let tree = ContentTree::new(
            (0..24)
                .map(|i| ContentNode::new(format!("n{i}"), i as f32 * 100.0, 100.0))
                .collect(),
        );
        let (structure, index) = prepare(&tree, &config);
        let input = vec![forced_at(1000.0), forced_at(2000.0)];
        let out = optimize_breaks(&input, &structure, &index, &config);
        assert_eq!(out.breaks, input);
        assert!(out.diagnostics.optimizations.is_empty());
    }

    #[test]
    fn test_output_strictly_increasing() {
        let config = config_with_budget(500.0);
        let (structure, index) = prepare(&straddling_tree(), &config);
        let candidates = find_break_points(&structure, &index, &config);
        let naive = select_breaks(&candidates, &structure, &index, &config);
        let out = optimize_breaks(&naive, &structure, &index, &config);
        assert_eq!(out.breaks.len(), naive.len());
        assert!(out.breaks.windows(2).all(|w| w[1].offset > w[0].offset));
    }
}
