//! Break Point Finder: enumerates legal page-break candidates and picks the
//! recommended break sequence.
//!
//! # Candidates
//! - Natural: starts of nodes matching a preferred-break selector, ranked by the
//!   selector's position in the list.
//! - Forced: one per page height, stepping from offset 0 and snapping each step
//!   to the closest legal boundary at or below the target. When a block taller
//!   than a page leaves no such boundary, the first boundary after it is used.
//!
//! Candidates are merged in offset order; on a tie the natural (lower priority)
//! candidate survives.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::layout::geometry::{LayoutConfig, EPSILON};
use crate::layout::index::FlowIndex;
use crate::layout::overflow::OverflowStrategy;
use crate::layout::selector::Selector;
use crate::layout::structure::DocumentStructure;

/// Priority carried by forced candidates; always weaker than any natural one.
pub const FORCED_PRIORITY: u32 = 1_000;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakOrigin {
    Natural,
    Forced,
    Optimized,
}

/// A chosen offset where one page ends and the next begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakPoint {
    /// Id of the node that starts the new page.
    pub node_id: String,
    pub offset: f32,
    pub origin: BreakOrigin,
    pub reason: String,
    pub priority: u32,
    /// Set when the overflow resolver inserted this break.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<OverflowStrategy>,
}

impl BreakPoint {
    /// A forced break at a legal boundary, or `None` if no node starts there.
    pub fn forced(
        structure: &DocumentStructure,
        index: &FlowIndex,
        offset: f32,
        reason: String,
    ) -> Option<BreakPoint> {
        let node = &structure.nodes[index.node_starting_at(offset)?];
        Some(BreakPoint {
            node_id: node.id.clone(),
            offset: node.offset,
            origin: BreakOrigin::Forced,
            reason,
            priority: FORCED_PRIORITY,
            resolution: None,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Candidate enumeration
// ────────────────────────────────────────────────────────────────────────────

/// Returns all natural and forced candidates, sorted by offset, one per offset.
pub fn find_break_points(
    structure: &DocumentStructure,
    index: &FlowIndex,
    config: &LayoutConfig,
) -> Vec<BreakPoint> {
    let budget = config.usable_height();
    let mut candidates = natural_candidates(structure, index, config);
    candidates.extend(greedy_breaks(structure, index, budget));

    candidates.sort_by(|a, b| {
        a.offset
            .total_cmp(&b.offset)
            .then_with(|| a.priority.cmp(&b.priority))
    });
    candidates.dedup_by(|later, earlier| (later.offset - earlier.offset).abs() <= EPSILON);
    candidates
}

fn natural_candidates(
    structure: &DocumentStructure,
    index: &FlowIndex,
    config: &LayoutConfig,
) -> Vec<BreakPoint> {
    let preferred = Selector::parse_list(&config.preferred_breaks);
    if preferred.is_empty() {
        return Vec::new();
    }

    structure
        .nodes
        .iter()
        .filter(|node| index.is_boundary(node.offset))
        .filter_map(|node| {
            let target = node.selector_target();
            let rank = preferred.iter().position(|s| s.matches(&target))?;
            Some(BreakPoint {
                node_id: node.id.clone(),
                offset: node.offset,
                origin: BreakOrigin::Natural,
                reason: format!(
                    "{} boundary at '{}' (preferred #{})",
                    node.section_type.as_str(),
                    node.id,
                    rank + 1
                ),
                priority: rank as u32,
                resolution: None,
            })
        })
        .collect()
}

/// Forced breaks: one page height at a time from offset 0, each snapped to a
/// legal boundary. Always valid, so it doubles as the controller's fallback.
pub fn greedy_breaks(
    structure: &DocumentStructure,
    index: &FlowIndex,
    budget: f32,
) -> Vec<BreakPoint> {
    let mut out = Vec::new();
    let mut pos = 0.0_f32;
    while index.content_end() - pos > budget + EPSILON {
        let target = pos + budget;
        let Some(offset) = snap_to_boundary(index, pos, target) else {
            break;
        };
        if let Some(bp) = BreakPoint::forced(
            structure,
            index,
            offset,
            format!("page height step at {target:.0}, snapped to {offset:.0}"),
        ) {
            out.push(bp);
        }
        pos = offset;
    }
    out
}

/// Closest legal boundary in `(start, target]`, else the first one after `start`.
fn snap_to_boundary(index: &FlowIndex, start: f32, target: f32) -> Option<f32> {
    index
        .boundary_at_or_before(target, start)
        .or_else(|| index.boundary_after(start))
}

// ────────────────────────────────────────────────────────────────────────────
// Selection
// ────────────────────────────────────────────────────────────────────────────

/// Greedy page walk that turns candidates into the recommended break sequence.
///
/// For each page starting at `start`:
/// 1. Any natural candidate in `[start + min_fill × budget, start + budget]` wins:
///    lowest priority first, then the one that fills the page most.
/// 2. Otherwise the snapped forced boundary for this page is used.
///
/// The output is strictly increasing.
pub fn select_breaks(
    candidates: &[BreakPoint],
    structure: &DocumentStructure,
    index: &FlowIndex,
    config: &LayoutConfig,
) -> Vec<BreakPoint> {
    let budget = config.usable_height();
    let mut selected: Vec<BreakPoint> = Vec::new();
    let mut start = 0.0_f32;

    while index.content_end() - start > budget + EPSILON {
        let limit = start + budget;
        let floor = start + budget * config.natural_break_min_fill;

        let natural = candidates
            .iter()
            .filter(|c| c.origin == BreakOrigin::Natural)
            .filter(|c| c.offset > start + EPSILON && c.offset >= floor - EPSILON)
            .filter(|c| c.offset <= limit + EPSILON)
            .min_by(|a, b| by_priority_then_fill(a, b));

        let chosen = match natural {
            Some(c) => c.clone(),
            None => {
                let Some(offset) = snap_to_boundary(index, start, limit) else {
                    break;
                };
                let existing = candidates
                    .iter()
                    .find(|c| (c.offset - offset).abs() <= EPSILON)
                    .cloned();
                let Some(bp) = existing.or_else(|| {
                    BreakPoint::forced(
                        structure,
                        index,
                        offset,
                        format!("page full at {limit:.0}, snapped to {offset:.0}"),
                    )
                }) else {
                    break;
                };
                bp
            }
        };

        start = chosen.offset;
        selected.push(chosen);
    }

    selected
}

fn by_priority_then_fill(a: &BreakPoint, b: &BreakPoint) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| b.offset.total_cmp(&a.offset))
}

/// True when offsets strictly increase and every break sits on a legal boundary.
pub fn breaks_are_valid(breaks: &[BreakPoint], index: &FlowIndex) -> bool {
    breaks.windows(2).all(|w| w[1].offset > w[0].offset + EPSILON)
        && breaks.iter().all(|b| index.is_boundary(b.offset))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
