//! Page Assembler: turns a final break sequence into per-page layouts.

use serde::{Deserialize, Serialize};

use crate::layout::breaks::BreakPoint;
use crate::layout::index::FlowIndex;
use crate::layout::optimizer::break_violations;
use crate::layout::structure::DocumentStructure;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// 1-based.
    pub page_number: u32,
    pub start: f32,
    pub end: f32,
    pub height: f32,
    pub node_ids: Vec<String>,
    pub has_orphans: bool,
    pub has_widows: bool,
}

/// `(start, end)` of every page: `[0, b1), [b1, b2), …, [bn, total)`.
pub fn page_bounds(offsets: &[f32], total_height: f32) -> Vec<(f32, f32)> {
    let starts = std::iter::once(0.0).chain(offsets.iter().copied());
    let ends = offsets
        .iter()
        .copied()
        .chain(std::iter::once(total_height));
    starts.zip(ends).collect()
}

/// Builds one `PageLayout` per page.
///
/// `has_orphans` looks at the break opening the page, `has_widows` at the break
/// closing it, using the same fragment rule as the optimizer.
pub fn assemble_pages(
    breaks: &[BreakPoint],
    structure: &DocumentStructure,
    index: &FlowIndex,
    min_section_height: f32,
) -> Vec<PageLayout> {
    let offsets: Vec<f32> = breaks.iter().map(|b| b.offset).collect();
    let bounds = page_bounds(&offsets, index.content_end());
    let last = bounds.len() - 1;

    bounds
        .iter()
        .enumerate()
        .map(|(i, &(start, end))| {
            let node_ids = index
                .node_range(start, end)
                .map(|n| structure.nodes[n].id.clone())
                .collect();

            let has_orphans = i > 0 && {
                let prev = bounds[i - 1].0;
                break_violations(structure, index, prev, start, end, min_section_height)
                    .orphan
                    .is_some()
            };
            let has_widows = i < last && {
                let next = bounds[i + 1].1;
                break_violations(structure, index, start, end, next, min_section_height)
                    .widow
                    .is_some()
            };

            PageLayout {
                page_number: i as u32 + 1,
                start,
                end,
                height: end - start,
                node_ids,
                has_orphans,
                has_widows,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::breaks::{BreakOrigin, FORCED_PRIORITY};
    use crate::layout::classifier::MarkerClassifier;
    use crate::layout::geometry::{default_layout_config, PageFormat, EPSILON};
    use crate::layout::structure::analyze_structure;
    use crate::layout::tree::{ContentNode, ContentTree};

    fn prepare(tree: &ContentTree) -> (DocumentStructure, FlowIndex) {
        let config = default_layout_config(PageFormat::Letter);
        let structure = analyze_structure(tree, &MarkerClassifier, &config).unwrap();
        let index = FlowIndex::build(&structure);
        (structure, index)
    }

    fn at(offset: f32) -> BreakPoint {
        BreakPoint {
            node_id: String::new(),
            offset,
            origin: BreakOrigin::Forced,
            reason: String::new(),
            priority: FORCED_PRIORITY,
            resolution: None,
        }
    }

    fn uniform(count: usize) -> ContentTree {
        ContentTree::new(
            (0..count)
                .map(|i| ContentNode::new(format!("n{i}"), i as f32 * 100.0, 100.0))
                .collect(),
        )
    }

    #[test]
    fn test_page_bounds_cover_flow() {
        assert_eq!(
            page_bounds(&[1000.0, 2000.0], 2400.0),
            vec![(0.0, 1000.0), (1000.0, 2000.0), (2000.0, 2400.0)]
        );
        assert_eq!(page_bounds(&[], 500.0), vec![(0.0, 500.0)]);
    }

    #[test]
    fn test_every_node_on_exactly_one_page() {
        let (structure, index) = prepare(&uniform(24));
        let pages = assemble_pages(&[at(1000.0), at(2000.0)], &structure, &index, 50.0);
        assert_eq!(pages.len(), 3);

        let mut ids: Vec<&String> = pages.iter().flat_map(|p| &p.node_ids).collect();
        assert_eq!(ids.len(), structure.nodes.len());
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), structure.nodes.len());
    }

    #[test]
    fn test_height_is_end_minus_start() {
        let (structure, index) = prepare(&uniform(24));
        let pages = assemble_pages(&[at(1000.0), at(2000.0)], &structure, &index, 50.0);
        for page in &pages {
            assert!((page.height - (page.end - page.start)).abs() < EPSILON);
        }
        assert_eq!(pages[0].page_number, 1);
        assert!((pages[2].height - 400.0).abs() < EPSILON);
        assert_eq!(pages[1].node_ids.first().map(String::as_str), Some("n10"));
    }

    #[test]
    fn test_stranding_flags_on_both_sides() {
        // One section of 30 + 300; breaking at 30 widows "lead" on page 1.
        let tree = ContentTree::new(vec![ContentNode::new("s", 0.0, 330.0).with_children(
            vec![
                ContentNode::new("lead", 0.0, 30.0),
                ContentNode::new("body", 30.0, 300.0),
            ],
        )]);
        let (structure, index) = prepare(&tree);
        let pages = assemble_pages(&[at(30.0)], &structure, &index, 50.0);
        assert!(pages[0].has_widows);
        assert!(!pages[0].has_orphans);
        assert!(!pages[1].has_orphans);
        assert!(!pages[1].has_widows, "terminal page closes no break");
    }

    #[test]
    fn test_single_page_has_no_flags() {
        let (structure, index) = prepare(&uniform(3));
        let pages = assemble_pages(&[], &structure, &index, 50.0);
        assert_eq!(pages.len(), 1);
        assert!(!pages[0].has_orphans && !pages[0].has_widows);
        assert_eq!(pages[0].node_ids.len(), 3);
    }
}
