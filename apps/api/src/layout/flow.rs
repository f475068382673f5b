//! Flow Controller: runs the pagination pipeline end to end.
//!
//! ```text
//! analyze → index → find → select → optimize → (sanitize) → resolve → assemble
//! ```
//!
//! Only an unusable config or a tree with nothing measurable fails the request.
//! Any other stage problem becomes a warning plus a valid fallback: greedy
//! page-height breaks, which are always strictly increasing and legal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::assembler::{assemble_pages, PageLayout};
use crate::layout::breaks::{
    breaks_are_valid, find_break_points, greedy_breaks, select_breaks, BreakPoint,
};
use crate::layout::classifier::NodeClassifier;
use crate::layout::diagnostics::{Diagnostics, LayoutError, LayoutWarning};
use crate::layout::geometry::{LayoutConfig, EPSILON};
use crate::layout::index::FlowIndex;
use crate::layout::optimizer::optimize_breaks;
use crate::layout::overflow::{resolve_overflow, ContentFlow};
use crate::layout::structure::{analyze_structure, normalize_structure, DocumentStructure};
use crate::layout::tree::{Bounds, ContentNode, ContentTree, RenderDirectives};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBreakAnalysis {
    pub recommended_breaks: Vec<BreakPoint>,
    pub page_layout: Vec<PageLayout>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub optimizations: Vec<String>,
}

/// Result of a full `paginate` run.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutReport {
    pub structure: DocumentStructure,
    pub flow: ContentFlow,
    /// Input tree with render directives applied.
    pub tree: ContentTree,
    pub warnings: Vec<String>,
    pub optimizations: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Public operations
// ────────────────────────────────────────────────────────────────────────────

/// Recommends a break sequence and the page layout it produces.
///
/// A caller-supplied `structure` skips the analyzer but is normalized the same way.
pub fn analyze_page_breaks(
    tree: &ContentTree,
    structure: Option<&DocumentStructure>,
    config: &LayoutConfig,
    classifier: &dyn NodeClassifier,
) -> Result<PageBreakAnalysis, LayoutError> {
    config.validate()?;
    let structure = prepare_structure(tree, structure, config, classifier)?;
    let index = FlowIndex::build(&structure);
    let mut diagnostics = Diagnostics::default();

    let recommended_breaks = recommend_breaks(&structure, &index, config, &mut diagnostics);
    let page_layout = assemble_pages(
        &recommended_breaks,
        &structure,
        &index,
        config.min_section_height,
    );
    flag_pages(
        page_layout.iter().map(|p| (p.page_number, p.has_orphans, p.has_widows)),
        config.min_section_height,
        &mut diagnostics,
    );

    Ok(PageBreakAnalysis {
        recommended_breaks,
        page_layout,
        warnings: diagnostics.warnings,
        optimizations: diagnostics.optimizations,
    })
}

/// Builds the final `ContentFlow` from a (possibly caller-edited) analysis.
pub fn create_content_flow(
    tree: &ContentTree,
    analysis: &PageBreakAnalysis,
    config: &LayoutConfig,
    classifier: &dyn NodeClassifier,
) -> Result<ContentFlow, LayoutError> {
    resolve_content_flow(tree, analysis, config, classifier).map(|(flow, _)| flow)
}

/// `create_content_flow`, also returning the diagnostics of this run.
pub fn resolve_content_flow(
    tree: &ContentTree,
    analysis: &PageBreakAnalysis,
    config: &LayoutConfig,
    classifier: &dyn NodeClassifier,
) -> Result<(ContentFlow, Diagnostics), LayoutError> {
    config.validate()?;
    let structure = prepare_structure(tree, None, config, classifier)?;
    let index = FlowIndex::build(&structure);
    let mut diagnostics = Diagnostics::default();

    let breaks = sanitize_breaks(&analysis.recommended_breaks, &structure, &index, &mut diagnostics);
    let flow = finish_flow(breaks, &structure, &index, config, &mut diagnostics);
    Ok((flow, diagnostics))
}

/// Returns a copy of `tree` with render directives set from `flow`.
///
/// Nodes placed by the flow get their page, a `break_before` flag when they
/// open a page, the page scale and the spacing removed above them. Descendants
/// of a placed node follow its page. Other nodes carry no directives. The
/// result depends only on bounds and `flow`, so re-applying it is a no-op.
pub fn optimize_content_flow(tree: &ContentTree, flow: &ContentFlow) -> ContentTree {
    let mut bounds: HashMap<&str, Bounds> = HashMap::new();
    tree.visit(&mut |n| {
        bounds.entry(n.id.as_str()).or_insert(n.bounds);
    });

    let mut directives: HashMap<String, RenderDirectives> = HashMap::new();
    for page in &flow.pages {
        let mut cursor = page.start;
        for (k, id) in page.node_ids.iter().enumerate() {
            let spacing_reduction = match (page.spacing_ratio, bounds.get(id.as_str())) {
                (Some(ratio), Some(b)) => {
                    let gap = b.offset - cursor;
                    cursor = cursor.max(b.end());
                    Some((gap - flow.spacing_floor).max(0.0) * ratio).filter(|r| *r > EPSILON)
                }
                _ => None,
            };
            directives.insert(
                id.clone(),
                RenderDirectives {
                    page: page.page_number,
                    break_before: page.page_number > 1 && k == 0,
                    scale: page.scale,
                    spacing_reduction,
                },
            );
        }
    }

    let mut revised = tree.clone();
    for node in &mut revised.nodes {
        apply_directives(node, &directives, None);
    }
    revised
}

/// Full controller run: structure, breaks, overflow resolution and directives.
pub fn paginate(
    tree: &ContentTree,
    config: &LayoutConfig,
    classifier: &dyn NodeClassifier,
) -> Result<LayoutReport, LayoutError> {
    config.validate()?;
    let structure = prepare_structure(tree, None, config, classifier)?;
    let index = FlowIndex::build(&structure);
    let mut diagnostics = Diagnostics::default();

    let breaks = recommend_breaks(&structure, &index, config, &mut diagnostics);
    let flow = finish_flow(breaks, &structure, &index, config, &mut diagnostics);
    let revised = optimize_content_flow(tree, &flow);

    debug!(
        pages = flow.total_pages,
        strategy = %flow.strategy,
        warnings = diagnostics.warnings.len(),
        "pagination complete"
    );

    Ok(LayoutReport {
        structure,
        flow,
        tree: revised,
        warnings: diagnostics.warnings,
        optimizations: diagnostics.optimizations,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Stages
// ────────────────────────────────────────────────────────────────────────────

fn prepare_structure(
    tree: &ContentTree,
    supplied: Option<&DocumentStructure>,
    config: &LayoutConfig,
    classifier: &dyn NodeClassifier,
) -> Result<DocumentStructure, LayoutError> {
    match supplied {
        Some(supplied) => normalize_structure(supplied.clone(), config),
        None => analyze_structure(tree, classifier, config),
    }
}

/// Finder → selection → optimizer, guarded by the validity check.
fn recommend_breaks(
    structure: &DocumentStructure,
    index: &FlowIndex,
    config: &LayoutConfig,
    diagnostics: &mut Diagnostics,
) -> Vec<BreakPoint> {
    let candidates = find_break_points(structure, index, config);
    let selected = select_breaks(&candidates, structure, index, config);
    let selected = guard_breaks("break selection", selected, structure, index, config, diagnostics);

    let optimized = optimize_breaks(&selected, structure, index, config);
    diagnostics.extend(optimized.diagnostics);
    guard_breaks("break optimization", optimized.breaks, structure, index, config, diagnostics)
}

/// Passes `breaks` through when valid, otherwise warns and falls back to
/// greedy page-height breaks.
fn guard_breaks(
    stage: &'static str,
    breaks: Vec<BreakPoint>,
    structure: &DocumentStructure,
    index: &FlowIndex,
    config: &LayoutConfig,
    diagnostics: &mut Diagnostics,
) -> Vec<BreakPoint> {
    if breaks_are_valid(&breaks, index) {
        return breaks;
    }
    diagnostics.warn(LayoutWarning::StageDegraded {
        stage,
        detail: "breaks not strictly increasing on legal boundaries; using page-height breaks"
            .to_string(),
    });
    greedy_breaks(structure, index, config.usable_height())
}

/// Drops caller breaks that are out of order, off a legal boundary, or outside
/// the flow. Kept breaks are re-anchored to the node that starts there.
fn sanitize_breaks(
    breaks: &[BreakPoint],
    structure: &DocumentStructure,
    index: &FlowIndex,
    diagnostics: &mut Diagnostics,
) -> Vec<BreakPoint> {
    let mut kept: Vec<BreakPoint> = Vec::with_capacity(breaks.len());
    for bp in breaks {
        let prev = kept.last().map_or(0.0, |b| b.offset);
        let reason = if !bp.offset.is_finite() || bp.offset >= index.content_end() - EPSILON {
            Some("outside the content flow")
        } else if bp.offset <= prev + EPSILON {
            Some("not after the previous break")
        } else if !index.is_boundary(bp.offset) {
            Some("inside a node")
        } else {
            None
        };

        match (reason, index.node_starting_at(bp.offset)) {
            (None, Some(i)) => {
                let mut bp = bp.clone();
                bp.node_id = structure.nodes[i].id.clone();
                kept.push(bp);
            }
            (reason, _) => diagnostics.warn(LayoutWarning::InvalidBreak {
                offset: bp.offset,
                reason: reason.unwrap_or("no node starts there").to_string(),
            }),
        }
    }
    kept
}

fn finish_flow(
    breaks: Vec<BreakPoint>,
    structure: &DocumentStructure,
    index: &FlowIndex,
    config: &LayoutConfig,
    diagnostics: &mut Diagnostics,
) -> ContentFlow {
    let flow = resolve_overflow(breaks, structure, index, config, diagnostics);
    flag_pages(
        flow.pages.iter().map(|p| (p.page_number, p.has_orphans, p.has_widows)),
        config.min_section_height,
        diagnostics,
    );
    flow
}

fn flag_pages(
    pages: impl Iterator<Item = (u32, bool, bool)>,
    minimum: f32,
    diagnostics: &mut Diagnostics,
) {
    for (page, orphans, widows) in pages {
        if orphans {
            diagnostics.warn(LayoutWarning::OrphanedPage { page, minimum });
        }
        if widows {
            diagnostics.warn(LayoutWarning::WidowedPage { page, minimum });
        }
    }
}

fn apply_directives(
    node: &mut ContentNode,
    directives: &HashMap<String, RenderDirectives>,
    inherited: Option<&RenderDirectives>,
) {
    node.directives = match directives.get(&node.id) {
        Some(own) => Some(own.clone()),
        None => inherited.map(|d| RenderDirectives {
            page: d.page,
            break_before: false,
            scale: d.scale,
            spacing_reduction: None,
        }),
    };
    let placed = directives.get(&node.id);
    for child in &mut node.children {
        apply_directives(child, directives, placed.or(inherited));
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
