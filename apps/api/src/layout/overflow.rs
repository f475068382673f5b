//! Overflow Resolver: brings over-budget pages back within the page budget.
//!
//! # Strategy order (per page, each at most once)
//! 1. `compress`: only when the spacing above the floor covers the overflow
//! 2. `split`: break at the median non-atomic node, when both halves fit or
//!    `newPage` has no boundary to use (a lopsided split costs an extra page)
//! 3. `newPage`: break at the last legal boundary within budget
//! 4. `scale`: only when `scale_factor` brings the page within budget
//!
//! `split` and `newPage` insert a break and re-evaluate the shortened page;
//! `compress` and `scale` finish it. A page nothing helps is accepted as is and
//! reported with `OverflowUnresolved`.
//!
//! Every decision is a pure function of the break sequence, so resolving an
//! already-resolved flow (same breaks in, same breaks out) changes nothing.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::assembler::{assemble_pages, PageLayout};
use crate::layout::breaks::BreakPoint;
use crate::layout::diagnostics::{Diagnostics, LayoutWarning};
use crate::layout::geometry::{LayoutConfig, EPSILON};
use crate::layout::index::FlowIndex;
use crate::layout::structure::DocumentStructure;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverflowStrategy {
    Compress,
    Split,
    NewPage,
    Scale,
}

impl OverflowStrategy {
    /// How much the strategy changes the rendered page. `NewPage` only moves
    /// content, `Scale` alters every glyph.
    fn invasiveness(self) -> u8 {
        match self {
            OverflowStrategy::NewPage => 0,
            OverflowStrategy::Compress => 1,
            OverflowStrategy::Split => 2,
            OverflowStrategy::Scale => 3,
        }
    }
}

impl std::fmt::Display for OverflowStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OverflowStrategy::Compress => "compress",
            OverflowStrategy::Split => "split",
            OverflowStrategy::NewPage => "newPage",
            OverflowStrategy::Scale => "scale",
        })
    }
}

/// A concrete remedy for one over-budget page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Remedy {
    /// Remove this fraction of the reclaimable spacing.
    Compress { ratio: f32 },
    Split { at: f32 },
    NewPage { at: f32 },
    Scale { factor: f32 },
}

impl Remedy {
    pub fn strategy(&self) -> OverflowStrategy {
        match self {
            Remedy::Compress { .. } => OverflowStrategy::Compress,
            Remedy::Split { .. } => OverflowStrategy::Split,
            Remedy::NewPage { .. } => OverflowStrategy::NewPage,
            Remedy::Scale { .. } => OverflowStrategy::Scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub page_number: u32,
    pub start: f32,
    pub end: f32,
    /// Measured height, `end - start`.
    pub natural_height: f32,
    /// Height once the page's adjustments are applied.
    pub effective_height: f32,
    /// Still over budget after resolution.
    pub overflow: bool,
    pub node_ids: Vec<String>,
    pub has_orphans: bool,
    pub has_widows: bool,
    /// Strategies applied to this page, in application order.
    #[serde(default)]
    pub applied: Vec<OverflowStrategy>,
    /// Fraction of each above-floor gap removed by `compress`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing_ratio: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFlow {
    pub total_pages: u32,
    pub pages: Vec<PageContent>,
    pub breaks: Vec<BreakPoint>,
    /// Most invasive strategy applied anywhere; `newPage` when none was needed.
    pub strategy: OverflowStrategy,
    pub page_budget: f32,
    /// Spacing floor `compress` worked against.
    pub spacing_floor: f32,
}

impl ContentFlow {
    pub fn overflowing_pages(&self) -> impl Iterator<Item = &PageContent> {
        self.pages.iter().filter(|p| p.overflow)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Strategy selection
// ────────────────────────────────────────────────────────────────────────────

/// The over-budget page being resolved.
pub struct PageSlice<'a> {
    pub structure: &'a DocumentStructure,
    pub index: &'a FlowIndex,
    pub start: f32,
    pub end: f32,
    pub budget: f32,
}

impl PageSlice<'_> {
    fn natural_height(&self) -> f32 {
        self.end - self.start
    }

    /// Σ max(0, gap − floor) over the gaps above each node on the page.
    pub fn reclaimable_spacing(&self, floor: f32) -> f32 {
        let mut cursor = self.start;
        let mut reclaimable = 0.0;
        for i in self.index.node_range(self.start, self.end) {
            let node = &self.structure.nodes[i];
            reclaimable += (node.offset - cursor - floor).max(0.0);
            cursor = cursor.max(node.end());
        }
        reclaimable
    }

    fn split_point(&self) -> Option<f32> {
        let range = self.index.node_range(self.start, self.end);
        let splittable: Vec<f32> = range
            .skip(1)
            .map(|i| &self.structure.nodes[i])
            .filter(|n| !n.atomic)
            .map(|n| n.offset)
            .collect();
        let target = *splittable.get(splittable.len() / 2)?;
        let inside = |b: f32| b > self.start + EPSILON && b < self.end - EPSILON;
        if inside(target) && self.index.is_boundary(target) {
            return Some(target);
        }
        self.index
            .boundaries_in(self.start, self.end)
            .iter()
            .copied()
            .filter(|&b| inside(b))
            .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()))
    }

    fn new_page_point(&self) -> Option<f32> {
        self.index
            .boundary_at_or_before(self.start + self.budget, self.start)
            .filter(|&b| b < self.end - EPSILON)
    }
}

/// Picks the first applicable remedy not in `tried`, or `None` when the page
/// has to be accepted oversized.
pub fn select_strategy(
    page: &PageSlice<'_>,
    config: &LayoutConfig,
    tried: &[OverflowStrategy],
) -> Option<Remedy> {
    let natural = page.natural_height();
    let overflow = natural - page.budget;
    let open = |s: OverflowStrategy| !tried.contains(&s);

    if open(OverflowStrategy::Compress) {
        let reclaimable = page.reclaimable_spacing(config.min_node_spacing);
        if reclaimable > EPSILON && reclaimable + EPSILON >= overflow {
            return Some(Remedy::Compress {
                ratio: (overflow / reclaimable).min(1.0),
            });
        }
    }
    if open(OverflowStrategy::Split) {
        if let Some(at) = page.split_point() {
            let balanced = at - page.start <= page.budget + EPSILON
                && page.end - at <= page.budget + EPSILON;
            let fallback = open(OverflowStrategy::NewPage)
                .then(|| page.new_page_point())
                .flatten();
            if balanced || fallback.is_none() {
                return Some(Remedy::Split { at });
            }
        }
    }
    if open(OverflowStrategy::NewPage) {
        if let Some(at) = page.new_page_point() {
            return Some(Remedy::NewPage { at });
        }
    }
    if open(OverflowStrategy::Scale) && natural * config.scale_factor <= page.budget + EPSILON {
        return Some(Remedy::Scale {
            factor: config.scale_factor,
        });
    }
    None
}

// ────────────────────────────────────────────────────────────────────────────
// Resolution
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct Adjustment {
    applied: Vec<OverflowStrategy>,
    spacing_ratio: Option<f32>,
    scale: Option<f32>,
    effective_height: f32,
}

/// Resolves every over-budget page and assembles the final `ContentFlow`.
///
/// `breaks` must already be strictly increasing legal boundaries.
pub fn resolve_overflow(
    breaks: Vec<BreakPoint>,
    structure: &DocumentStructure,
    index: &FlowIndex,
    config: &LayoutConfig,
    diagnostics: &mut Diagnostics,
) -> ContentFlow {
    let budget = config.usable_height();
    let total = index.content_end();
    let mut breaks = breaks;
    let mut adjustments: Vec<Adjustment> = Vec::new();
    let mut page = 0;

    while page <= breaks.len() {
        let start = if page == 0 { 0.0 } else { breaks[page - 1].offset };
        let end = breaks.get(page).map_or(total, |b| b.offset);
        let natural = end - start;

        // Break-inserting strategies are recorded on the break that closes the page.
        let tried: Vec<OverflowStrategy> =
            breaks.get(page).and_then(|b| b.resolution).into_iter().collect();
        let mut adjustment = Adjustment {
            applied: tried.clone(),
            effective_height: natural,
            ..Adjustment::default()
        };

        if natural > budget + EPSILON {
            let slice = PageSlice {
                structure,
                index,
                start,
                end,
                budget,
            };
            match select_strategy(&slice, config, &tried) {
                Some(remedy @ (Remedy::Split { at } | Remedy::NewPage { at })) => {
                    let strategy = remedy.strategy();
                    if let Some(mut bp) = BreakPoint::forced(
                        structure,
                        index,
                        at,
                        format!("{strategy} resolves overflow of page {}", page + 1),
                    ) {
                        debug!(page = page + 1, at, %strategy, "overflow break inserted");
                        bp.resolution = Some(strategy);
                        diagnostics.note(format!(
                            "page {}: {strategy} inserted a break at {at:.0}",
                            page + 1
                        ));
                        breaks.insert(page, bp);
                        // Re-evaluate the shortened page; its closing break now
                        // records the strategy as tried.
                        continue;
                    }
                }
                Some(Remedy::Compress { ratio }) => {
                    adjustment.applied.push(OverflowStrategy::Compress);
                    adjustment.spacing_ratio = Some(ratio);
                    adjustment.effective_height = budget;
                    diagnostics.note(format!(
                        "page {}: compressed spacing by {:.0}% to fit",
                        page + 1,
                        ratio * 100.0
                    ));
                }
                Some(Remedy::Scale { factor }) => {
                    adjustment.applied.push(OverflowStrategy::Scale);
                    adjustment.scale = Some(factor);
                    adjustment.effective_height = natural * factor;
                    diagnostics.note(format!("page {}: scaled to {factor:.2}", page + 1));
                }
                None => {}
            }
        }

        if adjustment.effective_height > budget + EPSILON {
            diagnostics.warn(LayoutWarning::OverflowUnresolved {
                page: page as u32 + 1,
                height: adjustment.effective_height,
                budget,
            });
        }
        adjustments.push(adjustment);
        page += 1;
    }

    let layouts = assemble_pages(&breaks, structure, index, config.min_section_height);
    let pages: Vec<PageContent> = layouts
        .into_iter()
        .zip(adjustments)
        .map(|(layout, adjustment)| page_content(layout, adjustment, budget))
        .collect();

    let strategy = pages
        .iter()
        .flat_map(|p| p.applied.iter().copied())
        .max_by_key(|s| s.invasiveness())
        .unwrap_or(OverflowStrategy::NewPage);

    ContentFlow {
        total_pages: pages.len() as u32,
        pages,
        breaks,
        strategy,
        page_budget: budget,
        spacing_floor: config.min_node_spacing,
    }
}

fn page_content(layout: PageLayout, adjustment: Adjustment, budget: f32) -> PageContent {
    PageContent {
        page_number: layout.page_number,
        start: layout.start,
        end: layout.end,
        natural_height: layout.height,
        effective_height: adjustment.effective_height,
        overflow: adjustment.effective_height > budget + EPSILON,
        node_ids: layout.node_ids,
        has_orphans: layout.has_orphans,
        has_widows: layout.has_widows,
        applied: adjustment.applied,
        spacing_ratio: adjustment.spacing_ratio,
        scale: adjustment.scale,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
