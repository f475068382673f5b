//! Offset index over the flattened flow, built once per request.
//!
//! Nodes are addressed by their position in `DocumentStructure::nodes`. All
//! point and range queries are binary searches over the sorted offsets.
//!
//! A *legal boundary* is a node start `o > 0` that no node spans across: every
//! node starting before `o` ends at or before it. Breaks are only ever placed on
//! legal boundaries, so no node (atomic or not) is ever cut.

use std::ops::Range;

use crate::layout::geometry::EPSILON;
use crate::layout::structure::DocumentStructure;

#[derive(Debug, Clone)]
pub struct FlowIndex {
    offsets: Vec<f32>,
    boundaries: Vec<f32>,
    content_end: f32,
}

impl FlowIndex {
    pub fn build(structure: &DocumentStructure) -> Self {
        let offsets: Vec<f32> = structure.nodes.iter().map(|n| n.offset).collect();

        let mut boundaries = Vec::new();
        let mut max_end = f32::NEG_INFINITY;
        for node in &structure.nodes {
            let offset = node.offset;
            let clear = max_end <= offset + EPSILON;
            let fresh = boundaries
                .last()
                .map_or(true, |&last: &f32| offset - last > EPSILON);
            if offset > EPSILON && clear && fresh {
                boundaries.push(offset);
            }
            max_end = max_end.max(node.end());
        }

        Self {
            offsets,
            boundaries,
            content_end: max_end.max(0.0),
        }
    }

    /// End of the last node. Pages never extend past it, whatever height the
    /// producer reported for the document.
    pub fn content_end(&self) -> f32 {
        self.content_end
    }

    pub fn boundaries(&self) -> &[f32] {
        &self.boundaries
    }

    pub fn is_boundary(&self, offset: f32) -> bool {
        let i = self.boundaries.partition_point(|&b| b < offset - EPSILON);
        self.boundaries
            .get(i)
            .is_some_and(|&b| (b - offset).abs() <= EPSILON)
    }

    /// Largest legal boundary `b` with `after < b <= limit`.
    pub fn boundary_at_or_before(&self, limit: f32, after: f32) -> Option<f32> {
        let i = self.boundaries.partition_point(|&b| b <= limit + EPSILON);
        i.checked_sub(1)
            .map(|j| self.boundaries[j])
            .filter(|&b| b > after + EPSILON)
    }

    /// Smallest legal boundary strictly after `pos`.
    pub fn boundary_after(&self, pos: f32) -> Option<f32> {
        let i = self.boundaries.partition_point(|&b| b <= pos + EPSILON);
        self.boundaries.get(i).copied()
    }

    /// Legal boundaries within `[lo, hi]`.
    pub fn boundaries_in(&self, lo: f32, hi: f32) -> &[f32] {
        let start = self.boundaries.partition_point(|&b| b < lo - EPSILON);
        let end = self.boundaries.partition_point(|&b| b <= hi + EPSILON);
        &self.boundaries[start..end.max(start)]
    }

    /// Positions of nodes whose offset lies in `[start, end)`.
    pub fn node_range(&self, start: f32, end: f32) -> Range<usize> {
        let lo = self.offsets.partition_point(|&o| o < start - EPSILON);
        let hi = self.offsets.partition_point(|&o| o < end - EPSILON);
        lo..hi.max(lo)
    }

    /// Position of the first node starting at `offset`.
    pub fn node_starting_at(&self, offset: f32) -> Option<usize> {
        let i = self.offsets.partition_point(|&o| o < offset - EPSILON);
        self.offsets
            .get(i)
            .filter(|&&o| (o - offset).abs() <= EPSILON)
            .map(|_| i)
    }
}
