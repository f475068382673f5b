//! Axum route handlers for the Layout API.
//!
//! Every handler validates the request, then runs the engine on the blocking
//! pool under the configured time budget.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::layout::diagnostics::LayoutError;
use crate::layout::flow::{
    analyze_page_breaks, optimize_content_flow, paginate, resolve_content_flow, LayoutReport,
    PageBreakAnalysis,
};
use crate::layout::geometry::LayoutConfig;
use crate::layout::overflow::ContentFlow;
use crate::layout::structure::DocumentStructure;
use crate::layout::tree::ContentTree;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub tree: ContentTree,
    /// Precomputed structure; skips the analyzer when present.
    #[serde(default)]
    pub structure: Option<DocumentStructure>,
    #[serde(default)]
    pub config: Option<LayoutConfig>,
}

#[derive(Debug, Deserialize)]
pub struct FlowRequest {
    pub tree: ContentTree,
    pub analysis: PageBreakAnalysis,
    #[serde(default)]
    pub config: Option<LayoutConfig>,
}

#[derive(Debug, Serialize)]
pub struct FlowResponse {
    #[serde(flatten)]
    pub flow: ContentFlow,
    pub warnings: Vec<String>,
    pub optimizations: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    pub tree: ContentTree,
    pub flow: ContentFlow,
}

#[derive(Debug, Deserialize)]
pub struct PaginateRequest {
    pub tree: ContentTree,
    #[serde(default)]
    pub config: Option<LayoutConfig>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/layout/analyze
///
/// Recommends page breaks and returns the page layout they produce.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<PageBreakAnalysis>, AppError> {
    match &request.structure {
        Some(structure) => {
            check_node_count(&state, "structure", structure.nodes.len())?;
            check_node_count(&state, "tree", request.tree.node_count())?;
        }
        None => check_tree(&state, &request.tree)?,
    }
    let config = request.config.unwrap_or_else(|| state.layout.clone());
    let classifier = state.classifier.clone();

    let analysis = run_blocking(&state, "analyze", move || {
        analyze_page_breaks(
            &request.tree,
            request.structure.as_ref(),
            &config,
            classifier.as_ref(),
        )
    })
    .await?;

    info!(
        breaks = analysis.recommended_breaks.len(),
        pages = analysis.page_layout.len(),
        warnings = analysis.warnings.len(),
        "page breaks analyzed"
    );
    Ok(Json(analysis))
}

/// POST /api/v1/layout/flow
///
/// Sanitizes the supplied analysis, resolves overflow and returns the flow.
pub async fn handle_flow(
    State(state): State<AppState>,
    Json(request): Json<FlowRequest>,
) -> Result<Json<FlowResponse>, AppError> {
    check_tree(&state, &request.tree)?;
    let config = request.config.unwrap_or_else(|| state.layout.clone());
    let classifier = state.classifier.clone();

    let (flow, diagnostics) = run_blocking(&state, "flow", move || {
        resolve_content_flow(&request.tree, &request.analysis, &config, classifier.as_ref())
    })
    .await?;

    info!(
        pages = flow.total_pages,
        strategy = %flow.strategy,
        overflowing = flow.overflowing_pages().count(),
        "content flow resolved"
    );
    Ok(Json(FlowResponse {
        flow,
        warnings: diagnostics.warnings,
        optimizations: diagnostics.optimizations,
    }))
}

/// POST /api/v1/layout/optimize
///
/// Applies a flow to the tree as per-node render directives.
pub async fn handle_optimize(
    State(state): State<AppState>,
    Json(request): Json<OptimizeRequest>,
) -> Result<Json<ContentTree>, AppError> {
    check_tree(&state, &request.tree)?;
    if request.flow.pages.is_empty() {
        return Err(AppError::Validation("flow has no pages".to_string()));
    }

    let tree = run_blocking(&state, "optimize", move || {
        Ok(optimize_content_flow(&request.tree, &request.flow))
    })
    .await?;

    Ok(Json(tree))
}

/// POST /api/v1/layout/paginate
///
/// Full run: analysis, flow resolution and render directives in one call.
pub async fn handle_paginate(
    State(state): State<AppState>,
    Json(request): Json<PaginateRequest>,
) -> Result<Json<LayoutReport>, AppError> {
    check_tree(&state, &request.tree)?;
    let config = request.config.unwrap_or_else(|| state.layout.clone());
    let classifier = state.classifier.clone();

    let report = run_blocking(&state, "paginate", move || {
        paginate(&request.tree, &config, classifier.as_ref())
    })
    .await?;

    info!(
        pages = report.flow.total_pages,
        estimated = report.structure.estimated_pages,
        strategy = %report.flow.strategy,
        warnings = report.warnings.len(),
        "document paginated"
    );
    Ok(Json(report))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn check_tree(state: &AppState, tree: &ContentTree) -> Result<(), AppError> {
    if tree.nodes.is_empty() {
        return Err(AppError::Validation("tree has no nodes".to_string()));
    }
    check_node_count(state, "tree", tree.node_count())
}

fn check_node_count(state: &AppState, what: &str, count: usize) -> Result<(), AppError> {
    if count > state.config.max_tree_nodes {
        return Err(AppError::Validation(format!(
            "{what} has {count} nodes; the limit is {}",
            state.config.max_tree_nodes
        )));
    }
    Ok(())
}

/// Runs a layout job on the blocking pool, bounded by `LAYOUT_TIMEOUT_MS`.
///
/// The timeout stops waiting, not the job: a timed-out computation finishes
/// on its blocking thread and its result is dropped.
async fn run_blocking<T, F>(state: &AppState, op: &'static str, job: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, LayoutError> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(job);
    let joined = tokio::time::timeout(state.config.layout_timeout(), task)
        .await
        .map_err(|_| {
            warn!(op, timeout_ms = state.config.layout_timeout_ms, "layout job timed out");
            AppError::Timeout(op)
        })?;
    let result = joined
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in {op}: {e}")))?;
    Ok(result?)
}
