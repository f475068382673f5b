pub mod health;

use axum::{routing::get, routing::post, Router};

use crate::layout::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Layout API
        .route("/api/v1/layout/analyze", post(handlers::handle_analyze))
        .route("/api/v1/layout/flow", post(handlers::handle_flow))
        .route("/api/v1/layout/optimize", post(handlers::handle_optimize))
        .route("/api/v1/layout/paginate", post(handlers::handle_paginate))
        .with_state(state)
}
