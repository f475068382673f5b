use std::sync::Arc;

use crate::config::Config;
use crate::layout::{LayoutConfig, NodeClassifier};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable node classifier. Default: MarkerClassifier. Swap via CLASSIFIER env.
    pub classifier: Arc<dyn NodeClassifier>,
    /// Layout defaults for requests that carry no config of their own.
    pub layout: LayoutConfig,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            classifier: config.classifier.build(),
            layout: config.layout_config(),
            config,
        }
    }
}
