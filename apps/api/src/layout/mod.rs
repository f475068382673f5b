// Pagination engine: structure analysis, break finding and repair, page
// assembly, overflow resolution.
// Pure synchronous code; handlers run it inside tokio::task::spawn_blocking.

pub mod assembler;
pub mod breaks;
pub mod classifier;
pub mod diagnostics;
pub mod flow;
pub mod geometry;
pub mod handlers;
pub mod index;
pub mod optimizer;
pub mod overflow;
pub mod selector;
pub mod structure;
pub mod tree;

// Re-export the public API consumed by the host (config, state, errors).
pub use classifier::{ClassifierKind, NodeClassifier};
pub use diagnostics::LayoutError;
pub use geometry::{default_layout_config, LayoutConfig, PageFormat};
