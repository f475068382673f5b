//! Content tree supplied by the rendering backend.
//!
//! The tree is an immutable, pre-measured snapshot: every node carries its
//! bounding box in flow coordinates. Top-level nodes are document sections.
//! `directives` is the only field the engine writes, and only on a copy
//! (see `flow::optimize_content_flow`).

use serde::{Deserialize, Serialize};

/// Measured bounding box. `offset` is the vertical position in the flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub offset: f32,
    #[serde(default)]
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(offset: f32, width: f32, height: f32) -> Self {
        Self {
            offset,
            width,
            height,
        }
    }

    pub fn end(&self) -> f32 {
        self.offset + self.height
    }
}

/// Page-assignment instructions for the painter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderDirectives {
    /// 1-based page the node is painted on.
    pub page: u32,
    /// True for the first node of every page after the first.
    pub break_before: bool,
    /// Uniform shrink applied to the node's page, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
    /// Units of vertical spacing removed above this node, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing_reduction: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    pub id: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Free-form type hint from the producer (e.g. "experience", "image").
    #[serde(default)]
    pub type_hint: Option<String>,
    /// Visible text, used only by text-based classifiers.
    #[serde(default)]
    pub text: Option<String>,
    pub bounds: Bounds,
    #[serde(default)]
    pub children: Vec<ContentNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directives: Option<RenderDirectives>,
}

impl ContentNode {
    pub fn new(id: impl Into<String>, offset: f32, height: f32) -> Self {
        Self {
            id: id.into(),
            tag: None,
            classes: Vec::new(),
            type_hint: None,
            text: None,
            bounds: Bounds::new(offset, 0.0, height),
            children: Vec::new(),
            directives: None,
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_type_hint(mut self, hint: &str) -> Self {
        self.type_hint = Some(hint.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<ContentNode>) -> Self {
        self.children = children;
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Depth-first visit of this node and all descendants.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a ContentNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTree {
    pub nodes: Vec<ContentNode>,
    /// Total measured content height, when the backend reports it.
    #[serde(default)]
    pub total_height: Option<f32>,
}

impl ContentTree {
    pub fn new(nodes: Vec<ContentNode>) -> Self {
        Self {
            nodes,
            total_height: None,
        }
    }

    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a ContentNode)) {
        for node in &self.nodes {
            node.visit(f);
        }
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |_| count += 1);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_count_includes_descendants() {
        let tree = ContentTree::new(vec![
            ContentNode::new("a", 0.0, 100.0).with_children(vec![
                ContentNode::new("a1", 0.0, 40.0),
                ContentNode::new("a2", 40.0, 60.0),
            ]),
            ContentNode::new("b", 100.0, 50.0),
        ]);
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_tree_deserializes_with_defaults() {
        let json = r#"{"nodes":[{"id":"n1","bounds":{"offset":0,"height":120}}]}"#;
        let tree: ContentTree = serde_json::from_str(json).unwrap();
        assert_eq!(tree.nodes[0].id, "n1");
        assert!(tree.nodes[0].children.is_empty());
        assert!(tree.nodes[0].directives.is_none());
        assert_eq!(tree.total_height, None);
    }

    #[test]
    fn test_has_tag_case_insensitive() {
        let node = ContentNode::new("h", 0.0, 20.0).with_tag("H2");
        assert!(node.has_tag("h2"));
        assert!(!node.has_tag("h3"));
    }
}
