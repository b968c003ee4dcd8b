//! Prerequisite tree nodes

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Why a node looks the way it does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOrigin {
    /// Member of the foundation set; never expanded
    Foundation,
    /// Depth budget exhausted (frontier node)
    DepthLimit,
    /// Children came from the knowledge store
    KnowledgeStore,
    /// Children came from the generative fallback
    Generated,
    /// No source produced usable prerequisites
    Unavailable,
    /// Deadline passed or the caller cancelled before a lookup finished
    TimedOut,
}

impl NodeOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Foundation => "foundation",
            Self::DepthLimit => "depth_limit",
            Self::KnowledgeStore => "knowledge_store",
            Self::Generated => "generated",
            Self::Unavailable => "unavailable",
            Self::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for NodeOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in a resolved prerequisite tree
///
/// `children` is `None` on foundation and frontier nodes, and `Some` (possibly
/// empty) on every node the resolver tried to expand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptNode {
    pub concept: String,
    pub level: u32,
    pub is_foundation: bool,
    pub origin: NodeOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ConceptNode>>,
}

impl ConceptNode {
    pub fn foundation(concept: impl Into<String>, level: u32) -> Self {
        Self {
            concept: concept.into(),
            level,
            is_foundation: true,
            origin: NodeOrigin::Foundation,
            children: None,
        }
    }

    pub fn frontier(concept: impl Into<String>, level: u32) -> Self {
        Self {
            concept: concept.into(),
            level,
            is_foundation: false,
            origin: NodeOrigin::DepthLimit,
            children: None,
        }
    }

    /// A non-foundation node that was expanded (or tried to be)
    pub fn expanded(
        concept: impl Into<String>,
        level: u32,
        origin: NodeOrigin,
        children: Vec<ConceptNode>,
    ) -> Self {
        Self {
            concept: concept.into(),
            level,
            is_foundation: false,
            origin,
            children: Some(children),
        }
    }

    /// Children, or an empty slice for leaves
    pub fn children(&self) -> &[ConceptNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// Total number of nodes in this subtree
    pub fn count_nodes(&self) -> usize {
        self.walk().count()
    }

    /// Deepest level reached in this subtree
    pub fn max_depth(&self) -> u32 {
        self.children()
            .iter()
            .map(ConceptNode::max_depth)
            .max()
            .unwrap_or(self.level)
    }

    /// Concept names at `level`, left to right
    pub fn nodes_at_level(&self, level: u32) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_level(level, &mut out);
        out
    }

    fn collect_level<'a>(&'a self, level: u32, out: &mut Vec<&'a str>) {
        if self.level == level {
            out.push(&self.concept);
            return;
        }
        if self.level < level {
            for child in self.children() {
                child.collect_level(level, out);
            }
        }
    }

    /// Pre-order walk over every node
    pub fn walk(&self) -> impl Iterator<Item = &ConceptNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children().iter().rev());
            Some(node)
        })
    }

    /// Indented outline, two spaces per level
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        self.render_into(0, &mut out);
        out
    }

    fn render_into(&self, indent: usize, out: &mut String) {
        let _ = write!(out, "{}{}", "  ".repeat(indent), self.concept);
        match self.origin {
            NodeOrigin::Foundation => out.push_str(" [foundation ✓]"),
            NodeOrigin::Unavailable => out.push_str(" [unresolved]"),
            NodeOrigin::TimedOut => out.push_str(" [timed out]"),
            _ => {}
        }
        out.push('\n');
        for child in self.children() {
            child.render_into(indent + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConceptNode {
        ConceptNode::expanded(
            "A",
            0,
            NodeOrigin::KnowledgeStore,
            vec![
                ConceptNode::expanded(
                    "B",
                    1,
                    NodeOrigin::Generated,
                    vec![ConceptNode::foundation("D", 2)],
                ),
                ConceptNode::foundation("C", 1),
            ],
        )
    }

    #[test]
    fn test_tree_metrics() {
        let tree = sample();
        assert_eq!(tree.count_nodes(), 4);
        assert_eq!(tree.max_depth(), 2);
        assert_eq!(tree.nodes_at_level(1), vec!["B", "C"]);
        assert_eq!(tree.nodes_at_level(2), vec!["D"]);
        assert!(tree.nodes_at_level(3).is_empty());
    }

    #[test]
    fn test_walk_is_pre_order() {
        let tree = sample();
        let names: Vec<&str> = tree.walk().map(|n| n.concept.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "D", "C"]);
    }

    #[test]
    fn test_render_text() {
        let text = sample().render_text();
        assert_eq!(
            text,
            "A\n  B\n    D [foundation ✓]\n  C [foundation ✓]\n"
        );
    }

    #[test]
    fn test_serialization_omits_absent_children() {
        let json = serde_json::to_value(ConceptNode::frontier("X", 0)).unwrap();
        assert_eq!(json["isFoundation"], false);
        assert_eq!(json["origin"], "depth_limit");
        assert!(json.get("children").is_none());

        let json =
            serde_json::to_value(ConceptNode::expanded("Z", 0, NodeOrigin::Unavailable, vec![]))
                .unwrap();
        assert_eq!(json["children"], serde_json::json!([]));
    }
}
