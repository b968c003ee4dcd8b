//! Linearizing a prerequisite tree into a learning order

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::node::ConceptNode;

/// Deduplicated concepts, earliest prerequisite first, target last
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LearningPath(Vec<String>);

impl LearningPath {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, concept: &str) -> bool {
        self.0.iter().any(|c| c == concept)
    }

    /// The final entry (the target concept for a well-formed tree)
    pub fn target(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<'a> IntoIterator for &'a LearningPath {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for LearningPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(" → "))
    }
}

/// Post-order walk; the first occurrence of a name wins
///
/// Names are compared trimmed and case-insensitively, so "Allele" and
/// "allele " collapse to one step spelled the way it was first seen.
pub fn flatten(tree: &ConceptNode) -> LearningPath {
    let mut seen = HashSet::new();
    let mut path = Vec::new();
    visit(tree, &mut seen, &mut path);
    LearningPath(path)
}

fn visit(node: &ConceptNode, seen: &mut HashSet<String>, path: &mut Vec<String>) {
    for child in node.children() {
        visit(child, seen, path);
    }
    if seen.insert(node.concept.trim().to_lowercase()) {
        path.push(node.concept.clone());
    }
}
