//! Foundation concepts: where recursion stops by domain knowledge

use std::collections::HashSet;

const GENETICS_FOUNDATIONS: &[&str] = &[
    "gene",
    "chromosome",
    "DNA",
    "RNA",
    "dominant",
    "recessive",
    "meiosis",
    "mitosis",
    "cell nucleus",
    "trait",
    "gamete",
    "allele",
    "homozygous",
    "heterozygous",
];

/// Concepts treated as axiomatic for one domain
///
/// Owned by the composition root and injected into the resolver. Membership
/// ignores case and surrounding whitespace.
#[derive(Debug, Clone, Default)]
pub struct FoundationSet {
    names: Vec<String>,
    index: HashSet<String>,
}

impl FoundationSet {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        let mut set = Self::default();
        for name in names {
            let name = name.trim().to_string();
            if !name.is_empty() && set.index.insert(name.to_lowercase()) {
                set.names.push(name);
            }
        }
        set
    }

    /// The default set for the genetics domain
    pub fn genetics() -> Self {
        Self::new(GENETICS_FOUNDATIONS.iter().map(|s| s.to_string()))
    }

    pub fn contains(&self, concept: &str) -> bool {
        self.index.contains(&concept.trim().to_lowercase())
    }

    /// Names in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for FoundationSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into))
    }
}
