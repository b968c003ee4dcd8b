//! Knowledge store seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agents::{ConceptAnalysis, ConceptEnrichment};
use crate::error::Result;

/// Reference to a curated direct prerequisite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteRef {
    pub concept: String,
}

impl PrerequisiteRef {
    pub fn new(concept: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
        }
    }
}

impl From<&str> for PrerequisiteRef {
    fn from(concept: &str) -> Self {
        Self::new(concept)
    }
}

/// Read-only lookup of curated concept data
///
/// `Ok(None)` means the store has no entry for the concept. Implementations
/// must be safe to query concurrently.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Known direct prerequisites of `concept`, in curated order
    async fn lookup_prerequisites(&self, concept: &str) -> Result<Option<Vec<PrerequisiteRef>>>;

    /// Curated analysis of `concept`
    async fn lookup_analysis(&self, concept: &str) -> Result<Option<ConceptAnalysis>>;

    /// Curated teaching content for `concept`
    async fn lookup_enrichment(&self, concept: &str) -> Result<Option<ConceptEnrichment>>;

    /// Subject area the store covers, when it names one
    fn domain(&self) -> Option<&str> {
        None
    }
}
