//! In-memory curated knowledge store
//!
//! Records are loaded once (from JSON or built in code) and never mutated
//! afterwards, so the store can be shared across concurrent resolutions
//! behind an `Arc` without coordination.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::agents::{ConceptAnalysis, ConceptEnrichment};
use crate::error::{Error, Result};

use super::store::{KnowledgeStore, PrerequisiteRef};

const BUNDLED_GENETICS: &str = include_str!("../../data/genetics.json");

/// Everything the store knows about one concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRecord {
    pub concept: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ConceptAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<ConceptEnrichment>,
}

impl ConceptRecord {
    pub fn new(concept: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            prerequisites: Vec::new(),
            analysis: None,
            enrichment: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StoreFile {
    #[serde(default)]
    domain: Option<String>,
    concepts: Vec<ConceptRecord>,
}

/// Curated store keyed by normalized concept name
#[derive(Debug, Clone, Default)]
pub struct CuratedKnowledgeStore {
    domain: Option<String>,
    records: HashMap<String, ConceptRecord>,
}

/// Case and surrounding whitespace never distinguish two concepts
fn key(concept: &str) -> String {
    concept.trim().to_lowercase()
}

impl CuratedKnowledgeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// The genetics store shipped with the crate
    pub fn genetics() -> Result<Self> {
        Self::from_json_str(BUNDLED_GENETICS)
    }

    /// Parse a store document: `{"domain": "...", "concepts": [...]}`
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: StoreFile = serde_json::from_str(json)
            .map_err(|e| Error::KnowledgeStore(format!("Invalid store document: {}", e)))?;
        let mut store = Self::from_records(file.concepts);
        store.domain = file.domain;
        Ok(store)
    }

    /// Load a store document from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::KnowledgeStore(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let store = Self::from_json_str(&contents)?;
        debug!(path = %path.display(), concepts = store.len(), "Loaded curated knowledge store");
        Ok(store)
    }

    /// Build from records; a later record for the same concept replaces an earlier one
    pub fn from_records(records: impl IntoIterator<Item = ConceptRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (key(&record.concept), record))
            .collect();
        Self {
            domain: None,
            records,
        }
    }

    /// Add or replace a whole record
    pub fn with_record(mut self, record: ConceptRecord) -> Self {
        self.records.insert(key(&record.concept), record);
        self
    }

    /// Set the curated prerequisites of `concept`
    pub fn with_prerequisites<S: AsRef<str>>(
        mut self,
        concept: impl Into<String>,
        prerequisites: &[S],
    ) -> Self {
        let record = self.entry(concept.into());
        record.prerequisites = prerequisites.iter().map(|p| p.as_ref().to_string()).collect();
        self
    }

    pub fn with_analysis(mut self, analysis: ConceptAnalysis) -> Self {
        let record = self.entry(analysis.concept.clone());
        record.analysis = Some(analysis);
        self
    }

    pub fn with_enrichment(mut self, enrichment: ConceptEnrichment) -> Self {
        let record = self.entry(enrichment.concept.clone());
        record.enrichment = Some(enrichment);
        self
    }

    fn entry(&mut self, concept: String) -> &mut ConceptRecord {
        self.records
            .entry(key(&concept))
            .or_insert_with(|| ConceptRecord::new(concept))
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn get(&self, concept: &str) -> Option<&ConceptRecord> {
        self.records.get(&key(concept))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Concept names in sorted order
    pub fn concepts(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.records.values().map(|r| r.concept.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl KnowledgeStore for CuratedKnowledgeStore {
    async fn lookup_prerequisites(&self, concept: &str) -> Result<Option<Vec<PrerequisiteRef>>> {
        Ok(self.get(concept).map(|record| {
            record
                .prerequisites
                .iter()
                .map(|p| PrerequisiteRef::new(p.as_str()))
                .collect()
        }))
    }

    async fn lookup_analysis(&self, concept: &str) -> Result<Option<ConceptAnalysis>> {
        Ok(self.get(concept).and_then(|record| record.analysis.clone()))
    }

    async fn lookup_enrichment(&self, concept: &str) -> Result<Option<ConceptEnrichment>> {
        Ok(self.get(concept).and_then(|record| record.enrichment.clone()))
    }

    fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }
}
