//! Concept enrichment stage

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use super::traits::ConceptEnricher;
use super::types::{ConceptEnrichment, Formula, WorkedExample};
use crate::error::Result;
use crate::knowledge::KnowledgeStore;
use crate::llm::{Message, StructuredChat, structured};

#[derive(Debug, Deserialize)]
struct EnrichmentReply {
    #[serde(default)]
    concept: Option<String>,
    definition: String,
    #[serde(default)]
    principles: Vec<String>,
    #[serde(default)]
    formulas: Vec<Formula>,
    #[serde(default)]
    examples: Vec<WorkedExample>,
    #[serde(default)]
    misconceptions: Vec<String>,
}

/// Store-first enricher with a generative fallback
pub struct LlmConceptEnricher {
    chat: Arc<dyn StructuredChat>,
    store: Arc<dyn KnowledgeStore>,
}

impl LlmConceptEnricher {
    pub fn new(chat: Arc<dyn StructuredChat>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self { chat, store }
    }

    async fn generate(&self, concept: &str) -> Result<ConceptEnrichment> {
        let prompt = format!(
            "You are a genetics teacher. Add detailed teaching content for this concept:\n\n\
             Concept: {}\n\n\
             Include:\n\
             1. A concise core definition\n\
             2. The laws or principles involved\n\
             3. Key formulas, in LaTeX\n\
             4. Classic worked examples\n\
             5. Common student misconceptions\n\n\
             Respond in JSON.",
            concept
        );
        let schema = json!({
            "type": "object",
            "properties": {
                "concept": { "type": "string" },
                "definition": { "type": "string" },
                "principles": { "type": "array", "items": { "type": "string" } },
                "formulas": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "key": { "type": "string" },
                            "latex": { "type": "string" },
                            "explanation": { "type": "string" }
                        }
                    }
                },
                "examples": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "description": { "type": "string" }
                        }
                    }
                },
                "misconceptions": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["definition"]
        });

        let reply: EnrichmentReply = structured(
            self.chat.as_ref(),
            vec![Message::user(prompt)],
            &schema,
            Some(0.5),
        )
        .await?;

        Ok(ConceptEnrichment {
            concept: reply
                .concept
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| concept.to_string()),
            definition: reply.definition,
            principles: reply.principles,
            formulas: reply.formulas,
            examples: reply.examples,
            misconceptions: reply.misconceptions,
        })
    }
}

#[async_trait]
impl ConceptEnricher for LlmConceptEnricher {
    async fn enrich(&self, concept: &str) -> Result<ConceptEnrichment> {
        match self.store.lookup_enrichment(concept).await {
            Ok(Some(enrichment)) => {
                debug!(concept = %concept, "Using curated enrichment");
                return Ok(enrichment);
            }
            Ok(None) => {}
            Err(e) => debug!(concept = %concept, error = %e, "Enrichment lookup failed"),
        }

        let enrichment = self.generate(concept).await?;
        info!(concept = %concept, principles = enrichment.principles.len(), "Concept enriched");
        Ok(enrichment)
    }
}
