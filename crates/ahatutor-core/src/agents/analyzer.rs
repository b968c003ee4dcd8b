//! Concept analysis stage

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use super::traits::ConceptAnalyzer;
use super::types::{Complexity, ConceptAnalysis, UserLevel};
use crate::error::Result;
use crate::knowledge::KnowledgeStore;
use crate::llm::{Message, StructuredChat, structured};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisReply {
    core_concept: String,
    domain: String,
    complexity: Complexity,
    #[serde(default)]
    visualization_potential: Option<f32>,
    #[serde(default)]
    suggested_visualizations: Vec<String>,
    #[serde(default)]
    key_terms: Vec<String>,
}

/// Store-first analyzer with a generative fallback
pub struct LlmConceptAnalyzer {
    chat: Arc<dyn StructuredChat>,
    store: Arc<dyn KnowledgeStore>,
}

impl LlmConceptAnalyzer {
    pub fn new(chat: Arc<dyn StructuredChat>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self { chat, store }
    }
}

#[async_trait]
impl ConceptAnalyzer for LlmConceptAnalyzer {
    async fn analyze(&self, concept: &str, user_level: UserLevel) -> Result<ConceptAnalysis> {
        match self.store.lookup_analysis(concept).await {
            Ok(Some(analysis)) => {
                debug!(concept = %concept, "Using curated analysis");
                return Ok(analysis);
            }
            Ok(None) => {}
            Err(e) => debug!(concept = %concept, error = %e, "Analysis lookup failed"),
        }

        let prompt = format!(
            "You are an expert genetics educator. Analyze the following learner input.\n\n\
             Input: \"{}\"\nLearner level: {}\n\n\
             Extract the core concept, its domain, its complexity, how well it lends itself to \
             visualization and its key terms. Respond in JSON.",
            concept, user_level
        );
        let schema = json!({
            "type": "object",
            "properties": {
                "coreConcept": { "type": "string" },
                "domain": { "type": "string" },
                "complexity": { "type": "string", "enum": ["basic", "intermediate", "advanced"] },
                "visualizationPotential": { "type": "number", "minimum": 0, "maximum": 1 },
                "suggestedVisualizations": { "type": "array", "items": { "type": "string" } },
                "keyTerms": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["coreConcept", "domain", "complexity", "keyTerms"]
        });

        let reply: AnalysisReply = structured(
            self.chat.as_ref(),
            vec![Message::user(prompt)],
            &schema,
            Some(0.3),
        )
        .await?;

        let analysis = ConceptAnalysis {
            concept: reply.core_concept,
            domain: reply.domain,
            complexity: reply.complexity,
            visualization_potential: reply.visualization_potential.unwrap_or(0.0).clamp(0.0, 1.0),
            suggested_visualizations: reply.suggested_visualizations,
            key_terms: reply.key_terms,
        };
        info!(concept = %analysis.concept, complexity = ?analysis.complexity, "Concept analyzed");
        Ok(analysis)
    }
}
