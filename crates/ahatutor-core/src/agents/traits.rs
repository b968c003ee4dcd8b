//! Stage seams used by the pipeline

use async_trait::async_trait;
use tracing::warn;

use super::types::{
    ConceptAnalysis, ConceptEnrichment, Difficulty, NarrativeComposition, QuizQuestion, UserLevel,
    VisualDesign,
};
use crate::error::Result;
use crate::prerequisites::ConceptNode;

/// "What is this really asking?"
#[async_trait]
pub trait ConceptAnalyzer: Send + Sync {
    async fn analyze(&self, concept: &str, user_level: UserLevel) -> Result<ConceptAnalysis>;
}

/// Definition, principles, formulas, examples and misconceptions for a concept
#[async_trait]
pub trait ConceptEnricher: Send + Sync {
    async fn enrich(&self, concept: &str) -> Result<ConceptEnrichment>;
}

/// Proposes how to visualize a concept
#[async_trait]
pub trait VisualDesigner: Send + Sync {
    async fn design(
        &self,
        concept: &str,
        analysis: &ConceptAnalysis,
        enrichment: &ConceptEnrichment,
        tree: &ConceptNode,
    ) -> Result<VisualDesign>;
}

/// Strings the material into a learning story
#[async_trait]
pub trait NarrativeComposer: Send + Sync {
    async fn compose(
        &self,
        concept: &str,
        analysis: &ConceptAnalysis,
        tree: &ConceptNode,
        enrichment: &ConceptEnrichment,
    ) -> Result<NarrativeComposition>;
}

/// Writes a multiple-choice question
#[async_trait]
pub trait QuizGenerator: Send + Sync {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        user_level: UserLevel,
    ) -> Result<QuizQuestion>;

    /// `count` questions, cycling through `topics` in order
    ///
    /// A question that cannot be written is logged and left out. The call
    /// fails only when every attempt failed.
    async fn generate_questions(
        &self,
        topics: &[String],
        difficulty: Difficulty,
        count: usize,
        user_level: UserLevel,
    ) -> Result<Vec<QuizQuestion>> {
        let mut questions = Vec::with_capacity(count);
        let mut last_error = None;
        for (i, topic) in topics.iter().cycle().take(count).enumerate() {
            match self.generate(topic, difficulty, user_level).await {
                Ok(question) => questions.push(question),
                Err(e) => {
                    warn!(topic = %topic, question = i + 1, error = %e, "Quiz question failed, skipping");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if questions.is_empty() => Err(e),
            _ => Ok(questions),
        }
    }
}
