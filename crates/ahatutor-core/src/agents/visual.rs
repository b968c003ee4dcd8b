//! Visual design stage

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::traits::VisualDesigner;
use super::types::{
    ConceptAnalysis, ConceptEnrichment, Layout, UnderstandingInsight, VisualDesign,
    VisualizationKind,
};
use crate::error::Result;
use crate::llm::{Message, StructuredChat, structured};
use crate::prerequisites::ConceptNode;

const KIND_KEYWORDS: &[(&[&str], VisualizationKind)] = &[
    (&["pedigree"], VisualizationKind::PedigreeChart),
    (
        &["sex-linked", "x-linked", "sex chromosome", "x chromosome"],
        VisualizationKind::InheritancePath,
    ),
    (
        &["cross", "gamete", "genotype", "punnett", "mendel"],
        VisualizationKind::PunnettSquare,
    ),
    (
        &["probability", "ratio", "frequency", "distribution", "hardy-weinberg"],
        VisualizationKind::ProbabilityDistribution,
    ),
];

/// Pick a visualization from the concept name, then its key terms
pub fn visualization_kind(concept: &str, analysis: &ConceptAnalysis) -> VisualizationKind {
    let matches = |text: &str| {
        let text = text.to_lowercase();
        KIND_KEYWORDS
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
            .map(|(_, kind)| *kind)
    };

    matches(concept)
        .or_else(|| matches(&analysis.key_terms.join(" ")))
        .unwrap_or(VisualizationKind::KnowledgeGraph)
}

#[derive(Debug, Deserialize)]
struct DesignReply {
    title: String,
    description: String,
    #[serde(default)]
    elements: Vec<String>,
    #[serde(default)]
    layout: Option<Layout>,
    #[serde(default)]
    annotations: Vec<String>,
}

/// Generative visual designer
///
/// A failed design request falls back to a generic layout; failed insights
/// are left empty. Neither fails the stage.
pub struct LlmVisualDesigner {
    chat: Arc<dyn StructuredChat>,
}

impl LlmVisualDesigner {
    pub fn new(chat: Arc<dyn StructuredChat>) -> Self {
        Self { chat }
    }

    async fn base_design(
        &self,
        concept: &str,
        kind: VisualizationKind,
        analysis: &ConceptAnalysis,
        enrichment: &ConceptEnrichment,
    ) -> VisualDesign {
        let formulas: Vec<&str> = enrichment.formulas.iter().map(|f| f.key.as_str()).collect();
        let prompt = format!(
            "You are an expert in genetics visualization. Design a visualization for this concept.\n\n\
             Concept: {concept}\n\
             Visualization type: {kind}\n\
             Complexity: {complexity:?}\n\
             Key terms: {terms}\n\
             Principles: {principles}\n\
             Formulas: {formulas}\n\n\
             The title and description should tell the learner what question the visualization answers. \
             Respond in JSON.",
            complexity = analysis.complexity,
            terms = analysis.key_terms.join(", "),
            principles = enrichment.principles.join(", "),
            formulas = formulas.join(", "),
        );
        let schema = json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "description": { "type": "string" },
                "elements": { "type": "array", "items": { "type": "string" } },
                "layout": { "type": "string", "enum": ["force", "hierarchical", "circular", "grid"] },
                "annotations": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["title", "description", "elements"]
        });

        match structured::<DesignReply>(
            self.chat.as_ref(),
            vec![Message::user(prompt)],
            &schema,
            Some(0.3),
        )
        .await
        {
            Ok(reply) => VisualDesign {
                kind,
                title: reply.title,
                description: reply.description,
                elements: reply.elements,
                layout: reply.layout.unwrap_or_default(),
                annotations: reply.annotations,
                insights: Vec::new(),
            },
            Err(e) => {
                warn!(concept = %concept, error = %e, "Visual design request failed, using default design");
                default_design(concept, kind, analysis)
            }
        }
    }

    async fn insights(
        &self,
        concept: &str,
        kind: VisualizationKind,
        tree: &ConceptNode,
    ) -> Vec<UnderstandingInsight> {
        let prompt = format!(
            "You are an education expert. Write 2-3 learning insights for a {} visualization of \"{}\".\n\n\
             Prerequisites:\n{}\n\
             Each insight has keyPoint, visualConnection, commonMistake and checkQuestion. \
             Respond with a JSON array.",
            kind,
            concept,
            tree.render_text(),
        );
        let schema = json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "keyPoint": { "type": "string" },
                    "visualConnection": { "type": "string" },
                    "commonMistake": { "type": "string" },
                    "checkQuestion": { "type": "string" }
                },
                "required": ["keyPoint", "visualConnection", "commonMistake", "checkQuestion"]
            },
            "minItems": 2,
            "maxItems": 4
        });

        structured(self.chat.as_ref(), vec![Message::user(prompt)], &schema, Some(0.3))
            .await
            .unwrap_or_else(|e| {
                warn!(concept = %concept, error = %e, "Insight generation failed");
                Vec::new()
            })
    }
}

fn default_design(concept: &str, kind: VisualizationKind, analysis: &ConceptAnalysis) -> VisualDesign {
    let mut elements = vec![concept.to_string()];
    elements.extend(analysis.key_terms.iter().take(3).cloned());
    VisualDesign {
        kind,
        title: format!("Visualizing {}", concept),
        description: format!("A visual walk through the core ideas of {}", concept),
        elements,
        layout: Layout::default(),
        annotations: Vec::new(),
        insights: Vec::new(),
    }
}

#[async_trait]
impl VisualDesigner for LlmVisualDesigner {
    async fn design(
        &self,
        concept: &str,
        analysis: &ConceptAnalysis,
        enrichment: &ConceptEnrichment,
        tree: &ConceptNode,
    ) -> Result<VisualDesign> {
        let kind = visualization_kind(concept, analysis);
        let mut design = self.base_design(concept, kind, analysis, enrichment).await;
        design.insights = self.insights(concept, kind, tree).await;

        info!(concept = %concept, kind = ?design.kind, insights = design.insights.len(), "Visualization designed");
        Ok(design)
    }
}
