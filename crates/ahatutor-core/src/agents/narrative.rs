//! Narrative composition stage

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::traits::NarrativeComposer;
use super::types::{
    Complexity, ConceptAnalysis, ConceptEnrichment, DifficultyProgression, NarrativeComposition,
};
use crate::error::Result;
use crate::llm::{Message, StructuredChat, structured};
use crate::prerequisites::{ConceptNode, flatten};

struct Analogy {
    concept: &'static str,
    analogy: &'static str,
    explanation: &'static str,
    memory_trick: &'static str,
}

const ANALOGIES: &[Analogy] = &[
    Analogy {
        concept: "gene",
        analogy: "a recipe in a huge cookbook",
        explanation: "DNA is the cookbook and each gene is one recipe. Some recipes (dominant) get cooked first, others (recessive) wait on the shelf, but all are kept.",
        memory_trick: "Gene = one recipe, genome = the whole book",
    },
    Analogy {
        concept: "chromosome",
        analogy: "chapters on a bookshelf",
        explanation: "Chromosomes are chapters; related recipes (genes) sit in the same chapter.",
        memory_trick: "23 pairs = 23 chapters, two copies of each",
    },
    Analogy {
        concept: "allele",
        analogy: "two versions of the same dish",
        explanation: "Mum's and Dad's versions of one recipe differ slightly; each is an allele.",
        memory_trick: "Allele = alternative",
    },
    Analogy {
        concept: "dominant",
        analogy: "the loud cook",
        explanation: "A dominant allele is the cook whose instructions are always heard.",
        memory_trick: "Dominant = shows up first",
    },
    Analogy {
        concept: "recessive",
        analogy: "the quiet cook",
        explanation: "A recessive allele is only heard when no loud cook is in the kitchen.",
        memory_trick: "Recessive = recedes into the background",
    },
    Analogy {
        concept: "Mendel's first law",
        analogy: "shuffling a deck of cards",
        explanation: "Each allele is a card; shuffling deals exactly one of each pair into every gamete.",
        memory_trick: "Segregation = separate, then deal",
    },
    Analogy {
        concept: "sex-linked inheritance",
        analogy: "an heirloom passed down one side of the family",
        explanation: "Genes on the X chromosome travel with it, so sons and daughters inherit them differently.",
        memory_trick: "Sex-linked = linked to the sex chromosomes",
    },
    Analogy {
        concept: "genetic linkage",
        analogy: "neighbours who move house together",
        explanation: "Genes close together on a chromosome tend to travel together; crossing over is the occasional swap of houses.",
        memory_trick: "Linked = living next door",
    },
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoryReply {
    title: String,
    narrative: String,
    #[serde(default)]
    key_moments: Vec<String>,
    #[serde(default)]
    hooks: Vec<String>,
}

/// Composer that adds curated analogies and a generated story
///
/// Only the story depends on the generative service; when it fails the
/// composition carries the analogies alone.
pub struct LlmNarrativeComposer {
    chat: Arc<dyn StructuredChat>,
}

impl LlmNarrativeComposer {
    pub fn new(chat: Arc<dyn StructuredChat>) -> Self {
        Self { chat }
    }

    async fn story(
        &self,
        path: &[String],
        concept: &str,
        enrichment: &ConceptEnrichment,
    ) -> Vec<String> {
        if path.len() < 2 {
            return Vec::new();
        }

        let examples: Vec<&str> = enrichment.examples.iter().map(|e| e.name.as_str()).collect();
        let prompt = format!(
            "You are a science educator who tells great stories. Write a connected narrative that \
             links the concepts of this learning path naturally.\n\n\
             Learning path: {}\n\
             Target concept: {}\n\
             Key principles: {}\n\
             Classic examples: {}\n\n\
             Use analogies, include a sense of discovery, and keep it to 300-500 words. Respond in JSON \
             with title, narrative, keyMoments and hooks.",
            path.join(" → "),
            concept,
            enrichment.principles.join(", "),
            examples.join(", "),
        );
        let schema = json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "narrative": { "type": "string" },
                "keyMoments": { "type": "array", "items": { "type": "string" } },
                "hooks": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["title", "narrative"]
        });

        let reply: StoryReply = match structured(
            self.chat.as_ref(),
            vec![Message::user(prompt)],
            &schema,
            Some(0.8),
        )
        .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(concept = %concept, error = %e, "Story generation failed");
                return Vec::new();
            }
        };

        let mut lines = vec![reply.title, reply.narrative];
        if !reply.key_moments.is_empty() {
            lines.push("Key moments:".to_string());
            lines.extend(reply.key_moments.into_iter().map(|m| format!("  • {}", m)));
        }
        if !reply.hooks.is_empty() {
            lines.push("Hooks:".to_string());
            lines.extend(reply.hooks.into_iter().map(|h| format!("  • {}", h)));
        }
        lines
    }
}

/// Definition first, then principles, an example, misconceptions and applications
pub fn explanation_order(
    concept: &str,
    analysis: &ConceptAnalysis,
    enrichment: &ConceptEnrichment,
) -> Vec<String> {
    let mut order = vec![format!("Definition of {}", concept)];
    order.extend(enrichment.principles.iter().take(2).cloned());
    if let Some(example) = enrichment.examples.first() {
        order.push(format!("Example: {}", example.name));
    }
    if !enrichment.misconceptions.is_empty() {
        order.push("Common misconceptions".to_string());
    }
    if analysis.complexity != Complexity::Basic {
        order.push("Real-world applications".to_string());
    }
    order
}

fn analogies_for(path: &[String]) -> Vec<String> {
    let mut lines = Vec::new();
    for concept in path {
        if let Some(a) = ANALOGIES
            .iter()
            .find(|a| a.concept.eq_ignore_ascii_case(concept.trim()))
        {
            lines.push(format!("{}: {}", concept, a.analogy));
            lines.push(format!("  {}", a.explanation));
            lines.push(format!("  Memory trick: {}", a.memory_trick));
        }
    }
    lines
}

#[async_trait]
impl NarrativeComposer for LlmNarrativeComposer {
    async fn compose(
        &self,
        concept: &str,
        analysis: &ConceptAnalysis,
        tree: &ConceptNode,
        enrichment: &ConceptEnrichment,
    ) -> Result<NarrativeComposition> {
        let learning_path = flatten(tree).into_vec();

        let mut connecting_stories = analogies_for(&learning_path);
        connecting_stories.extend(self.story(&learning_path, concept, enrichment).await);

        let difficulty_progression =
            DifficultyProgression::for_path(analysis.complexity, learning_path.len());
        info!(
            concept = %concept,
            steps = learning_path.len(),
            progression = ?difficulty_progression,
            "Narrative composed"
        );

        Ok(NarrativeComposition {
            explanation_order: explanation_order(concept, analysis, enrichment),
            learning_path,
            connecting_stories,
            difficulty_progression,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::WorkedExample;
    use crate::llm::{UnconfiguredChat, parse_json_reply};
    use crate::prerequisites::NodeOrigin;
    use serde_json::Value;

    fn analysis(complexity: Complexity) -> ConceptAnalysis {
        ConceptAnalysis {
            concept: "Mendel's first law".into(),
            domain: "genetics".into(),
            complexity,
            visualization_potential: 0.9,
            suggested_visualizations: vec![],
            key_terms: vec![],
        }
    }

    fn enrichment() -> ConceptEnrichment {
        ConceptEnrichment {
            concept: "Mendel's first law".into(),
            definition: "Alleles segregate".into(),
            principles: vec!["p1".into(), "p2".into(), "p3".into()],
            formulas: vec![],
            examples: vec![WorkedExample {
                name: "Pea color".into(),
                description: "3:1".into(),
            }],
            misconceptions: vec!["blending".into()],
        }
    }

    fn tree() -> ConceptNode {
        ConceptNode::expanded(
            "Mendel's first law",
            0,
            NodeOrigin::KnowledgeStore,
            vec![
                ConceptNode::foundation("allele", 1),
                ConceptNode::foundation("gamete", 1),
            ],
        )
    }

    #[test]
    fn test_explanation_order() {
        let order = explanation_order("Mendel's first law", &analysis(Complexity::Basic), &enrichment());
        assert_eq!(
            order,
            vec![
                "Definition of Mendel's first law",
                "p1",
                "p2",
                "Example: Pea color",
                "Common misconceptions",
            ]
        );

        let order = explanation_order("x", &analysis(Complexity::Advanced), &enrichment());
        assert_eq!(order.last().map(String::as_str), Some("Real-world applications"));
    }

    #[tokio::test]
    async fn test_offline_composition_keeps_analogies() {
        let composer = LlmNarrativeComposer::new(Arc::new(UnconfiguredChat));
        let narrative = composer
            .compose("Mendel's first law", &analysis(Complexity::Basic), &tree(), &enrichment())
            .await
            .unwrap();

        assert_eq!(narrative.learning_path, vec!["allele", "gamete", "Mendel's first law"]);
        assert_eq!(narrative.difficulty_progression, DifficultyProgression::Linear);
        assert!(narrative.connecting_stories[0].starts_with("allele: "));
        assert_eq!(narrative.connecting_stories.len(), 6);
    }

    struct StoryChat;

    #[async_trait]
    impl StructuredChat for StoryChat {
        async fn chat_json(&self, _: Vec<Message>, _: &Value, temperature: Option<f32>) -> Result<Value> {
            assert_eq!(temperature, Some(0.8));
            parse_json_reply(r#"{"title": "The pea garden", "narrative": "Once upon a time", "hooks": ["Why 3:1?"]}"#)
        }
    }

    #[tokio::test]
    async fn test_generated_story_is_appended() {
        let composer = LlmNarrativeComposer::new(Arc::new(StoryChat));
        let narrative = composer
            .compose("Mendel's first law", &analysis(Complexity::Basic), &tree(), &enrichment())
            .await
            .unwrap();

        let stories = &narrative.connecting_stories;
        assert_eq!(&stories[6..], ["The pea garden", "Once upon a time", "Hooks:", "  • Why 3:1?"]);
    }
}
