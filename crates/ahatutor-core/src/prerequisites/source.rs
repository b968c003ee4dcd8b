//! Generative fallback for prerequisite names

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::llm::{Message, StructuredChat, structured};

const PREREQUISITE_TEMPERATURE: f32 = 0.3;

/// Asks an external service for the direct prerequisites of a concept
///
/// Consulted only when the knowledge store has nothing. Failures are typed;
/// the resolver decides how to degrade.
#[async_trait]
pub trait PrerequisiteSource: Send + Sync {
    async fn request_prerequisites(&self, concept: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct PrerequisiteReply {
    #[serde(default)]
    prerequisites: Vec<String>,
}

/// [`PrerequisiteSource`] backed by a structured chat
pub struct LlmPrerequisiteSource {
    chat: Arc<dyn StructuredChat>,
    domain: String,
    max_prerequisites: usize,
}

impl LlmPrerequisiteSource {
    pub fn new(chat: Arc<dyn StructuredChat>) -> Self {
        Self {
            chat,
            domain: "genetics".to_string(),
            max_prerequisites: 5,
        }
    }

    /// Subject area named in the prompt
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_max_prerequisites(mut self, max: usize) -> Self {
        self.max_prerequisites = max.max(1);
        self
    }

    fn prompt(&self, concept: &str) -> String {
        format!(
            "You are an expert {domain} educator.\n\n\
             To understand \"{concept}\", which concepts must a student master first?\n\n\
             Requirements:\n\
             1. List 3-5 direct prerequisite concepts\n\
             2. Only direct prerequisites, never indirect ones\n\
             3. Return JSON: {{\"prerequisites\": [\"concept 1\", \"concept 2\", ...]}}\n\n\
             If \"{concept}\" is itself a foundational concept (such as gene, chromosome or DNA), \
             return an empty array.",
            domain = self.domain,
            concept = concept,
        )
    }
}

#[async_trait]
impl PrerequisiteSource for LlmPrerequisiteSource {
    async fn request_prerequisites(&self, concept: &str) -> Result<Vec<String>> {
        let schema = json!({
            "type": "object",
            "properties": {
                "prerequisites": {
                    "type": "array",
                    "items": { "type": "string" }
                }
            },
            "required": ["prerequisites"]
        });

        let reply: PrerequisiteReply = structured(
            self.chat.as_ref(),
            vec![Message::user(self.prompt(concept))],
            &schema,
            Some(PREREQUISITE_TEMPERATURE),
        )
        .await?;

        let mut names = normalize_names(reply.prerequisites);
        names.truncate(self.max_prerequisites);
        debug!(concept = %concept, count = names.len(), "Generated prerequisites");
        Ok(names)
    }
}

/// Trim names, dropping blanks and repeats while keeping order
pub(crate) fn normalize_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter_map(|name| {
            let name = name.as_ref().trim();
            (!name.is_empty() && seen.insert(name.to_lowercase())).then(|| name.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::llm::parse_json_reply;
    use serde_json::Value;
    use std::sync::Mutex;

    struct RecordingChat {
        reply: &'static str,
        prompts: Mutex<Vec<(String, Option<f32>)>>,
    }

    #[async_trait]
    impl StructuredChat for RecordingChat {
        async fn chat_json(
            &self,
            messages: Vec<Message>,
            _schema: &Value,
            temperature: Option<f32>,
        ) -> Result<Value> {
            self.prompts
                .lock()
                .unwrap()
                .push((messages[0].content.clone(), temperature));
            parse_json_reply(self.reply)
        }
    }

    fn source(reply: &'static str) -> (Arc<RecordingChat>, LlmPrerequisiteSource) {
        let chat = Arc::new(RecordingChat {
            reply,
            prompts: Mutex::new(Vec::new()),
        });
        let source = LlmPrerequisiteSource::new(chat.clone());
        (chat, source)
    }

    #[tokio::test]
    async fn test_cleans_and_caps_reply() {
        let (chat, source) = source(
            r#"{"prerequisites": [" allele ", "", "Allele", "gamete", "a", "b", "c", "d"]}"#,
        );
        let names = source.request_prerequisites("Mendel's first law").await.unwrap();
        assert_eq!(names, vec!["allele", "gamete", "a", "b", "c"]);

        let prompts = chat.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].0.contains("\"Mendel's first law\""));
        assert_eq!(prompts[0].1, Some(0.3));
    }

    #[tokio::test]
    async fn test_missing_field_is_empty() {
        let (_, source) = source("{}");
        assert!(source.request_prerequisites("gene").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_reply_is_typed_failure() {
        let (_, source) = source("no idea, sorry");
        let err = source.request_prerequisites("X").await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_normalize_names() {
        assert_eq!(normalize_names(["B", " C", "b", "  "]), vec!["B", "C"]);
    }
}
