//! Quiz generation stage

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::traits::QuizGenerator;
use super::types::{Difficulty, QuizOption, QuizQuestion, UserLevel};
use crate::error::{Error, Result};
use crate::llm::{Message, StructuredChat, structured};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizReply {
    question: String,
    #[serde(default)]
    options: Vec<QuizOption>,
    correct_answer: String,
    #[serde(default)]
    explanation: Value,
    #[serde(default)]
    tags: Vec<String>,
}

/// Explanations arrive either as text or as levelled hints (`level1`..`level5`)
fn explanation_text(explanation: Value) -> String {
    match explanation {
        Value::String(text) => text,
        Value::Object(levels) => {
            let mut keys: Vec<&String> = levels.keys().collect();
            keys.sort();
            keys.into_iter()
                .filter_map(|k| levels.get(k).and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        }
        _ => String::new(),
    }
}

/// Generative multiple-choice question writer
pub struct LlmQuizGenerator {
    chat: Arc<dyn StructuredChat>,
}

impl LlmQuizGenerator {
    pub fn new(chat: Arc<dyn StructuredChat>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl QuizGenerator for LlmQuizGenerator {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        user_level: UserLevel,
    ) -> Result<QuizQuestion> {
        let prompt = format!(
            "You are a genetics teacher. Write one multiple-choice question.\n\n\
             Topic: {}\nDifficulty: {:?}\nLearner level: {}\n\n\
             Requirements:\n\
             1. Test the core concept\n\
             2. Exactly 4 options, only one correct\n\
             3. Stay within the syllabus\n\
             4. Respond in JSON",
            topic, difficulty, user_level
        );
        let schema = json!({
            "type": "object",
            "properties": {
                "question": { "type": "string" },
                "options": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "content": { "type": "string" }
                        }
                    }
                },
                "correctAnswer": { "type": "string" },
                "explanation": { "type": "string" },
                "tags": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["question", "options", "correctAnswer"]
        });

        let reply: QuizReply = structured(
            self.chat.as_ref(),
            vec![Message::user(prompt)],
            &schema,
            Some(0.7),
        )
        .await?;

        if !reply.options.is_empty() && !reply.options.iter().any(|o| o.id == reply.correct_answer) {
            return Err(Error::Parse(format!(
                "correct answer '{}' is not one of the options",
                reply.correct_answer
            )));
        }

        let question = QuizQuestion {
            id: format!("quiz_{}", Uuid::new_v4().simple()),
            difficulty,
            topic: topic.to_string(),
            content: reply.question,
            options: reply.options,
            correct_answer: reply.correct_answer,
            explanation: explanation_text(reply.explanation),
            tags: if reply.tags.is_empty() {
                vec![topic.to_string()]
            } else {
                reply.tags
            },
        };
        info!(topic = %topic, id = %question.id, "Quiz question generated");
        Ok(question)
    }
}
