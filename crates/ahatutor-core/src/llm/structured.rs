//! Structured (JSON) chat on top of plain completions
//!
//! Every stage that talks to the generative service goes through the
//! [`StructuredChat`] seam: send messages plus a JSON schema, get a JSON value
//! back. Tests substitute canned implementations; production uses
//! [`LlmClient`](super::LlmClient).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

use super::types::Message;

/// A generative service that answers with JSON matching a schema
#[async_trait]
pub trait StructuredChat: Send + Sync {
    /// Send `messages` and parse the reply as JSON
    async fn chat_json(
        &self,
        messages: Vec<Message>,
        schema: &Value,
        temperature: Option<f32>,
    ) -> Result<Value>;
}

/// Ask for JSON and decode it into `T`
pub async fn structured<T: DeserializeOwned>(
    chat: &dyn StructuredChat,
    messages: Vec<Message>,
    schema: &Value,
    temperature: Option<f32>,
) -> Result<T> {
    let value = chat.chat_json(messages, schema, temperature).await?;
    serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "Structured response did not match the expected shape");
        Error::Parse(format!("Unexpected response shape: {}", e))
    })
}

/// System message that pins the reply to JSON only
pub fn json_instruction(schema: &Value) -> Message {
    let pretty = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    Message::system(format!(
        "You must respond with valid JSON only. Do not include any explanatory text outside the JSON structure.\nJSON Schema:\n{}",
        pretty
    ))
}

/// Parse a model reply that may wrap its JSON in markdown or prose
pub fn parse_json_reply(reply: &str) -> Result<Value> {
    let json_str = extract_json_from_response(reply);
    serde_json::from_str(&json_str).map_err(|e| {
        warn!(error = %e, "Failed to parse LLM response as JSON");
        Error::Parse(format!("Invalid JSON response from LLM: {}", e))
    })
}

/// Extract JSON from a response that might contain markdown or other text
pub fn extract_json_from_response(response: &str) -> String {
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim().to_string();
        }
    }

    if let Some(start) = response.find("```") {
        let potential_start = start + 3;
        // Skip language identifier if present
        let json_start = if let Some(newline) = response[potential_start..].find('\n') {
            potential_start + newline + 1
        } else {
            potential_start
        };
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim().to_string();
        }
    }

    let object = response.find('{').zip(response.rfind('}'));
    let array = response.find('[').zip(response.rfind(']'));
    match (object, array) {
        (Some((os, _)), Some((as_, ae))) if as_ < os && as_ < ae => {
            response[as_..=ae].to_string()
        }
        (Some((os, oe)), _) if os < oe => response[os..=oe].to_string(),
        (_, Some((as_, ae))) if as_ < ae => response[as_..=ae].to_string(),
        _ => response.trim().to_string(),
    }
}

/// Stand-in used when no API key is configured
///
/// Every call fails with [`Error::LLMError`], so callers fall back to the
/// knowledge store alone and degrade the rest.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredChat;

#[async_trait]
impl StructuredChat for UnconfiguredChat {
    async fn chat_json(
        &self,
        _messages: Vec<Message>,
        _schema: &Value,
        _temperature: Option<f32>,
    ) -> Result<Value> {
        Err(Error::LLMError("no API key configured".to_string()))
    }
}
