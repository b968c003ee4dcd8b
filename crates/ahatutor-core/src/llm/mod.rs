//! LLM integration - OpenAI-compatible chat completions
//!
//! This module provides:
//! - HTTP client for chat completions with retry and model fallback
//! - Request/response types matching the OpenAI-compatible API
//! - The `StructuredChat` seam used by every generative stage

mod client;
mod structured;
mod types;

pub use client::{LlmClient, LlmClientBuilder};
pub use structured::{
    StructuredChat, UnconfiguredChat, extract_json_from_response, json_instruction,
    parse_json_reply, structured,
};
pub use types::{ChatRequest, ChatResponse, Choice, FinishReason, LlmResponse, Message, MessageRole, Usage};
