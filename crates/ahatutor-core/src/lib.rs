//! AhaTutor Core Library
//!
//! This crate turns a target concept into learning material:
//! - Prerequisite resolution (knowledge store first, generative fallback)
//! - Linearization of the prerequisite tree into a learning path
//! - Pipeline orchestration over the enrichment stages
//! - LLM integration (OpenAI-compatible chat completions)
//! - Curated knowledge store (bundled genetics data)
//! - Configuration with file persistence

pub mod agents;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod pipeline;
pub mod prerequisites;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agents::{UserLevel, Difficulty};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::knowledge::{CuratedKnowledgeStore, KnowledgeStore};
    pub use crate::pipeline::{AgentPipeline, FailurePolicy, PipelineInput};
    pub use crate::prerequisites::{
        ConceptNode, FoundationSet, LearningPath, PrerequisiteResolver, ResolutionRequest, flatten,
    };
}
