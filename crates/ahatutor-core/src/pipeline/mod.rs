//! Pipeline orchestration
//!
//! Two entry points with deliberately different failure policies:
//!
//! - [`AgentPipeline::execute_pipeline`]: one aggregate answer, [`FailurePolicy::Abort`]
//! - [`AgentPipeline::generate_learning_path`]: a batch over path concepts,
//!   [`FailurePolicy::BestEffort`]
//!
//! Both have `*_with_policy` variants so callers can choose the other policy.
//! [`AgentPipeline::generate_quiz_for_topic`] drives the quiz stage on its own.

mod orchestrator;
mod types;

pub use orchestrator::{
    AgentPipeline, MAX_TOPIC_QUIZ_QUESTIONS, STAGE_ANALYSIS, STAGE_ENRICHMENT, STAGE_NARRATIVE,
    STAGE_QUIZ, STAGE_TREE, STAGE_VISUAL, Stages,
};
pub use types::{
    AggregateResult, Exploration, FailurePolicy, LearningPathResult, PipelineInput, QUIZ_FOCUS,
    QuickAnalysis, SkippedConcept, StageFailure, TopicQuiz,
};
