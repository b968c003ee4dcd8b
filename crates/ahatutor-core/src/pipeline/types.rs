//! Pipeline inputs and results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::agents::{
    ConceptAnalysis, ConceptEnrichment, Difficulty, NarrativeComposition, QuizQuestion,
    UserLevel, VisualDesign,
};
use crate::error::Error;
use crate::prerequisites::{ConceptNode, LearningPath, ResolutionStats};

/// How an entry point reacts to a failing stage or item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The first failure ends the call with an error
    Abort,
    /// Failures are recorded and the call carries on
    BestEffort,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::BestEffort => write!(f, "best_effort"),
        }
    }
}

/// Focus area that opts into the quiz stage
pub const QUIZ_FOCUS: &str = "quiz";

/// Input to the single-shot pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInput {
    pub concept: String,
    #[serde(default)]
    pub user_level: UserLevel,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    /// Tree depth; the pipeline default when absent
    #[serde(default)]
    pub max_depth: Option<u32>,
}

impl PipelineInput {
    pub fn new(concept: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            user_level: UserLevel::default(),
            focus_areas: Vec::new(),
            max_depth: None,
        }
    }

    pub fn with_user_level(mut self, level: UserLevel) -> Self {
        self.user_level = level;
        self
    }

    pub fn with_focus(mut self, area: impl Into<String>) -> Self {
        self.focus_areas.push(area.into());
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn wants_quiz(&self) -> bool {
        self.focus_areas
            .iter()
            .any(|area| area.trim().eq_ignore_ascii_case(QUIZ_FOCUS))
    }
}

/// A stage that failed under [`FailurePolicy::BestEffort`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFailure {
    pub stage: String,
    pub code: String,
    pub message: String,
    pub elapsed_ms: u64,
}

impl StageFailure {
    /// Record a stage error; anything other than `StageFailed` is filed under `unknown`
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::StageFailed {
                stage,
                elapsed_ms,
                source,
            } => Self {
                stage: stage.to_string(),
                code: source.code().to_string(),
                message: source.to_string(),
                elapsed_ms: *elapsed_ms,
            },
            other => Self {
                stage: "unknown".to_string(),
                code: other.code().to_string(),
                message: other.to_string(),
                elapsed_ms: 0,
            },
        }
    }
}

/// Everything one single-shot run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub run_id: Uuid,
    pub concept: String,
    pub user_level: UserLevel,
    pub policy: FailurePolicy,
    pub tree: Option<ConceptNode>,
    pub learning_path: LearningPath,
    pub analysis: Option<ConceptAnalysis>,
    pub enrichment: Option<ConceptEnrichment>,
    pub visualization: Option<VisualDesign>,
    pub narrative: Option<NarrativeComposition>,
    pub quiz: Option<QuizQuestion>,
    pub failures: Vec<StageFailure>,
    /// Stages not run because an input they need failed
    pub skipped_stages: Vec<String>,
    pub stats: ResolutionStats,
    pub elapsed_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl AggregateResult {
    /// No stage failed or was skipped
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped_stages.is_empty()
    }
}

/// A path concept whose enrichment failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedConcept {
    pub concept: String,
    pub code: String,
    pub error: String,
}

/// Result of batch learning-path enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPathResult {
    pub path: LearningPath,
    pub enriched: BTreeMap<String, ConceptEnrichment>,
    pub skipped: Vec<SkippedConcept>,
    pub stats: ResolutionStats,
    pub elapsed_ms: u64,
}

impl LearningPathResult {
    /// Enrichments in learning order
    pub fn in_order(&self) -> impl Iterator<Item = (&str, &ConceptEnrichment)> {
        self.path
            .iter()
            .filter_map(|concept| self.enriched.get(concept).map(|e| (concept, e)))
    }
}

/// Analysis plus a shallow tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAnalysis {
    pub analysis: ConceptAnalysis,
    pub tree: ConceptNode,
    pub learning_path: LearningPath,
}

/// Tree, learning path and outline for one concept
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exploration {
    pub tree: ConceptNode,
    pub learning_path: LearningPath,
    pub text: String,
    pub stats: ResolutionStats,
}

/// Standalone quiz on one topic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicQuiz {
    pub topic: String,
    pub difficulty: Difficulty,
    pub requested: usize,
    pub questions: Vec<QuizQuestion>,
    pub elapsed_ms: u64,
}

impl TopicQuiz {
    /// Every requested question was written
    pub fn is_complete(&self) -> bool {
        self.questions.len() == self.requested
    }
}
