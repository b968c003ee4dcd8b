//! Enrichment stages
//!
//! Each stage sits behind an async trait so the pipeline can be driven by the
//! LLM-backed implementations here or by test doubles:
//!
//! - **ConceptAnalyzer**: domain, complexity and key terms of the input
//! - **ConceptEnricher**: definition, principles, formulas, examples, misconceptions
//! - **VisualDesigner**: visualization kind, layout and learning insights
//! - **NarrativeComposer**: learning path, explanation order and connecting stories
//! - **QuizGenerator**: multiple-choice questions at a chosen difficulty

mod analyzer;
mod enricher;
mod narrative;
mod quiz;
mod traits;
mod types;
mod visual;

pub use analyzer::LlmConceptAnalyzer;
pub use enricher::LlmConceptEnricher;
pub use narrative::{LlmNarrativeComposer, explanation_order};
pub use quiz::LlmQuizGenerator;
pub use traits::{ConceptAnalyzer, ConceptEnricher, NarrativeComposer, QuizGenerator, VisualDesigner};
pub use types::{
    Complexity, ConceptAnalysis, ConceptEnrichment, Difficulty, DifficultyProgression, Formula,
    Layout, NarrativeComposition, QuizOption, QuizQuestion, UnderstandingInsight, UserLevel,
    VisualDesign, VisualizationKind, WorkedExample,
};
pub use visual::{LlmVisualDesigner, visualization_kind};
