//! Outputs of the enrichment stages

use serde::{Deserialize, Serialize};

/// Learner level supplied by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl UserLevel {
    /// Quiz difficulty matching this learner level
    pub fn difficulty(self) -> Difficulty {
        match self {
            Self::Beginner => Difficulty::Easy,
            Self::Intermediate => Difficulty::Medium,
            Self::Advanced => Difficulty::Hard,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for UserLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!(
                "Unknown user level '{}'. Valid options: beginner, intermediate, advanced",
                other
            )),
        }
    }
}

/// How demanding a concept is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Basic,
    #[default]
    Intermediate,
    Advanced,
}

/// Result of the concept analysis stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptAnalysis {
    pub concept: String,
    pub domain: String,
    pub complexity: Complexity,
    /// 0.0 to 1.0
    #[serde(default)]
    pub visualization_potential: f32,
    #[serde(default)]
    pub suggested_visualizations: Vec<String>,
    #[serde(default)]
    pub key_terms: Vec<String>,
}

/// A formula attached to an enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    pub key: String,
    pub latex: String,
    #[serde(default)]
    pub explanation: String,
}

/// A classic worked example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkedExample {
    pub name: String,
    pub description: String,
}

/// Teaching content for one concept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptEnrichment {
    pub concept: String,
    pub definition: String,
    #[serde(default)]
    pub principles: Vec<String>,
    #[serde(default)]
    pub formulas: Vec<Formula>,
    #[serde(default)]
    pub examples: Vec<WorkedExample>,
    #[serde(default)]
    pub misconceptions: Vec<String>,
}

/// Kind of visualization the designer proposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationKind {
    #[default]
    KnowledgeGraph,
    Animation,
    Chart,
    Diagram,
    PunnettSquare,
    InheritancePath,
    PedigreeChart,
    ProbabilityDistribution,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for VisualizationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::KnowledgeGraph => "knowledge_graph",
            Self::Animation => "animation",
            Self::Chart => "chart",
            Self::Diagram => "diagram",
            Self::PunnettSquare => "punnett_square",
            Self::InheritancePath => "inheritance_path",
            Self::PedigreeChart => "pedigree_chart",
            Self::ProbabilityDistribution => "probability_distribution",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Layout hint for the renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Force,
    #[default]
    Hierarchical,
    Circular,
    Grid,
}

/// A learning aid attached to a visualization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnderstandingInsight {
    pub key_point: String,
    #[serde(default)]
    pub visual_connection: String,
    #[serde(default)]
    pub common_mistake: String,
    #[serde(default)]
    pub check_question: String,
}

/// Result of the visual design stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualDesign {
    #[serde(rename = "type")]
    pub kind: VisualizationKind,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub elements: Vec<String>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub insights: Vec<UnderstandingInsight>,
}

/// How the narrative walks through the material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyProgression {
    Linear,
    Spiral,
    Hierarchical,
}

impl DifficultyProgression {
    /// Pick a progression for a topic of `complexity` with `path_len` steps
    pub fn for_path(complexity: Complexity, path_len: usize) -> Self {
        if complexity == Complexity::Advanced && path_len > 5 {
            Self::Spiral
        } else if path_len > 4 {
            Self::Hierarchical
        } else {
            Self::Linear
        }
    }
}

/// Result of the narrative stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeComposition {
    pub learning_path: Vec<String>,
    pub explanation_order: Vec<String>,
    pub connecting_stories: Vec<String>,
    pub difficulty_progression: DifficultyProgression,
}

/// Quiz difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(format!(
                "Unknown difficulty '{}'. Valid options: easy, medium, hard",
                other
            )),
        }
    }
}

/// One answer option of a multiple-choice question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: String,
    pub content: String,
}

/// Result of the optional quiz stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub difficulty: Difficulty,
    pub topic: String,
    pub content: String,
    #[serde(default)]
    pub options: Vec<QuizOption>,
    pub correct_answer: String,
    pub explanation: String,
    #[serde(default)]
    pub tags: Vec<String>,
}
