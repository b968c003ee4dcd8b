//! Fixed-stage pipeline orchestrator
//!
//! Stage layout of a single-shot run:
//!
//! 1. concept analysis, prerequisite tree and concept enrichment, concurrently
//! 2. visual design and narrative, concurrently (need all of stage 1)
//! 3. quiz, only when the caller asked for it
//!
//! Batch mode resolves a tree, flattens it and enriches each path concept in
//! order.

use chrono::Utc;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::{
    ConceptAnalyzer, ConceptEnricher, Difficulty, LlmConceptAnalyzer, LlmConceptEnricher,
    LlmNarrativeComposer, LlmQuizGenerator, LlmVisualDesigner, NarrativeComposer, QuizGenerator,
    UserLevel, VisualDesigner,
};
use crate::config::{Config, MAX_RESOLUTION_DEPTH};
use crate::error::{Error, Result};
use crate::knowledge::KnowledgeStore;
use crate::llm::StructuredChat;
use crate::prerequisites::{
    LlmPrerequisiteSource, PrerequisiteResolver, ResolutionRequest, ResolutionStats, flatten,
};

use super::types::{
    AggregateResult, Exploration, FailurePolicy, LearningPathResult, PipelineInput,
    QuickAnalysis, SkippedConcept, StageFailure, TopicQuiz,
};

pub const STAGE_ANALYSIS: &str = "concept_analysis";
pub const STAGE_TREE: &str = "prerequisite_tree";
pub const STAGE_ENRICHMENT: &str = "concept_enrichment";
pub const STAGE_VISUAL: &str = "visual_design";
pub const STAGE_NARRATIVE: &str = "narrative";
pub const STAGE_QUIZ: &str = "quiz";

/// Upper bound on questions in one topic quiz
pub const MAX_TOPIC_QUIZ_QUESTIONS: usize = 10;

/// The enrichment stages a pipeline drives
#[derive(Clone)]
pub struct Stages {
    pub analyzer: Arc<dyn ConceptAnalyzer>,
    pub enricher: Arc<dyn ConceptEnricher>,
    pub visual: Arc<dyn VisualDesigner>,
    pub narrative: Arc<dyn NarrativeComposer>,
    pub quiz: Arc<dyn QuizGenerator>,
}

impl Stages {
    /// LLM-backed stages, consulting `store` first where curated data exists
    pub fn llm(chat: Arc<dyn StructuredChat>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            analyzer: Arc::new(LlmConceptAnalyzer::new(chat.clone(), store.clone())),
            enricher: Arc::new(LlmConceptEnricher::new(chat.clone(), store)),
            visual: Arc::new(LlmVisualDesigner::new(chat.clone())),
            narrative: Arc::new(LlmNarrativeComposer::new(chat.clone())),
            quiz: Arc::new(LlmQuizGenerator::new(chat)),
        }
    }
}

/// Composes the resolver with the enrichment stages
pub struct AgentPipeline {
    resolver: Arc<PrerequisiteResolver>,
    stages: Stages,
    default_max_depth: u32,
    quick_max_depth: u32,
}

impl AgentPipeline {
    pub fn new(resolver: Arc<PrerequisiteResolver>, stages: Stages) -> Self {
        Self {
            resolver,
            stages,
            default_max_depth: 3,
            quick_max_depth: 2,
        }
    }

    /// Wire a pipeline from configuration
    pub fn from_config(
        config: &Config,
        chat: Arc<dyn StructuredChat>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        let mut source = LlmPrerequisiteSource::new(chat.clone())
            .with_max_prerequisites(config.resolver.max_prerequisites);
        if let Some(domain) = store.domain() {
            source = source.with_domain(domain);
        }
        let resolver = PrerequisiteResolver::new(
            store.clone(),
            Arc::new(source),
            config.resolver.foundation_set(),
        )
        .with_options(config.resolver.options());

        Self::new(Arc::new(resolver), Stages::llm(chat, store)).with_depths(
            config.resolver.default_max_depth,
            config.resolver.quick_max_depth,
        )
    }

    pub fn with_depths(mut self, default_max_depth: u32, quick_max_depth: u32) -> Self {
        self.default_max_depth = default_max_depth;
        self.quick_max_depth = quick_max_depth;
        self
    }

    /// Swap the enrichment stages, keeping the resolver
    pub fn with_stages(mut self, stages: Stages) -> Self {
        self.stages = stages;
        self
    }

    pub fn resolver(&self) -> &PrerequisiteResolver {
        &self.resolver
    }

    pub fn default_max_depth(&self) -> u32 {
        self.default_max_depth
    }

    /// Single-shot run; any stage failure aborts
    pub async fn execute_pipeline(&self, input: &PipelineInput) -> Result<AggregateResult> {
        self.execute_pipeline_with_policy(input, FailurePolicy::Abort)
            .await
    }

    pub async fn execute_pipeline_with_policy(
        &self,
        input: &PipelineInput,
        policy: FailurePolicy,
    ) -> Result<AggregateResult> {
        let concept = validate_concept(&input.concept)?;
        let max_depth = validate_depth(input.max_depth.unwrap_or(self.default_max_depth))?;
        let level = input.user_level;
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        info!(%run_id, concept = %concept, level = %level, %policy, "Executing pipeline");

        let mut failures = Vec::new();
        let mut skipped_stages = Vec::new();

        // Stage 1
        let analysis = self.stage(STAGE_ANALYSIS, started, policy, async {
            self.stages.analyzer.analyze(concept, level).await
        });
        let resolution = self.stage(STAGE_TREE, started, policy, async {
            self.resolver
                .resolve(ResolutionRequest::new(concept, max_depth))
                .await
        });
        let enrichment = self.stage(STAGE_ENRICHMENT, started, policy, async {
            self.stages.enricher.enrich(concept).await
        });

        let (analysis, resolution, enrichment) = match policy {
            FailurePolicy::Abort => {
                let (a, r, e) = tokio::try_join!(analysis, resolution, enrichment)?;
                (Some(a), Some(r), Some(e))
            }
            FailurePolicy::BestEffort => {
                let (a, r, e) = tokio::join!(analysis, resolution, enrichment);
                (
                    settle(a, &mut failures),
                    settle(r, &mut failures),
                    settle(e, &mut failures),
                )
            }
        };

        let (tree, stats) = match resolution {
            Some(resolution) => (Some(resolution.tree), resolution.stats),
            None => (None, ResolutionStats::default()),
        };
        let learning_path = tree.as_ref().map(flatten).unwrap_or_default();

        // Stage 2
        let (visualization, narrative) = match (&analysis, &tree, &enrichment) {
            (Some(analysis), Some(tree), Some(enrichment)) => {
                let visual = self.stage(STAGE_VISUAL, started, policy, async {
                    self.stages
                        .visual
                        .design(concept, analysis, enrichment, tree)
                        .await
                });
                let narrative = self.stage(STAGE_NARRATIVE, started, policy, async {
                    self.stages
                        .narrative
                        .compose(concept, analysis, tree, enrichment)
                        .await
                });

                match policy {
                    FailurePolicy::Abort => {
                        let (v, n) = tokio::try_join!(visual, narrative)?;
                        (Some(v), Some(n))
                    }
                    FailurePolicy::BestEffort => {
                        let (v, n) = tokio::join!(visual, narrative);
                        (settle(v, &mut failures), settle(n, &mut failures))
                    }
                }
            }
            _ => {
                warn!(%run_id, "Skipping visual design and narrative: stage 1 incomplete");
                skipped_stages.push(STAGE_VISUAL.to_string());
                skipped_stages.push(STAGE_NARRATIVE.to_string());
                (None, None)
            }
        };

        // Stage 3
        let quiz = if input.wants_quiz() {
            let quiz = self
                .stage(STAGE_QUIZ, started, policy, async {
                    self.stages
                        .quiz
                        .generate(concept, level.difficulty(), level)
                        .await
                })
                .await;
            match policy {
                FailurePolicy::Abort => Some(quiz?),
                FailurePolicy::BestEffort => settle(quiz, &mut failures),
            }
        } else {
            None
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            %run_id,
            concept = %concept,
            elapsed_ms,
            failures = failures.len(),
            "Pipeline completed"
        );

        Ok(AggregateResult {
            run_id,
            concept: concept.to_string(),
            user_level: level,
            policy,
            tree,
            learning_path,
            analysis,
            enrichment,
            visualization,
            narrative,
            quiz,
            failures,
            skipped_stages,
            stats,
            elapsed_ms,
            completed_at: Utc::now(),
        })
    }

    /// Batch enrichment of every path concept; item failures are skipped
    pub async fn generate_learning_path(
        &self,
        concept: &str,
        max_depth: u32,
    ) -> Result<LearningPathResult> {
        self.generate_learning_path_with_policy(concept, max_depth, FailurePolicy::BestEffort)
            .await
    }

    pub async fn generate_learning_path_with_policy(
        &self,
        concept: &str,
        max_depth: u32,
        policy: FailurePolicy,
    ) -> Result<LearningPathResult> {
        let concept = validate_concept(concept)?;
        let max_depth = validate_depth(max_depth)?;
        let started = Instant::now();
        info!(concept = %concept, max_depth, %policy, "Generating learning path");

        let resolution = self
            .resolver
            .resolve(ResolutionRequest::new(concept, max_depth))
            .await?;
        let path = flatten(&resolution.tree);

        let mut enriched = BTreeMap::new();
        let mut skipped = Vec::new();
        for item in path.iter() {
            match self.stages.enricher.enrich(item).await {
                Ok(enrichment) => {
                    enriched.insert(item.to_string(), enrichment);
                }
                Err(e) => match policy {
                    FailurePolicy::Abort => {
                        error!(concept = %item, error = %e, "Enrichment failed, aborting learning path");
                        return Err(Error::EnrichmentFailed {
                            concept: item.to_string(),
                            source: Box::new(e),
                        });
                    }
                    FailurePolicy::BestEffort => {
                        warn!(concept = %item, error = %e, "Enrichment failed, skipping concept");
                        skipped.push(SkippedConcept {
                            concept: item.to_string(),
                            code: e.code().to_string(),
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            concept = %concept,
            steps = path.len(),
            enriched = enriched.len(),
            skipped = skipped.len(),
            elapsed_ms,
            "Learning path generated"
        );

        Ok(LearningPathResult {
            path,
            enriched,
            skipped,
            stats: resolution.stats,
            elapsed_ms,
        })
    }

    /// Analysis plus a tree at the quick depth
    pub async fn quick_analyze(&self, concept: &str) -> Result<QuickAnalysis> {
        let concept = validate_concept(concept)?;
        let max_depth = validate_depth(self.quick_max_depth)?;
        info!(concept = %concept, max_depth, "Quick analysis");

        let (analysis, resolution) = tokio::try_join!(
            self.stages.analyzer.analyze(concept, UserLevel::default()),
            self.resolver
                .resolve(ResolutionRequest::new(concept, max_depth)),
        )?;
        let learning_path = flatten(&resolution.tree);

        Ok(QuickAnalysis {
            analysis,
            tree: resolution.tree,
            learning_path,
        })
    }

    /// Tree, learning path and outline without any enrichment
    pub async fn explore(&self, concept: &str, max_depth: u32) -> Result<Exploration> {
        let concept = validate_concept(concept)?;
        let max_depth = validate_depth(max_depth)?;

        let resolution = self
            .resolver
            .resolve(ResolutionRequest::new(concept, max_depth))
            .await?;

        Ok(Exploration {
            learning_path: flatten(&resolution.tree),
            text: resolution.tree.render_text(),
            tree: resolution.tree,
            stats: resolution.stats,
        })
    }

    /// `count` questions on one topic; questions that fail are left out
    pub async fn generate_quiz_for_topic(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: usize,
        user_level: UserLevel,
    ) -> Result<TopicQuiz> {
        let topic = validate_concept(topic)?;
        if !(1..=MAX_TOPIC_QUIZ_QUESTIONS).contains(&count) {
            return Err(Error::InvalidInput(format!(
                "question count {} must be between 1 and {}",
                count, MAX_TOPIC_QUIZ_QUESTIONS
            )));
        }
        info!(topic = %topic, %difficulty, count, "Generating topic quiz");

        let started = Instant::now();
        let topics = [topic.to_string()];
        let questions = self
            .stage(
                STAGE_QUIZ,
                started,
                FailurePolicy::Abort,
                self.stages
                    .quiz
                    .generate_questions(&topics, difficulty, count, user_level),
            )
            .await?;
        if questions.len() < count {
            warn!(topic = %topic, written = questions.len(), requested = count, "Topic quiz is short");
        }

        Ok(TopicQuiz {
            topic: topic.to_string(),
            difficulty,
            requested: count,
            questions,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Run one stage, tagging its error with the stage name and elapsed time
    async fn stage<T>(
        &self,
        name: &'static str,
        started: Instant,
        policy: FailurePolicy,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        work.await.map_err(|e| {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match policy {
                FailurePolicy::Abort => {
                    error!(stage = name, elapsed_ms, error = %e, "Pipeline stage failed")
                }
                FailurePolicy::BestEffort => {
                    warn!(stage = name, elapsed_ms, error = %e, "Pipeline stage failed, continuing")
                }
            }
            Error::stage(name, elapsed_ms, e)
        })
    }
}

fn settle<T>(result: Result<T>, failures: &mut Vec<StageFailure>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            failures.push(StageFailure::from_error(&e));
            None
        }
    }
}

fn validate_concept(concept: &str) -> Result<&str> {
    let concept = concept.trim();
    if concept.is_empty() {
        return Err(Error::InvalidInput("concept must not be empty".to_string()));
    }
    Ok(concept)
}

fn validate_depth(max_depth: u32) -> Result<u32> {
    if max_depth > MAX_RESOLUTION_DEPTH {
        return Err(Error::InvalidInput(format!(
            "max depth {} exceeds the limit of {}",
            max_depth, MAX_RESOLUTION_DEPTH
        )));
    }
    Ok(max_depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{
        Complexity, ConceptAnalysis, ConceptEnrichment, Difficulty, QuizQuestion,
    };
    use crate::knowledge::CuratedKnowledgeStore;
    use crate::llm::UnconfiguredChat;
    use crate::prerequisites::FoundationSet;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct StubAnalyzer {
        fail: bool,
    }

    #[async_trait]
    impl ConceptAnalyzer for StubAnalyzer {
        async fn analyze(&self, concept: &str, _: UserLevel) -> Result<ConceptAnalysis> {
            if self.fail {
                return Err(Error::LLMError("analyzer down".into()));
            }
            Ok(ConceptAnalysis {
                concept: concept.to_string(),
                domain: "genetics".into(),
                complexity: Complexity::Intermediate,
                visualization_potential: 0.5,
                suggested_visualizations: vec![],
                key_terms: vec![],
            })
        }
    }

    #[derive(Default)]
    struct StubEnricher {
        fail: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConceptEnricher for StubEnricher {
        async fn enrich(&self, concept: &str) -> Result<ConceptEnrichment> {
            self.calls.lock().unwrap().push(concept.to_string());
            if self.fail.contains(concept) {
                return Err(Error::LLMError(format!("cannot enrich {concept}")));
            }
            Ok(ConceptEnrichment {
                concept: concept.to_string(),
                definition: format!("about {concept}"),
                principles: vec![],
                formulas: vec![],
                examples: vec![],
                misconceptions: vec![],
            })
        }
    }

    struct StubQuiz {
        fail: bool,
        seen: Mutex<Option<Difficulty>>,
    }

    #[async_trait]
    impl QuizGenerator for StubQuiz {
        async fn generate(&self, topic: &str, difficulty: Difficulty, _: UserLevel) -> Result<QuizQuestion> {
            *self.seen.lock().unwrap() = Some(difficulty);
            if self.fail {
                return Err(Error::Parse("bad quiz".into()));
            }
            Ok(QuizQuestion {
                id: "quiz_1".into(),
                difficulty,
                topic: topic.to_string(),
                content: "q".into(),
                options: vec![],
                correct_answer: "A".into(),
                explanation: String::new(),
                tags: vec![],
            })
        }
    }

    /// Fails the listed attempts (zero-based), succeeds otherwise
    struct FlakyQuiz {
        fail_on: &'static [usize],
        attempts: Mutex<usize>,
    }

    #[async_trait]
    impl QuizGenerator for FlakyQuiz {
        async fn generate(&self, topic: &str, difficulty: Difficulty, _: UserLevel) -> Result<QuizQuestion> {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                *attempts += 1;
                *attempts - 1
            };
            if self.fail_on.contains(&attempt) {
                return Err(Error::RateLimited(5));
            }
            Ok(QuizQuestion {
                id: format!("quiz_{attempt}"),
                difficulty,
                topic: topic.to_string(),
                content: "q".into(),
                options: vec![],
                correct_answer: "A".into(),
                explanation: String::new(),
                tags: vec![],
            })
        }
    }

    fn with_quiz(pipeline: AgentPipeline, quiz: Arc<dyn QuizGenerator>) -> AgentPipeline {
        let stages = Stages {
            quiz,
            ..pipeline.stages.clone()
        };
        pipeline.with_stages(stages)
    }

    struct Fixture {
        analyzer_fails: bool,
        quiz_fails: bool,
        enrich_fails: &'static [&'static str],
    }

    impl Fixture {
        fn build(self) -> (AgentPipeline, Arc<StubEnricher>, Arc<StubQuiz>) {
            let store = Arc::new(
                CuratedKnowledgeStore::new()
                    .with_prerequisites("A", &["B", "C"])
                    .with_prerequisites("B", &["D"])
                    .with_prerequisites("C", &["D"]),
            );
            let chat: Arc<dyn StructuredChat> = Arc::new(UnconfiguredChat);
            let resolver = PrerequisiteResolver::new(
                store,
                Arc::new(LlmPrerequisiteSource::new(chat.clone())),
                ["D"].into_iter().collect::<FoundationSet>(),
            );
            let enricher = Arc::new(StubEnricher {
                fail: self.enrich_fails.iter().map(|s| s.to_string()).collect(),
                ..StubEnricher::default()
            });
            let quiz = Arc::new(StubQuiz {
                fail: self.quiz_fails,
                seen: Mutex::new(None),
            });
            let stages = Stages {
                analyzer: Arc::new(StubAnalyzer {
                    fail: self.analyzer_fails,
                }),
                enricher: enricher.clone(),
                visual: Arc::new(LlmVisualDesigner::new(chat.clone())),
                narrative: Arc::new(LlmNarrativeComposer::new(chat)),
                quiz: quiz.clone(),
            };
            (AgentPipeline::new(Arc::new(resolver), stages), enricher, quiz)
        }
    }

    fn healthy() -> Fixture {
        Fixture {
            analyzer_fails: false,
            quiz_fails: false,
            enrich_fails: &[],
        }
    }

    #[tokio::test]
    async fn test_single_shot_runs_every_stage() {
        let (pipeline, _, quiz) = healthy().build();
        let input = PipelineInput::new("A")
            .with_user_level(UserLevel::Advanced)
            .with_focus("quiz");

        let result = pipeline.execute_pipeline(&input).await.unwrap();
        assert!(result.is_complete());
        assert_eq!(result.learning_path.as_slice(), ["D", "B", "C", "A"]);
        assert!(result.analysis.is_some());
        assert!(result.visualization.is_some());
        assert_eq!(
            result.narrative.unwrap().learning_path,
            vec!["D", "B", "C", "A"]
        );
        assert_eq!(result.quiz.unwrap().difficulty, Difficulty::Hard);
        assert_eq!(*quiz.seen.lock().unwrap(), Some(Difficulty::Hard));
    }

    #[tokio::test]
    async fn test_quiz_requires_opt_in() {
        let (pipeline, _, quiz) = healthy().build();
        let result = pipeline.execute_pipeline(&PipelineInput::new("A")).await.unwrap();
        assert!(result.quiz.is_none());
        assert!(quiz.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abort_surfaces_stage_and_timing() {
        let (pipeline, _, _) = Fixture {
            analyzer_fails: true,
            ..healthy()
        }
        .build();

        let err = pipeline.execute_pipeline(&PipelineInput::new("A")).await.unwrap_err();
        match err {
            Error::StageFailed { stage, source, .. } => {
                assert_eq!(stage, STAGE_ANALYSIS);
                assert!(matches!(*source, Error::LLMError(_)));
            }
            other => panic!("expected StageFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_best_effort_records_failures_and_skips_dependants() {
        let (pipeline, _, _) = Fixture {
            analyzer_fails: true,
            quiz_fails: true,
            enrich_fails: &[],
        }
        .build();
        let input = PipelineInput::new("A").with_focus("Quiz");

        let result = pipeline
            .execute_pipeline_with_policy(&input, FailurePolicy::BestEffort)
            .await
            .unwrap();

        assert!(!result.is_complete());
        assert!(result.tree.is_some());
        assert!(result.enrichment.is_some());
        assert!(result.analysis.is_none());
        assert_eq!(result.skipped_stages, vec![STAGE_VISUAL, STAGE_NARRATIVE]);

        let stages: Vec<&str> = result.failures.iter().map(|f| f.stage.as_str()).collect();
        assert_eq!(stages, vec![STAGE_ANALYSIS, STAGE_QUIZ]);
        assert_eq!(result.failures[1].code, "E200");
    }

    #[tokio::test]
    async fn test_learning_path_policies() {
        let (pipeline, enricher, _) = Fixture {
            enrich_fails: &["B"],
            ..healthy()
        }
        .build();

        let result = pipeline.generate_learning_path("A", 3).await.unwrap();
        assert_eq!(result.path.as_slice(), ["D", "B", "C", "A"]);
        assert_eq!(result.enriched.len(), 3);
        assert!(!result.enriched.contains_key("B"));
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].concept, "B");
        assert_eq!(*enricher.calls.lock().unwrap(), vec!["D", "B", "C", "A"]);

        let order: Vec<&str> = result.in_order().map(|(c, _)| c).collect();
        assert_eq!(order, vec!["D", "C", "A"]);

        let err = pipeline
            .generate_learning_path_with_policy("A", 3, FailurePolicy::Abort)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EnrichmentFailed { ref concept, .. } if concept == "B"));
    }

    #[tokio::test]
    async fn test_quick_analyze_and_explore() {
        let (pipeline, _, _) = healthy().build();

        let quick = pipeline.quick_analyze("A").await.unwrap();
        assert_eq!(quick.tree.max_depth(), 2);
        assert_eq!(quick.learning_path.target(), Some("A"));

        let exploration = pipeline.explore("A", 1).await.unwrap();
        assert_eq!(exploration.learning_path.as_slice(), ["B", "C", "A"]);
        assert_eq!(exploration.text, "A\n  B\n  C\n");
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let (pipeline, _, _) = healthy().build();

        let err = pipeline.explore(" ", 3).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = pipeline
            .execute_pipeline(&PipelineInput::new("A").with_max_depth(11))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "E800");
    }

    #[tokio::test]
    async fn test_topic_quiz_keeps_the_questions_that_worked() {
        let (pipeline, _, _) = healthy().build();
        let pipeline = with_quiz(
            pipeline,
            Arc::new(FlakyQuiz {
                fail_on: &[1],
                attempts: Mutex::new(0),
            }),
        );

        let quiz = pipeline
            .generate_quiz_for_topic(" allele ", Difficulty::Hard, 3, UserLevel::Beginner)
            .await
            .unwrap();
        assert_eq!(quiz.topic, "allele");
        assert_eq!(quiz.requested, 3);
        assert!(!quiz.is_complete());
        let ids: Vec<&str> = quiz.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["quiz_0", "quiz_2"]);
        assert!(quiz.questions.iter().all(|q| q.difficulty == Difficulty::Hard));
    }

    #[tokio::test]
    async fn test_topic_quiz_fails_when_nothing_was_written() {
        let (pipeline, _, quiz) = Fixture {
            quiz_fails: true,
            ..healthy()
        }
        .build();

        let err = pipeline
            .generate_quiz_for_topic("allele", Difficulty::Easy, 2, UserLevel::Intermediate)
            .await
            .unwrap_err();
        match err {
            Error::StageFailed { stage, source, .. } => {
                assert_eq!(stage, STAGE_QUIZ);
                assert!(matches!(*source, Error::Parse(_)));
            }
            other => panic!("expected StageFailed, got {other:?}"),
        }
        assert_eq!(*quiz.seen.lock().unwrap(), Some(Difficulty::Easy));
    }

    #[tokio::test]
    async fn test_topic_quiz_rejects_bad_input() {
        let (pipeline, _, quiz) = healthy().build();

        for count in [0, MAX_TOPIC_QUIZ_QUESTIONS + 1] {
            let err = pipeline
                .generate_quiz_for_topic("allele", Difficulty::Easy, count, UserLevel::Beginner)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }
        let err = pipeline
            .generate_quiz_for_topic("  ", Difficulty::Easy, 1, UserLevel::Beginner)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "E800");
        assert!(quiz.seen.lock().unwrap().is_none());
    }

    struct RecordingChat {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StructuredChat for RecordingChat {
        async fn chat_json(
            &self,
            messages: Vec<crate::llm::Message>,
            _: &serde_json::Value,
            _: Option<f32>,
        ) -> Result<serde_json::Value> {
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            Ok(serde_json::json!({ "prerequisites": [] }))
        }
    }

    #[tokio::test]
    async fn test_generated_prerequisites_name_the_store_domain() {
        for (document, expected) in [
            (r#"{"domain": "botany", "concepts": []}"#, "expert botany educator"),
            (r#"{"concepts": []}"#, "expert genetics educator"),
        ] {
            let chat = Arc::new(RecordingChat {
                prompts: Mutex::new(Vec::new()),
            });
            let store = Arc::new(CuratedKnowledgeStore::from_json_str(document).unwrap());
            let pipeline = AgentPipeline::from_config(&Config::default(), chat.clone(), store);

            let exploration = pipeline.explore("photosynthesis", 1).await.unwrap();
            assert_eq!(exploration.learning_path.as_slice(), ["photosynthesis"]);

            let prompts = chat.prompts.lock().unwrap();
            assert_eq!(prompts.len(), 1);
            assert!(prompts[0].contains(expected), "{}", prompts[0]);
        }
    }
}
