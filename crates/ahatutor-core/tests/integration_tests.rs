//! AhaTutor Core Integration Tests

use ahatutor_core::{
    Error, Result,
    agents::{ConceptEnrichment, UserLevel},
    config::Config,
    knowledge::{CuratedKnowledgeStore, KnowledgeStore},
    llm::{StructuredChat, UnconfiguredChat},
    pipeline::{AgentPipeline, FailurePolicy, PipelineInput, Stages},
    prerequisites::{
        ConceptNode, FoundationSet, NodeOrigin, PrerequisiteResolver, PrerequisiteSource,
        ResolutionRequest, flatten,
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Generative source that counts calls and always fails
#[derive(Default)]
struct FailingSource {
    calls: AtomicUsize,
}

#[async_trait]
impl PrerequisiteSource for FailingSource {
    async fn request_prerequisites(&self, concept: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::LLMError(format!("no answer for {concept}")))
    }
}

fn resolver(
    store: CuratedKnowledgeStore,
    foundations: &[&str],
) -> (PrerequisiteResolver, Arc<FailingSource>) {
    let source = Arc::new(FailingSource::default());
    let resolver = PrerequisiteResolver::new(
        Arc::new(store),
        source.clone(),
        foundations.iter().copied().collect::<FoundationSet>(),
    );
    (resolver, source)
}

fn assert_bare(node: &ConceptNode, concept: &str, is_foundation: bool) {
    assert_eq!(node.concept, concept);
    assert_eq!(node.level, 0);
    assert_eq!(node.is_foundation, is_foundation);
    assert!(node.children().is_empty());
}

#[tokio::test]
async fn test_depth_zero_returns_root_only() {
    let (resolver, source) = resolver(
        CuratedKnowledgeStore::new().with_prerequisites("X", &["Y"]),
        &[],
    );

    let tree = resolver.resolve_concept("X", 0).await.unwrap();
    assert_bare(&tree, "X", false);
    assert_eq!(tree.origin, NodeOrigin::DepthLimit);
    assert_eq!(flatten(&tree).as_slice(), ["X"]);
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_foundation_short_circuits() {
    let (resolver, source) = resolver(
        CuratedKnowledgeStore::new().with_prerequisites("DNA", &["nucleotide"]),
        &["DNA"],
    );

    let resolution = resolver
        .resolve(ResolutionRequest::new("DNA", 3))
        .await
        .unwrap();
    assert_bare(&resolution.tree, "DNA", true);
    assert_eq!(resolution.stats.store_hits, 0);
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_simple_fan_out() {
    let (resolver, _) = resolver(
        CuratedKnowledgeStore::new().with_prerequisites("A", &["B", "C"]),
        &["B", "C"],
    );

    let tree = resolver.resolve_concept("A", 3).await.unwrap();
    assert_eq!(tree.nodes_at_level(1), vec!["B", "C"]);
    assert!(tree.children().iter().all(|c| c.is_foundation && c.is_leaf()));
    assert_eq!(flatten(&tree).as_slice(), ["B", "C", "A"]);
}

#[tokio::test]
async fn test_shared_subconcept_appears_once() {
    let (resolver, _) = resolver(
        CuratedKnowledgeStore::new()
            .with_prerequisites("A", &["B", "C"])
            .with_prerequisites("B", &["D"])
            .with_prerequisites("C", &["D"]),
        &["D"],
    );

    let tree = resolver.resolve_concept("A", 3).await.unwrap();
    assert_eq!(tree.nodes_at_level(2), vec!["D", "D"]);
    assert_eq!(flatten(&tree).as_slice(), ["D", "B", "C", "A"]);
}

#[tokio::test]
async fn test_generative_failure_degrades() {
    let (resolver, source) = resolver(CuratedKnowledgeStore::new(), &[]);

    let resolution = resolver
        .resolve(ResolutionRequest::new("Z", 3))
        .await
        .unwrap();
    assert_bare(&resolution.tree, "Z", false);
    assert_eq!(resolution.tree.origin, NodeOrigin::Unavailable);
    assert_eq!(resolution.stats.soft_failures, 1);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

/// Enricher that fails for one named concept
struct PickyEnricher {
    reject: &'static str,
}

#[async_trait]
impl ahatutor_core::agents::ConceptEnricher for PickyEnricher {
    async fn enrich(&self, concept: &str) -> Result<ConceptEnrichment> {
        if concept == self.reject {
            return Err(Error::RateLimited(30));
        }
        Ok(ConceptEnrichment {
            concept: concept.to_string(),
            definition: format!("{concept} explained"),
            principles: vec![],
            formulas: vec![],
            examples: vec![],
            misconceptions: vec![],
        })
    }
}

fn genetics_pipeline(reject: &'static str) -> AgentPipeline {
    let store: Arc<dyn KnowledgeStore> = Arc::new(CuratedKnowledgeStore::genetics().unwrap());
    let chat: Arc<dyn StructuredChat> = Arc::new(UnconfiguredChat);
    let mut stages = Stages::llm(chat.clone(), store.clone());
    stages.enricher = Arc::new(PickyEnricher { reject });
    AgentPipeline::from_config(&Config::default(), chat, store).with_stages(stages)
}

#[tokio::test]
async fn test_batch_partial_failure_skips_one_concept() {
    let pipeline = genetics_pipeline("meiosis");

    let result = pipeline
        .generate_learning_path("Mendel's first law", 3)
        .await
        .unwrap();

    assert!(result.path.contains("meiosis"));
    assert_eq!(result.path.target(), Some("Mendel's first law"));
    assert_eq!(result.enriched.len(), result.path.len() - 1);
    assert!(!result.enriched.contains_key("meiosis"));
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].code, "E102");
}

#[tokio::test]
async fn test_batch_abort_names_failed_concept() {
    let pipeline = genetics_pipeline("meiosis");

    let err = pipeline
        .generate_learning_path_with_policy("Mendel's first law", 3, FailurePolicy::Abort)
        .await
        .unwrap_err();

    match err {
        Error::EnrichmentFailed { concept, source } => {
            assert_eq!(concept, "meiosis");
            assert!(source.is_transient());
        }
        other => panic!("expected EnrichmentFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_curated_pipeline_without_llm() {
    let pipeline = genetics_pipeline("");
    let input = PipelineInput::new("Mendel's first law").with_user_level(UserLevel::Beginner);

    let result = pipeline.execute_pipeline(&input).await.unwrap();

    assert!(result.is_complete());
    assert_eq!(result.analysis.unwrap().domain, "genetics");
    assert_eq!(result.learning_path.target(), Some("Mendel's first law"));
    let narrative = result.narrative.unwrap();
    assert_eq!(narrative.learning_path, result.learning_path.clone().into_vec());
    assert!(narrative.connecting_stories.is_empty());
    assert!(result.visualization.is_some());
}
