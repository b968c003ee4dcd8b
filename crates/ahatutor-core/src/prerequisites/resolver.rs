//! Recursive prerequisite resolution
//!
//! Builds a bounded-depth tree of "things to understand first". Each concept
//! goes through the same checks in order: foundation membership, depth budget,
//! then the knowledge store with the generative source as fallback. Sibling
//! subtrees are resolved concurrently and reattached in discovery order.

use futures_util::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MAX_RESOLUTION_DEPTH;
use crate::error::{Error, Result};
use crate::knowledge::KnowledgeStore;

use super::foundation::FoundationSet;
use super::node::{ConceptNode, NodeOrigin};
use super::source::{PrerequisiteSource, normalize_names};

/// What to do with a prerequisite already on its own ancestor chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Drop it from the child list
    #[default]
    Prune,
    /// Keep it; the depth budget still bounds the recursion
    Allow,
}

impl std::fmt::Display for CyclePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prune => write!(f, "prune"),
            Self::Allow => write!(f, "allow"),
        }
    }
}

impl std::str::FromStr for CyclePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prune" => Ok(Self::Prune),
            "allow" => Ok(Self::Allow),
            other => Err(format!(
                "Unknown cycle policy '{}'. Valid options: prune, allow",
                other
            )),
        }
    }
}

/// Runtime knobs for a [`PrerequisiteResolver`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOptions {
    /// Adapter calls allowed in flight at once
    pub max_concurrency: usize,
    /// Deadline for a whole resolution
    pub timeout: Duration,
    /// Cap on generated prerequisites per concept
    pub max_prerequisites: usize,
    /// Share name lookups for repeated concepts within one resolution
    pub memoize: bool,
    pub cycle_policy: CyclePolicy,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            timeout: Duration::from_secs(60),
            max_prerequisites: 5,
            memoize: false,
            cycle_policy: CyclePolicy::Prune,
        }
    }
}

/// Input to a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub concept: String,
    pub max_depth: u32,
}

impl ResolutionRequest {
    pub fn new(concept: impl Into<String>, max_depth: u32) -> Self {
        Self {
            concept: concept.into(),
            max_depth,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.concept.trim().is_empty() {
            return Err(Error::InvalidInput("concept must not be empty".to_string()));
        }
        if self.max_depth > MAX_RESOLUTION_DEPTH {
            return Err(Error::InvalidInput(format!(
                "max depth {} exceeds the limit of {}",
                self.max_depth, MAX_RESOLUTION_DEPTH
            )));
        }
        Ok(())
    }
}

/// Counters gathered during one resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionStats {
    pub nodes: usize,
    pub store_hits: usize,
    pub generative_calls: usize,
    pub soft_failures: usize,
    pub timeouts: usize,
    pub cycles_pruned: usize,
    pub memo_hits: usize,
}

#[derive(Default)]
struct Counters {
    nodes: AtomicUsize,
    store_hits: AtomicUsize,
    generative_calls: AtomicUsize,
    soft_failures: AtomicUsize,
    timeouts: AtomicUsize,
    cycles_pruned: AtomicUsize,
    memo_hits: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ResolutionStats {
        ResolutionStats {
            nodes: self.nodes.load(Ordering::Relaxed),
            store_hits: self.store_hits.load(Ordering::Relaxed),
            generative_calls: self.generative_calls.load(Ordering::Relaxed),
            soft_failures: self.soft_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cycles_pruned: self.cycles_pruned.load(Ordering::Relaxed),
            memo_hits: self.memo_hits.load(Ordering::Relaxed),
        }
    }
}

/// A resolved tree plus how it was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub tree: ConceptNode,
    pub stats: ResolutionStats,
}

/// Outcome of looking up one concept's direct prerequisites
#[derive(Debug, Clone)]
enum Lookup {
    Found {
        names: Vec<String>,
        origin: NodeOrigin,
    },
    Unavailable,
    TimedOut,
}

/// Builds prerequisite trees from a knowledge store and a generative source
pub struct PrerequisiteResolver {
    store: Arc<dyn KnowledgeStore>,
    source: Arc<dyn PrerequisiteSource>,
    foundations: FoundationSet,
    options: ResolverOptions,
    permits: Arc<Semaphore>,
}

impl PrerequisiteResolver {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        source: Arc<dyn PrerequisiteSource>,
        foundations: FoundationSet,
    ) -> Self {
        let options = ResolverOptions::default();
        Self {
            store,
            source,
            foundations,
            permits: permits_for(&options),
            options,
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.permits = permits_for(&options);
        self.options = options;
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn foundations(&self) -> &FoundationSet {
        &self.foundations
    }

    /// Resolve `concept` down to `max_depth` levels
    pub async fn resolve_concept(&self, concept: &str, max_depth: u32) -> Result<ConceptNode> {
        let resolution = self.resolve(ResolutionRequest::new(concept, max_depth)).await?;
        Ok(resolution.tree)
    }

    pub async fn resolve(&self, request: ResolutionRequest) -> Result<Resolution> {
        self.resolve_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Resolve, stopping early if `cancel` fires
    ///
    /// Cancellation and the configured timeout degrade unfinished branches to
    /// leaves; only invalid input is an error.
    pub async fn resolve_with_cancel(
        &self,
        request: ResolutionRequest,
        cancel: CancellationToken,
    ) -> Result<Resolution> {
        request.validate()?;
        let concept = request.concept.trim().to_string();
        info!(concept = %concept, max_depth = request.max_depth, "Resolving prerequisites");

        let started = Instant::now();
        let run = Run {
            resolver: self,
            max_depth: request.max_depth,
            deadline: deadline_after(started, self.options.timeout),
            cancel,
            counters: Counters::default(),
            memo: Mutex::new(HashMap::new()),
        };

        let tree = run.resolve_node(concept.clone(), 0, Vec::new()).await;
        let stats = run.counters.snapshot();

        info!(
            concept = %concept,
            nodes = stats.nodes,
            depth = tree.max_depth(),
            generative_calls = stats.generative_calls,
            soft_failures = stats.soft_failures,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Prerequisite resolution complete"
        );

        Ok(Resolution { tree, stats })
    }
}

fn permits_for(options: &ResolverOptions) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(
        options.max_concurrency.clamp(1, Semaphore::MAX_PERMITS),
    ))
}

/// `started + timeout`, saturating at roughly thirty years out
fn deadline_after(started: Instant, timeout: Duration) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);
    started
        .checked_add(timeout)
        .unwrap_or_else(|| started + FAR_FUTURE)
}

/// State shared by every branch of one resolution
struct Run<'r> {
    resolver: &'r PrerequisiteResolver,
    max_depth: u32,
    deadline: Instant,
    cancel: CancellationToken,
    counters: Counters,
    memo: Mutex<HashMap<String, Arc<OnceCell<Lookup>>>>,
}

fn lineage_key(concept: &str) -> String {
    concept.trim().to_lowercase()
}

impl Run<'_> {
    fn resolve_node(
        &self,
        concept: String,
        depth: u32,
        ancestors: Vec<String>,
    ) -> BoxFuture<'_, ConceptNode> {
        Box::pin(async move {
            Counters::bump(&self.counters.nodes);

            if self.resolver.foundations.contains(&concept) {
                return ConceptNode::foundation(concept, depth);
            }
            if depth >= self.max_depth {
                return ConceptNode::frontier(concept, depth);
            }

            let (names, origin) = match self.lookup(&concept).await {
                Lookup::Found { names, origin } => (names, origin),
                Lookup::Unavailable => {
                    return ConceptNode::expanded(concept, depth, NodeOrigin::Unavailable, vec![]);
                }
                Lookup::TimedOut => {
                    return ConceptNode::expanded(concept, depth, NodeOrigin::TimedOut, vec![]);
                }
            };

            let mut lineage = ancestors;
            lineage.push(lineage_key(&concept));

            let names: Vec<String> = names
                .into_iter()
                .filter(|name| {
                    let cyclic = lineage.contains(&lineage_key(name));
                    if cyclic && self.resolver.options.cycle_policy == CyclePolicy::Prune {
                        debug!(concept = %concept, prerequisite = %name, "Pruned cyclic prerequisite");
                        Counters::bump(&self.counters.cycles_pruned);
                        return false;
                    }
                    true
                })
                .collect();

            let children = join_all(
                names
                    .into_iter()
                    .map(|name| self.resolve_node(name, depth + 1, lineage.clone())),
            )
            .await;

            ConceptNode::expanded(concept, depth, origin, children)
        })
    }

    async fn lookup(&self, concept: &str) -> Lookup {
        if !self.resolver.options.memoize {
            return self.fetch(concept).await;
        }

        let cell = {
            let mut memo = self.memo.lock().await;
            memo.entry(lineage_key(concept)).or_default().clone()
        };

        let mut fetched = false;
        let lookup = cell
            .get_or_init(|| {
                fetched = true;
                self.fetch(concept)
            })
            .await
            .clone();
        if !fetched {
            Counters::bump(&self.counters.memo_hits);
        }
        lookup
    }

    /// Store first, generative source second
    async fn fetch(&self, concept: &str) -> Lookup {
        let resolver = self.resolver;

        match self.guarded(resolver.store.lookup_prerequisites(concept)).await {
            None => return self.timed_out(concept),
            Some(Ok(Some(refs))) => {
                let names = normalize_names(refs.iter().map(|r| r.concept.as_str()));
                if !names.is_empty() {
                    Counters::bump(&self.counters.store_hits);
                    return Lookup::Found {
                        names,
                        origin: NodeOrigin::KnowledgeStore,
                    };
                }
            }
            Some(Ok(None)) => {}
            Some(Err(e)) => {
                warn!(concept = %concept, error = %e, "Knowledge store lookup failed, using generative fallback");
            }
        }

        Counters::bump(&self.counters.generative_calls);
        match self.guarded(resolver.source.request_prerequisites(concept)).await {
            None => self.timed_out(concept),
            Some(Ok(names)) => {
                let mut names = normalize_names(names);
                names.truncate(resolver.options.max_prerequisites.max(1));
                if names.is_empty() {
                    debug!(concept = %concept, "Generative source returned no prerequisites");
                    Lookup::Unavailable
                } else {
                    Lookup::Found {
                        names,
                        origin: NodeOrigin::Generated,
                    }
                }
            }
            Some(Err(e)) => {
                warn!(concept = %concept, error = %e, "Generative prerequisite lookup failed, treating as leaf");
                Counters::bump(&self.counters.soft_failures);
                Lookup::Unavailable
            }
        }
    }

    /// Run adapter I/O under a permit, the deadline and the cancel token
    ///
    /// `None` means the deadline passed or the run was cancelled.
    async fn guarded<T>(&self, io: impl Future<Output = T>) -> Option<T> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let _permit = tokio::select! {
            permit = self.resolver.permits.acquire() => permit.ok()?,
            _ = self.cancel.cancelled() => return None,
            _ = tokio::time::sleep_until(self.deadline) => return None,
        };

        tokio::select! {
            out = io => Some(out),
            _ = self.cancel.cancelled() => None,
            _ = tokio::time::sleep_until(self.deadline) => None,
        }
    }

    fn timed_out(&self, concept: &str) -> Lookup {
        if self.cancel.is_cancelled() {
            debug!(concept = %concept, "Resolution cancelled, treating as leaf");
        } else {
            warn!(concept = %concept, "Resolution deadline passed, treating as leaf");
        }
        Counters::bump(&self.counters.timeouts);
        Lookup::TimedOut
    }
}
