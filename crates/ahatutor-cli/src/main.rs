//! AhaTutor CLI - prerequisite trees and learning paths

use ahatutor_core::agents::{Difficulty, QuizQuestion, UserLevel};
use ahatutor_core::config::Config;
use ahatutor_core::knowledge::{CuratedKnowledgeStore, KnowledgeStore};
use ahatutor_core::llm::{LlmClient, StructuredChat, UnconfiguredChat};
use ahatutor_core::pipeline::{
    AgentPipeline, AggregateResult, Exploration, FailurePolicy, LearningPathResult,
    PipelineInput, QuickAnalysis, TopicQuiz,
};
use ahatutor_core::prerequisites::ResolutionStats;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "ahatutor")]
#[command(author, version, about = "Prerequisite-aware learning material generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the prerequisite tree and learning path of a concept
    Explore {
        /// Target concept
        concept: String,
        /// Maximum tree depth (0-10)
        #[arg(short, long)]
        depth: Option<u32>,
        /// Shallow tree plus concept analysis
        #[arg(long, conflicts_with = "depth")]
        quick: bool,
    },

    /// Enrich every concept on the learning path
    Path {
        /// Target concept
        concept: String,
        /// Maximum tree depth (0-10)
        #[arg(short, long)]
        depth: Option<u32>,
        /// Fail on the first concept that cannot be enriched
        #[arg(long)]
        strict: bool,
    },

    /// Run the full pipeline for one concept
    Run {
        /// Target concept
        concept: String,
        /// Learner level (beginner, intermediate, advanced)
        #[arg(short, long, default_value = "intermediate")]
        level: UserLevel,
        /// Focus areas; "quiz" adds a quiz question
        #[arg(short, long)]
        focus: Vec<String>,
        /// Maximum tree depth (0-10)
        #[arg(short, long)]
        depth: Option<u32>,
        /// Record failing stages instead of aborting
        #[arg(long)]
        best_effort: bool,
    },

    /// Write a standalone quiz on one topic
    Quiz {
        /// Quiz topic
        topic: String,
        /// Number of questions (1-10)
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
        /// easy, medium or hard; follows the learner level when omitted
        #[arg(long)]
        difficulty: Option<Difficulty>,
        /// Learner level (beginner, intermediate, advanced)
        #[arg(short, long, default_value = "intermediate")]
        level: UserLevel,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
    /// Reset to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ahatutor=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Explore {
            concept,
            depth,
            quick,
        } => cmd_explore(&concept, depth, quick, cli.format, cli.quiet).await,

        Commands::Path {
            concept,
            depth,
            strict,
        } => cmd_path(&concept, depth, strict, cli.format, cli.quiet).await,

        Commands::Run {
            concept,
            level,
            focus,
            depth,
            best_effort,
        } => {
            let mut input = PipelineInput::new(concept).with_user_level(level);
            input.focus_areas = focus;
            input.max_depth = depth;
            cmd_run(&input, best_effort, cli.format, cli.quiet).await
        }

        Commands::Quiz {
            topic,
            count,
            difficulty,
            level,
        } => {
            let difficulty = difficulty.unwrap_or(level.difficulty());
            cmd_quiz(&topic, difficulty, count, level, cli.format, cli.quiet).await
        }

        Commands::Config { action } => cmd_config(action, cli.quiet),

        Commands::Doctor => cmd_doctor(cli.quiet),
    };

    if let Err(e) = &result
        && let Some(err) = e.downcast_ref::<ahatutor_core::Error>()
        && let Some(hint) = err.suggestion()
    {
        eprintln!("Hint: {}", hint);
    }
    result
}

/// Wire the pipeline: curated store from config (bundled genetics data by
/// default), LLM client only when an API key resolves
fn build_pipeline(config: &Config) -> anyhow::Result<AgentPipeline> {
    let store: Arc<dyn KnowledgeStore> = match &config.knowledge.data_path {
        Some(path) => Arc::new(CuratedKnowledgeStore::from_path(path)?),
        None => Arc::new(CuratedKnowledgeStore::genetics()?),
    };

    let chat: Arc<dyn StructuredChat> = match config.llm.resolved_api_key()? {
        Some(key) => Arc::new(LlmClient::new(config.llm.clone(), key)?),
        None => {
            warn!("No API key configured; only curated knowledge is available");
            Arc::new(UnconfiguredChat)
        }
    };

    Ok(AgentPipeline::from_config(config, chat, store))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_explore(
    concept: &str,
    depth: Option<u32>,
    quick: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let pipeline = build_pipeline(&config)?;

    if quick {
        let quick = pipeline.quick_analyze(concept).await?;
        return match format {
            OutputFormat::Json => print_json(&quick),
            OutputFormat::Text => {
                print_quick(&quick, quiet);
                Ok(())
            }
        };
    }

    let depth = depth.unwrap_or(pipeline.default_max_depth());
    let exploration = pipeline.explore(concept, depth).await?;
    match format {
        OutputFormat::Json => print_json(&exploration),
        OutputFormat::Text => {
            print_exploration(&exploration, quiet);
            Ok(())
        }
    }
}

fn print_exploration(exploration: &Exploration, quiet: bool) {
    if quiet {
        println!("{}", exploration.learning_path);
        return;
    }
    print!("{}", exploration.text);
    println!();
    println!("Learning path ({} steps):", exploration.learning_path.len());
    println!("  {}", exploration.learning_path);
    print_stats(&exploration.stats);
}

fn print_quick(quick: &QuickAnalysis, quiet: bool) {
    if quiet {
        println!("{}", quick.learning_path);
        return;
    }
    let analysis = &quick.analysis;
    println!("{} ({})", analysis.concept, analysis.domain);
    println!("  Complexity: {:?}", analysis.complexity);
    println!(
        "  Visualization potential: {:.0}%",
        analysis.visualization_potential * 100.0
    );
    if !analysis.key_terms.is_empty() {
        println!("  Key terms: {}", analysis.key_terms.join(", "));
    }
    println!();
    print!("{}", quick.tree.render_text());
    println!();
    println!("Learning path: {}", quick.learning_path);
}

fn print_stats(stats: &ResolutionStats) {
    println!();
    println!(
        "Resolved {} nodes ({} from the knowledge store, {} generated)",
        stats.nodes, stats.store_hits, stats.generative_calls
    );
    if stats.soft_failures + stats.timeouts > 0 {
        println!(
            "  {} unresolved, {} timed out",
            stats.soft_failures, stats.timeouts
        );
    }
    if stats.cycles_pruned > 0 {
        println!("  {} cyclic edges pruned", stats.cycles_pruned);
    }
}

async fn cmd_path(
    concept: &str,
    depth: Option<u32>,
    strict: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let pipeline = build_pipeline(&config)?;
    let depth = depth.unwrap_or(pipeline.default_max_depth());
    let policy = if strict {
        FailurePolicy::Abort
    } else {
        FailurePolicy::BestEffort
    };
    debug!(concept, depth, %policy, "Generating learning path");

    let result = pipeline
        .generate_learning_path_with_policy(concept, depth, policy)
        .await?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Text => {
            print_learning_path(&result, quiet);
            Ok(())
        }
    }
}

fn print_learning_path(result: &LearningPathResult, quiet: bool) {
    if quiet {
        println!("{}", result.path);
        return;
    }

    println!("Learning path ({} steps):", result.path.len());
    for (i, concept) in result.path.iter().enumerate() {
        match result.enriched.get(concept) {
            Some(enrichment) if !enrichment.definition.is_empty() => {
                println!("  {}. {} - {}", i + 1, concept, enrichment.definition)
            }
            Some(_) => println!("  {}. {}", i + 1, concept),
            None => println!("  {}. {} (not enriched)", i + 1, concept),
        }
    }

    if !result.skipped.is_empty() {
        println!();
        println!("Skipped {} concept(s):", result.skipped.len());
        for skipped in &result.skipped {
            println!("  {} [{}] {}", skipped.concept, skipped.code, skipped.error);
        }
    }
    println!();
    println!("Completed in {} ms", result.elapsed_ms);
}

async fn cmd_run(
    input: &PipelineInput,
    best_effort: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let pipeline = build_pipeline(&config)?;
    let policy = if best_effort {
        FailurePolicy::BestEffort
    } else {
        FailurePolicy::Abort
    };

    let result = pipeline.execute_pipeline_with_policy(input, policy).await?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Text => {
            print_aggregate(&result, quiet);
            Ok(())
        }
    }
}

fn print_aggregate(result: &AggregateResult, quiet: bool) {
    if quiet {
        println!("{}", result.learning_path);
        return;
    }

    println!("{} (level: {})", result.concept, result.user_level);
    println!("Run: {}", result.run_id);
    println!();

    if let Some(analysis) = &result.analysis {
        println!("Analysis");
        println!("  Domain: {}", analysis.domain);
        println!("  Complexity: {:?}", analysis.complexity);
        if !analysis.key_terms.is_empty() {
            println!("  Key terms: {}", analysis.key_terms.join(", "));
        }
        println!();
    }

    if let Some(tree) = &result.tree {
        println!("Prerequisites");
        for line in tree.render_text().lines() {
            println!("  {}", line);
        }
        println!();
        println!("Learning path: {}", result.learning_path);
        println!();
    }

    if let Some(enrichment) = &result.enrichment {
        println!("Definition");
        println!("  {}", enrichment.definition);
        for principle in &enrichment.principles {
            println!("  - {}", principle);
        }
        for formula in &enrichment.formulas {
            println!("  {}: {}", formula.key, formula.latex);
        }
        println!();
    }

    if let Some(visual) = &result.visualization {
        println!("Visualization: {} ({})", visual.title, visual.kind);
        for insight in &visual.insights {
            println!("  * {}", insight.key_point);
        }
        println!();
    }

    if let Some(narrative) = &result.narrative {
        println!("Explanation order");
        for (i, concept) in narrative.explanation_order.iter().enumerate() {
            println!("  {}. {}", i + 1, concept);
        }
        for story in &narrative.connecting_stories {
            println!("  > {}", story);
        }
        println!();
    }

    if let Some(quiz) = &result.quiz {
        println!("Quiz ({})", quiz.difficulty);
        print_question(quiz);
        println!();
    }

    for failure in &result.failures {
        println!(
            "Stage {} failed after {} ms [{}]: {}",
            failure.stage, failure.elapsed_ms, failure.code, failure.message
        );
    }
    for stage in &result.skipped_stages {
        println!("Stage {} skipped", stage);
    }
    println!("Completed in {} ms", result.elapsed_ms);
}

fn print_question(question: &QuizQuestion) {
    println!("  {}", question.content);
    for option in &question.options {
        println!("    {}) {}", option.id, option.content);
    }
}

async fn cmd_quiz(
    topic: &str,
    difficulty: Difficulty,
    count: usize,
    level: UserLevel,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let pipeline = build_pipeline(&config)?;

    let quiz = pipeline
        .generate_quiz_for_topic(topic, difficulty, count, level)
        .await?;

    match format {
        OutputFormat::Json => print_json(&quiz),
        OutputFormat::Text => {
            print_topic_quiz(&quiz, quiet);
            Ok(())
        }
    }
}

fn print_topic_quiz(quiz: &TopicQuiz, quiet: bool) {
    if quiet {
        for question in &quiz.questions {
            println!("{}", question.content);
        }
        return;
    }

    println!(
        "Quiz on {} ({}): {} of {} questions",
        quiz.topic,
        quiz.difficulty,
        quiz.questions.len(),
        quiz.requested
    );
    for (i, question) in quiz.questions.iter().enumerate() {
        println!();
        println!("{}.", i + 1);
        print_question(question);
        println!("  Answer: {}", question.correct_answer);
        if !question.explanation.is_empty() {
            println!("  {}", question.explanation);
        }
    }
    println!();
    println!("Completed in {} ms", quiz.elapsed_ms);
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn cmd_doctor(quiet: bool) -> anyhow::Result<()> {
    let mut issues = 0;

    let path = Config::config_path()?;
    let config = match Config::load() {
        Ok(config) => {
            if !quiet {
                println!("[ok] Configuration ({})", path.display());
            }
            config
        }
        Err(e) => {
            println!("[!!] Configuration: {:#}", e);
            issues += 1;
            Config::default()
        }
    };

    match config.llm.redacted_api_key() {
        Ok(Some(key)) => {
            if !quiet {
                println!("[ok] API key {}", key);
            }
        }
        Ok(None) => {
            println!("[--] No API key (set AHATUTOR_API_KEY); curated knowledge only");
        }
        Err(e) => {
            println!("[!!] API key: {}", e);
            issues += 1;
        }
    }

    let store = match &config.knowledge.data_path {
        Some(path) => CuratedKnowledgeStore::from_path(path),
        None => CuratedKnowledgeStore::genetics(),
    };
    match store {
        Ok(store) => {
            if !quiet {
                println!(
                    "[ok] Knowledge store: {} concepts ({})",
                    store.len(),
                    store.domain().unwrap_or("unnamed domain")
                );
            }
        }
        Err(e) => {
            println!("[!!] Knowledge store: {}", e);
            issues += 1;
        }
    }

    if !quiet {
        println!(
            "[ok] Foundation set: {} concepts",
            config.resolver.foundation_concepts.len()
        );
    }

    if issues > 0 {
        anyhow::bail!("{} issue(s) found", issues);
    }
    if !quiet {
        println!("All checks passed.");
    }
    Ok(())
}
