//! Prerequisite resolution and linearization
//!
//! # Architecture
//!
//! - **FoundationSet**: injected set of axiomatic concepts (recursion stops there)
//! - **PrerequisiteSource**: generative fallback when the knowledge store has no entry
//! - **PrerequisiteResolver**: concurrent, bounded, deadline-aware tree builder
//! - **flatten**: post-order, first-occurrence linearization into a [`LearningPath`]
//!
//! # Example
//!
//! ```rust,ignore
//! use ahatutor_core::prerequisites::{PrerequisiteResolver, ResolutionRequest, flatten};
//!
//! let resolution = resolver.resolve(ResolutionRequest::new("Mendel's first law", 3)).await?;
//! println!("{}", resolution.tree.render_text());
//! println!("{}", flatten(&resolution.tree));
//! ```

mod foundation;
mod node;
mod path;
mod resolver;
mod source;

pub use foundation::FoundationSet;
pub use node::{ConceptNode, NodeOrigin};
pub use path::{LearningPath, flatten};
pub use resolver::{
    CyclePolicy, PrerequisiteResolver, Resolution, ResolutionRequest, ResolutionStats,
    ResolverOptions,
};
pub use source::{LlmPrerequisiteSource, PrerequisiteSource};
