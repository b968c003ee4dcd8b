//! Structured knowledge store
//!
//! The cheap first tier of every lookup: curated prerequisites, analyses and
//! teaching content keyed by concept name. Generative fallbacks are only
//! consulted when the store has nothing.

mod curated;
mod store;

pub use curated::{ConceptRecord, CuratedKnowledgeStore};
pub use store::{KnowledgeStore, PrerequisiteRef};
