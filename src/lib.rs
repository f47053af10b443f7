//! apidoc-rag library
//!
//! Retrieval of API documentation for quantum-computing libraries,
//! combining semantic, keyword and usage-context matching.
//!
//! # Modules
//!
//! - `core`: Corpus model and loading (documents, store, paths)
//! - `search`: Embedding provider, embedding cache, strategies and engine
//! - `error`: Library error type

pub mod core;
pub mod error;
pub mod search;

// Re-exports for convenience
pub use core::document::DocumentEntry;
pub use core::paths::KnowledgePaths;
pub use core::store::{Corpus, DocumentStore};
pub use error::{KbError, Result};
pub use search::{
    EmbeddingCache, EmbeddingProvider, KnowledgeBase, KnowledgeStats, LoadReport, MatchType,
    SearchOptions, SearchResult,
};
