//! Multi-strategy search over the API corpus
//!
//! Semantic similarity over cached embeddings, keyword overlap and
//! usage-context overlap, fused into one ranking.

pub mod cache;
pub mod embedding;
pub mod engine;
pub mod strategy;

pub use cache::EmbeddingCache;
pub use embedding::{Embedder, EmbeddingProvider, HtpEmbedder};
pub use engine::{IntegrityIssue, KnowledgeBase, KnowledgeStats, LoadReport, SearchOptions};
pub use strategy::{MatchType, SearchResult};
