//! Knowledge base - corpus, embedding provider and cache behind one API
//!
//! A load cycle reads the corpus, precomputes document embeddings through
//! the cache, and swaps the new snapshot in. Queries run the three matching
//! strategies and fuse their results.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use super::cache::EmbeddingCache;
use super::embedding::EmbeddingProvider;
use super::strategy::{context_search, fuse, keyword_search, semantic_search, SearchResult};
use crate::core::document::DocumentEntry;
use crate::core::paths::KnowledgePaths;
use crate::core::store::{Corpus, DocumentStore};
use crate::error::{KbError, Result};

/// Ranking parameters for one query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    pub top_k: usize,
    pub min_similarity: f32,
}

impl SearchOptions {
    /// Defaults of the description-based entry point
    pub fn for_description() -> Self {
        Self {
            top_k: 10,
            min_similarity: 0.2,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(KbError::invalid("top_k", "must be at least 1"));
        }
        if !self.min_similarity.is_finite() {
            return Err(KbError::invalid(
                "min_similarity",
                format!("must be a finite number, got {}", self.min_similarity),
            ));
        }
        Ok(())
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: 0.3,
        }
    }
}

/// Outcome of one load cycle
#[derive(Debug, Default, Clone, Serialize)]
pub struct LoadReport {
    pub documents: usize,
    pub files: usize,
    pub failed_files: usize,
    pub skipped_documents: usize,
    pub duplicates: usize,
    pub embedded_new: usize,
    pub embedded_cached: usize,
    pub embedding_failures: usize,
    pub duration_ms: u128,
}

#[derive(Debug, Default)]
struct EmbeddingCounts {
    new: usize,
    cached: usize,
    failed: usize,
}

/// Knowledge base statistics
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStats {
    pub total_apis: usize,
    pub libraries: BTreeMap<String, usize>,
    pub embedded_apis: usize,
    pub embedding_model_loaded: bool,
    pub cache_size: usize,
}

/// Multi-strategy retrieval over an in-memory API corpus
pub struct KnowledgeBase {
    knowledge_base_dir: PathBuf,
    store: DocumentStore,
    provider: EmbeddingProvider,
    cache: Arc<EmbeddingCache>,
}

impl KnowledgeBase {
    /// Create an empty knowledge base; call [`KnowledgeBase::load`] to fill it.
    ///
    /// Note: the embedding model is loaded lazily on first use
    pub fn new(
        knowledge_base_dir: &Path,
        cache: Arc<EmbeddingCache>,
        provider: EmbeddingProvider,
    ) -> Self {
        info!(
            "Initialized knowledge base: {}",
            knowledge_base_dir.display()
        );
        Self {
            knowledge_base_dir: knowledge_base_dir.to_path_buf(),
            store: DocumentStore::new(),
            provider,
            cache,
        }
    }

    /// Knowledge base over the configured directories with the HTP model
    pub fn open(paths: &KnowledgePaths) -> Self {
        let cache = Arc::new(EmbeddingCache::open(&paths.cache_dir));
        Self::new(&paths.knowledge_base, cache, EmbeddingProvider::htp())
    }

    pub fn knowledge_base_dir(&self) -> &Path {
        &self.knowledge_base_dir
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    pub fn provider(&self) -> &EmbeddingProvider {
        &self.provider
    }

    pub fn documents(&self) -> &[DocumentEntry] {
        self.store.documents()
    }

    /// Load every document from the configured directory.
    ///
    /// The previous snapshot stays visible until the new one, with its
    /// embeddings, is complete.
    pub fn load(&mut self) -> LoadReport {
        let dir = self.knowledge_base_dir.clone();
        self.load_from(&dir)
    }

    /// Load from `dir` and remember it as the corpus location
    pub fn load_from(&mut self, dir: &Path) -> LoadReport {
        let start = Instant::now();
        info!("Loading knowledge base from {}", dir.display());

        let mut corpus = Corpus::load(dir);
        let counts = if corpus.is_empty() {
            EmbeddingCounts::default()
        } else {
            self.precompute_embeddings(&mut corpus)
        };

        let report = LoadReport {
            documents: corpus.len(),
            files: corpus.stats.files,
            failed_files: corpus.stats.failed_files,
            skipped_documents: corpus.stats.skipped_documents,
            duplicates: corpus.stats.duplicates.len(),
            embedded_new: counts.new,
            embedded_cached: counts.cached,
            embedding_failures: counts.failed,
            duration_ms: start.elapsed().as_millis(),
        };

        self.knowledge_base_dir = dir.to_path_buf();
        self.store.replace(corpus, Some(dir.to_path_buf()));
        report
    }

    /// Replace the corpus with a fresh read of the same directory
    pub fn reload(&mut self) -> LoadReport {
        self.load()
    }

    /// Install documents directly, bypassing the filesystem
    pub fn load_documents(&mut self, documents: Vec<DocumentEntry>) -> LoadReport {
        let mut corpus = Corpus::from_documents(documents);
        let counts = if corpus.is_empty() {
            EmbeddingCounts::default()
        } else {
            self.precompute_embeddings(&mut corpus)
        };
        let report = LoadReport {
            documents: corpus.len(),
            duplicates: corpus.stats.duplicates.len(),
            embedded_new: counts.new,
            embedded_cached: counts.cached,
            embedding_failures: counts.failed,
            ..Default::default()
        };
        self.store.replace(corpus, None);
        report
    }

    fn precompute_embeddings(&self, corpus: &mut Corpus) -> EmbeddingCounts {
        let mut counts = EmbeddingCounts::default();

        if !self.provider.ensure_ready() {
            warn!("No embedding model available, skipping embedding computation");
            return counts;
        }
        if let Some(model_id) = self.provider.model_id() {
            self.cache.bind_model(model_id);
        }

        info!("Computing embeddings for API documents...");
        for doc in corpus.documents_mut() {
            let text = doc.embedding_text();
            if let Some(cached) = self.cache.get(&text) {
                doc.embedding = Some(cached);
                counts.cached += 1;
                continue;
            }
            match self.provider.embed(&text) {
                Some(embedding) => {
                    self.cache.set(&text, embedding.clone());
                    doc.embedding = Some(embedding);
                    counts.new += 1;
                }
                None => {
                    warn!(api = %doc.api_name, "Failed to compute embedding");
                    counts.failed += 1;
                }
            }
        }

        self.cache.flush();
        info!(
            "Computed {} new embeddings, using {} cached",
            counts.new, counts.cached
        );
        counts
    }

    /// Query embedding, read from and written to the shared cache
    fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        if let Some(cached) = self.cache.get(query) {
            return Some(cached);
        }
        let embedding = self.provider.embed(query)?;
        self.cache.set(query, embedding.clone());
        Some(embedding)
    }

    /// Multi-strategy search.
    ///
    /// Returns at most `top_k` results, sorted by score descending, each at
    /// least `min_similarity`, with no API repeated. Fails only on invalid
    /// arguments.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult<'_>>> {
        self.search_with(
            query,
            &SearchOptions {
                top_k,
                min_similarity,
            },
        )
    }

    pub fn search_with(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult<'_>>> {
        options.validate()?;

        let documents = self.store.documents();
        if documents.is_empty() {
            warn!("No API docs loaded, call load() first");
            return Ok(Vec::new());
        }

        let top_k = options.top_k;

        // over-fetch semantic hits so they survive deduplication
        let semantic = match self.embed_query(query) {
            Some(query_embedding) => {
                semantic_search(documents, &query_embedding, top_k.saturating_mul(2))
            }
            None => Vec::new(),
        };
        let keyword = keyword_search(documents, query, top_k);
        let context = context_search(documents, query, top_k);

        Ok(fuse(
            semantic.into_iter().chain(keyword).chain(context),
            top_k,
            options.min_similarity,
        ))
    }

    /// Description-based entry point with top_k = 10, min_similarity = 0.2
    pub fn search_by_description(&self, description: &str) -> Result<Vec<&DocumentEntry>> {
        let results = self.search_with(description, &SearchOptions::for_description())?;
        Ok(results.into_iter().map(|r| r.document).collect())
    }

    /// Exact API lookup by name
    pub fn get_api_by_name(&self, api_name: &str) -> Option<&DocumentEntry> {
        self.store.get(api_name)
    }

    /// All APIs of one library, in load order
    pub fn get_apis_by_library(&self, library: &str) -> Vec<&DocumentEntry> {
        self.store.by_library(library)
    }

    /// Resolved related APIs; unknown names are dropped
    pub fn get_related_apis(&self, api_name: &str) -> Vec<&DocumentEntry> {
        self.store.related(api_name)
    }

    pub fn statistics(&self) -> KnowledgeStats {
        let mut libraries = BTreeMap::new();
        for doc in self.store.documents() {
            *libraries.entry(doc.library.clone()).or_insert(0) += 1;
        }

        KnowledgeStats {
            total_apis: self.store.len(),
            libraries,
            embedded_apis: self
                .store
                .documents()
                .iter()
                .filter(|d| d.embedding.is_some())
                .count(),
            embedding_model_loaded: self.provider.is_available(),
            cache_size: self.cache.len(),
        }
    }

    /// Duplicate names from the last load and unresolved related references
    pub fn integrity_issues(&self) -> Vec<IntegrityIssue> {
        let mut issues: Vec<IntegrityIssue> = self
            .store
            .load_stats()
            .duplicates
            .iter()
            .map(|name| IntegrityIssue::DuplicateName(name.clone()))
            .collect();

        for doc in self.store.documents() {
            for related in &doc.related_apis {
                if self.store.get(related).is_none() {
                    issues.push(IntegrityIssue::BrokenRelated {
                        api: doc.api_name.clone(),
                        missing: related.clone(),
                    });
                }
            }
        }
        issues
    }
}

/// Corpus consistency problem reported by `validate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    DuplicateName(String),
    BrokenRelated { api: String, missing: String },
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityIssue::DuplicateName(name) => {
                write!(f, "[DUPLICATE] '{}' defined more than once", name)
            }
            IntegrityIssue::BrokenRelated { api, missing } => {
                write!(f, "[RELATED] '{}' references unknown API '{}'", api, missing)
            }
        }
    }
}
