//! Document Store - loads the JSON corpus into memory

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::document::{parse_documents, DocumentEntry};
use crate::error::KbError;

/// One load cycle worth of documents.
///
/// Built off to the side and swapped into the store whole, so readers never
/// observe a partially loaded corpus.
#[derive(Debug, Default)]
pub struct Corpus {
    documents: Vec<DocumentEntry>,
    by_name: HashMap<String, usize>,
    pub stats: CorpusLoadStats,
}

/// Counters collected while walking the corpus directory
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CorpusLoadStats {
    pub files: usize,
    pub failed_files: usize,
    pub skipped_documents: usize,
    pub duplicates: Vec<String>,
}

impl Corpus {
    /// Walk `dir` recursively and decode every `*.json` file.
    ///
    /// Files are visited in sorted path order. Malformed files and entries
    /// are logged and skipped. A duplicate `api_name` keeps the first entry.
    pub fn load(dir: &Path) -> Self {
        let mut corpus = Self::default();

        if !dir.exists() {
            warn!(path = %dir.display(), "Knowledge base directory not found");
            return corpus;
        }

        let files = WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable path: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension().map(|e| e == "json").unwrap_or(false));

        for entry in files {
            let path = entry.path();
            corpus.stats.files += 1;

            let value = match read_json(path) {
                Ok(value) => value,
                Err(e) => {
                    error!("Failed to load {}: {}", path.display(), e);
                    corpus.stats.failed_files += 1;
                    continue;
                }
            };

            for (i, parsed) in parse_documents(value).into_iter().enumerate() {
                match parsed {
                    Ok(doc) => corpus.push(doc, path),
                    Err(e) => {
                        error!("Failed to load entry {} of {}: {}", i, path.display(), e);
                        corpus.stats.skipped_documents += 1;
                    }
                }
            }
        }

        info!("Loaded {} API documents", corpus.documents.len());
        corpus
    }

    /// Build a corpus from already-decoded documents (first occurrence wins)
    pub fn from_documents(documents: impl IntoIterator<Item = DocumentEntry>) -> Self {
        let mut corpus = Self::default();
        for doc in documents {
            corpus.push(doc, Path::new("<memory>"));
        }
        corpus
    }

    fn push(&mut self, doc: DocumentEntry, source: &Path) {
        if self.by_name.contains_key(&doc.api_name) {
            warn!(
                api = %doc.api_name,
                file = %source.display(),
                "Duplicate API name, keeping the first loaded entry"
            );
            self.stats.duplicates.push(doc.api_name);
            return;
        }
        debug!(api = %doc.api_name, "Loaded document");
        self.by_name.insert(doc.api_name.clone(), self.documents.len());
        self.documents.push(doc);
    }

    pub fn documents(&self) -> &[DocumentEntry] {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> &mut [DocumentEntry] {
        &mut self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value, KbError> {
    let content = fs::read_to_string(path).map_err(|source| KbError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| KbError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// In-memory owner of the current corpus snapshot
#[derive(Debug, Default)]
pub struct DocumentStore {
    source: Option<PathBuf>,
    corpus: Corpus,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot with `corpus`
    pub fn replace(&mut self, corpus: Corpus, source: Option<PathBuf>) {
        self.corpus = corpus;
        self.source = source;
    }

    /// Directory the current snapshot was loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn documents(&self) -> &[DocumentEntry] {
        self.corpus.documents()
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    /// Exact lookup by identifier
    pub fn get(&self, api_name: &str) -> Option<&DocumentEntry> {
        self.corpus
            .by_name
            .get(api_name)
            .map(|&idx| &self.corpus.documents[idx])
    }

    /// All documents tagged with `library`, in load order
    pub fn by_library(&self, library: &str) -> Vec<&DocumentEntry> {
        self.corpus
            .documents
            .iter()
            .filter(|doc| doc.library == library)
            .collect()
    }

    /// Resolve a document's related identifiers, dropping broken references
    pub fn related(&self, api_name: &str) -> Vec<&DocumentEntry> {
        let Some(doc) = self.get(api_name) else {
            return Vec::new();
        };
        doc.related_apis
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    pub fn load_stats(&self) -> &CorpusLoadStats {
        &self.corpus.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    fn write(dir: &Path, rel: &str, value: &serde_json::Value) -> Result<()> {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    #[test]
    fn test_load_recursive_single_and_array() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        write(tmp.path(), "qiskit/sampler.json", &json!({"api_name": "Sampler.run", "library": "qiskit"}))?;
        write(
            tmp.path(),
            "cirq/ops.json",
            &json!([
                {"api_name": "cirq.H", "library": "cirq"},
                {"api_name": "cirq.CNOT", "library": "cirq"}
            ]),
        )?;
        fs::write(tmp.path().join("README.md"), "not a corpus file")?;

        let corpus = Corpus::load(tmp.path());
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.stats.files, 2);
        // sorted traversal: cirq/ before qiskit/
        assert_eq!(corpus.documents()[0].api_name, "cirq.H");
        assert_eq!(corpus.documents()[2].api_name, "Sampler.run");
        Ok(())
    }

    #[test]
    fn test_malformed_file_skipped() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        write(tmp.path(), "a.json", &json!({"api_name": "good"}))?;
        fs::write(tmp.path().join("b.json"), "{ not json")?;
        write(tmp.path(), "c.json", &json!([{"api_name": "also_good"}, {"api_name": ["bad"]}]))?;

        let corpus = Corpus::load(tmp.path());
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.stats.failed_files, 1);
        assert_eq!(corpus.stats.skipped_documents, 1);
        Ok(())
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let corpus = Corpus::load(Path::new("/tmp/nonexistent-apidoc-corpus"));
        assert!(corpus.is_empty());
    }

    #[test]
    fn test_duplicate_keeps_first() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        write(tmp.path(), "1.json", &json!({"api_name": "dup", "library": "first"}))?;
        write(tmp.path(), "2.json", &json!({"api_name": "dup", "library": "second"}))?;

        let mut store = DocumentStore::new();
        store.replace(Corpus::load(tmp.path()), Some(tmp.path().to_path_buf()));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("dup").map(|d| d.library.as_str()), Some("first"));
        assert_eq!(store.load_stats().duplicates, vec!["dup".to_string()]);
        Ok(())
    }

    #[test]
    fn test_library_filter_and_related() {
        let corpus = Corpus::from_documents(vec![
            DocumentEntry {
                api_name: "X".to_string(),
                library: "qiskit".to_string(),
                related_apis: vec!["Y".to_string(), "missing".to_string()],
                ..Default::default()
            },
            DocumentEntry {
                api_name: "Z".to_string(),
                library: "cirq".to_string(),
                ..Default::default()
            },
            DocumentEntry {
                api_name: "Y".to_string(),
                library: "qiskit".to_string(),
                ..Default::default()
            },
        ]);
        let mut store = DocumentStore::new();
        store.replace(corpus, None);

        let qiskit: Vec<_> = store.by_library("qiskit").iter().map(|d| d.api_name.as_str()).collect();
        assert_eq!(qiskit, vec!["X", "Y"]);

        let related = store.related("X");
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].api_name, "Y");

        assert!(store.related("nope").is_empty());
        assert!(store.get("nope").is_none());
    }
}
