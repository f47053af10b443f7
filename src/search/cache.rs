//! Embedding Cache
//!
//! Content-addressed store of text → vector. Keys are the SHA-256 of the
//! exact embedded text, so a document and a query with the same text share
//! one entry. Durable state lives in two companion files inside the cache
//! directory: a SQLite table of vectors and a JSON metadata record.
//!
//! The cache is an optimization only. Any read or write failure is logged
//! and the cache keeps working from memory.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::error::{KbError, Result};

/// Pending insertions that trigger a write to disk
pub const DEFAULT_FLUSH_EVERY: usize = 10;

pub const CACHE_DB_FILE: &str = "embeddings_cache.db";
pub const METADATA_FILE: &str = "cache_metadata.json";
pub const CACHE_SCHEMA_VERSION: &str = "1.0";

/// Companion metadata record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub version: String,
    pub model: Option<String>,
    pub created: Option<String>,
}

impl CacheMetadata {
    fn fresh(model: Option<String>) -> Self {
        Self {
            version: CACHE_SCHEMA_VERSION.to_string(),
            model,
            created: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

struct CacheInner {
    entries: HashMap<String, Vec<f32>>,
    /// Keys inserted since the last successful flush
    pending: HashSet<String>,
    inserts_since_flush: usize,
    metadata: CacheMetadata,
    conn: Option<Connection>,
}

/// Content-addressed embedding cache.
///
/// All state sits behind one lock, so inserts and the periodic flush are
/// serialized per instance.
pub struct EmbeddingCache {
    dir: Option<PathBuf>,
    flush_every: usize,
    inner: Mutex<CacheInner>,
}

/// Cache key for `text`: lowercase hex SHA-256 of its UTF-8 bytes
pub fn cache_key(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(digest)
}

impl EmbeddingCache {
    /// Open the cache stored in `dir`, creating the directory if absent.
    ///
    /// Never fails: unreadable or corrupted state yields an empty cache.
    pub fn open(dir: &Path) -> Self {
        let mut inner = CacheInner {
            entries: HashMap::new(),
            pending: HashSet::new(),
            inserts_since_flush: 0,
            metadata: CacheMetadata::fresh(None),
            conn: None,
        };

        if let Err(e) = fs::create_dir_all(dir) {
            warn!(
                "Failed to create cache directory {}: {}, using in-memory cache",
                dir.display(),
                e
            );
            return Self::from_inner(None, inner);
        }

        inner.metadata = load_metadata(&dir.join(METADATA_FILE));

        let db_path = dir.join(CACHE_DB_FILE);
        match open_db(&db_path).and_then(|conn| load_entries(&conn).map(|entries| (conn, entries)))
        {
            Ok((conn, entries)) => {
                if entries.is_empty() {
                    info!("Created new embedding cache");
                } else {
                    info!("Loaded embedding cache with {} entries", entries.len());
                }
                inner.entries = entries;
                inner.conn = Some(conn);
            }
            Err(e) => {
                warn!("Failed to load cache: {}, creating new cache", e);
                inner.conn = reset_db(&db_path);
            }
        }

        Self::from_inner(Some(dir.to_path_buf()), inner)
    }

    /// Cache with no durable storage
    pub fn in_memory() -> Self {
        Self::from_inner(
            None,
            CacheInner {
                entries: HashMap::new(),
                pending: HashSet::new(),
                inserts_since_flush: 0,
                metadata: CacheMetadata::fresh(None),
                conn: None,
            },
        )
    }

    fn from_inner(dir: Option<PathBuf>, inner: CacheInner) -> Self {
        Self {
            dir,
            flush_every: DEFAULT_FLUSH_EVERY,
            inner: Mutex::new(inner),
        }
    }

    /// Override the batch size of automatic flushes (minimum 1)
    pub fn with_flush_every(mut self, n: usize) -> Self {
        self.flush_every = n.max(1);
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// True when entries are written to disk
    pub fn is_persistent(&self) -> bool {
        self.inner.lock().conn.is_some()
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.inner.lock().entries.get(&cache_key(text)).cloned()
    }

    /// Insert an embedding, flushing once the batch size is reached
    pub fn set(&self, text: &str, embedding: Vec<f32>) {
        let key = cache_key(text);
        let mut inner = self.inner.lock();
        inner.entries.insert(key.clone(), embedding);
        inner.pending.insert(key);
        inner.inserts_since_flush += 1;

        if inner.inserts_since_flush >= self.flush_every {
            self.flush_locked(&mut inner);
        }
    }

    /// Write pending entries and metadata to disk now
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        self.flush_locked(&mut inner);
    }

    fn flush_locked(&self, inner: &mut CacheInner) {
        inner.inserts_since_flush = 0;
        let Some(dir) = &self.dir else {
            inner.pending.clear();
            return;
        };

        match write_pending(inner) {
            Ok(written) => {
                inner.pending.clear();
                debug!(
                    "Saved embedding cache with {} entries ({} new)",
                    inner.entries.len(),
                    written
                );
            }
            Err(e) => error!("Failed to save cache: {}", e),
        }

        if let Err(e) = save_metadata(&dir.join(METADATA_FILE), &inner.metadata) {
            error!("Failed to save cache metadata: {}", e);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn metadata(&self) -> CacheMetadata {
        self.inner.lock().metadata.clone()
    }

    /// Tie the cache to the model producing its vectors.
    ///
    /// Entries recorded under a different model, or under no recorded model
    /// at all, are discarded. Returns `true` when that happened.
    pub fn bind_model(&self, model_id: &str) -> bool {
        let mut inner = self.inner.lock();
        let current = inner.metadata.model.clone();
        match current.as_deref() {
            Some(current) if current == model_id => false,
            None if inner.entries.is_empty() => {
                inner.metadata.model = Some(model_id.to_string());
                false
            }
            None => {
                warn!(
                    model = model_id,
                    "Cache has no recorded model, discarding {} cached entries",
                    inner.entries.len()
                );
                Self::clear_locked(&mut inner);
                inner.metadata = CacheMetadata::fresh(Some(model_id.to_string()));
                drop(inner);
                self.flush();
                true
            }
            Some(current) => {
                warn!(
                    previous = current,
                    model = model_id,
                    "Embedding model changed, discarding {} cached entries",
                    inner.entries.len()
                );
                Self::clear_locked(&mut inner);
                inner.metadata = CacheMetadata::fresh(Some(model_id.to_string()));
                drop(inner);
                self.flush();
                true
            }
        }
    }

    /// Drop every entry, in memory and on disk
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        Self::clear_locked(&mut inner);
        let model = inner.metadata.model.clone();
        inner.metadata = CacheMetadata::fresh(model);
        self.flush_locked(&mut inner);
    }

    fn clear_locked(inner: &mut CacheInner) {
        inner.entries.clear();
        inner.pending.clear();
        inner.inserts_since_flush = 0;
        if let Some(conn) = &inner.conn {
            if let Err(e) = conn.execute("DELETE FROM embeddings", []) {
                error!("Failed to clear cache table: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("dir", &self.dir)
            .field("entries", &self.len())
            .finish()
    }
}

fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            key TEXT PRIMARY KEY,
            dim INTEGER NOT NULL,
            vector BLOB NOT NULL
        );
        "#,
    )?;
    Ok(conn)
}

/// Replace a corrupted database file with an empty one
fn reset_db(path: &Path) -> Option<Connection> {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!(
                "Failed to remove corrupted cache {}: {}, using in-memory cache",
                path.display(),
                e
            );
            return None;
        }
    }
    match open_db(path) {
        Ok(conn) => Some(conn),
        Err(e) => {
            warn!("Failed to recreate cache: {}, using in-memory cache", e);
            None
        }
    }
}

fn load_entries(conn: &Connection) -> Result<HashMap<String, Vec<f32>>> {
    let mut stmt = conn.prepare("SELECT key, dim, vector FROM embeddings")?;
    let rows = stmt.query_map([], |row| {
        let key: String = row.get(0)?;
        let dim: i64 = row.get(1)?;
        let blob: Vec<u8> = row.get(2)?;
        Ok((key, dim, blob))
    })?;

    let mut entries = HashMap::new();
    for row in rows {
        let (key, dim, blob) = row?;
        if blob.len() != (dim.max(0) as usize) * 4 {
            warn!(key = %key, "Skipping cache entry with truncated vector");
            continue;
        }
        entries.insert(key, blob_to_embedding(&blob));
    }
    Ok(entries)
}

fn write_pending(inner: &mut CacheInner) -> Result<usize> {
    let CacheInner {
        entries,
        pending,
        conn,
        ..
    } = inner;
    let Some(conn) = conn else {
        return Ok(0);
    };

    let tx = conn.transaction()?;
    let mut written = 0;
    for key in pending.iter() {
        if let Some(embedding) = entries.get(key) {
            tx.execute(
                r#"
                INSERT INTO embeddings (key, dim, vector)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET dim = excluded.dim, vector = excluded.vector
                "#,
                params![key, embedding.len() as i64, embedding_to_blob(embedding)],
            )?;
            written += 1;
        }
    }
    tx.commit()?;
    Ok(written)
}

fn load_metadata(path: &Path) -> CacheMetadata {
    if !path.exists() {
        return CacheMetadata::fresh(None);
    }
    match fs::read_to_string(path)
        .map_err(|e| KbError::Cache(e.to_string()))
        .and_then(|s| serde_json::from_str(&s).map_err(|e| KbError::Cache(e.to_string())))
    {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("Failed to load cache metadata: {}, starting fresh", e);
            CacheMetadata::fresh(None)
        }
    }
}

fn save_metadata(path: &Path, metadata: &CacheMetadata) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata).map_err(|e| KbError::Cache(e.to_string()))?;
    fs::write(path, json).map_err(|source| KbError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Convert f32 embedding to BLOB
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Convert BLOB to f32 embedding
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
