use std::path::PathBuf;

/// Directory holding the JSON corpus, relative to the root
pub const KNOWLEDGE_BASE_DIR: &str = "knowledge_base";

/// Directory holding the embedding cache files, relative to the root
pub const CACHE_DIR: &str = "embeddings";

pub struct KnowledgePaths {
    pub root: PathBuf,
    pub knowledge_base: PathBuf,
    pub cache_dir: PathBuf,
}

impl KnowledgePaths {
    pub fn new() -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_root(root)
    }

    pub fn from_root(root: PathBuf) -> Self {
        Self {
            knowledge_base: root.join(KNOWLEDGE_BASE_DIR),
            cache_dir: root.join(CACHE_DIR),
            root,
        }
    }

    /// Replace the corpus directory, keeping the rest
    pub fn with_knowledge_base(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.knowledge_base = dir;
        }
        self
    }

    /// Replace the cache directory, keeping the rest
    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.cache_dir = dir;
        }
        self
    }

    pub fn required_folders(&self) -> Vec<(&PathBuf, &str)> {
        vec![
            (&self.knowledge_base, "API documentation corpus (*.json)"),
            (&self.cache_dir, "Embedding cache"),
        ]
    }
}

impl Default for KnowledgePaths {
    fn default() -> Self {
        Self::new()
    }
}
