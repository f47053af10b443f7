pub mod index;
pub mod library;
pub mod related;
pub mod search;
pub mod show;
pub mod stats;
pub mod validate;

use colored::*;

use apidoc_rag::{DocumentEntry, KnowledgeBase, KnowledgePaths};

/// Open the knowledge base and run one load cycle
pub(crate) fn open_loaded(paths: &KnowledgePaths) -> KnowledgeBase {
    let mut kb = KnowledgeBase::open(paths);
    kb.load();
    kb
}

/// Truncate for display (char-aware for Unicode)
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}

/// One-line listing: name, library, description
pub(crate) fn print_summary(doc: &DocumentEntry) {
    println!("  {} [{}]", doc.api_name.cyan(), doc.library);
    if !doc.description.is_empty() {
        println!("    {}", truncate(&doc.description, 100).dimmed());
    }
}
