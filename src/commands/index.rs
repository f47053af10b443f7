//! Index command - precompute document embeddings into the cache

use anyhow::{Context, Result};
use colored::Colorize;

use apidoc_rag::{KnowledgeBase, KnowledgePaths};

/// Run index command
pub fn run(paths: &KnowledgePaths, rebuild: bool, json: bool) -> Result<()> {
    for (dir, _) in paths.required_folders() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let mut kb = KnowledgeBase::open(paths);

    if rebuild {
        kb.cache().clear();
        if !json {
            println!("{} Cleared embedding cache", "→".dimmed());
        }
    }

    if !json {
        println!("{} Loading knowledge base...", "→".dimmed());
    }

    let report = kb.load();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "{} Loaded {} APIs from {} files in {:.2}s",
        "✓".green().bold(),
        report.documents.to_string().cyan(),
        report.files,
        report.duration_ms as f64 / 1000.0
    );
    println!(
        "  {} {} new embeddings, {} from cache",
        "→".dimmed(),
        report.embedded_new,
        report.embedded_cached
    );
    if report.failed_files > 0 || report.skipped_documents > 0 {
        println!(
            "  {} {} files failed, {} entries skipped",
            "✗".red(),
            report.failed_files,
            report.skipped_documents
        );
    }
    if report.duplicates > 0 {
        println!(
            "  {} {} duplicate API names ignored",
            "!".yellow(),
            report.duplicates
        );
    }
    if report.embedding_failures > 0 {
        println!(
            "  {} {} documents without embeddings",
            "✗".red(),
            report.embedding_failures
        );
    }
    if kb.cache().is_persistent() {
        println!(
            "  {} Cache saved to: {}",
            "→".dimmed(),
            paths.cache_dir.display()
        );
        println!(
            "  {} Model: {}",
            "→".dimmed(),
            kb.cache().metadata().model.unwrap_or_else(|| "none".to_string())
        );
    } else {
        println!(
            "  {} Cache is in-memory only, {} is not writable",
            "!".yellow(),
            paths.cache_dir.display()
        );
    }

    Ok(())
}
