use anyhow::Result;
use colored::*;

use apidoc_rag::KnowledgePaths;

use super::open_loaded;

pub fn run(paths: &KnowledgePaths, json: bool) -> Result<()> {
    let kb = open_loaded(paths);
    let stats = kb.statistics();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "Knowledge Base Status".bold());
    println!("{}", "=".repeat(60));
    println!();
    println!("  {} {} APIs", "→".dimmed(), stats.total_apis.to_string().cyan());
    println!(
        "  {} {} with embeddings",
        "→".dimmed(),
        stats.embedded_apis.to_string().cyan()
    );
    println!(
        "  {} {} cached embeddings",
        "→".dimmed(),
        stats.cache_size.to_string().cyan()
    );
    println!(
        "  {} Embedding model: {}",
        "→".dimmed(),
        if stats.embedding_model_loaded {
            "loaded".green()
        } else {
            "unavailable".red()
        }
    );

    if !stats.libraries.is_empty() {
        println!();
        println!("{}", "Libraries:".bold());
        for (library, count) in &stats.libraries {
            let name = if library.is_empty() { "(untagged)" } else { library.as_str() };
            println!("  {:<24} {}", name, count);
        }
    }

    Ok(())
}
