//! Search commands - multi-strategy API search

use anyhow::Result;
use colored::Colorize;

use apidoc_rag::{KnowledgePaths, MatchType, SearchResult};

use super::{open_loaded, print_summary, truncate};

/// Run search command
pub fn run(
    paths: &KnowledgePaths,
    query: &str,
    top_k: usize,
    min_similarity: f32,
    json: bool,
) -> Result<()> {
    let kb = open_loaded(paths);
    let results = kb.search(query, top_k, min_similarity)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), query.cyan());
        return Ok(());
    }

    println!(
        "{} {} results for: {}",
        "→".dimmed(),
        results.len(),
        query.cyan()
    );
    println!();

    for (i, result) in results.iter().enumerate() {
        print_result(i, result);
    }

    Ok(())
}

/// Run the description-based entry point
pub fn run_description(paths: &KnowledgePaths, description: &str, json: bool) -> Result<()> {
    let kb = open_loaded(paths);
    let docs = kb.search_by_description(description)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }

    if docs.is_empty() {
        println!("{} No APIs match: {}", "→".dimmed(), description.cyan());
        return Ok(());
    }

    println!("{} {} APIs for: {}", "→".dimmed(), docs.len(), description.cyan());
    println!();
    for doc in docs {
        print_summary(doc);
    }

    Ok(())
}

fn print_result(i: usize, result: &SearchResult<'_>) {
    let score_str = format!("{:.2}", result.score);
    let score_colored = if result.score > 0.8 {
        score_str.green()
    } else if result.score > 0.5 {
        score_str.yellow()
    } else {
        score_str.dimmed()
    };

    let tag = match result.match_type {
        MatchType::Semantic => "semantic".magenta(),
        MatchType::Keyword => "keyword".blue(),
        MatchType::Context => "context".yellow(),
    };

    let doc = result.document;
    println!(
        "{}. [{}] {} ({}, {})",
        (i + 1).to_string().bold(),
        score_colored,
        doc.api_name.cyan(),
        doc.library,
        tag
    );

    if !doc.signature.is_empty() {
        println!("   {}", doc.signature);
    }
    if !doc.description.is_empty() {
        println!("   {}", truncate(&doc.description, 100).dimmed());
    }
    println!();
}
