use anyhow::Result;
use colored::*;

use apidoc_rag::KnowledgePaths;

use super::{open_loaded, print_summary};

pub fn run(paths: &KnowledgePaths, api_name: &str, json: bool) -> Result<()> {
    let kb = open_loaded(paths);

    let source = match kb.get_api_by_name(api_name) {
        Some(doc) => doc,
        None => {
            println!("{}", format!("API '{}' not found.", api_name).red());
            std::process::exit(1);
        }
    };

    let related = kb.get_related_apis(api_name);

    if json {
        println!("{}", serde_json::to_string_pretty(&related)?);
        return Ok(());
    }

    println!("{}", "Related APIs".bold());
    println!("{}", "=".repeat(60));
    println!("Source: {}", api_name.cyan());
    println!("Declared: {}", source.related_apis.len());
    println!();

    if related.is_empty() {
        println!("{}", "No related APIs found.".yellow());
        return Ok(());
    }

    for doc in &related {
        print_summary(doc);
    }

    let unresolved = source.related_apis.len() - related.len();
    if unresolved > 0 {
        println!();
        println!(
            "{}",
            format!("... {} references not in the knowledge base", unresolved).dimmed()
        );
    }

    Ok(())
}
