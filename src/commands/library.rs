use anyhow::Result;
use colored::*;

use apidoc_rag::KnowledgePaths;

use super::{open_loaded, print_summary};

pub fn run(paths: &KnowledgePaths, library: &str, json: bool) -> Result<()> {
    let kb = open_loaded(paths);
    let docs = kb.get_apis_by_library(library);

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }

    println!("{}", format!("Library: {}", library).bold());
    println!("{}", "=".repeat(60));

    if docs.is_empty() {
        println!("{}", "No APIs found.".yellow());
        return Ok(());
    }

    println!("Found {} APIs:", docs.len());
    println!();
    for doc in docs {
        print_summary(doc);
    }

    Ok(())
}
