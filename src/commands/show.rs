use anyhow::Result;
use colored::*;

use apidoc_rag::{DocumentEntry, KnowledgePaths};

use super::open_loaded;

pub fn run(paths: &KnowledgePaths, api_name: &str, json: bool) -> Result<()> {
    let kb = open_loaded(paths);

    let doc = match kb.get_api_by_name(api_name) {
        Some(doc) => doc,
        None => {
            if json {
                println!("{}", serde_json::json!({ "error": "API not found", "api_name": api_name }));
            } else {
                println!("{}", format!("API '{}' not found.", api_name).red());
            }
            std::process::exit(1);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(doc)?);
    } else {
        print_document(doc);
    }

    Ok(())
}

fn print_document(doc: &DocumentEntry) {
    println!("{} [{}]", doc.api_name.bold().cyan(), doc.library);
    println!("{}", "=".repeat(60));

    if !doc.signature.is_empty() {
        println!("{}", doc.signature);
        println!();
    }
    if !doc.description.is_empty() {
        println!("{}", doc.description);
        println!();
    }

    if !doc.parameters.is_empty() {
        println!("{}", "Parameters:".bold());
        for (name, desc) in &doc.parameters {
            println!("  {} {}", name.green(), desc);
        }
        println!();
    }

    section("Returns", &doc.returns);
    section("Usage context", &doc.usage_context);
    section("Example", &doc.example);
    section("Common pitfalls", &doc.common_pitfalls);

    if !doc.related_apis.is_empty() {
        println!("{} {}", "Related:".bold(), doc.related_apis.join(", "));
    }
}

fn section(title: &str, body: &str) {
    if body.is_empty() {
        return;
    }
    println!("{}", format!("{}:", title).bold());
    for line in body.lines() {
        println!("  {}", line);
    }
    println!();
}
