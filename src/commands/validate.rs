use anyhow::Result;
use colored::*;
use serde::Serialize;

use apidoc_rag::search::IntegrityIssue;
use apidoc_rag::{KnowledgeBase, KnowledgePaths};

#[derive(Serialize)]
struct ValidationResult {
    total_apis: usize,
    failed_files: usize,
    skipped_documents: usize,
    issues: Vec<IntegrityIssue>,
}

pub fn run(paths: &KnowledgePaths, json: bool) -> Result<()> {
    let mut kb = KnowledgeBase::open(paths);
    let report = kb.load();

    let result = ValidationResult {
        total_apis: report.documents,
        failed_files: report.failed_files,
        skipped_documents: report.skipped_documents,
        issues: kb.integrity_issues(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&result);
    }

    if !result.issues.is_empty() || result.failed_files > 0 || result.skipped_documents > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn print_report(result: &ValidationResult) {
    println!("{}", "Knowledge Base Validation Report".bold());
    println!("{}", "=".repeat(60));
    println!();
    println!("Total APIs: {}", result.total_apis);
    println!();

    if result.issues.is_empty() && result.failed_files == 0 && result.skipped_documents == 0 {
        println!("{}", "✓ No violations found!".green());
        return;
    }

    if !result.issues.is_empty() {
        println!("{}", "Violations:".red().bold());
        println!("{}", "-".repeat(60));
        for issue in &result.issues {
            println!("  {} {}", "•".red(), issue);
        }
        println!();
    }

    println!("{}", "Summary:".bold());
    let count = |n: usize| {
        if n > 0 {
            n.to_string().red()
        } else {
            n.to_string().green()
        }
    };
    println!("  Unreadable files: {}", count(result.failed_files));
    println!("  Skipped entries: {}", count(result.skipped_documents));
    println!("  Integrity issues: {}", count(result.issues.len()));
}
