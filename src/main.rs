mod commands;
#[cfg(feature = "mcp")]
mod mcp;

use std::path::PathBuf;

use apidoc_rag::KnowledgePaths;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "apidoc")]
#[command(about = "Quantum API documentation retrieval with semantic, keyword and context search", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, env = "APIDOC_ROOT", help = "Root holding knowledge_base/ and embeddings/")]
    root: Option<PathBuf>,
    #[arg(long, global = true, env = "APIDOC_KB_DIR", help = "Corpus directory (overrides <root>/knowledge_base)")]
    kb_dir: Option<PathBuf>,
    #[arg(long, global = true, env = "APIDOC_CACHE_DIR", help = "Embedding cache directory (overrides <root>/embeddings)")]
    cache_dir: Option<PathBuf>,
    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "More log output (-v, -vv, -vvv)")]
    verbose: u8,
    #[arg(short, long, global = true, help = "No log output")]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Multi-strategy search (semantic + keyword + context)
    Search {
        query: String,
        #[arg(long, short = 'k', default_value_t = 5, help = "Maximum number of results")]
        top_k: usize,
        #[arg(long, short = 'm', default_value_t = 0.3, help = "Minimum score")]
        min_similarity: f32,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Find APIs for a feature description (top 10, min score 0.2)
    Describe {
        description: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show one API by exact name
    Show {
        api_name: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// List APIs of one library
    Library {
        library: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// List the related APIs of one API
    Related {
        api_name: String,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Knowledge base statistics
    Stats {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Load the corpus and precompute embeddings into the cache
    Index {
        #[arg(long, help = "Discard the embedding cache first")]
        rebuild: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Check for duplicate names and broken related references
    Validate {
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== MCP Server =====
    /// Start MCP server for agent integration
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show client configuration instructions")]
        install: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let paths = cli
        .root
        .map(KnowledgePaths::from_root)
        .unwrap_or_default()
        .with_knowledge_base(cli.kb_dir)
        .with_cache_dir(cli.cache_dir);

    match cli.command {
        Commands::Search {
            query,
            top_k,
            min_similarity,
            json,
        } => commands::search::run(&paths, &query, top_k, min_similarity, json),
        Commands::Describe { description, json } => {
            commands::search::run_description(&paths, &description, json)
        }
        Commands::Show { api_name, json } => commands::show::run(&paths, &api_name, json),
        Commands::Library { library, json } => commands::library::run(&paths, &library, json),
        Commands::Related { api_name, json } => commands::related::run(&paths, &api_name, json),
        Commands::Stats { json } => commands::stats::run(&paths, json),
        Commands::Index { rebuild, json } => commands::index::run(&paths, rebuild, json),
        Commands::Validate { json } => commands::validate::run(&paths, json),

        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions(&paths);
                Ok(())
            } else {
                run_mcp_server(paths)
            }
        }
    }
}

/// Logs go to stderr so stdout stays clean for results and the MCP transport
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(feature = "mcp")]
fn run_mcp_server(paths: KnowledgePaths) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(mcp::run_mcp_server(paths))
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions(paths: &KnowledgePaths) {
    use colored::Colorize;

    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "apidoc".to_string());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your MCP client configuration:");
    println!();
    println!(r#"{{
  "mcpServers": {{
    "apidoc": {{
      "command": "{}",
      "args": ["mcp"],
      "env": {{
        "APIDOC_KB_DIR": "{}",
        "APIDOC_CACHE_DIR": "{}"
      }}
    }}
  }}
}}"#, binary_path, paths.knowledge_base.display(), paths.cache_dir.display());
    println!();
    println!("{}", "Available tools:".bold());
    println!("  • {} - Multi-strategy API search", "apidoc_search".green());
    println!("  • {} - Get one API by exact name", "apidoc_get".green());
    println!("  • {} - List APIs of a library", "apidoc_list_library".green());
    println!("  • {} - Related APIs of an API", "apidoc_related".green());
    println!("  • {} - Knowledge base statistics", "apidoc_stats".green());
}
