use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use conversation_grader::{
    config::{Config, LogFormat},
    error::AppResult,
    transcript::Transcript,
    tree::TreeNavigator,
    validation::{redact_sensitive, safe_error_message, scan_for_security_issues},
    ConversationGradingSystem, TopicNode,
};

/// Session id used when neither the CLI nor the transcript names one.
const DEFAULT_SESSION_ID: &str = "replay";

/// Grade conversations as hierarchical topic trees.
#[derive(Parser, Debug)]
#[command(name = "conversation-grader", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a transcript file and report the resulting topic tree
    Replay {
        /// Transcript JSON: an array of pairs or {"sessionId", "pairs"}
        file: PathBuf,

        /// Session id (overrides the transcript's)
        #[arg(long)]
        session: Option<String>,

        /// Print the tree, stats and next branch as JSON
        #[arg(long)]
        json: bool,
    },

    /// Screen text for injection patterns and show its redacted form
    Scan {
        /// Text to screen
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "Conversation grader starting...");

    match cli.command {
        Commands::Replay { file, session, json } => {
            if let Err(e) = replay(&config, file, session, json).await {
                error!(error = %safe_error_message(&e), "Replay failed");
                return Err(e.into());
            }
        }
        Commands::Scan { text } => scan(&text),
    }

    Ok(())
}

async fn replay(config: &Config, file: PathBuf, session: Option<String>, json: bool) -> AppResult<()> {
    let transcript = Transcript::from_path(&file)?;
    let session_id = session
        .or(transcript.session_id.clone())
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());
    info!(path = %file.display(), pairs = transcript.len(), session_id = %session_id, "Transcript loaded");

    let mut system = ConversationGradingSystem::from_config(&session_id, config)?;
    let mut skipped = 0usize;
    for (index, pair) in transcript.pairs.into_iter().enumerate() {
        if let Err(e) = system.add_qa_pair(pair, None).await {
            skipped += 1;
            warn!(index, error = %safe_error_message(&e), "Skipping exchange");
        }
    }
    system.validate_integrity()?;

    let stats = system.get_stats();
    let next = system.get_deepest_unvisited_branch();

    if json {
        let report = serde_json::json!({
            "sessionId": session_id,
            "skipped": skipped,
            "tree": system.tree(),
            "stats": stats,
            "deepestUnvisited": next,
        });
        let rendered = serde_json::to_string_pretty(&report).map_err(|e| {
            conversation_grader::AppError::Internal {
                message: format!("Failed to render report: {}", e),
            }
        })?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("Session {}", session_id);
    let nav = system.navigator();
    for root in nav.get_root_nodes() {
        print_outline(&nav, root, 0)?;
    }
    println!();
    println!(
        "{} nodes, {} roots, {} leaves, max depth {}",
        stats.total_nodes, stats.root_nodes, stats.leaf_nodes, stats.max_depth
    );
    if let Some(avg) = stats.average_score {
        println!("average score {:.1} over {} scored nodes", avg, stats.scored_nodes);
    }
    if skipped > 0 {
        println!("{} exchanges skipped", skipped);
    }
    match next {
        Some(node) => println!("explore next: {} (depth {})", node.topic, node.depth),
        None => println!("every branch has been visited"),
    }
    Ok(())
}

fn print_outline(nav: &TreeNavigator<'_>, node: &TopicNode, indent: usize) -> AppResult<()> {
    let score = node
        .score
        .map(|s| format!("{:.1}", s))
        .unwrap_or_else(|| "-".to_string());
    println!("{}- {} [{}]", "  ".repeat(indent), node.topic, score);
    for child in nav.get_children(node.id())? {
        print_outline(nav, child, indent + 1)?;
    }
    Ok(())
}

fn scan(text: &str) {
    let report = scan_for_security_issues(text);
    if report.is_safe() {
        println!("no issues found");
    } else {
        for issue in &report.issues {
            println!("{}: {}", issue.kind, issue.detail);
        }
    }
    println!("redacted: {}", redact_sensitive(text));
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
