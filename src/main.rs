mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use recall::config::RecallConfig;

#[derive(Parser)]
#[command(name = "recall", version, about = "Semantic memory for videos you've watched")]
struct Cli {
    /// Config file (default: ~/.recall/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a summarized video as a memory
    Add {
        #[arg(long)]
        user: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        summary: String,
        #[arg(long)]
        url: String,
    },
    /// Find memories matching a vague description
    Search {
        #[arg(long)]
        user: String,
        /// Number of results (default from config)
        #[arg(short, long)]
        k: Option<usize>,
        /// What you remember about the video
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Delete all memories for a user
    Clear {
        #[arg(long)]
        user: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Add demo videos with random fingerprints
    Seed {
        #[arg(long)]
        user: String,
    },
    /// Import a JSON array of {title, summary, url} entries
    Import {
        #[arg(long)]
        user: String,
        file: PathBuf,
        /// Clear the user's memory before importing
        #[arg(long)]
        replace: bool,
    },
    /// Show memory counts for a user
    Stats {
        #[arg(long)]
        user: String,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.recall/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RecallConfig::load_from(path)?,
        None => RecallConfig::load()?,
    };

    // Log to stderr so stdout stays clean for command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Add {
            user,
            title,
            summary,
            url,
        } => cli::add::add(&config, &user, &title, &summary, &url).await?,
        Command::Search { user, k, query } => {
            cli::search::search(&config, &user, &query.join(" "), k).await?
        }
        Command::Clear { user, yes } => cli::clear::clear(&config, &user, yes)?,
        Command::Seed { user } => cli::seed::seed(&config, &user)?,
        Command::Import {
            user,
            file,
            replace,
        } => cli::import::import(&config, &user, &file, replace).await?,
        Command::Stats { user } => cli::stats::stats(&config, &user)?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
    }

    Ok(())
}
