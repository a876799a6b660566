//! Atelier CLI
//!
//! Command-line client for Atelier - an art-journaling gallery kept in
//! sync with the remote service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use atelier_core::{ArtworkApi, Config, EventBus, HttpArtworkApi, SideStore, SyncEngine};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "atelier")]
#[command(about = "Atelier - art journal gallery, synced with the server")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List artworks
    #[command(alias = "ls")]
    List {
        /// Use the local mirror instead of contacting the server
        #[arg(long)]
        cached: bool,
        /// Filter by tag
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Upload a new artwork
    #[command(alias = "add")]
    Upload {
        /// Artwork title
        title: String,
        /// Image URL or data reference
        image: String,
        /// Description (or pipe it on stdin)
        #[arg(short, long)]
        description: Option<String>,
        /// Tags to attach
        #[arg(short, long)]
        tag: Vec<String>,
        /// Mood recorded with the upload
        #[arg(long)]
        mood: Option<String>,
        /// Rating (1-5)
        #[arg(long)]
        rating: Option<u8>,
        /// Time spent, in minutes
        #[arg(long)]
        duration: Option<u32>,
        /// Name of a multi-part series this belongs to
        #[arg(long)]
        series: Option<String>,
        /// Series id printed by an earlier part's upload
        #[arg(long)]
        series_id: Option<String>,
        /// Position within the series (0-based)
        #[arg(long)]
        part: Option<u32>,
    },
    /// Edit an artwork
    Edit {
        /// Artwork id
        id: i64,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// Replace all tags
        #[arg(short, long)]
        tag: Option<Vec<String>>,
        /// New mood
        #[arg(long)]
        mood: Option<String>,
        /// New rating (1-5)
        #[arg(long)]
        rating: Option<u8>,
        /// New duration, in minutes
        #[arg(long)]
        duration: Option<u32>,
    },
    /// Delete an artwork
    #[command(alias = "rm")]
    Delete {
        /// Artwork id
        id: i64,
    },
    /// Record today's check-in
    Checkin,
    /// Show the upload quota
    Quota,
    /// Show status (server, mirror, last check-in)
    Status,
    /// Force a sync with the server
    Sync,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (api_url, data_dir)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("atelier_core=warn,atelier_cli=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands don't need the engine
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), &output);
    }

    let config = Config::load()?;
    tracing::debug!("using api at {}", config.api_url);

    let mut http = HttpArtworkApi::new(&config.api_url);
    if let Some(ref token) = config.token {
        http = http.with_token(token);
    }
    let api: Arc<dyn ArtworkApi> = Arc::new(http);

    let engine = SyncEngine::new(
        api.clone(),
        SideStore::new(config.data_dir.clone()),
        EventBus::new(),
    );

    match cli.command {
        Commands::List { cached, tag } => {
            commands::list::run(&engine, &output, cached, tag).await
        }
        Commands::Upload {
            title,
            image,
            description,
            tag,
            mood,
            rating,
            duration,
            series,
            series_id,
            part,
        } => {
            let args = commands::upload::UploadArgs {
                title,
                image,
                description,
                tags: tag,
                mood,
                rating,
                duration,
                series,
                series_id,
                part,
            };
            commands::upload::run(&engine, &output, args).await
        }
        Commands::Edit {
            id,
            title,
            description,
            tag,
            mood,
            rating,
            duration,
        } => {
            let args = commands::edit::EditArgs {
                title,
                description,
                tags: tag,
                mood,
                rating,
                duration,
            };
            commands::edit::run(&engine, &output, id, args).await
        }
        Commands::Delete { id } => commands::delete::run(&engine, &output, id).await,
        Commands::Checkin => commands::checkin::run(&engine, &output).await,
        Commands::Quota => commands::quota::run(api.as_ref(), &output).await,
        Commands::Status => commands::status::run(&config, &engine, &output).await,
        Commands::Sync => commands::sync::run(&engine, &output).await,
        Commands::Config { .. } => unreachable!("handled above"),
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command.unwrap_or(ConfigCommands::Show) {
        ConfigCommands::Show => {
            let config = Config::load()?;
            println!("api_url  = {}", config.api_url);
            println!("data_dir = {}", config.data_dir.display());
            println!(
                "token    = {}",
                if config.token.is_some() {
                    "(set)"
                } else {
                    "(unset, use ATELIER_TOKEN)"
                }
            );
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load()?;
            match key.as_str() {
                "api_url" => config.api_url = value,
                "data_dir" => config.data_dir = PathBuf::from(value),
                "token" => {
                    bail!("The token is not stored in the config file. Set ATELIER_TOKEN instead.")
                }
                other => bail!(
                    "Unknown configuration key: {}. Valid keys: api_url, data_dir",
                    other
                ),
            }
            config.save()?;
            output.success(&format!("Set {}", key));
            Ok(())
        }
    }
}
