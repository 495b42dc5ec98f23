// Amani - Crisis-aware support service
// Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

use amani::config::{load_config, Config};
use amani::errors::UserFriendlyError;
use amani::pipeline::SupportPipeline;
use amani::server::SupportServer;

#[derive(Parser, Debug)]
#[command(name = "amani")]
#[command(about = "Crisis detection, classification and escalation for support chat", version)]
struct Args {
    /// Config file (default: ~/.amani/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Bind address (overrides server.bind_address)
        #[arg(long)]
        bind: Option<String>,
        /// Also append logs to ~/.amani/amani.log
        #[arg(long)]
        log_file: bool,
    },
    /// Classify a single message and print the reply
    Classify {
        /// Message text
        message: String,
    },
    /// Search the resource catalog
    Resources {
        /// Search text
        query: String,
        /// Maximum results
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = matches!(args.command, Command::Serve { log_file: true, .. });
    init_tracing(log_file)?;

    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Serve { bind, .. } => {
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            run_serve(config).await
        }
        Command::Classify { message } => run_classify(config, &message).await,
        Command::Resources { query, limit } => run_resources(config, &query, limit),
    }
}

/// Stderr logging, plus the log file when requested
fn init_tracing(log_file: bool) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let file_layer = if log_file {
        let dir = Config::amani_dir().context("Failed to determine home directory")?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let log_path = dir.join("amani.log");

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;
        eprintln!("Logs: {}", log_path.display());

        let file_writer = Arc::new(file);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(move || file_writer.clone())
                .with_ansi(false),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

async fn run_serve(config: Config) -> Result<()> {
    tracing::info!("Starting Amani in server mode");

    let server_config = config.server.clone();
    let pipeline = Arc::new(
        SupportPipeline::builder(config)
            .build()
            .user_context_with_suggestion(
                "Failed to start the support pipeline",
                "Check the [audit] and [resources] paths in ~/.amani/config.toml",
            )?,
    );
    let server = SupportServer::new(Arc::clone(&pipeline), server_config);

    server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    pipeline.shutdown().await;
    Ok(())
}

async fn run_classify(config: Config, message: &str) -> Result<()> {
    let pipeline = SupportPipeline::builder(config).build()?;
    let session_id = uuid::Uuid::new_v4().to_string();

    let reply = pipeline.process_message("cli", &session_id, message).await;
    pipeline.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

fn run_resources(config: Config, query: &str, limit: usize) -> Result<()> {
    let catalog = amani::resources::load_catalog(config.resources.catalog_path.as_deref())
        .user_context("Failed to load the resource catalog")?;
    let matcher = amani::resources::ResourceMatcher::with_resources(catalog);

    let results = matcher.search_resources(query, limit);
    if results.is_empty() {
        println!("No resources matched \"{}\"", query);
        return Ok(());
    }

    for scored in results {
        let resource = &scored.resource;
        println!("{} [{}] (score {})", resource.title, resource.category, scored.score);
        println!("  {}", resource.description);
        if let Some(phone) = &resource.phone {
            println!("  Phone: {}", phone);
        }
        if let Some(url) = &resource.url {
            println!("  {}", url);
        }
    }

    Ok(())
}
