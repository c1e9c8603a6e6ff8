//! vault-qa service entry point.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use vault_qa::application::IndexRequest;
use vault_qa::infrastructure::http::HttpServer;
use vault_qa::{Config, ServiceContainer};

#[derive(Parser)]
#[command(name = "vault-qa")]
#[command(about = "Question answering over Markdown note vaults")]
struct Cli {
    /// Configuration file path (TOML); environment variables are used when
    /// absent
    #[arg(long)]
    config: Option<String>,

    /// HTTP server port override
    #[arg(long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable structured JSON logging
    #[arg(long)]
    structured_logs: bool,

    /// Run a bulk index and exit instead of serving
    #[arg(long)]
    index: bool,

    /// With --index: clear all notes and chunks first
    #[arg(long)]
    force: bool,

    /// Print example environment variables and exit
    #[arg(long)]
    env_example: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.env_example {
        println!("{}", Config::env_example());
        return Ok(());
    }

    init_logging(&cli.log_level, cli.structured_logs);

    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path, "loading configuration file");
            Config::from_file(path)?
        }
        None => {
            info!("loading configuration from environment");
            Config::from_env()
        }
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    let server_config = config.server.clone();
    let container = match ServiceContainer::new(config).await {
        Ok(container) => Arc::new(container),
        Err(e) => {
            error!(error = %e, "service startup failed");
            return Err(e.into());
        }
    };

    if cli.index {
        let cancel = CancellationToken::new();
        let response = container
            .index(IndexRequest { force: cli.force }, &cancel)
            .await?;
        info!(
            status = %response.status,
            files = response.summary.files,
            successes = response.summary.successes,
            errors = response.summary.errors.len(),
            chunks = response.summary.chunks_indexed,
            skipped = response.summary.chunks_skipped,
            elapsed_ms = response.summary.elapsed_ms,
            "index run finished"
        );
        for failure in &response.summary.errors {
            error!(failure = %failure, "file failed to index");
        }
        return Ok(());
    }

    let server = HttpServer::new(server_config, container);
    server.start().await?;
    info!("vault-qa service stopped");
    Ok(())
}

/// Initialize logging and tracing based on CLI flags.
fn init_logging(log_level: &str, structured: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "vault_qa={},vaultqa_search=info,tower_http=info",
            log_level
        ))
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    if structured {
        subscriber
            .with(fmt::layer().json().with_target(false))
            .init();
    } else {
        subscriber.with(fmt::layer().with_target(false)).init();
    }
}
