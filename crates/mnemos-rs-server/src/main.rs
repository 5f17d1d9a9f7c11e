//! Mnemos memory service binary.

use anyhow::{Context, bail};
use clap::Parser;
use log::{debug, info};
use mnemos_rs_config::MnemosConfig;
use mnemos_rs_memory::MemoryService;
use mnemos_rs_server::{AppState, build_embedder, build_store, router, service_config};
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line options for the memory server.
#[derive(Parser)]
#[command(name = "mnemos", version)]
struct Cli {
    /// Optional path to a mnemos.json5 config file, layered above the defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Bind address override
    #[arg(long)]
    host: Option<String>,
    /// Port override
    #[arg(long)]
    port: Option<u16>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> anyhow::Result<MnemosConfig> {
    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let mut options = mnemos_rs_config::LayeredConfigOptions::new(&cwd);
    if let Some(path) = cli.config.as_ref() {
        options = options.with_runtime_path(path);
    }
    let layered = MnemosConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    let mut config = layered.config;
    if let Some(host) = cli.host.clone() {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = cli.log_level.clone() {
        config.server.log_level = level;
    }
    Ok(config)
}

fn init_logging(level: &str) {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_filters(level)
        .parse_default_env()
        .try_init();
}

/// Entry point for the Mnemos memory server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.server.log_level);
    info!(
        "starting memory server (embedding_model={}, store={}, collection={})",
        config.embedding.model, config.vector_store.provider, config.vector_store.collection
    );

    let key_var = &config.embedding.api_key_env;
    let api_key = match std::env::var(key_var) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => bail!("{key_var} is required to run the memory server"),
    };
    let embedder =
        build_embedder(&config, &api_key).context("failed to build embedding provider")?;
    let store = build_store(&config).context("failed to build vector store")?;
    let service = MemoryService::new(service_config(&config), embedder, store)
        .context("failed to build memory service")?;
    service
        .initialize()
        .await
        .context("failed to initialize vector store")?;

    let app = router(AppState::new(
        Arc::new(service),
        config.search.default_top_k,
    ));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("memory server listening (addr={})", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("memory server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
