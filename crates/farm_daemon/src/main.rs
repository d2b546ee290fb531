use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use farm_coord::{MemoryStore, RoundCoordinator};

mod routes;
mod state;
mod sweep;

#[derive(Parser)]
#[command(name = "farm_daemon", about = "Farming simulation daemon")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,
    /// Load content tables from a JSON directory instead of the built-ins.
    #[arg(long)]
    content_dir: Option<String>,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
    /// Deadline sweep period in seconds.
    #[arg(long, default_value_t = 5)]
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let content = match &cli.content_dir {
        Some(dir) => farm_content::load_content(dir)
            .with_context(|| format!("loading content from {dir}"))?,
        None => farm_content::standard_content(),
    };
    tracing::info!(
        content_version = %content.content_version,
        "content tables loaded"
    );

    let coordinator = Arc::new(RoundCoordinator::new(MemoryStore::new(), content));
    let (round_tx, _) = tokio::sync::broadcast::channel(64);
    let app_state = state::AppState {
        coordinator: Arc::clone(&coordinator),
        round_tx: round_tx.clone(),
    };

    tokio::spawn(sweep::run_deadline_sweep(
        coordinator,
        round_tx,
        cli.sweep_interval_secs,
    ));

    let router = routes::make_router_with_cors(app_state, &cli.cors_origin);
    let listener = tokio::net::TcpListener::bind(&cli.addr)
        .await
        .with_context(|| format!("binding {}", cli.addr))?;
    tracing::info!("listening on {}", cli.addr);
    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}
