//! canvas-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite record store (running any pending migrations first) and serves the
//! JSON API under `/api`.

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use axum::Router;
use canvas_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::{ServerConfig, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "Canvas record store server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Apply pending migrations and exit without serving.
  #[arg(long)]
  migrate_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg =
    ServerConfig::load(&cli.config).context("failed to load configuration")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  // Opening migrates; a failed migration aborts startup here.
  let store = SqliteStore::open_with(&store_path, &server_cfg.store_options())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if cli.migrate_only {
    let applied = store.applied_migrations().await?;
    for record in &applied {
      tracing::info!(version = record.version, name = %record.name, "migration recorded");
    }
    store.close().await?;
    return Ok(());
  }

  let store = Arc::new(store);
  let app = Router::new()
    .nest("/api", canvas_api::api_router(store.clone()))
    .layer(TraceLayer::new_for_http());

  let address = server_cfg.address();
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // The router (and its clone of the Arc) is gone once serve returns.
  match Arc::try_unwrap(store) {
    Ok(store) => store.close().await?,
    Err(_) => tracing::warn!("store still shared at shutdown; skipping close"),
  }
  tracing::info!("shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutdown requested");
}
