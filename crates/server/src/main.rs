//! taximoto-sw host entry point.
//!
//! Opens the cache storage, registers the worker, runs the install event
//! and serves the worker's tools over MCP stdio. Logging goes to stderr to
//! avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use taximoto_client::{FetchConfig, HttpFetcher, Scope, ServiceWorker};
use taximoto_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;

    let storage = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache storage at {}", config.db_path.display()))?;
    let fetcher = HttpFetcher::new(FetchConfig::from(&config))?;
    let scope = Scope::new(&config.origin, &config.scope)?;
    let worker = ServiceWorker::new(storage, Arc::new(fetcher), scope).with_install_max_bytes(config.max_bytes);

    if config.install_on_start {
        match worker.on_install().await {
            Ok(_) => worker.activate().await?,
            Err(e) => tracing::warn!(error = %e, "install failed; requests bypass the cache until sw_install succeeds"),
        }
    }

    tracing::info!(origin = %config.origin, scope = %config.scope, "Starting taximoto-sw on stdio transport");

    let handler = handler::TaximotoServer::new(worker);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
