//! dougcast-sw entry point.
//!
//! Boots the offline worker on a stdio transport. Logging goes to stderr to
//! avoid interfering with the reply stream on stdout.

use anyhow::Result;
use dougcast_client::{FetchConfig, HttpFetcher};
use dougcast_core::{AppConfig, CacheDb, Manifest};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

mod error;
mod events;
mod handler;
mod lifecycle;
mod notify;
mod transport;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let scope = config.scope_url()?;
    let manifest = Manifest::builtin();

    tracing::info!(
        scope = %scope,
        db = %config.db_path.display(),
        generation = %manifest.cache_name,
        "starting dougcast-sw on stdio transport"
    );

    let storage = Arc::new(CacheDb::open(&config.db_path).await?);
    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from(&config))?);
    let worker = handler::ServiceWorker::new(fetcher, storage, manifest, scope)?;

    transport::serve(worker, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
