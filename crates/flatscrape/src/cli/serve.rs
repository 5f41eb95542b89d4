//! `flatscrape serve`: run the REST API.

use crate::config::ScraperRegistry;
use crate::extract::Extractor;
use crate::fetch::PageFetcher;
use crate::rest::{self, AppState};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

use super::engine_settings;

pub async fn run(
    host: &str,
    port: u16,
    data_dir: Option<&str>,
    no_browser: bool,
    warm_up: bool,
) -> Result<()> {
    let settings = engine_settings(data_dir, no_browser);
    let registry = ScraperRegistry::load(&settings.data_dir)?;
    let extractor = Extractor::new(PageFetcher::new(settings)?);

    if warm_up {
        let availability = extractor.fetcher().warm_up().await;
        tracing::info!("render tier: {availability:?}");
    }

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let state = Arc::new(AppState::new(extractor, registry));

    let server = rest::start(addr, state.clone());
    tokio::select! {
        result = server => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    state.extractor.shutdown().await;
    Ok(())
}
