// Copyright 2026 Flatscrape Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API for the extraction engine.
//!
//! Exposes extraction, canonicalization and the configured domains. Session
//! handling and writing into the record store belong to the calling service.

use crate::canonical::{canonicalize, validate_canonical};
use crate::config::ScraperRegistry;
use crate::error::ScrapeError;
use crate::extract::{ExtractedRecord, Extractor};
use crate::record::map_to_store_fields;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

/// State shared by all handlers.
pub struct AppState {
    pub extractor: Extractor,
    pub registry: RwLock<ScraperRegistry>,
}

impl AppState {
    pub fn new(extractor: Extractor, registry: ScraperRegistry) -> Self {
        Self {
            extractor,
            registry: RwLock::new(registry),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
    /// Identity recorded in the `found_by` store field.
    #[serde(default)]
    pub found_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CanonicalizeRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExtractedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_fields: Option<Map<String, Value>>,
}

/// A `ScrapeError` rendered as a JSON failure body.
pub struct ApiError(ScrapeError);

impl From<ScrapeError> for ApiError {
    fn from(e: ScrapeError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ScrapeResponse {
            success: false,
            message: format!("Scraping failed: {}", self.0),
            kind: Some(self.0.kind()),
            canonical_url: None,
            data: None,
            store_fields: None,
        };
        (status, Json(body)).into_response()
    }
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/domains", get(handle_domains))
        .route("/api/v1/reload", post(handle_reload))
        .route("/api/v1/canonicalize", post(handle_canonicalize))
        .route("/api/v1/scrape", post(handle_scrape))
        .layer(cors)
        .with_state(state)
}

/// Start the REST API server on the given address.
pub async fn start(addr: std::net::SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    tracing::info!("REST API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "render": state.extractor.fetcher().availability(),
    }))
}

async fn handle_domains(State(state): State<Arc<AppState>>) -> Json<Value> {
    let registry = state.registry.read().await;
    let domains: Vec<&str> = registry.domains().collect();
    Json(json!({ "domains": domains }))
}

async fn handle_reload(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let mut registry = state.registry.write().await;
    registry.reload()?;
    Ok(Json(json!({ "domains": registry.len() })))
}

async fn handle_canonicalize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CanonicalizeRequest>,
) -> Result<Json<Value>, ApiError> {
    let registry = state.registry.read().await;
    let config = registry.for_url(&req.url)?;
    let canonical_url = canonicalize(&req.url, config.url_cleaning.as_ref());
    validate_canonical(&canonical_url)?;
    Ok(Json(json!({ "canonical_url": canonical_url })))
}

async fn handle_scrape(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    let config = state.registry.read().await.for_url(&req.url)?.clone();

    let canonical_url = canonicalize(&req.url, config.url_cleaning.as_ref());
    validate_canonical(&canonical_url)?;

    let extraction = state.extractor.extract(&req.url, &config).await?;
    let store_fields = map_to_store_fields(
        &extraction.record,
        &extraction.canonical_url,
        &config.store_field_map,
        req.found_by.as_deref(),
    );

    let missing = extraction.missing_fields();
    let message = if missing.is_empty() {
        "Data successfully scraped".to_string()
    } else {
        format!("Data scraped; missing fields: {}", missing.join(", "))
    };
    let (record, canonical_url) = extraction.into_parts();

    Ok(Json(ScrapeResponse {
        success: true,
        message,
        kind: None,
        canonical_url: Some(canonical_url),
        data: Some(record),
        store_fields: Some(store_fields),
    }))
}
