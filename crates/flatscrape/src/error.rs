//! Error taxonomy for the extraction engine.
//!
//! Only whole-page failures are represented here. Per-field problems never
//! become errors; they degrade to a null field value inside the record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The retrieval tier that produced a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchTier {
    /// Headless browser rendering (primary or secondary engine).
    Render,
    /// Direct HTTP GET without script execution.
    Plain,
}

impl fmt::Display for FetchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchTier::Render => write!(f, "render"),
            FetchTier::Plain => write!(f, "plain-fetch"),
        }
    }
}

/// All errors that abort an extraction.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("No scraper configuration found for domain: {domain}")]
    ConfigurationMissing { domain: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch failed ({tier}){}: {cause}", status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    FetchFailed {
        tier: FetchTier,
        status: Option<u16>,
        cause: String,
    },

    /// The plain-fetch tier was refused with 401/403. Rendering is required
    /// for this site and is not available, so there is nothing to retry.
    #[error("Website requires browser authentication ({status}) - a real browser is required for {url}")]
    AuthRequired { url: String, status: u16 },

    #[error("Fetched document for {url} is empty")]
    EmptyDocument { url: String },

    #[error("Configuration load error: {0}")]
    ConfigLoad(String),
}

impl ScrapeError {
    /// HTTP status the surrounding API should answer with for this failure.
    pub fn http_status(&self) -> u16 {
        match self {
            ScrapeError::ConfigurationMissing { .. } | ScrapeError::InvalidUrl(_) => 400,
            ScrapeError::FetchFailed { .. }
            | ScrapeError::AuthRequired { .. }
            | ScrapeError::EmptyDocument { .. } => 502,
            ScrapeError::ConfigLoad(_) => 500,
        }
    }

    /// Short machine-readable kind, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::ConfigurationMissing { .. } => "configuration_missing",
            ScrapeError::InvalidUrl(_) => "invalid_url",
            ScrapeError::FetchFailed { .. } => "fetch_failed",
            ScrapeError::AuthRequired { .. } => "auth_required",
            ScrapeError::EmptyDocument { .. } => "empty_document",
            ScrapeError::ConfigLoad(_) => "config_load",
        }
    }
}

impl From<std::io::Error> for ScrapeError {
    fn from(e: std::io::Error) -> Self {
        ScrapeError::ConfigLoad(e.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(e: serde_json::Error) -> Self {
        ScrapeError::ConfigLoad(e.to_string())
    }
}

/// Convenience result type.
pub type ScrapeResult<T> = Result<T, ScrapeError>;
