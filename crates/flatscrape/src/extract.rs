//! Extraction orchestrator.
//!
//! canonicalize URL → fetch page → parse → resolve and normalize every
//! configured field. The whole call fails only when the page cannot be
//! obtained; a field whose selector misses or breaks is recorded as null.

use crate::canonical::canonicalize;
use crate::config::{DomainScraperConfig, ScraperRegistry};
use crate::error::{ScrapeError, ScrapeResult};
use crate::fetch::{PageFetcher, Provenance};
use crate::normalize::{normalize_field, FieldValue};
use crate::selector::resolve;
use chrono::{DateTime, Utc};
use scraper::Html;
use serde::Serialize;
use std::collections::BTreeMap;

/// Field name → value. `None` means the selector matched nothing usable.
pub type ExtractedRecord = BTreeMap<String, Option<FieldValue>>;

/// Result of one extraction.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    /// Cleaned URL to use for duplicate detection and storage.
    pub canonical_url: String,
    #[serde(rename = "data")]
    pub record: ExtractedRecord,
    #[serde(skip)]
    pub final_url: String,
    #[serde(skip)]
    pub provenance: Provenance,
    pub extracted_at: DateTime<Utc>,
}

impl Extraction {
    pub fn into_parts(self) -> (ExtractedRecord, String) {
        (self.record, self.canonical_url)
    }

    /// Fields that resolved to null.
    pub fn missing_fields(&self) -> Vec<&str> {
        self.record
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// Resolve every configured field against an HTML document.
///
/// Every key of `config.selectors` is present in the result.
pub fn extract_fields(html: &str, config: &DomainScraperConfig) -> ExtractedRecord {
    let document = Html::parse_document(html);

    config
        .selectors
        .iter()
        .fold(ExtractedRecord::new(), |mut record, (field, spec)| {
            tracing::debug!("extracting {field} with {:?} '{}'", spec.kind, spec.value);
            let value = resolve(&document, spec).and_then(|raw| normalize_field(field, &raw));
            if value.is_none() {
                tracing::warn!("could not extract {field}");
            }
            record.insert(field.clone(), value);
            record
        })
}

/// Runs extractions through a shared [`PageFetcher`].
pub struct Extractor {
    fetcher: PageFetcher,
}

impl Extractor {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }

    /// Extract `raw_url` with an already resolved domain configuration.
    ///
    /// The page is fetched at `raw_url`; the canonical URL is returned for
    /// the caller's bookkeeping and may not be fetchable itself.
    pub async fn extract(
        &self,
        raw_url: &str,
        config: &DomainScraperConfig,
    ) -> ScrapeResult<Extraction> {
        tracing::info!("scraping URL: {raw_url}");

        let canonical_url = canonicalize(raw_url, config.url_cleaning.as_ref());
        let page = self.fetcher.fetch(raw_url).await.map_err(|e| {
            tracing::error!("error scraping {raw_url}: {e}");
            e
        })?;

        if page.html.trim().is_empty() {
            return Err(ScrapeError::EmptyDocument {
                url: raw_url.to_string(),
            });
        }

        let record = extract_fields(&page.html, config);
        tracing::info!(
            "extracted {} field(s) from {raw_url} via {:?}: {:?}",
            record.len(),
            page.provenance,
            record.keys().collect::<Vec<_>>()
        );

        Ok(Extraction {
            canonical_url,
            record,
            final_url: page.final_url,
            provenance: page.provenance,
            extracted_at: Utc::now(),
        })
    }

    /// Look up the domain configuration for `raw_url`, then extract.
    pub async fn extract_url(
        &self,
        raw_url: &str,
        registry: &ScraperRegistry,
    ) -> ScrapeResult<Extraction> {
        let config = registry.for_url(raw_url)?;
        self.extract(raw_url, config).await
    }

    pub async fn shutdown(&self) {
        self.fetcher.shutdown().await;
    }
}
