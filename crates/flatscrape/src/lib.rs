// Copyright 2026 Flatscrape Contributors
// SPDX-License-Identifier: Apache-2.0

//! Flatscrape: configuration-driven extraction of listing pages.
//!
//! A `scrapers.json` file describes, per site, which selector yields which
//! field. The engine fetches a page (headless browser first, plain HTTP when
//! no browser starts), resolves every selector and normalizes the values into
//! a flat record keyed by field name.

pub mod canonical;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod record;
pub mod renderer;
pub mod rest;
pub mod selector;

pub use canonical::canonicalize;
pub use config::{DomainScraperConfig, EngineSettings, ScraperRegistry, SelectorKind, SelectorSpec};
pub use error::{ScrapeError, ScrapeResult};
pub use extract::{extract_fields, ExtractedRecord, Extraction, Extractor};
pub use fetch::{FetchResult, PageFetcher, Provenance, RenderAvailability};
pub use normalize::FieldValue;
