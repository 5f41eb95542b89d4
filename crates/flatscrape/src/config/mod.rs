//! Per-domain scraper configuration.
//!
//! A `scrapers.json` file maps a lower-cased host to the selectors used for
//! each logical field, an optional URL cleaning rule and an optional mapping
//! of field names onto record-store field ids:
//!
//! ```json
//! {
//!   "flats.example": {
//!     "selectors": { "warm_rent": { "type": "id", "value": "price" } },
//!     "url_cleaning": {
//!       "base_pattern": "https://flats.example/listing/",
//!       "extract_pattern": "/listing/(\\d+)",
//!       "clean_pattern": "https://flats.example/l/{id}"
//!     },
//!     "store_field_map": { "warm_rent": "fld_rent", "url_address": "fld_url" }
//!   }
//! }
//! ```

pub mod settings;

pub use settings::EngineSettings;

use crate::error::{ScrapeError, ScrapeResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// File name of the domain configuration inside the data directory.
pub const SCRAPERS_FILE: &str = "scrapers.json";

/// Addressing scheme of a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SelectorKind {
    /// Element whose `id` attribute equals the selector.
    Id,
    /// First element carrying the class token(s).
    Class,
    /// Standard CSS selector, first match.
    Css,
    /// Simple tag paths only. Degraded to a CSS selector, not evaluated as XPath.
    XPath,
    /// Anything else found in the config file. Always resolves to null.
    Unknown(String),
}

impl From<String> for SelectorKind {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "id" => SelectorKind::Id,
            "class" | "class_name" | "class-name" => SelectorKind::Class,
            "css" => SelectorKind::Css,
            "xpath" => SelectorKind::XPath,
            _ => SelectorKind::Unknown(s),
        }
    }
}

impl From<SelectorKind> for String {
    fn from(kind: SelectorKind) -> Self {
        match kind {
            SelectorKind::Id => "id".to_string(),
            SelectorKind::Class => "class".to_string(),
            SelectorKind::Css => "css".to_string(),
            SelectorKind::XPath => "xpath".to_string(),
            SelectorKind::Unknown(s) => s,
        }
    }
}

/// A selector for one logical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSpec {
    #[serde(rename = "type")]
    pub kind: SelectorKind,
    pub value: String,
}

impl SelectorSpec {
    pub fn new(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Domain-specific rule for rebuilding a canonical listing URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlCleaningRule {
    /// Descriptive only; not used by the canonicalizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_pattern: Option<String>,
    /// Regex with one capture group yielding the listing id.
    pub extract_pattern: String,
    /// Template containing an `{id}` placeholder.
    pub clean_pattern: String,
    #[serde(skip)]
    compiled: OnceLock<Option<Regex>>,
}

impl UrlCleaningRule {
    pub fn new(extract_pattern: impl Into<String>, clean_pattern: impl Into<String>) -> Self {
        Self {
            base_pattern: None,
            extract_pattern: extract_pattern.into(),
            clean_pattern: clean_pattern.into(),
            compiled: OnceLock::new(),
        }
    }

    pub fn with_base_pattern(mut self, base_pattern: impl Into<String>) -> Self {
        self.base_pattern = Some(base_pattern.into());
        self
    }

    /// `extract_pattern`, compiled on first use and kept across clones.
    /// `None` if the pattern is not a valid regex.
    pub fn extract_regex(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| match Regex::new(&self.extract_pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(
                        "invalid url cleaning pattern '{}': {e}",
                        self.extract_pattern
                    );
                    None
                }
            })
            .as_ref()
    }
}

impl PartialEq for UrlCleaningRule {
    fn eq(&self, other: &Self) -> bool {
        self.base_pattern == other.base_pattern
            && self.extract_pattern == other.extract_pattern
            && self.clean_pattern == other.clean_pattern
    }
}

impl Eq for UrlCleaningRule {}

/// Scraper configuration for a single site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainScraperConfig {
    pub selectors: BTreeMap<String, SelectorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_cleaning: Option<UrlCleaningRule>,
    /// Internal field name → record-store field id.
    #[serde(default, alias = "nocodb_field_map")]
    pub store_field_map: BTreeMap<String, String>,
}

/// Lower-cased host of a URL, or `None` if the URL has no host.
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url.trim()).ok()?;
    parsed.host_str().map(|h| h.to_ascii_lowercase())
}

/// All domain configurations, keyed by lower-cased host.
#[derive(Debug, Clone, Default)]
pub struct ScraperRegistry {
    path: Option<PathBuf>,
    domains: BTreeMap<String, DomainScraperConfig>,
}

impl ScraperRegistry {
    /// Load `scrapers.json` from a data directory.
    pub fn load(data_dir: &Path) -> ScrapeResult<Self> {
        let path = data_dir.join(SCRAPERS_FILE);
        let domains = read_domains(&path)?;
        tracing::info!(
            "loaded {} scraper configuration(s) from {}",
            domains.len(),
            path.display()
        );
        Ok(Self {
            path: Some(path),
            domains,
        })
    }

    /// Build a registry from an in-memory JSON document.
    pub fn from_json(json: &str) -> ScrapeResult<Self> {
        let raw: BTreeMap<String, DomainScraperConfig> = serde_json::from_str(json)?;
        Ok(Self {
            path: None,
            domains: lowercase_keys(raw),
        })
    }

    /// Re-read the backing file. A registry built from JSON has nothing to reload.
    pub fn reload(&mut self) -> ScrapeResult<()> {
        if let Some(path) = &self.path {
            self.domains = read_domains(path)?;
        }
        Ok(())
    }

    /// Configuration for a host, case-insensitive.
    pub fn get(&self, domain: &str) -> Option<&DomainScraperConfig> {
        self.domains.get(&domain.to_ascii_lowercase())
    }

    /// Resolve the configuration responsible for a URL.
    pub fn for_url(&self, url: &str) -> ScrapeResult<&DomainScraperConfig> {
        let domain = extract_domain(url)
            .ok_or_else(|| ScrapeError::InvalidUrl(format!("could not extract domain from {url}")))?;
        self.domains
            .get(&domain)
            .ok_or(ScrapeError::ConfigurationMissing { domain })
    }

    /// Configured domains in sorted order.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Path of the backing file, if loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn read_domains(path: &Path) -> ScrapeResult<BTreeMap<String, DomainScraperConfig>> {
    if !path.exists() {
        return Err(ScrapeError::ConfigLoad(format!(
            "configuration file not found: {}",
            path.display()
        )));
    }
    let text = std::fs::read_to_string(path)?;
    let raw: BTreeMap<String, DomainScraperConfig> = serde_json::from_str(&text)
        .map_err(|e| ScrapeError::ConfigLoad(format!("{}: {e}", path.display())))?;
    Ok(lowercase_keys(raw))
}

/// Lower-case the host keys and compile every URL cleaning pattern.
fn lowercase_keys(
    raw: BTreeMap<String, DomainScraperConfig>,
) -> BTreeMap<String, DomainScraperConfig> {
    raw.into_iter()
        .map(|(k, v)| {
            if let Some(rule) = &v.url_cleaning {
                rule.extract_regex();
            }
            (k.to_ascii_lowercase(), v)
        })
        .collect()
}
