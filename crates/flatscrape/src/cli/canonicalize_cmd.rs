//! `flatscrape canonicalize <url>`: print the canonical form of a URL.

use crate::canonical::{canonicalize, validate_canonical};
use crate::config::ScraperRegistry;
use anyhow::Result;
use serde_json::json;

use super::engine_settings;

pub async fn run(url: &str, data_dir: Option<&str>, as_json: bool) -> Result<()> {
    let settings = engine_settings(data_dir, true);
    let registry = ScraperRegistry::load(&settings.data_dir)?;
    let config = registry.for_url(url)?;

    let canonical = canonicalize(url, config.url_cleaning.as_ref());
    validate_canonical(&canonical)?;

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "url": url, "canonical_url": canonical }))?
        );
    } else {
        println!("{canonical}");
    }
    Ok(())
}
