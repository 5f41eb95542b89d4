//! `flatscrape extract <url>`: run one extraction and print the record.

use crate::config::ScraperRegistry;
use crate::extract::Extractor;
use crate::fetch::PageFetcher;
use crate::record::map_to_store_fields;
use anyhow::Result;
use serde_json::json;

use super::engine_settings;

pub async fn run(
    url: &str,
    data_dir: Option<&str>,
    no_browser: bool,
    store_fields: bool,
    found_by: Option<&str>,
    as_json: bool,
) -> Result<()> {
    let settings = engine_settings(data_dir, no_browser);
    let registry = ScraperRegistry::load(&settings.data_dir)?;
    let config = registry.for_url(url)?.clone();

    let extractor = Extractor::new(PageFetcher::new(settings)?);
    let outcome = extractor.extract(url, &config).await;
    extractor.shutdown().await;
    let extraction = outcome?;

    let payload = store_fields.then(|| {
        map_to_store_fields(
            &extraction.record,
            &extraction.canonical_url,
            &config.store_field_map,
            found_by,
        )
    });

    if as_json {
        let mut out = serde_json::to_value(&extraction)?;
        if let Some(payload) = payload {
            out["store_fields"] = json!(payload);
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Canonical URL: {}", extraction.canonical_url);
    println!("Fetched via:   {:?}", extraction.provenance);
    println!();
    let width = extraction.record.keys().map(|k| k.len()).max().unwrap_or(0);
    for (field, value) in &extraction.record {
        let shown = match value {
            Some(v) => v
                .as_text()
                .map(str::to_string)
                .or_else(|| v.as_number().map(|n| n.to_string()))
                .unwrap_or_default(),
            None => "-".to_string(),
        };
        println!("  {field:<width$}  {shown}");
    }

    let missing = extraction.missing_fields();
    if !missing.is_empty() {
        println!();
        println!("[!!] Missing: {}", missing.join(", "));
    }

    if let Some(payload) = payload {
        println!();
        println!("Store fields:");
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }

    Ok(())
}
