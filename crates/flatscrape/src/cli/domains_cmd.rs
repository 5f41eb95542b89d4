//! `flatscrape domains`: list configured sites.

use crate::config::ScraperRegistry;
use anyhow::Result;

use super::engine_settings;

pub async fn run(data_dir: Option<&str>, as_json: bool) -> Result<()> {
    let settings = engine_settings(data_dir, true);
    let registry = ScraperRegistry::load(&settings.data_dir)?;

    if as_json {
        let domains: Vec<serde_json::Value> = registry
            .domains()
            .filter_map(|d| registry.get(d).map(|c| (d, c)))
            .map(|(domain, config)| {
                serde_json::json!({
                    "domain": domain,
                    "fields": config.selectors.keys().collect::<Vec<_>>(),
                    "url_cleaning": config.url_cleaning.is_some(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&domains)?);
        return Ok(());
    }

    if registry.is_empty() {
        println!("No domains configured.");
        return Ok(());
    }

    for domain in registry.domains() {
        let Some(config) = registry.get(domain) else {
            continue;
        };
        let fields: Vec<&str> = config.selectors.keys().map(String::as_str).collect();
        println!("{domain}  ({} fields: {})", fields.len(), fields.join(", "));
    }
    Ok(())
}
