//! Environment readiness check.

use crate::config::ScraperRegistry;
use crate::renderer::chromium::resolve_browser;
use crate::renderer::LaunchProfile;
use anyhow::Result;

use super::engine_settings;

/// Check browser availability and the domain configuration.
pub async fn run(data_dir: Option<&str>) -> Result<()> {
    println!("Flatscrape Doctor");
    println!("=================");
    println!();

    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let settings = engine_settings(data_dir, false);

    let mut browsers = 0;
    for profile in LaunchProfile::ORDER {
        match resolve_browser(profile, &settings) {
            Some(path) => {
                browsers += 1;
                println!("[OK] {profile} browser found: {}", path.display());
            }
            None => println!("[!!] {profile} browser NOT found"),
        }
    }
    if !settings.render_enabled {
        println!("[!!] Rendering disabled by FLATSCRAPE_NO_BROWSER, plain fetch only");
    }

    let config_ok = match ScraperRegistry::load(&settings.data_dir) {
        Ok(registry) if registry.is_empty() => {
            println!(
                "[!!] {} contains no domains",
                registry.path().unwrap_or(settings.data_dir.as_path()).display()
            );
            false
        }
        Ok(registry) => {
            println!(
                "[OK] {} domain(s) configured in {}",
                registry.len(),
                registry.path().unwrap_or(settings.data_dir.as_path()).display()
            );
            true
        }
        Err(e) => {
            println!("[!!] {e}");
            false
        }
    };

    println!();
    if !config_ok {
        println!("Status: NOT READY");
        println!("  Create scrapers.json in {}.", settings.data_dir.display());
    } else if browsers == 0 || !settings.render_enabled {
        println!("Status: DEGRADED");
        println!("  Pages will be fetched without a browser; some sites will refuse.");
    } else {
        println!("Status: READY");
    }

    Ok(())
}
