//! CLI subcommand implementations for the flatscrape binary.

pub mod canonicalize_cmd;
pub mod doctor;
pub mod domains_cmd;
pub mod extract_cmd;
pub mod serve;

use crate::config::EngineSettings;

/// Engine settings from the environment, with command-line overrides applied.
pub fn engine_settings(data_dir: Option<&str>, no_browser: bool) -> EngineSettings {
    let mut settings = EngineSettings::from_env();
    if let Some(dir) = data_dir {
        settings = settings.with_data_dir(dir);
    }
    if no_browser {
        settings = settings.without_browser();
    }
    settings
}
