//! Engine-wide settings: timeouts, browser discovery, request headers.
//!
//! Values resolve as explicit override → `FLATSCRAPE_*` environment
//! variable → built-in default.

use std::path::PathBuf;

/// Default navigation timeout for the render tier.
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;
/// Fixed wait after network idle so client-rendered content can populate.
pub const DEFAULT_SETTLE_MS: u64 = 2_000;
/// Quiet period without new network activity that counts as idle.
pub const DEFAULT_NETWORK_IDLE_MS: u64 = 500;
/// Timeout for the plain-fetch tier.
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,de;q=0.8";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/120.0.0.0 Safari/537.36";

/// Settings shared by the fetcher and the orchestrator.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Directory holding `scrapers.json`.
    pub data_dir: PathBuf,
    /// When false the fetcher never probes a browser.
    pub render_enabled: bool,
    /// Explicit primary browser executable.
    pub browser_path: Option<PathBuf>,
    /// Explicit secondary browser executable.
    pub secondary_browser_path: Option<PathBuf>,
    pub navigation_timeout_ms: u64,
    pub settle_ms: u64,
    pub network_idle_ms: u64,
    pub http_timeout_ms: u64,
    pub accept_language: String,
    pub user_agent: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            render_enabled: true,
            browser_path: None,
            secondary_browser_path: None,
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            network_idle_ms: DEFAULT_NETWORK_IDLE_MS,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl EngineSettings {
    /// Settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Settings from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let number = |key: &str, fallback: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(fallback)
        };
        let flag = |key: &str| {
            lookup(key)
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false)
        };

        Self {
            data_dir: resolve_data_dir(None, &lookup),
            render_enabled: !flag("FLATSCRAPE_NO_BROWSER"),
            browser_path: lookup("FLATSCRAPE_BROWSER_PATH").map(PathBuf::from),
            secondary_browser_path: lookup("FLATSCRAPE_SECONDARY_BROWSER_PATH")
                .map(PathBuf::from),
            navigation_timeout_ms: number(
                "FLATSCRAPE_NAVIGATION_TIMEOUT_MS",
                defaults.navigation_timeout_ms,
            ),
            settle_ms: number("FLATSCRAPE_SETTLE_MS", defaults.settle_ms),
            network_idle_ms: number("FLATSCRAPE_NETWORK_IDLE_MS", defaults.network_idle_ms),
            http_timeout_ms: number("FLATSCRAPE_HTTP_TIMEOUT_MS", defaults.http_timeout_ms),
            accept_language: lookup("FLATSCRAPE_ACCEPT_LANGUAGE")
                .unwrap_or(defaults.accept_language),
            user_agent: lookup("FLATSCRAPE_USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }

    /// Override the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Disable the render tier entirely.
    pub fn without_browser(mut self) -> Self {
        self.render_enabled = false;
        self
    }
}

/// Resolve the data directory.
///
/// Explicit path, then `FLATSCRAPE_DATA_DIR`, then `./data` if it exists,
/// then `~/.flatscrape`.
pub fn resolve_data_dir<F>(explicit: Option<&str>, lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Some(env_path) = lookup("FLATSCRAPE_DATA_DIR") {
        return PathBuf::from(env_path);
    }

    let cwd_data = PathBuf::from("data");
    if cwd_data.exists() {
        return cwd_data;
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".flatscrape")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let settings = EngineSettings::from_lookup(lookup_from(&[(
            "FLATSCRAPE_DATA_DIR",
            "/srv/flatscrape",
        )]));
        assert!(settings.render_enabled);
        assert_eq!(settings.navigation_timeout_ms, 30_000);
        assert_eq!(settings.settle_ms, 2_000);
        assert_eq!(settings.http_timeout_ms, 30_000);
        assert_eq!(settings.data_dir, PathBuf::from("/srv/flatscrape"));
        assert_eq!(settings.accept_language, "en-US,en;q=0.9,de;q=0.8");
    }

    #[test]
    fn test_env_overrides() {
        let settings = EngineSettings::from_lookup(lookup_from(&[
            ("FLATSCRAPE_NO_BROWSER", "1"),
            ("FLATSCRAPE_SETTLE_MS", "250"),
            ("FLATSCRAPE_HTTP_TIMEOUT_MS", "not-a-number"),
            ("FLATSCRAPE_BROWSER_PATH", "/opt/chrome/chrome"),
        ]));
        assert!(!settings.render_enabled);
        assert_eq!(settings.settle_ms, 250);
        assert_eq!(settings.http_timeout_ms, DEFAULT_HTTP_TIMEOUT_MS);
        assert_eq!(
            settings.browser_path,
            Some(PathBuf::from("/opt/chrome/chrome"))
        );
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let lookup = lookup_from(&[("FLATSCRAPE_DATA_DIR", "/from/env")]);
        assert_eq!(
            resolve_data_dir(Some("/explicit"), &lookup),
            PathBuf::from("/explicit")
        );
        assert_eq!(resolve_data_dir(None, &lookup), PathBuf::from("/from/env"));
    }
}
