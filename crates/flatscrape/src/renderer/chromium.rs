//! Chromium-family renderer using chromiumoxide.

use super::{BrowserLauncher, LaunchProfile, NavigationResult, RenderContext, Renderer};
use crate::config::EngineSettings;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Flags for the primary launch. Relaxed isolation and automation hints
/// keep hostile listing sites from refusing the headless browser.
const PRIMARY_ARGS: &[&str] = &[
    "--headless=new",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-blink-features=AutomationControlled",
    "--disable-gpu",
    "--disable-software-rasterizer",
    "--disable-web-security",
    "--disable-features=IsolateOrigins,site-per-process",
    "--disable-extensions",
    "--disable-background-networking",
];

const SECONDARY_ARGS: &[&str] = &["--headless=new", "--no-sandbox"];

const PRIMARY_BINARIES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

const SECONDARY_BINARIES: &[&str] = &[
    "microsoft-edge",
    "microsoft-edge-stable",
    "brave-browser",
    "chromium",
    "chromium-browser",
];

/// Executable for a launch profile as configured by the settings.
///
/// The secondary profile never resolves to the executable the primary
/// profile uses; a host with a single Chromium has no secondary engine.
pub fn resolve_browser(profile: LaunchProfile, settings: &EngineSettings) -> Option<PathBuf> {
    match profile {
        LaunchProfile::Primary => find_browser(profile, settings.browser_path.as_deref()),
        LaunchProfile::Secondary => {
            let primary = find_browser(LaunchProfile::Primary, settings.browser_path.as_deref());
            find_browser_except(
                profile,
                settings.secondary_browser_path.as_deref(),
                primary.as_deref(),
            )
        }
    }
}

/// Find the browser executable for a launch profile.
pub fn find_browser(profile: LaunchProfile, explicit: Option<&Path>) -> Option<PathBuf> {
    find_browser_except(profile, explicit, None)
}

fn find_browser_except(
    profile: LaunchProfile,
    explicit: Option<&Path>,
    except: Option<&Path>,
) -> Option<PathBuf> {
    let usable = |path: &Path| path.exists() && !except.is_some_and(|e| same_file(path, e));

    // 1. Configured path
    if let Some(path) = explicit {
        if usable(path) {
            return Some(path.to_path_buf());
        }
        tracing::warn!("configured {profile} browser not usable: {}", path.display());
    }

    let binaries = match profile {
        LaunchProfile::Primary => {
            // 2. ~/.flatscrape/chromium/
            if let Some(home) = dirs::home_dir() {
                let candidates = if cfg!(target_os = "macos") {
                    vec![
                        home.join(".flatscrape/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                        home.join(".flatscrape/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                    ]
                } else {
                    vec![
                        home.join(".flatscrape/chromium/chrome-linux64/chrome"),
                        home.join(".flatscrape/chromium/chrome"),
                    ]
                };
                if let Some(found) = candidates.into_iter().find(|c| usable(c.as_path())) {
                    return Some(found);
                }
            }
            PRIMARY_BINARIES
        }
        LaunchProfile::Secondary => SECONDARY_BINARIES,
    };

    // 3. System PATH
    if let Some(path) = binaries
        .iter()
        .filter_map(|b| which::which(b).ok())
        .find(|p| usable(p.as_path()))
    {
        return Some(path);
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let app = match profile {
            LaunchProfile::Primary => "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            LaunchProfile::Secondary => {
                "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"
            }
        };
        let common = PathBuf::from(app);
        if usable(common.as_path()) {
            return Some(common);
        }
    }

    None
}

/// Two paths naming the same executable, after resolving symlinks.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Launches Chromium-family browsers according to the engine settings.
pub struct ChromiumLauncher {
    settings: EngineSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, profile: LaunchProfile) -> Result<Arc<dyn Renderer>> {
        let renderer = ChromiumRenderer::launch(profile, &self.settings).await?;
        Ok(Arc::new(renderer))
    }
}

/// A running headless browser.
pub struct ChromiumRenderer {
    profile: LaunchProfile,
    browser: Mutex<Option<Browser>>,
    handler: std::sync::Mutex<Option<JoinHandle<()>>>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless browser for the given profile.
    pub async fn launch(profile: LaunchProfile, settings: &EngineSettings) -> Result<Self> {
        let chrome_path = resolve_browser(profile, settings)
            .with_context(|| format!("no {profile} browser executable found"))?;

        let args = match profile {
            LaunchProfile::Primary => PRIMARY_ARGS,
            LaunchProfile::Secondary => SECONDARY_ARGS,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .request_timeout(Duration::from_millis(settings.navigation_timeout_ms));
        for arg in args {
            builder = builder.arg(*arg);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .with_context(|| format!("failed to launch {}", chrome_path.display()))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!("launched {profile} browser: {}", chrome_path.display());

        Ok(Self {
            profile,
            browser: Mutex::new(Some(browser)),
            handler: std::sync::Mutex::new(Some(handle)),
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    fn profile(&self) -> LaunchProfile {
        self.profile
    }

    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().context("browser already shut down")?;
        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        drop(guard);

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(e) = browser.close().await {
                tracing::debug!("browser close failed: {e}");
            }
            let _ = browser.wait().await;
        }
        if let Ok(mut handler) = self.handler.lock() {
            if let Some(handle) = handler.take() {
                handle.abort();
            }
        }
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn set_extra_headers(&mut self, headers: &[(String, String)]) -> Result<()> {
        let map: serde_json::Map<String, serde_json::Value> = headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        self.page
            .execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::Value::Object(map),
            )))
            .await
            .context("failed to set extra HTTP headers")?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url))
            .await;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        result
            .into_value::<String>()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        self.page.close().await.context("failed to close page")?;
        Ok(())
    }
}
