//! Page retrieval with a tiered fallback.
//!
//! Tiers, in order:
//! 1. Render with the primary browser engine.
//! 2. Render with the secondary browser engine, if the primary will not launch.
//! 3. Plain HTTP GET, if neither engine launches.
//!
//! Launch availability is probed once per fetcher and cached; a fetcher whose
//! browsers failed to start stays on the plain tier for its whole lifetime.
//! Failures after a tier has been chosen (navigation timeout, refused
//! connection, non-2xx status) are returned as-is and never retried here.

pub mod http_client;

use crate::config::EngineSettings;
use crate::error::{FetchTier, ScrapeError, ScrapeResult};
use crate::renderer::chromium::ChromiumLauncher;
use crate::renderer::{BrowserLauncher, LaunchProfile, RenderContext, Renderer};
use http_client::HttpClient;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// Polling interval while waiting for network idle.
const IDLE_POLL_MS: u64 = 100;

/// Extra time allowed on top of the per-step timeouts for a whole render.
const RENDER_BUDGET_SLACK_MS: u64 = 5_000;

/// Counts loaded resources once the document is complete, -1 before that.
const RESOURCE_COUNT_JS: &str = "document.readyState === 'complete' \
     ? performance.getEntriesByType('resource').length : -1";

/// How a document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Rendered(LaunchProfile),
    PlainFetch,
}

/// A fetched document.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub html: String,
    /// URL after redirects.
    pub final_url: String,
    pub provenance: Provenance,
}

/// Render-tier capability as currently known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RenderAvailability {
    /// No fetch has happened yet, so no browser was launched.
    Unprobed,
    Ready { profile: LaunchProfile },
    /// Browsers could not be started; plain fetch only.
    Unavailable { reason: String },
}

enum RenderTier {
    Ready(Arc<dyn Renderer>),
    Unavailable(String),
}

/// Retrieves pages through the tier chain.
///
/// One browser is shared by all calls on a fetcher; each call gets its own
/// tab, which is closed on every exit path.
pub struct PageFetcher {
    settings: EngineSettings,
    http: HttpClient,
    launcher: Arc<dyn BrowserLauncher>,
    render: OnceCell<RenderTier>,
}

impl PageFetcher {
    /// Fetcher that launches Chromium-family browsers on first use.
    pub fn new(settings: EngineSettings) -> anyhow::Result<Self> {
        let launcher = Arc::new(ChromiumLauncher::new(settings.clone()));
        Self::with_launcher(settings, launcher)
    }

    /// Fetcher with a custom browser launcher.
    pub fn with_launcher(
        settings: EngineSettings,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> anyhow::Result<Self> {
        let http = HttpClient::new(&settings)?;
        let render = if settings.render_enabled {
            OnceCell::new()
        } else {
            OnceCell::new_with(Some(RenderTier::Unavailable(
                "render tier disabled".to_string(),
            )))
        };
        Ok(Self {
            settings,
            http,
            launcher,
            render,
        })
    }

    /// Fetcher that never starts a browser.
    pub fn http_only(settings: EngineSettings) -> anyhow::Result<Self> {
        Self::new(settings.without_browser())
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn availability(&self) -> RenderAvailability {
        match self.render.get() {
            None => RenderAvailability::Unprobed,
            Some(RenderTier::Ready(r)) => RenderAvailability::Ready {
                profile: r.profile(),
            },
            Some(RenderTier::Unavailable(reason)) => RenderAvailability::Unavailable {
                reason: reason.clone(),
            },
        }
    }

    /// Launch the browser now instead of on the first fetch.
    pub async fn warm_up(&self) -> RenderAvailability {
        self.render_tier().await;
        self.availability()
    }

    /// Fetch `url` through the first available tier.
    pub async fn fetch(&self, url: &str) -> ScrapeResult<FetchResult> {
        match self.render_tier().await {
            RenderTier::Ready(renderer) => self.fetch_rendered(renderer.as_ref(), url).await,
            RenderTier::Unavailable(_) => {
                tracing::warn!("using plain HTTP fetch for {url} - may not work with all websites");
                self.fetch_plain(url).await
            }
        }
    }

    /// Close the browser, if one was launched.
    pub async fn shutdown(&self) {
        if let Some(RenderTier::Ready(renderer)) = self.render.get() {
            if let Err(e) = renderer.shutdown().await {
                tracing::warn!("browser shutdown failed: {e:#}");
            }
        }
    }

    async fn render_tier(&self) -> &RenderTier {
        self.render
            .get_or_init(|| probe_browsers(self.launcher.as_ref()))
            .await
    }

    async fn fetch_rendered(&self, renderer: &dyn Renderer, url: &str) -> ScrapeResult<FetchResult> {
        let profile = renderer.profile();
        let mut ctx = renderer
            .new_context()
            .await
            .map_err(|e| render_failure(format!("{e:#}")))?;

        let budget = Duration::from_millis(
            self.settings.navigation_timeout_ms * 2
                + self.settings.settle_ms
                + RENDER_BUDGET_SLACK_MS,
        );
        let outcome = tokio::time::timeout(budget, render_page(ctx.as_mut(), url, &self.settings))
            .await;

        if let Err(e) = ctx.close().await {
            tracing::debug!("failed to close page for {url}: {e:#}");
        }

        match outcome {
            Ok(Ok((html, final_url))) => Ok(FetchResult {
                html,
                final_url,
                provenance: Provenance::Rendered(profile),
            }),
            Ok(Err(e)) => Err(render_failure(format!("{e:#}"))),
            Err(_) => Err(render_failure(format!(
                "rendering {url} exceeded {}ms",
                budget.as_millis()
            ))),
        }
    }

    async fn fetch_plain(&self, url: &str) -> ScrapeResult<FetchResult> {
        let resp = self.http.get(url).await.map_err(|e| ScrapeError::FetchFailed {
            tier: FetchTier::Plain,
            status: None,
            cause: format!("{e:#}"),
        })?;

        if resp.requires_browser() {
            return Err(ScrapeError::AuthRequired {
                url: url.to_string(),
                status: resp.status,
            });
        }
        if !resp.is_success() {
            return Err(ScrapeError::FetchFailed {
                tier: FetchTier::Plain,
                status: Some(resp.status),
                cause: format!("non-success response from {}", resp.final_url),
            });
        }

        Ok(FetchResult {
            html: resp.body,
            final_url: resp.final_url,
            provenance: Provenance::PlainFetch,
        })
    }
}

/// Try each launch profile in order until one starts.
async fn probe_browsers(launcher: &dyn BrowserLauncher) -> RenderTier {
    let mut failures = Vec::new();

    for profile in LaunchProfile::ORDER {
        match launcher.launch(profile).await {
            Ok(renderer) => {
                tracing::info!("render tier ready ({profile} browser)");
                return RenderTier::Ready(renderer);
            }
            Err(e) => {
                tracing::error!("failed to launch {profile} browser: {e:#}");
                failures.push(format!("{profile}: {e:#}"));
            }
        }
    }

    tracing::warn!("no browser could be started, falling back to plain HTTP fetching");
    RenderTier::Unavailable(failures.join("; "))
}

/// Navigate, wait for the network to go quiet, settle, read the DOM.
async fn render_page(
    ctx: &mut dyn RenderContext,
    url: &str,
    settings: &EngineSettings,
) -> anyhow::Result<(String, String)> {
    ctx.set_extra_headers(&[(
        "Accept-Language".to_string(),
        settings.accept_language.clone(),
    )])
    .await?;

    let nav = ctx.navigate(url, settings.navigation_timeout_ms).await?;
    tracing::debug!("navigated to {} in {}ms", nav.final_url, nav.load_time_ms);

    let idle = wait_for_network_idle(
        &*ctx,
        settings.network_idle_ms,
        settings.navigation_timeout_ms,
    )
    .await;
    if !idle {
        tracing::debug!("network did not go idle for {url}, reading page anyway");
    }

    tokio::time::sleep(Duration::from_millis(settings.settle_ms)).await;

    let html = ctx.get_html().await?;
    Ok((html, nav.final_url))
}

/// Wait until the document is complete and no new resources have loaded
/// for `idle_ms`. Gives up after `timeout_ms` and returns false.
pub async fn wait_for_network_idle(ctx: &dyn RenderContext, idle_ms: u64, timeout_ms: u64) -> bool {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let idle_for = Duration::from_millis(idle_ms);
    let mut last_count: Option<i64> = None;
    let mut quiet_since = Instant::now();

    while Instant::now() < deadline {
        let count = match ctx.execute_js(RESOURCE_COUNT_JS).await {
            Ok(v) => v.as_i64().unwrap_or(-1),
            Err(e) => {
                tracing::debug!("network idle probe failed: {e:#}");
                return false;
            }
        };

        if count >= 0 && last_count == Some(count) {
            if quiet_since.elapsed() >= idle_for {
                return true;
            }
        } else {
            last_count = Some(count);
            quiet_since = Instant::now();
        }

        tokio::time::sleep(Duration::from_millis(IDLE_POLL_MS)).await;
    }

    false
}

fn render_failure(cause: String) -> ScrapeError {
    ScrapeError::FetchFailed {
        tier: FetchTier::Render,
        status: None,
        cause,
    }
}
