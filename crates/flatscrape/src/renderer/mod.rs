//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over the
//! browser engine, and the `BrowserLauncher` seam the fetcher uses to start
//! one. The production implementation drives Chromium-family browsers via
//! chromiumoxide.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which browser launch the fetcher is attempting.
///
/// The primary engine is a hardened headless Chrome/Chromium. The secondary
/// engine is a different Chromium-family executable (Edge, Brave, or a
/// configured path) launched with minimal flags, for hosts where the first
/// one is blocked or cannot start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchProfile {
    Primary,
    Secondary,
}

impl LaunchProfile {
    /// Launch order tried by the fetcher.
    pub const ORDER: [LaunchProfile; 2] = [LaunchProfile::Primary, LaunchProfile::Secondary];
}

impl fmt::Display for LaunchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchProfile::Primary => write!(f, "primary"),
            LaunchProfile::Secondary => write!(f, "secondary"),
        }
    }
}

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A running browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Which launch produced this renderer.
    fn profile(&self) -> LaunchProfile;
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine and its process.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Send these headers with every request made by this tab.
    async fn set_extra_headers(&mut self, headers: &[(String, String)]) -> Result<()>;
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full rendered page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Starts a browser engine for a launch profile.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, profile: LaunchProfile) -> Result<Arc<dyn Renderer>>;
}
