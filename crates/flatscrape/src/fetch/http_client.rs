//! Plain HTTP GET with a browser-like header set.
//!
//! Not a browser: no script execution, no retries. Redirects are followed
//! and every request is bounded by the configured timeout.

use crate::config::EngineSettings;
use anyhow::{Context, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;

/// Maximum number of redirects followed per request.
const MAX_REDIRECTS: usize = 10;

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 401/403: the site refuses clients that are not real browsers.
    pub fn requires_browser(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

/// HTTP client for the plain-fetch tier.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    /// Build a client that presents itself like a desktop Chrome.
    pub fn new(settings: &EngineSettings) -> Result<Self> {
        let timeout = Duration::from_millis(settings.http_timeout_ms);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(settings.user_agent.as_str())
            .default_headers(browser_headers(&settings.accept_language)?)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, timeout })
    }

    /// Perform a single GET request. Non-2xx statuses are returned, not errors.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        let r = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = r.status().as_u16();
        let final_url = r.url().to_string();
        let body = r
            .text()
            .await
            .with_context(|| format!("failed to read body of {url}"))?;

        Ok(HttpResponse {
            final_url,
            status,
            body,
        })
    }
}

fn browser_headers(accept_language: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_str(accept_language).context("invalid Accept-Language value")?,
    );
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    Ok(headers)
}
