//! End-to-end extraction: registry on disk, fetcher tiers, REST surface.

use async_trait::async_trait;
use flatscrape::config::EngineSettings;
use flatscrape::error::FetchTier;
use flatscrape::renderer::{
    BrowserLauncher, LaunchProfile, NavigationResult, RenderContext, Renderer,
};
use flatscrape::rest::{self, AppState};
use flatscrape::{
    Extractor, FetchResult, FieldValue, PageFetcher, Provenance, RenderAvailability,
    ScrapeError, ScraperRegistry,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING_HTML: &str = r#"<html><body>
    <h1 class="title">  Nice   Flat </h1>
    <div id="price">1.500,00 €</div>
    <ul class="facts"><li>Area</li><li><span class="area">54 m²</span></li></ul>
</body></html>"#;

fn scrapers_json(domain: &str) -> String {
    json!({
        domain: {
            "selectors": {
                "title": { "type": "class", "value": "title" },
                "price": { "type": "id", "value": "price" },
                "area": { "type": "xpath", "value": "//ul//span.area" },
                "deposit": { "type": "id", "value": "deposit" }
            },
            "url_cleaning": {
                "extract_pattern": "/listing/(\\d+)",
                "clean_pattern": "https://flats.example/l/{id}"
            },
            "nocodb_field_map": {
                "title": "c_title",
                "price": "c_price",
                "deposit": "c_deposit",
                "url_address": "c_url",
                "found_by": "c_user"
            }
        }
    })
    .to_string()
}

/// Write `scrapers.json` for the mock server's host into a fresh directory.
fn registry_for(server: &MockServer) -> (tempfile::TempDir, ScraperRegistry) {
    let dir = tempfile::tempdir().unwrap();
    let host = url::Url::parse(&server.uri())
        .unwrap()
        .host_str()
        .unwrap()
        .to_string();
    std::fs::write(dir.path().join("scrapers.json"), scrapers_json(&host)).unwrap();
    let registry = ScraperRegistry::load(dir.path()).unwrap();
    (dir, registry)
}

fn fast_settings() -> EngineSettings {
    EngineSettings {
        navigation_timeout_ms: 2_000,
        settle_ms: 0,
        network_idle_ms: 0,
        http_timeout_ms: 5_000,
        accept_language: "de-DE,de;q=0.9".into(),
        ..EngineSettings::default()
    }
}

async fn mount_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/listing/42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING_HTML))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_plain_fetch_extracts_full_record() {
    let server = MockServer::start().await;
    mount_listing(&server).await;
    let (_dir, registry) = registry_for(&server);

    let extractor = Extractor::new(PageFetcher::http_only(fast_settings()).unwrap());
    let url = format!("{}/listing/42?utm_source=feed#top", server.uri());
    let extraction = extractor.extract_url(&url, &registry).await.unwrap();

    assert_eq!(extraction.canonical_url, "https://flats.example/l/42");
    assert_eq!(extraction.provenance, Provenance::PlainFetch);
    assert_eq!(extraction.record.len(), 4);
    assert_eq!(
        extraction.record["title"],
        Some(FieldValue::Text("Nice Flat".into()))
    );
    assert_eq!(extraction.record["price"], Some(FieldValue::Number(1500.0)));
    assert_eq!(extraction.record["area"], Some(FieldValue::Number(54.0)));
    assert_eq!(extraction.record["deposit"], None);
    assert_eq!(extraction.missing_fields(), vec!["deposit"]);
}

#[tokio::test]
async fn test_unknown_domain_fails_before_fetching() {
    let server = MockServer::start().await;
    let (_dir, registry) = registry_for(&server);

    let extractor = Extractor::new(PageFetcher::http_only(fast_settings()).unwrap());
    let err = extractor
        .extract_url("https://unknown.example/listing/1", &registry)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScrapeError::ConfigurationMissing { ref domain } if domain == "unknown.example"
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_plain_fetch_auth_refusal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    let (_dir, registry) = registry_for(&server);

    let extractor = Extractor::new(PageFetcher::http_only(fast_settings()).unwrap());
    let err = extractor
        .extract_url(&format!("{}/listing/7", server.uri()), &registry)
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapeError::AuthRequired { status: 401, .. }));
    assert_eq!(err.http_status(), 502);
}

#[tokio::test]
async fn test_plain_fetch_server_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let (_dir, registry) = registry_for(&server);

    let extractor = Extractor::new(PageFetcher::http_only(fast_settings()).unwrap());
    let err = extractor
        .extract_url(&format!("{}/listing/7", server.uri()), &registry)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScrapeError::FetchFailed {
            tier: FetchTier::Plain,
            status: Some(503),
            ..
        }
    ));
}

#[tokio::test]
async fn test_blank_body_is_empty_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  \n "))
        .mount(&server)
        .await;
    let (_dir, registry) = registry_for(&server);

    let extractor = Extractor::new(PageFetcher::http_only(fast_settings()).unwrap());
    let err = extractor
        .extract_url(&format!("{}/listing/7", server.uri()), &registry)
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapeError::EmptyDocument { .. }));
}

/// What the fake browser observed.
#[derive(Default)]
struct BrowserLog {
    launches: Mutex<Vec<LaunchProfile>>,
    headers: Mutex<Vec<(String, String)>>,
    navigated: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// How pages opened by the fake browser behave.
#[derive(Clone, Copy, PartialEq)]
enum PageBehavior {
    Normal,
    FailNavigation,
    /// `navigate` never completes.
    HangNavigation,
    /// The resource count keeps growing, so the network never goes idle.
    BusyNetwork,
    /// `execute_js` never completes.
    HangScript,
}

/// Fails the launch profiles it is told to, serves `html` otherwise.
struct FakeLauncher {
    log: Arc<BrowserLog>,
    failing: Vec<LaunchProfile>,
    html: String,
    behavior: PageBehavior,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, profile: LaunchProfile) -> anyhow::Result<Arc<dyn Renderer>> {
        self.log.launches.lock().unwrap().push(profile);
        if self.failing.contains(&profile) {
            anyhow::bail!("{profile} executable not found");
        }
        Ok(Arc::new(FakeRenderer {
            profile,
            log: self.log.clone(),
            html: self.html.clone(),
            behavior: self.behavior,
        }))
    }
}

struct FakeRenderer {
    profile: LaunchProfile,
    log: Arc<BrowserLog>,
    html: String,
    behavior: PageBehavior,
}

#[async_trait]
impl Renderer for FakeRenderer {
    fn profile(&self) -> LaunchProfile {
        self.profile
    }

    async fn new_context(&self) -> anyhow::Result<Box<dyn RenderContext>> {
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeContext {
            log: self.log.clone(),
            html: self.html.clone(),
            behavior: self.behavior,
            scripts_run: AtomicUsize::new(0),
        }))
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.log.opened.load(Ordering::SeqCst) - self.log.closed.load(Ordering::SeqCst)
    }
}

struct FakeContext {
    log: Arc<BrowserLog>,
    html: String,
    behavior: PageBehavior,
    scripts_run: AtomicUsize,
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn set_extra_headers(&mut self, headers: &[(String, String)]) -> anyhow::Result<()> {
        self.log.headers.lock().unwrap().extend_from_slice(headers);
        Ok(())
    }

    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> anyhow::Result<NavigationResult> {
        self.log.navigated.lock().unwrap().push(url.to_string());
        match self.behavior {
            PageBehavior::FailNavigation => anyhow::bail!("net::ERR_CONNECTION_REFUSED"),
            PageBehavior::HangNavigation => std::future::pending::<()>().await,
            _ => {}
        }
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 12,
        })
    }

    async fn execute_js(&self, _script: &str) -> anyhow::Result<Value> {
        let run = self.scripts_run.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            PageBehavior::HangScript => std::future::pending().await,
            PageBehavior::BusyNetwork => Ok(json!(run)),
            _ => Ok(json!(3)),
        }
    }

    async fn get_html(&self) -> anyhow::Result<String> {
        Ok(self.html.clone())
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn fake_launcher(failing: Vec<LaunchProfile>, behavior: PageBehavior) -> Arc<FakeLauncher> {
    Arc::new(FakeLauncher {
        log: Arc::new(BrowserLog::default()),
        failing,
        html: LISTING_HTML.to_string(),
        behavior,
    })
}

#[tokio::test]
async fn test_secondary_engine_used_when_primary_fails() {
    let launcher = fake_launcher(vec![LaunchProfile::Primary], PageBehavior::Normal);
    let fetcher = PageFetcher::with_launcher(fast_settings(), launcher.clone()).unwrap();
    let registry = ScraperRegistry::from_json(&scrapers_json("rent.example")).unwrap();
    let extractor = Extractor::new(fetcher);

    let url = "https://rent.example/listing/99?ref=home";
    let extraction = extractor.extract_url(url, &registry).await.unwrap();

    assert_eq!(
        extraction.provenance,
        Provenance::Rendered(LaunchProfile::Secondary)
    );
    assert_eq!(extraction.canonical_url, "https://flats.example/l/99");
    assert_eq!(extraction.record["price"], Some(FieldValue::Number(1500.0)));

    let log = &launcher.log;
    assert_eq!(
        *log.launches.lock().unwrap(),
        vec![LaunchProfile::Primary, LaunchProfile::Secondary]
    );
    assert_eq!(*log.navigated.lock().unwrap(), vec![url.to_string()]);
    assert!(log
        .headers
        .lock()
        .unwrap()
        .contains(&("Accept-Language".to_string(), "de-DE,de;q=0.9".to_string())));
    assert_eq!(log.opened.load(Ordering::SeqCst), 1);
    assert_eq!(log.closed.load(Ordering::SeqCst), 1);
    assert_eq!(
        extractor.fetcher().availability(),
        RenderAvailability::Ready {
            profile: LaunchProfile::Secondary
        }
    );
}

#[tokio::test]
async fn test_browser_launched_once_for_many_fetches() {
    let launcher = fake_launcher(vec![], PageBehavior::Normal);
    let fetcher = PageFetcher::with_launcher(fast_settings(), launcher.clone()).unwrap();

    for id in 1..=3 {
        let page = fetcher
            .fetch(&format!("https://rent.example/listing/{id}"))
            .await
            .unwrap();
        assert_eq!(page.provenance, Provenance::Rendered(LaunchProfile::Primary));
    }

    assert_eq!(launcher.log.launches.lock().unwrap().len(), 1);
    assert_eq!(launcher.log.opened.load(Ordering::SeqCst), 3);
    assert_eq!(launcher.log.closed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_render_failure_does_not_fall_back_to_plain_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING_HTML))
        .expect(0)
        .mount(&server)
        .await;

    let launcher = fake_launcher(vec![], PageBehavior::FailNavigation);
    let fetcher = PageFetcher::with_launcher(fast_settings(), launcher.clone()).unwrap();
    let err = fetcher
        .fetch(&format!("{}/listing/5", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScrapeError::FetchFailed {
            tier: FetchTier::Render,
            ..
        }
    ));
    assert_eq!(launcher.log.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_browser_falls_back_to_plain_fetch() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let launcher = fake_launcher(
        vec![LaunchProfile::Primary, LaunchProfile::Secondary],
        PageBehavior::Normal,
    );
    let fetcher = PageFetcher::with_launcher(fast_settings(), launcher.clone()).unwrap();

    let page = fetcher
        .fetch(&format!("{}/listing/42", server.uri()))
        .await
        .unwrap();

    assert_eq!(page.provenance, Provenance::PlainFetch);
    assert!(page.html.contains("Nice   Flat"));
    assert!(matches!(
        fetcher.availability(),
        RenderAvailability::Unavailable { .. }
    ));
}

/// Settings with a short navigation timeout; the whole render is bounded by
/// twice that plus the settle time plus a fixed slack of a few seconds.
fn short_timeout_settings() -> EngineSettings {
    EngineSettings {
        navigation_timeout_ms: 200,
        ..fast_settings()
    }
}

/// Fetch one page from a fake browser, returning what it saw, the outcome
/// and how long the fetch took.
async fn fetch_with(
    behavior: PageBehavior,
) -> (Arc<FakeLauncher>, Result<FetchResult, ScrapeError>, Duration) {
    let launcher = fake_launcher(vec![], behavior);
    let fetcher =
        PageFetcher::with_launcher(short_timeout_settings(), launcher.clone()).unwrap();
    fetcher.warm_up().await;

    let started = Instant::now();
    let result = fetcher.fetch("https://rent.example/listing/8").await;
    (launcher, result, started.elapsed())
}

#[tokio::test]
async fn test_hanging_navigation_times_out_and_closes_page() {
    let (launcher, result, elapsed) = fetch_with(PageBehavior::HangNavigation).await;

    assert!(matches!(
        result,
        Err(ScrapeError::FetchFailed {
            tier: FetchTier::Render,
            ..
        })
    ));
    assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");
    assert_eq!(launcher.log.opened.load(Ordering::SeqCst), 1);
    assert_eq!(launcher.log.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_hanging_script_times_out_and_closes_page() {
    let (launcher, result, elapsed) = fetch_with(PageBehavior::HangScript).await;

    assert!(matches!(
        result,
        Err(ScrapeError::FetchFailed {
            tier: FetchTier::Render,
            ..
        })
    ));
    assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");
    assert_eq!(launcher.log.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_busy_network_still_reads_page_after_idle_deadline() {
    let (launcher, result, elapsed) = fetch_with(PageBehavior::BusyNetwork).await;

    let page = result.unwrap();
    assert!(page.html.contains("Nice   Flat"));
    assert!(elapsed >= Duration::from_millis(200), "took {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    assert_eq!(launcher.log.closed.load(Ordering::SeqCst), 1);
}

/// Serve the REST router on an ephemeral port and return its base URL.
async fn spawn_api(state: Arc<AppState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, rest::router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_rest_scrape_and_errors() {
    let server = MockServer::start().await;
    mount_listing(&server).await;
    let (_dir, registry) = registry_for(&server);

    let extractor = Extractor::new(PageFetcher::http_only(fast_settings()).unwrap());
    let base = spawn_api(Arc::new(AppState::new(extractor, registry))).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "running");
    assert_eq!(health["render"]["state"], "unavailable");

    let domains: Value = client
        .get(format!("{base}/api/v1/domains"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(domains["domains"], json!(["127.0.0.1"]));

    let listing_url = format!("{}/listing/42?x=1", server.uri());
    let resp = client
        .post(format!("{base}/api/v1/scrape"))
        .json(&json!({ "url": listing_url, "found_by": "agent@flats.example" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["canonical_url"], "https://flats.example/l/42");
    assert_eq!(body["data"]["price"], json!(1500.0));
    assert_eq!(body["data"]["deposit"], Value::Null);
    assert_eq!(body["store_fields"]["c_title"], "Nice Flat");
    assert_eq!(body["store_fields"]["c_url"], "https://flats.example/l/42");
    assert_eq!(body["store_fields"]["c_user"], "agent@flats.example");

    let canon: Value = client
        .post(format!("{base}/api/v1/canonicalize"))
        .json(&json!({ "url": listing_url }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(canon["canonical_url"], "https://flats.example/l/42");

    let resp = client
        .post(format!("{base}/api/v1/scrape"))
        .json(&json!({ "url": "https://unknown.example/listing/1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "configuration_missing");
}
