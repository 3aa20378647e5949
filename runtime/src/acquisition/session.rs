//! One browser session per acquisition attempt.

use super::retry::with_retry;
use super::RecordSource;
use crate::config::SessionConfig;
use crate::extraction::queries::BODY_TEXT_JS;
use crate::extraction::{Extraction, ExtractionPipeline};
use crate::renderer::{Launcher, RenderContext, Renderer};
use crate::store::SnapshotStore;
use crate::types::CanonicalRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Body text that marks an anti-bot interstitial.
const CHALLENGE_MARKER: &str = "Cloudflare";

/// Acquires records by rendering the listing in a fresh browser.
///
/// Each attempt launches its own renderer, so nothing from a failed attempt
/// (tab, process, cookies) leaks into the next one.
pub struct BrowserSource {
    launcher: Arc<dyn Launcher>,
    pipeline: ExtractionPipeline,
    config: SessionConfig,
    debug_store: Option<SnapshotStore>,
}

impl BrowserSource {
    pub fn new(launcher: Arc<dyn Launcher>, config: SessionConfig) -> Self {
        let pipeline = ExtractionPipeline::standard(&config.home_url);
        Self {
            launcher,
            pipeline,
            config,
            debug_store: None,
        }
    }

    /// Write debug artifacts into `store` after each extraction.
    pub fn with_debug_store(mut self, store: SnapshotStore) -> Self {
        self.debug_store = Some(store);
        self
    }

    async fn attempt(&self, attempt: u32) -> Result<Vec<CanonicalRecord>> {
        info!(attempt, "launching browser");
        let renderer = self
            .launcher
            .launch()
            .await
            .context("launching browser failed")?;

        let result = self.run_in(renderer.as_ref()).await;

        if let Err(e) = renderer.shutdown().await {
            warn!("browser shutdown failed: {e:#}");
        }
        result
    }

    async fn run_in(&self, renderer: &dyn Renderer) -> Result<Vec<CanonicalRecord>> {
        let mut page = renderer
            .new_context()
            .await
            .context("opening browser tab failed")?;

        let result = self.visit(page.as_mut()).await;

        if let Err(e) = page.close().await {
            debug!("closing tab failed: {e:#}");
        }
        result
    }

    async fn visit(&self, page: &mut dyn RenderContext) -> Result<Vec<CanonicalRecord>> {
        let cfg = &self.config;

        info!(url = %cfg.home_url, "navigating to home page");
        page.navigate(&cfg.home_url, cfg.nav_timeout_ms)
            .await
            .context("home page navigation failed")?;
        tokio::time::sleep(cfg.settle).await;

        info!(url = %cfg.target_url, "navigating to listing");
        let nav = page
            .navigate(&cfg.target_url, cfg.nav_timeout_ms)
            .await
            .context("listing navigation failed")?;
        debug!(final_url = %nav.final_url, load_ms = nav.load_time_ms, "listing loaded");

        if challenge_detected(page).await {
            info!(
                wait_ms = cfg.challenge_wait.as_millis() as u64,
                "challenge page detected, waiting longer"
            );
            tokio::time::sleep(cfg.challenge_wait).await;
        }
        tokio::time::sleep(cfg.settle).await;

        let extraction = self.pipeline.run(page, Utc::now()).await?;
        info!(
            strategy = extraction.strategy.unwrap_or("none"),
            count = extraction.records.len(),
            "extraction finished"
        );

        if let Some(store) = &self.debug_store {
            write_artifacts(store, page, &extraction).await;
        }
        Ok(extraction.records)
    }
}

#[async_trait]
impl RecordSource for BrowserSource {
    async fn acquire(&self) -> Result<Vec<CanonicalRecord>> {
        with_retry(
            |attempt| self.attempt(attempt),
            self.config.retry_attempts,
            self.config.retry_backoff,
        )
        .await
    }
}

async fn challenge_detected(page: &dyn RenderContext) -> bool {
    match page.execute_js(BODY_TEXT_JS).await {
        Ok(body) => body.as_str().is_some_and(|t| t.contains(CHALLENGE_MARKER)),
        Err(e) => {
            debug!("body text query failed: {e:#}");
            false
        }
    }
}

/// Best effort; failures are logged only.
async fn write_artifacts(store: &SnapshotStore, page: &dyn RenderContext, extraction: &Extraction) {
    match page.get_html().await {
        Ok(html) => {
            if let Err(e) = store.write_debug("debug-page-content.html", html.as_bytes()) {
                warn!("writing page HTML failed: {e}");
            }
        }
        Err(e) => warn!("reading page HTML failed: {e:#}"),
    }

    let body = serde_json::json!({
        "strategy": extraction.strategy,
        "count": extraction.records.len(),
        "records": extraction.records,
    });
    let written = serde_json::to_vec_pretty(&body)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| Ok(store.write_debug("debug-extracted.json", &bytes)?));
    if let Err(e) = written {
        warn!("writing extracted records failed: {e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::replay::ReplayPage;
    use crate::renderer::NavigationResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const LISTING: &str = r#"<html><body><table class="table-wrap">
      <tr><td>1</td><td><a href="/solana/p1">AAA</a></td><td>Alpha</td><td>$1</td>
          <td>$2</td><td>$3</td><td>$4</td><td>5%</td></tr>
    </table></body></html>"#;

    #[derive(Default)]
    struct Counters {
        launches: AtomicUsize,
        shutdowns: AtomicUsize,
        closes: AtomicUsize,
        navigations: Mutex<Vec<String>>,
    }

    /// Launcher whose first `fail_first` attempts fail during navigation.
    struct FakeLauncher {
        html: String,
        fail_first: usize,
        counters: Arc<Counters>,
    }

    struct FakeRenderer {
        html: String,
        fail_nav: bool,
        counters: Arc<Counters>,
    }

    struct FakeContext {
        inner: ReplayPage,
        fail_nav: bool,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl Launcher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn Renderer>> {
            let n = self.counters.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeRenderer {
                html: self.html.clone(),
                fail_nav: n < self.fail_first,
                counters: Arc::clone(&self.counters),
            }))
        }
    }

    #[async_trait]
    impl Renderer for FakeRenderer {
        async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
            Ok(Box::new(FakeContext {
                inner: ReplayPage::new(self.html.clone(), "about:blank"),
                fail_nav: self.fail_nav,
                counters: Arc::clone(&self.counters),
            }))
        }

        async fn shutdown(&self) -> Result<()> {
            self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl RenderContext for FakeContext {
        async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
            self.counters.navigations.lock().unwrap().push(url.to_string());
            if self.fail_nav {
                anyhow::bail!("net::ERR_CONNECTION_RESET");
            }
            self.inner.navigate(url, timeout_ms).await
        }

        async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
            self.inner.execute_js(script).await
        }

        async fn get_html(&self) -> Result<String> {
            self.inner.get_html().await
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn session_config() -> SessionConfig {
        SessionConfig {
            home_url: "https://dexscreener.com".into(),
            target_url: "https://dexscreener.com/solana".into(),
            nav_timeout_ms: 1000,
            settle: Duration::ZERO,
            challenge_wait: Duration::from_millis(10),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(1),
            headless: true,
            chromium_path: None,
            debug_artifacts: false,
        }
    }

    fn source(html: &str, fail_first: usize) -> (BrowserSource, Arc<Counters>) {
        source_with(html, fail_first, session_config())
    }

    fn source_with(
        html: &str,
        fail_first: usize,
        config: SessionConfig,
    ) -> (BrowserSource, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let launcher = FakeLauncher {
            html: html.to_string(),
            fail_first,
            counters: Arc::clone(&counters),
        };
        (BrowserSource::new(Arc::new(launcher), config), counters)
    }

    #[tokio::test]
    async fn test_visits_home_then_listing() {
        let (source, counters) = source(LISTING, 0);
        let records = source.acquire().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "AAA");
        assert_eq!(
            *counters.navigations.lock().unwrap(),
            vec!["https://dexscreener.com", "https://dexscreener.com/solana"]
        );
    }

    #[tokio::test]
    async fn test_retries_and_always_cleans_up() {
        let (source, counters) = source(LISTING, 2);
        let records = source.acquire().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(counters.launches.load(Ordering::SeqCst), 3);
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 3);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_error() {
        let (source, counters) = source(LISTING, 10);
        let err = source.acquire().await.unwrap_err();
        assert!(format!("{err:#}").contains("ERR_CONNECTION_RESET"));
        assert_eq!(counters.launches.load(Ordering::SeqCst), 3);
        assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_page_is_empty_not_error() {
        let config = SessionConfig {
            challenge_wait: Duration::from_secs(30),
            ..session_config()
        };
        let (source, counters) = source_with("<html><body>Cloudflare</body></html>", 0, config);

        let started = tokio::time::Instant::now();
        let records = source.acquire().await.unwrap();
        assert!(records.is_empty());
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_challenge_wait_skipped_on_normal_page() {
        let config = SessionConfig {
            challenge_wait: Duration::from_secs(30),
            ..session_config()
        };
        let (source, _) = source_with(LISTING, 0, config);

        let started = tokio::time::Instant::now();
        assert_eq!(source.acquire().await.unwrap().len(), 1);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_debug_artifacts_written() {
        let dir = tempfile::TempDir::new().unwrap();
        let (source, _) = source(LISTING, 0);
        let source = source.with_debug_store(SnapshotStore::new(dir.path()));
        source.acquire().await.unwrap();

        let html = std::fs::read_to_string(dir.path().join("debug-page-content.html")).unwrap();
        assert!(html.contains("table-wrap"));
        let extracted: serde_json::Value = serde_json::from_slice(
            &std::fs::read(dir.path().join("debug-extracted.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(extracted["strategy"], "dom");
        assert_eq!(extracted["count"], 1);
    }
}
