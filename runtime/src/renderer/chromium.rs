//! Headless Chromium over the DevTools protocol (chromiumoxide).

use super::{LaunchOptions, Launcher, NavigationResult, RenderContext, Renderer};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const BROWSER_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-background-networking",
    "--no-first-run",
    "--window-size=1366,900",
];

/// CDP request timeout; navigation has its own, shorter, per-call limit.
const CDP_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Browser binary from `PAIRWATCH_CHROMIUM_PATH`, `~/.pairwatch/chromium`,
/// `PATH`, or the macOS default install, in that order.
pub fn find_chromium() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("PAIRWATCH_CHROMIUM_PATH").map(PathBuf::from) {
        if path.exists() {
            return Some(path);
        }
    }

    let bundled = dirs::home_dir().map(|home| home.join(".pairwatch").join("chromium"));
    if let Some(found) = bundled
        .iter()
        .flat_map(|root| bundled_candidates(root))
        .find(|p| p.exists())
    {
        return Some(found);
    }

    let on_path = ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"]
        .into_iter()
        .find_map(|name| which::which(name).ok());
    if on_path.is_some() {
        return on_path;
    }

    let mac_default = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
    (cfg!(target_os = "macos") && mac_default.exists()).then_some(mac_default)
}

fn bundled_candidates(root: &std::path::Path) -> Vec<PathBuf> {
    const TESTING_APP: &str =
        "Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing";
    if cfg!(target_os = "macos") {
        vec![
            root.join("chrome-mac-arm64").join(TESTING_APP),
            root.join("chrome-mac-x64").join(TESTING_APP),
            root.join("chrome"),
        ]
    } else {
        vec![root.join("chrome-linux64").join("chrome"), root.join("chrome")]
    }
}

/// One Chromium process plus the task pumping its CDP events.
pub struct ChromiumBrowser {
    browser: Mutex<Browser>,
    events: JoinHandle<()>,
}

impl ChromiumBrowser {
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let executable = match &options.chromium_path {
            Some(p) => p.clone(),
            None => find_chromium()
                .context("no Chromium binary found; set PAIRWATCH_CHROMIUM_PATH")?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&executable)
            .request_timeout(CDP_REQUEST_TIMEOUT)
            .args(BROWSER_ARGS.iter().copied());
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("invalid browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .with_context(|| format!("launching {} failed", executable.display()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::debug!(
            executable = %executable.display(),
            headless = options.headless,
            "browser started"
        );
        Ok(Self {
            browser: Mutex::new(browser),
            events,
        })
    }
}

#[async_trait]
impl Renderer for ChromiumBrowser {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("opening tab failed")?;
        Ok(Box::new(ChromiumTab { page }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::debug!("browser close: {e}");
        }
        if let Err(e) = browser.wait().await {
            tracing::debug!("browser wait: {e}");
        }
        self.events.abort();
        Ok(())
    }
}

pub struct ChromiumTab {
    page: Page,
}

#[async_trait]
impl RenderContext for ChromiumTab {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let started = Instant::now();
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url))
            .await
            .map_err(|_| anyhow!("navigation to {url} timed out after {timeout_ms}ms"))?
            .with_context(|| format!("navigation to {url} failed"))?;

        let final_url = match self.page.url().await {
            Ok(Some(u)) => u,
            _ => url.to_string(),
        };
        Ok(NavigationResult {
            final_url,
            load_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        self.page
            .evaluate(script)
            .await
            .context("page script failed")?
            .into_value()
            .map_err(|e| anyhow!("page script returned a non-JSON value: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        self.page.content().await.context("reading page HTML failed")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Err(e) = self.page.close().await {
            tracing::debug!("tab close: {e}");
        }
        Ok(())
    }
}

/// [`Launcher`] that starts a [`ChromiumBrowser`] per attempt.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    options: LaunchOptions,
}

impl ChromiumLauncher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn Renderer>> {
        Ok(Box::new(ChromiumBrowser::launch(&self.options).await?))
    }
}
