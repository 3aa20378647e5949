//! Browser seam used by acquisition.
//!
//! A [`Launcher`] starts one browser per acquisition attempt; the browser
//! hands out a single [`RenderContext`] (tab) that navigates to the listing
//! and answers page queries. [`chromium`] is the production engine; the
//! offline `ReplayPage` answers the same queries from saved HTML.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

/// Where a navigation ended up and how long it took.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationResult {
    pub final_url: String,
    pub load_time_ms: u64,
}

/// A running browser scoped to one attempt.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Close the browser. Called on every exit path of an attempt.
    async fn shutdown(&self) -> Result<()>;
}

/// One tab.
#[async_trait]
pub trait RenderContext: Send + Sync {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Evaluate `script` in the page and return its JSON value.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Serialized DOM, used for debug artifacts and the static-HTML strategy.
    async fn get_html(&self) -> Result<String>;
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Starts a fresh browser for each attempt.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Renderer>>;
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Auto-detected with [`chromium::find_chromium`] when `None`.
    pub chromium_path: Option<PathBuf>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
        }
    }
}
