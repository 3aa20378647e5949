//! Multi-strategy listing extraction.
//!
//! Strategies run in order against one rendered page; the first that yields
//! records wins. An empty result from every strategy is a value, not an error.

pub mod dom;
pub mod html;
pub mod queries;
pub mod replay;
pub mod scripts;

use crate::renderer::RenderContext;
use crate::types::CanonicalRecord;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One way of pulling listing records out of a page.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short name used in logs and debug artifacts.
    fn name(&self) -> &'static str;

    async fn extract(
        &self,
        page: &dyn RenderContext,
        captured_at: DateTime<Utc>,
    ) -> Result<Vec<CanonicalRecord>>;
}

/// Pipeline output: the records plus which strategy produced them.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub strategy: Option<&'static str>,
    pub records: Vec<CanonicalRecord>,
}

/// Ordered list of strategies.
pub struct ExtractionPipeline {
    strategies: Vec<Box<dyn Extractor>>,
}

impl ExtractionPipeline {
    pub fn new(strategies: Vec<Box<dyn Extractor>>) -> Self {
        Self { strategies }
    }

    /// DOM read, then script mining, then static HTML parsing.
    /// `origin` resolves relative row links in the static parse.
    pub fn standard(origin: &str) -> Self {
        Self::new(vec![
            Box::new(dom::DomExtractor),
            Box::new(scripts::ScriptExtractor),
            Box::new(html::HtmlExtractor::new(origin)),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run strategies in order and return the first non-empty result.
    pub async fn run(
        &self,
        page: &dyn RenderContext,
        captured_at: DateTime<Utc>,
    ) -> Result<Extraction> {
        for strategy in &self.strategies {
            let records = strategy.extract(page, captured_at).await?;
            tracing::info!(
                strategy = strategy.name(),
                count = records.len(),
                "extraction strategy finished"
            );
            if !records.is_empty() {
                return Ok(Extraction {
                    strategy: Some(strategy.name()),
                    records,
                });
            }
        }
        Ok(Extraction::default())
    }
}

/// Last path segment of a row link (`.../solana/abc` → `abc`).
pub(crate) fn pair_id_from_href(href: &str) -> &str {
    href.rsplit('/').next().unwrap_or("")
}
