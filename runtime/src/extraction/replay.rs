//! Offline page backed by captured HTML.
//!
//! Answers the listing queries in [`super::queries`] with `scraper`, which
//! lets the whole pipeline run against a saved `debug-page-content.html`.

use super::queries::{BODY_TEXT_JS, CELL_SELECTOR, ROWS_QUERY_JS, ROW_SELECTOR, SCRIPT_TEXTS_JS};
use crate::renderer::{NavigationResult, RenderContext};
use anyhow::{bail, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::{json, Value};
use url::Url;

pub struct ReplayPage {
    html: String,
    url: String,
}

impl ReplayPage {
    pub fn new(html: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            url: url.into(),
        }
    }

    fn answer(&self, script: &str) -> Result<Value> {
        let document = Html::parse_document(&self.html);
        match script {
            ROWS_QUERY_JS => Ok(rows(&document, Url::parse(&self.url).ok().as_ref())),
            SCRIPT_TEXTS_JS => Ok(Value::from(
                document
                    .select(&selector("script"))
                    .map(|s| s.text().collect::<String>())
                    .collect::<Vec<_>>(),
            )),
            BODY_TEXT_JS => Ok(Value::from(
                document
                    .select(&selector("body"))
                    .next()
                    .map(|b| b.text().collect::<String>())
                    .unwrap_or_default(),
            )),
            _ => bail!("query not supported by replay page"),
        }
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn rows(document: &Html, base: Option<&Url>) -> Value {
    let cell_sel = selector(CELL_SELECTOR);
    let link_sel = selector("a");
    let rows: Vec<Value> = document
        .select(&selector(ROW_SELECTOR))
        .map(|row| {
            let href = row
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|h| match base.and_then(|b| b.join(h).ok()) {
                    Some(abs) => abs.to_string(),
                    None => h.to_string(),
                })
                .unwrap_or_default();
            let cells: Vec<String> = row
                .select(&cell_sel)
                .map(|c| c.text().collect::<String>().trim().to_string())
                .collect();
            json!({ "href": href, "cells": cells })
        })
        .collect();
    Value::Array(rows)
}

#[async_trait]
impl RenderContext for ReplayPage {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        self.url = url.to_string();
        Ok(NavigationResult {
            final_url: self.url.clone(),
            load_time_ms: 0,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<Value> {
        self.answer(script)
    }

    async fn get_html(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
