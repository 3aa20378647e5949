//! Run the extraction pipeline against a saved page.

use crate::cli::output;
use crate::config::DaemonConfig;
use crate::daemon::{commit_records, CommitOutcome};
use crate::extraction::replay::ReplayPage;
use crate::extraction::ExtractionPipeline;
use crate::store::SnapshotStore;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;

pub async fn run(
    config: &DaemonConfig,
    file: &Path,
    url: Option<&str>,
    commit: bool,
) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let page = ReplayPage::new(html, url.unwrap_or(&config.session.target_url));
    let pipeline = ExtractionPipeline::standard(&config.session.home_url);

    let extraction = pipeline.run(&page, Utc::now()).await?;
    let strategy = extraction.strategy.unwrap_or("none");

    let committed = if commit {
        Some(commit_records(
            &SnapshotStore::new(&config.data_dir),
            extraction.records.clone(),
            Utc::now(),
        )?)
    } else {
        None
    };

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "strategy": extraction.strategy,
            "count": extraction.records.len(),
            "records": extraction.records,
            "commit": committed,
        }));
        return Ok(());
    }

    output::say(format!(
        "  {} records via {strategy} strategy.",
        extraction.records.len()
    ));
    for r in &extraction.records {
        output::say(format!(
            "  {:<10} {:<24} {} {}",
            r.symbol, r.name, r.price_usd, r.pair_address
        ));
    }
    match committed {
        Some(CommitOutcome::Written(receipt)) => {
            output::say(format!("  Committed {} records.", receipt.count))
        }
        Some(CommitOutcome::Empty { .. }) => output::say("  Nothing to commit; snapshot kept."),
        None => {}
    }
    Ok(())
}
