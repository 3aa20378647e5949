//! Merge a records file into the canonical snapshot.

use crate::cli::output;
use crate::config::DaemonConfig;
use crate::store::SnapshotStore;
use crate::types::{CanonicalRecord, Snapshot};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use std::path::Path;

/// Either a bare record array or a full snapshot file.
#[derive(Deserialize)]
#[serde(untagged)]
enum MergeInput {
    Records(Vec<CanonicalRecord>),
    Snapshot(Snapshot),
}

pub async fn run(config: &DaemonConfig, file: &Path) -> Result<()> {
    let raw = std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
    let input: MergeInput = serde_json::from_slice(&raw)
        .with_context(|| format!("{} is not a record array or snapshot", file.display()))?;
    let records = match input {
        MergeInput::Records(r) => r,
        MergeInput::Snapshot(s) => s.data,
    };

    let (report, receipt) = SnapshotStore::new(&config.data_dir).merge(records, Utc::now())?;

    if output::is_json() {
        output::print_json(&serde_json::json!({ "report": report, "write": receipt }));
        return Ok(());
    }
    output::say(format!(
        "  Merged: {} added, {} updated, {} skipped, {} total.",
        report.added, report.updated, report.skipped, report.total
    ));
    if let Some(backup) = receipt.backup {
        output::say(format!("  Previous snapshot saved as {backup}."));
    }
    Ok(())
}
