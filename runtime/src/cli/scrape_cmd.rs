//! One manual acquisition and commit.

use crate::cli::output;
use crate::config::DaemonConfig;
use crate::daemon::{trigger_once, CommitOutcome};
use crate::store::SnapshotStore;
use anyhow::{Context, Result};

pub async fn run(config: &DaemonConfig) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("cannot create data dir {}", config.data_dir.display()))?;
    let store = SnapshotStore::new(&config.data_dir);
    let source = super::browser_source(config);

    let outcome = trigger_once(&source, &store).await?;

    if output::is_json() {
        output::print_json(&outcome);
        return Ok(());
    }
    match outcome {
        CommitOutcome::Empty { marker } => output::say(format!(
            "  No records acquired; existing snapshot kept (marker {}).",
            marker.display()
        )),
        CommitOutcome::Written(receipt) => {
            output::say(format!("  Wrote {} records.", receipt.count));
            if let Some(backup) = receipt.backup {
                output::say(format!("  Previous snapshot saved as {backup}."));
            }
        }
    }
    Ok(())
}
