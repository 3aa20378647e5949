//! Show snapshot health and the last daemon metrics.

use crate::cli::output;
use crate::config::DaemonConfig;
use crate::store::SnapshotStore;
use anyhow::Result;

pub async fn run(config: &DaemonConfig) -> Result<()> {
    let store = SnapshotStore::new(&config.data_dir);
    let health = store.health();
    let metrics = store.read_metrics();
    let backups = store.list_backups()?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "status": if health.is_some() { "ok" } else { "no-data" },
            "health": health,
            "metrics": metrics,
            "backupCount": backups.len(),
        }));
        return Ok(());
    }

    println!("  Data dir:   {}", config.data_dir.display());
    match &health {
        Some(h) => {
            let updated = h
                .last_updated
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".into());
            println!("  Snapshot:   {} records, updated {updated}", h.record_count);
        }
        None => println!("  Snapshot:   no data"),
    }
    println!("  Backups:    {}", backups.len());
    match &metrics {
        Some(m) => {
            println!("  Last tick:  {} ({} records)", m.last_scrape.to_rfc3339(), m.last_count);
            println!("  Failures:   {} consecutive", m.consecutive_failures);
            if let Some(ok) = m.last_success_at {
                println!("  Last ok:    {}", ok.to_rfc3339());
            }
        }
        None => println!("  Daemon:     no metrics yet"),
    }
    Ok(())
}
