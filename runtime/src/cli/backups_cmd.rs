//! Backup listing, restore and validation.

use crate::cli::output;
use crate::config::DaemonConfig;
use crate::store::SnapshotStore;
use anyhow::{bail, Result};
use chrono::Utc;

pub async fn run_list(config: &DaemonConfig) -> Result<()> {
    let backups = SnapshotStore::new(&config.data_dir).list_backups()?;
    if output::is_json() {
        output::print_json(&serde_json::json!({ "backups": backups }));
        return Ok(());
    }
    if backups.is_empty() {
        println!("  No backups.");
    }
    for b in &backups {
        let when = chrono::DateTime::<Utc>::from_timestamp_millis(b.millis as i64)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        println!("  {:<32} {:>10} B  {when}", b.name, b.size);
    }
    Ok(())
}

pub async fn run_restore(config: &DaemonConfig, name: &str) -> Result<()> {
    let receipt = SnapshotStore::new(&config.data_dir).restore(name, Utc::now())?;
    if output::is_json() {
        output::print_json(&receipt);
        return Ok(());
    }
    output::say(format!("  Restored {}.", receipt.restored));
    if let Some(backup) = receipt.backup {
        output::say(format!("  Previous snapshot saved as {backup}."));
    }
    Ok(())
}

/// Exits non-zero when any backup fails to parse.
pub async fn run_validate(config: &DaemonConfig) -> Result<()> {
    let checks = SnapshotStore::new(&config.data_dir).validate_backups()?;
    let failures = checks.iter().filter(|c| !c.is_ok()).count();

    if output::is_json() {
        output::print_json(&serde_json::json!({ "checks": checks, "failures": failures }));
    } else if checks.is_empty() {
        println!("  No backup files found.");
    } else {
        for c in &checks {
            match (&c.entries, &c.error) {
                (Some(n), None) => println!("  [OK]   {} - entries: {n}", c.name),
                (_, err) => println!("  [FAIL] {} - {}", c.name, err.as_deref().unwrap_or("")),
            }
        }
    }

    if failures > 0 {
        bail!("{failures} backup(s) failed validation");
    }
    Ok(())
}
