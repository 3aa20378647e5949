//! Durable snapshot, backup and metrics files.
//!
//! Layout under the data directory:
//!
//! | file | content |
//! |---|---|
//! | `coins.json` | canonical snapshot |
//! | `coins.json.bak.<millis>` | byte-exact copies of earlier canonical snapshots |
//! | `daemon-metrics.json` | daemon health counters |
//! | `debug-*` | empty-tick markers and optional debug artifacts |
//!
//! Every write goes to a temp file first and is renamed into place, so a
//! reader sees either the old or the new content. Backups are never mutated
//! or deleted here.

use crate::types::{CanonicalRecord, DaemonMetrics, Snapshot};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const CANONICAL_FILE: &str = "coins.json";
pub const METRICS_FILE: &str = "daemon-metrics.json";
pub const BACKUP_PREFIX: &str = "coins.json.bak.";

fn backup_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^coins\.json\.bak\.\d+$").expect("valid regex"))
}

/// Errors raised by [`SnapshotStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid backup name: {0:?}")]
    InvalidBackupName(String),
    #[error("backup {name} is unreadable: {source}")]
    BackupUnreadable {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A backup file in the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    pub name: String,
    pub millis: u64,
    pub size: u64,
}

/// Result of writing a new canonical snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReceipt {
    /// Backup of the previous canonical content, if there was one.
    pub backup: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub count: usize,
}

/// Result of a restore.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReceipt {
    pub restored: String,
    pub backup: Option<String>,
}

/// Where a served snapshot came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "name")]
pub enum SnapshotSource {
    Canonical,
    /// Canonical was missing or empty; this backup was served instead.
    Backup(String),
    Empty,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServedSnapshot {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    #[serde(rename = "_source")]
    pub source: SnapshotSource,
}

/// Canonical snapshot summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub last_updated: Option<DateTime<Utc>>,
    pub record_count: usize,
}

/// Outcome of checking one backup file.
#[derive(Debug, Clone, Serialize)]
pub struct BackupCheck {
    pub name: String,
    pub entries: Option<usize>,
    pub error: Option<String>,
}

impl BackupCheck {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Counts from a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub total: usize,
}

/// File-backed store rooted at one data directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn canonical_path(&self) -> PathBuf {
        self.dir.join(CANONICAL_FILE)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(METRICS_FILE)
    }

    /// The canonical snapshot; missing or unparsable reads as `None`.
    pub fn read_snapshot(&self) -> Option<Snapshot> {
        read_json_file(&self.canonical_path())
    }

    /// Back up the current canonical content, then write `records` as the
    /// new canonical snapshot.
    ///
    /// `lastUpdated` is forced strictly past the previous snapshot's.
    pub fn write_snapshot(
        &self,
        records: Vec<CanonicalRecord>,
        now: DateTime<Utc>,
    ) -> StoreResult<WriteReceipt> {
        let previous = self.read_snapshot().and_then(|s| s.last_updated);
        let last_updated = match previous {
            Some(prev) if now <= prev => prev + Duration::milliseconds(1),
            _ => now,
        };

        let backup = self.backup_current(now)?;
        let count = records.len();
        let snapshot = Snapshot::new(last_updated, records);
        write_atomic(&self.canonical_path(), &serde_json::to_vec_pretty(&snapshot)?)?;

        Ok(WriteReceipt {
            backup,
            last_updated,
            count,
        })
    }

    /// Copy the canonical file byte-for-byte to a new backup.
    /// Returns `None` when there is no canonical file.
    pub fn backup_current(&self, now: DateTime<Utc>) -> StoreResult<Option<String>> {
        let canonical = self.canonical_path();
        let bytes = match std::fs::read(&canonical) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&canonical)(e)),
        };

        let mut millis = now.timestamp_millis().max(0) as u64;
        let mut name = format!("{BACKUP_PREFIX}{millis}");
        while self.dir.join(&name).exists() {
            millis += 1;
            name = format!("{BACKUP_PREFIX}{millis}");
        }
        write_atomic(&self.dir.join(&name), &bytes)?;
        tracing::debug!(backup = %name, bytes = bytes.len(), "canonical snapshot backed up");
        Ok(Some(name))
    }

    /// Record an acquisition that produced nothing.
    pub fn write_empty_marker(&self, now: DateTime<Utc>) -> StoreResult<PathBuf> {
        let path = self
            .dir
            .join(format!("debug-empty-scrape-{}.json", now.timestamp_millis()));
        let body = serde_json::json!({
            "lastAttempt": now,
            "recordCount": 0,
        });
        write_atomic(&path, &serde_json::to_vec_pretty(&body)?)?;
        Ok(path)
    }

    pub fn write_metrics(&self, metrics: &DaemonMetrics) -> StoreResult<()> {
        write_atomic(&self.metrics_path(), &serde_json::to_vec_pretty(metrics)?)
    }

    pub fn read_metrics(&self) -> Option<DaemonMetrics> {
        read_json_file(&self.metrics_path())
    }

    /// Write a debug artifact next to the snapshot.
    pub fn write_debug(&self, file_name: &str, bytes: &[u8]) -> StoreResult<PathBuf> {
        let path = self.dir.join(file_name);
        write_atomic(&path, bytes)?;
        Ok(path)
    }

    /// Backups, newest first.
    pub fn list_backups(&self) -> StoreResult<Vec<BackupEntry>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.dir)(e)),
        };

        let mut backups: Vec<BackupEntry> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                if !backup_name_pattern().is_match(&name) {
                    return None;
                }
                let millis = name[BACKUP_PREFIX.len()..].parse().unwrap_or(0);
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                Some(BackupEntry { name, millis, size })
            })
            .collect();
        backups.sort_by(|a, b| b.millis.cmp(&a.millis).then_with(|| b.name.cmp(&a.name)));
        Ok(backups)
    }

    /// Make backup `name` the canonical snapshot, backing up the current one.
    ///
    /// Names that are not `coins.json.bak.<digits>` are rejected before any
    /// file is touched.
    pub fn restore(&self, name: &str, now: DateTime<Utc>) -> StoreResult<RestoreReceipt> {
        if !backup_name_pattern().is_match(name) {
            return Err(StoreError::InvalidBackupName(name.to_string()));
        }
        let bytes =
            std::fs::read(self.dir.join(name)).map_err(|source| StoreError::BackupUnreadable {
                name: name.to_string(),
                source,
            })?;

        let backup = self.backup_current(now)?;
        write_atomic(&self.canonical_path(), &bytes)?;
        tracing::info!(restored = name, backup = ?backup, "backup restored");

        Ok(RestoreReceipt {
            restored: name.to_string(),
            backup,
        })
    }

    /// What a reader should be shown: canonical, else the newest backup with
    /// records, else an empty snapshot.
    pub fn served_snapshot(&self) -> ServedSnapshot {
        if let Some(snapshot) = self.read_snapshot() {
            if !snapshot.is_empty() {
                return ServedSnapshot {
                    snapshot,
                    source: SnapshotSource::Canonical,
                };
            }
        }

        for entry in self.list_backups().unwrap_or_default() {
            if let Some(snapshot) = read_json_file::<Snapshot>(&self.dir.join(&entry.name)) {
                if !snapshot.is_empty() {
                    return ServedSnapshot {
                        snapshot,
                        source: SnapshotSource::Backup(entry.name),
                    };
                }
            }
        }

        ServedSnapshot {
            snapshot: Snapshot::default(),
            source: SnapshotSource::Empty,
        }
    }

    /// Summary of the canonical snapshot; `None` means no data.
    pub fn health(&self) -> Option<Health> {
        let raw: Value = read_json_file(&self.canonical_path())?;
        let last_updated = raw
            .get("lastUpdated")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        let record_count = raw
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        Some(Health {
            last_updated,
            record_count,
        })
    }

    /// Check every backup parses as an object with a `data` array.
    pub fn validate_backups(&self) -> StoreResult<Vec<BackupCheck>> {
        Ok(self
            .list_backups()?
            .into_iter()
            .map(|entry| {
                let path = self.dir.join(&entry.name);
                let checked = std::fs::read(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|bytes| {
                        serde_json::from_slice::<Value>(&bytes).map_err(|e| e.to_string())
                    })
                    .and_then(|value| match value {
                        Value::Object(map) => map
                            .get("data")
                            .and_then(Value::as_array)
                            .map(Vec::len)
                            .ok_or_else(|| "missing data array".to_string()),
                        _ => Err("not an object".to_string()),
                    });
                match checked {
                    Ok(n) => BackupCheck {
                        name: entry.name,
                        entries: Some(n),
                        error: None,
                    },
                    Err(e) => BackupCheck {
                        name: entry.name,
                        entries: None,
                        error: Some(e),
                    },
                }
            })
            .collect())
    }

    /// Merge `incoming` into the canonical snapshot by pair identifier.
    ///
    /// Unknown pairs are appended; known pairs are replaced when the incoming
    /// record is at least as new. Records without a pair identifier are
    /// skipped. The previous canonical content is backed up first.
    pub fn merge(
        &self,
        incoming: Vec<CanonicalRecord>,
        now: DateTime<Utc>,
    ) -> StoreResult<(MergeReport, WriteReceipt)> {
        let mut merged = self.read_snapshot().map(|s| s.data).unwrap_or_default();
        let mut index: HashMap<String, usize> = merged
            .iter()
            .enumerate()
            .map(|(i, r)| (r.pair_address.clone(), i))
            .collect();

        let mut report = MergeReport::default();
        for record in incoming {
            if record.pair_address.is_empty() {
                report.skipped += 1;
                continue;
            }
            match index.get(&record.pair_address) {
                Some(&i) => {
                    if record.timestamp >= merged[i].timestamp {
                        merged[i] = record;
                        report.updated += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
                None => {
                    index.insert(record.pair_address.clone(), merged.len());
                    merged.push(record);
                    report.added += 1;
                }
            }
        }
        report.total = merged.len();

        let receipt = self.write_snapshot(merged, now)?;
        Ok((report, receipt))
    }
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = std::fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(path = %path.display(), "ignoring unparsable file: {e}");
            None
        }
    }
}

/// Write via a sibling temp file and rename into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    std::fs::write(&tmp, bytes).map_err(io_err(&tmp))?;
    std::fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(pair: &str, symbol: &str, ts: DateTime<Utc>) -> CanonicalRecord {
        CanonicalRecord {
            pair_address: pair.into(),
            name: format!("{symbol} token"),
            symbol: symbol.into(),
            price_usd: 1.0,
            liquidity: 0.0,
            market_cap: 0.0,
            volume_24h: 0.0,
            price_change_24h: 0.0,
            dexscreener_url: String::new(),
            timestamp: ts,
        }
    }

    fn store() -> (TempDir, SnapshotStore) {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_first_write_has_no_backup() {
        let (_dir, store) = store();
        let now = Utc::now();
        let receipt = store.write_snapshot(vec![record("p1", "A", now)], now).unwrap();
        assert!(receipt.backup.is_none());
        assert_eq!(receipt.count, 1);
        assert_eq!(store.read_snapshot().unwrap().data.len(), 1);
        assert!(store.list_backups().unwrap().is_empty());
    }

    #[test]
    fn test_overwrite_backs_up_byte_exact() {
        let (_dir, store) = store();
        let now = Utc::now();
        store.write_snapshot(vec![record("p1", "A", now)], now).unwrap();
        let before = std::fs::read(store.canonical_path()).unwrap();

        let receipt = store
            .write_snapshot(vec![record("p2", "B", now)], now)
            .unwrap();
        let backup = receipt.backup.unwrap();
        assert_eq!(std::fs::read(store.dir().join(&backup)).unwrap(), before);
        assert!(receipt.last_updated > now);
    }

    #[test]
    fn test_backup_names_unique_within_millisecond() {
        let (_dir, store) = store();
        let now = Utc::now();
        store.write_snapshot(vec![record("p1", "A", now)], now).unwrap();
        let a = store.backup_current(now).unwrap().unwrap();
        let b = store.backup_current(now).unwrap().unwrap();
        assert_ne!(a, b);
        let listed = store.list_backups().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, b);
    }

    #[test]
    fn test_read_snapshot_tolerates_garbage() {
        let (_dir, store) = store();
        assert!(store.read_snapshot().is_none());
        std::fs::write(store.canonical_path(), b"{not json").unwrap();
        assert!(store.read_snapshot().is_none());
        assert!(store.health().is_none());
    }

    #[test]
    fn test_restore_rejects_bad_names_without_touching_files() {
        let (_dir, store) = store();
        let now = Utc::now();
        store.write_snapshot(vec![record("p1", "A", now)], now).unwrap();
        let before = std::fs::read(store.canonical_path()).unwrap();

        for name in ["../coins.json", "coins.json", "coins.json.bak.12a", "coins.json.bak.", "x/coins.json.bak.1"] {
            let err = store.restore(name, now).unwrap_err();
            assert!(matches!(err, StoreError::InvalidBackupName(_)), "{name}");
        }
        assert_eq!(std::fs::read(store.canonical_path()).unwrap(), before);
        assert!(store.list_backups().unwrap().is_empty());
    }

    #[test]
    fn test_restore_missing_backup_is_clean_error() {
        let (_dir, store) = store();
        let err = store.restore("coins.json.bak.123", Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::BackupUnreadable { .. }));
        assert!(!store.canonical_path().exists());
    }

    #[test]
    fn test_restore_round_trip() {
        let (_dir, store) = store();
        let now = Utc::now();
        store.write_snapshot(vec![record("p1", "A", now)], now).unwrap();
        let original = std::fs::read(store.canonical_path()).unwrap();
        let first_backup = store
            .write_snapshot(vec![record("p2", "B", now)], now)
            .unwrap()
            .backup
            .unwrap();

        let receipt = store.restore(&first_backup, now).unwrap();
        assert_eq!(std::fs::read(store.canonical_path()).unwrap(), original);
        assert!(receipt.backup.is_some());
        assert_eq!(store.list_backups().unwrap().len(), 2);
    }

    #[test]
    fn test_served_snapshot_falls_back_to_backup() {
        let (_dir, store) = store();
        let now = Utc::now();
        store.write_snapshot(vec![record("p1", "A", now)], now).unwrap();
        store.write_snapshot(Vec::new(), now).unwrap();

        let served = store.served_snapshot();
        assert!(matches!(served.source, SnapshotSource::Backup(_)));
        assert_eq!(served.snapshot.data[0].symbol, "A");
    }

    #[test]
    fn test_served_snapshot_empty_dir() {
        let (_dir, store) = store();
        let served = store.served_snapshot();
        assert_eq!(served.source, SnapshotSource::Empty);
        assert!(served.snapshot.last_updated.is_none());
    }

    #[test]
    fn test_validate_backups() {
        let (_dir, store) = store();
        std::fs::write(store.dir().join("coins.json.bak.1"), br#"{"data": [1, 2]}"#).unwrap();
        std::fs::write(store.dir().join("coins.json.bak.2"), br#"{"lastUpdated": null}"#).unwrap();
        std::fs::write(store.dir().join("coins.json.bak.3"), b"[]").unwrap();
        std::fs::write(store.dir().join("coins.json.bak.4"), b"oops").unwrap();

        let checks = store.validate_backups().unwrap();
        assert_eq!(checks.len(), 4);
        let by_name: HashMap<_, _> = checks.iter().map(|c| (c.name.as_str(), c)).collect();
        assert_eq!(by_name["coins.json.bak.1"].entries, Some(2));
        assert_eq!(by_name["coins.json.bak.2"].error.as_deref(), Some("missing data array"));
        assert_eq!(by_name["coins.json.bak.3"].error.as_deref(), Some("not an object"));
        assert!(!by_name["coins.json.bak.4"].is_ok());
    }

    #[test]
    fn test_merge_newer_wins() {
        let (_dir, store) = store();
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);
        store
            .write_snapshot(vec![record("p1", "OLD", t1), record("p2", "KEEP", t0)], t0)
            .unwrap();

        let incoming = vec![
            record("p1", "STALE", t0),
            record("p2", "FRESH", t1),
            record("p3", "NEW", t1),
            record("", "NOKEY", t1),
        ];
        let (report, receipt) = store.merge(incoming, t1).unwrap();
        assert_eq!(
            report,
            MergeReport {
                added: 1,
                updated: 1,
                skipped: 2,
                total: 3
            }
        );
        assert!(receipt.backup.is_some());

        let symbols: Vec<_> = store
            .read_snapshot()
            .unwrap()
            .data
            .into_iter()
            .map(|r| r.symbol)
            .collect();
        assert_eq!(symbols, vec!["OLD", "FRESH", "NEW"]);
    }

    #[test]
    fn test_metrics_round_trip_and_marker() {
        let (_dir, store) = store();
        let now = Utc::now();
        let metrics = DaemonMetrics {
            last_scrape: now,
            last_count: 0,
            consecutive_failures: 2,
            last_success_at: None,
        };
        store.write_metrics(&metrics).unwrap();
        assert_eq!(store.read_metrics().unwrap(), metrics);

        let marker = store.write_empty_marker(now).unwrap();
        let body: Value = serde_json::from_slice(&std::fs::read(marker).unwrap()).unwrap();
        assert_eq!(body["recordCount"], 0);
    }
}
