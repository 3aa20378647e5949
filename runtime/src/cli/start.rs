//! Run the supervised acquisition daemon in the foreground.

use crate::alert::AlertDispatcher;
use crate::cli::output;
use crate::config::DaemonConfig;
use crate::daemon::{Daemon, ShutdownSignal};
use crate::store::SnapshotStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Start the loop and block until it exits.
pub async fn run(config: DaemonConfig) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("cannot create data dir {}", config.data_dir.display()))?;

    info!(
        data_dir = %config.data_dir.display(),
        "starting pairwatch v{}",
        env!("CARGO_PKG_VERSION")
    );

    let store = SnapshotStore::new(&config.data_dir);
    let source = Arc::new(super::browser_source(&config));
    let alerts = AlertDispatcher::new(config.alert.clone());
    if !alerts.is_configured() {
        info!("no alert webhook configured; alerts will be skipped");
    }

    let shutdown = ShutdownSignal::new();
    spawn_signal_handlers(shutdown.clone());

    let mut daemon = Daemon::new(config, source, store, Arc::new(alerts), shutdown);
    let tracker = daemon.run().await;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "consecutiveFailures": tracker.consecutive_failures,
            "lastSuccessAt": tracker.last_success_at,
        }));
    }
    Ok(())
}

/// Flip `shutdown` on SIGINT or SIGTERM.
fn spawn_signal_handlers(shutdown: ShutdownSignal) {
    let on_int = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received SIGINT, finishing current tick");
            on_int.trigger();
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                if term.recv().await.is_some() {
                    info!("received SIGTERM, finishing current tick");
                    shutdown.trigger();
                }
            }
            Err(e) => warn!("cannot install SIGTERM handler: {e}"),
        }
    });
}
