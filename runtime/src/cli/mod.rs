//! CLI subcommand implementations for the pairwatch binary.

pub mod alert_cmd;
pub mod backups_cmd;
pub mod doctor;
pub mod merge_cmd;
pub mod output;
pub mod replay_cmd;
pub mod scrape_cmd;
pub mod snapshot_cmd;
pub mod start;
pub mod status;

use crate::acquisition::BrowserSource;
use crate::config::DaemonConfig;
use crate::renderer::chromium::ChromiumLauncher;
use crate::renderer::LaunchOptions;
use crate::store::SnapshotStore;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "pairwatch=info,pairwatch_runtime=info";
const VERBOSE_FILTER: &str = "pairwatch=debug,pairwatch_runtime=debug";

/// Install the global tracing subscriber. Logs go to stderr so stdout
/// carries only command output.
///
/// `RUST_LOG` overrides the default filter; `PAIRWATCH_LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER })
    });
    let json = std::env::var("PAIRWATCH_LOG_FORMAT")
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Environment configuration with the global `--data-dir` applied.
pub fn load_config(data_dir: Option<&Path>) -> DaemonConfig {
    let mut config = DaemonConfig::from_env();
    if let Some(dir) = data_dir {
        config.data_dir = dir.to_path_buf();
    }
    config
}

/// Chromium-backed record source for `config`.
pub fn browser_source(config: &DaemonConfig) -> BrowserSource {
    let launcher = ChromiumLauncher::new(LaunchOptions {
        headless: config.session.headless,
        chromium_path: config.session.chromium_path.clone(),
    });
    let source = BrowserSource::new(Arc::new(launcher), config.session.clone());
    if config.session.debug_artifacts {
        source.with_debug_store(SnapshotStore::new(&config.data_dir))
    } else {
        source
    }
}
