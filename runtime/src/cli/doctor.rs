//! Environment readiness check.

use crate::cli::output;
use crate::config::DaemonConfig;
use crate::renderer::chromium::find_chromium;
use crate::store::SnapshotStore;
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
struct Check {
    name: &'static str,
    ok: bool,
    detail: String,
}

/// Check the browser binary, data dir, snapshot and alert setup.
pub async fn run(config: &DaemonConfig) -> Result<()> {
    let mut checks = Vec::new();

    let chromium = config.session.chromium_path.clone().or_else(find_chromium);
    checks.push(match &chromium {
        Some(path) if path.exists() => Check {
            name: "chromium",
            ok: true,
            detail: path.display().to_string(),
        },
        Some(path) => Check {
            name: "chromium",
            ok: false,
            detail: format!("configured path does not exist: {}", path.display()),
        },
        None => Check {
            name: "chromium",
            ok: false,
            detail: "not found; set PAIRWATCH_CHROMIUM_PATH".into(),
        },
    });

    checks.push(data_dir_check(config));

    let store = SnapshotStore::new(&config.data_dir);
    checks.push(match store.health() {
        Some(h) => Check {
            name: "snapshot",
            ok: true,
            detail: format!("{} records", h.record_count),
        },
        None => Check {
            name: "snapshot",
            ok: true,
            detail: "none yet".into(),
        },
    });

    checks.push(Check {
        name: "alerts",
        ok: true,
        detail: match (&config.alert.webhook_url, &config.alert.secret) {
            (Some(url), Some(_)) => format!("{url} (signed)"),
            (Some(url), None) => url.clone(),
            (None, _) => "no webhook configured".into(),
        },
    });

    let ready = checks.iter().all(|c| c.ok);

    if output::is_json() {
        output::print_json(&serde_json::json!({ "ready": ready, "checks": checks }));
        return Ok(());
    }

    println!("Pairwatch Doctor");
    println!("================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();
    for c in &checks {
        let mark = if c.ok { "[OK]" } else { "[!!]" };
        println!("{mark} {:<9} {}", c.name, c.detail);
    }
    println!();
    println!("Status: {}", if ready { "READY" } else { "NOT READY" });
    Ok(())
}

fn data_dir_check(config: &DaemonConfig) -> Check {
    let dir = &config.data_dir;
    if let Err(e) = std::fs::create_dir_all(dir) {
        return Check {
            name: "data dir",
            ok: false,
            detail: format!("{}: {e}", dir.display()),
        };
    }
    let probe = dir.join(".doctor-probe");
    let writable = std::fs::write(&probe, b"ok").is_ok();
    let _ = std::fs::remove_file(&probe);
    Check {
        name: "data dir",
        ok: writable,
        detail: if writable {
            format!("{} is writable", dir.display())
        } else {
            format!("{} is not writable", dir.display())
        },
    }
}
