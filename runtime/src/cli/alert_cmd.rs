//! Send a test alert through the configured webhook.

use crate::alert::{AlertDispatcher, AlertSink, DeliveryResult};
use crate::cli::output;
use crate::config::DaemonConfig;
use anyhow::{bail, Result};

pub async fn run(config: &DaemonConfig, title: &str, body: &str) -> Result<()> {
    let result = AlertDispatcher::new(config.alert.clone())
        .send(title, body)
        .await;

    if output::is_json() {
        output::print_json(&result);
    } else {
        output::say(format!("  Alert: {}", result.summary()));
    }

    if let DeliveryResult::Failed { attempts, .. } = result {
        bail!("alert delivery failed after {attempts} attempt(s)");
    }
    Ok(())
}
