//! Print the snapshot a reader would be served.

use crate::cli::output;
use crate::config::DaemonConfig;
use crate::store::{SnapshotSource, SnapshotStore};
use anyhow::Result;

pub async fn run(config: &DaemonConfig, limit: Option<usize>) -> Result<()> {
    let served = SnapshotStore::new(&config.data_dir).served_snapshot();

    if output::is_json() {
        output::print_json(&served);
        return Ok(());
    }

    match &served.source {
        SnapshotSource::Canonical => {}
        SnapshotSource::Backup(name) => println!("  (canonical snapshot empty, showing {name})"),
        SnapshotSource::Empty => {
            println!("  No data.");
            return Ok(());
        }
    }
    if let Some(updated) = served.snapshot.last_updated {
        println!("  Updated {}", updated.to_rfc3339());
    }

    println!(
        "  {:<10} {:<24} {:>14} {:>12} {:>12} {:>12} {:>8}",
        "SYMBOL", "NAME", "PRICE", "LIQUIDITY", "MCAP", "VOL 24H", "24H %"
    );
    let shown = limit.unwrap_or(usize::MAX);
    for r in served.snapshot.data.iter().take(shown) {
        println!(
            "  {:<10} {:<24} {:>14} {:>12.0} {:>12.0} {:>12.0} {:>8.2}",
            clip(&r.symbol, 10),
            clip(&r.name, 24),
            format!("{:.8}", r.price_usd)
                .trim_end_matches('0')
                .trim_end_matches('.'),
            r.liquidity,
            r.market_cap,
            r.volume_24h,
            r.price_change_24h
        );
    }
    Ok(())
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
