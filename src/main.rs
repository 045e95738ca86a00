use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use time::OffsetDateTime;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use lan_watch_rs::registry::{HostRegistry, MergeOutcome};
use lan_watch_rs::scanner::ScanOptions;
use lan_watch_rs::types::HostRow;
use lan_watch_rs::{display, netdetect, scanner};

const MIN_INTERVAL_SECS: u64 = 3;
const MAX_INTERVAL_SECS: u64 = 60;

/// lan-watch-rs — live LAN host monitor with SSH, MAC and hostname detection.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "lan-watch-rs",
    version,
    about = "Continuously scans the local IPv4 subnet and renders a live table of reachable hosts.",
    long_about = None
)]
struct Cli {
    /// Refresh interval in seconds (clamped to 3-60).
    #[arg(default_value_t = 10)]
    interval: u64,

    /// CIDR to scan (e.g., 192.168.1.0/24). If omitted, derived from the
    /// first non-loopback interface address.
    #[arg(long)]
    cidr: Option<String>,

    /// Prefix length applied to the detected local address.
    #[arg(long, default_value_t = 24)]
    prefix: u8,

    /// Max concurrent address probes.
    #[arg(long, default_value_t = 50)]
    concurrency: usize,

    /// Echo probe timeout in milliseconds.
    #[arg(long = "ping-timeout-ms", default_value_t = 1000)]
    ping_timeout_ms: u64,

    /// TCP connect timeout in milliseconds for the SSH check.
    #[arg(long = "port-timeout-ms", default_value_t = 1000)]
    port_timeout_ms: u64,

    /// Port probed for SSH availability.
    #[arg(long = "ssh-port", default_value_t = 22)]
    ssh_port: u16,

    /// Write the current view as pretty JSON to this path after each cycle.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run a single cycle and exit instead of looping.
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let interval = clamp_interval(cli.interval);
    let (local, prefix) = match cli.cidr.as_deref() {
        Some(cidr) => netdetect::parse_cidr(cidr).context("failed to parse --cidr")?,
        None => {
            let ip = netdetect::detect_local_ipv4()
                .context("failed to determine local network; pass --cidr explicitly")?;
            (ip, cli.prefix)
        }
    };
    let addrs = netdetect::host_range(local, prefix)
        .with_context(|| format!("cannot enumerate hosts of {local}/{prefix}"))?;

    let opts = ScanOptions {
        concurrency: cli.concurrency,
        ping_timeout: Duration::from_millis(cli.ping_timeout_ms.max(1)),
        port_timeout: Duration::from_millis(cli.port_timeout_ms.max(1)),
        ssh_port: cli.ssh_port,
        ..ScanOptions::default()
    };

    println!("Starting live network monitor");
    println!("  local address : {local}");
    println!("  network       : {local}/{prefix} ({} hosts)", addrs.len());
    println!("  refresh       : {interval}s");

    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    let mut registry = HostRegistry::new();
    loop {
        let started = Instant::now();
        let snapshot = match scanner::run_cycle_with_cancel(&addrs, &opts, cancel.clone()).await {
            Ok(snapshot) => snapshot,
            // Interrupted mid-scan: the partial cycle is discarded, never merged.
            Err(_) => break,
        };
        let cycle_duration = started.elapsed();

        let now = OffsetDateTime::now_utc();
        let outcome = registry.merge(&snapshot, now);
        display::render_live(
            &registry.view(),
            &outcome.newly_joined,
            outcome.cycle,
            cycle_duration,
            interval,
            now,
        );

        if let Some(path) = cli.output.as_deref() {
            if let Err(e) = write_view_json(path, &registry, &outcome, now) {
                eprintln!("Failed to write JSON to {}: {e}", path.display());
            }
        }

        if cli.once {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            _ = cancel.cancelled() => break,
        }
    }

    print!(
        "{}",
        display::render_shutdown(registry.cycles(), OffsetDateTime::now_utc())
    );
    Ok(())
}

fn clamp_interval(requested: u64) -> u64 {
    if requested < MIN_INTERVAL_SECS {
        eprintln!("Minimum interval is {MIN_INTERVAL_SECS} seconds. Using {MIN_INTERVAL_SECS}.");
        MIN_INTERVAL_SECS
    } else if requested > MAX_INTERVAL_SECS {
        eprintln!("Maximum interval is {MAX_INTERVAL_SECS} seconds. Using {MAX_INTERVAL_SECS}.");
        MAX_INTERVAL_SECS
    } else {
        requested
    }
}

fn write_view_json(
    path: &std::path::Path,
    registry: &HostRegistry,
    outcome: &MergeOutcome,
    now: OffsetDateTime,
) -> Result<()> {
    let rows: Vec<HostRow> = registry
        .view()
        .into_iter()
        .map(|r| HostRow::from_record(r, now, outcome.newly_joined.contains(&r.addr)))
        .collect();
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &rows)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_clamped_to_bounds() {
        assert_eq!(clamp_interval(1), 3);
        assert_eq!(clamp_interval(10), 10);
        assert_eq!(clamp_interval(120), 60);
    }
}
