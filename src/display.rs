use crate::types::{format_rfc3339, HostRecord, PingQuality, Staleness};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::time::Duration;
use time::OffsetDateTime;

const GREEN_BG: &str = "\x1b[42m\x1b[30m";
const RESET: &str = "\x1b[0m";
const RULE_WIDTH: usize = 100;

/// Clear the terminal and draw the current registry view.
pub fn render_live(
    view: &[&HostRecord],
    newly_joined: &BTreeSet<Ipv4Addr>,
    cycle: u64,
    cycle_duration: Duration,
    interval_secs: u64,
    now: OffsetDateTime,
) {
    print!("\x1b[2J\x1b[H");
    print!(
        "{}",
        render_table(view, newly_joined, cycle, cycle_duration, interval_secs, now)
    );
}

/// Build the full frame as a string so tests can inspect it.
pub fn render_table(
    view: &[&HostRecord],
    newly_joined: &BTreeSet<Ipv4Addr>,
    cycle: u64,
    cycle_duration: Duration,
    interval_secs: u64,
    now: OffsetDateTime,
) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);

    out.push_str(&rule);
    out.push_str("\nLIVE NETWORK MONITOR - reachable hosts with SSH detection\n");
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!("Time: {}\n", format_rfc3339(now)));
    out.push_str(&format!(
        "Scan #{} | Duration: {:.2}s | Refresh: {}s\n",
        cycle,
        cycle_duration.as_secs_f64(),
        interval_secs
    ));

    let online = view
        .iter()
        .filter(|r| r.staleness(now) == Staleness::Online)
        .count();
    out.push_str(&format!("Online hosts: {} / {} known\n", online, view.len()));

    // Summary stats describe the hosts answering right now; dark hosts
    // keep their rows but their stale measurements stay out of averages.
    let pings: Vec<f64> = view
        .iter()
        .filter(|r| r.staleness(now) == Staleness::Online)
        .filter_map(|r| r.last_ping_ms)
        .collect();
    if !pings.is_empty() {
        let avg = pings.iter().sum::<f64>() / pings.len() as f64;
        let ssh = view
            .iter()
            .filter(|r| r.staleness(now) == Staleness::Online && r.ssh_open)
            .count();
        out.push_str(&format!(
            "Average ping: {avg:.1}ms | SSH open: {ssh}/{online}\n"
        ));
    }
    out.push_str(&rule);
    out.push('\n');

    if view.is_empty() {
        out.push_str("\nNo hosts found yet. Devices may be off or the network unreachable.\n");
        return out;
    }

    out.push_str(&format!(
        "\n    {:<4} {:<17} {:<25} {:<20} {:<12} {:<6} {:<10}\n",
        "#", "IP Address", "Hostname", "MAC Address", "Ping", "SSH", "Status"
    ));
    out.push_str(&format!("{}\n", "-".repeat(RULE_WIDTH)));

    for (idx, record) in view.iter().enumerate() {
        let is_new = newly_joined.contains(&record.addr);
        let line = format_row(record, idx + 1, now);
        if is_new {
            out.push_str(&format!("{GREEN_BG}NEW {line}{RESET}\n"));
        } else {
            out.push_str(&format!("    {line}\n"));
        }
    }
    out.push_str(&rule);
    out.push('\n');
    out.push_str("\nPress Ctrl+C to stop monitoring.\n");
    out
}

fn format_row(record: &HostRecord, idx: usize, now: OffsetDateTime) -> String {
    let hostname = truncate(record.hostname.as_deref().unwrap_or("Unknown"), 25);
    let mac = record.mac.as_deref().unwrap_or("N/A");
    let ping = match record.last_ping_ms {
        Some(ms) => format!("{} {}", record.ping_quality().marker(), format_ping(ms)),
        None => format!("{} -", PingQuality::Slow.marker()),
    };
    let ssh = if record.ssh_open { "Yes" } else { "No" };
    format!(
        "{:<4} {:<17} {:<25} {:<20} {:<12} {:<6} {:<10}",
        idx,
        record.addr,
        hostname,
        mac,
        ping,
        ssh,
        record.staleness(now).label()
    )
}

fn format_ping(ms: f64) -> String {
    if ms < 1.0 {
        format!("{ms:.2}ms")
    } else if ms < 10.0 {
        format!("{ms:.1}ms")
    } else {
        format!("{ms:.0}ms")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let keep: String = s.chars().take(max.saturating_sub(2)).collect();
        format!("{keep}..")
    } else {
        s.to_string()
    }
}

/// Printed once after the monitor loop exits.
pub fn render_shutdown(total_cycles: u64, now: OffsetDateTime) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!(
        "{rule}\nLive monitoring stopped.\n{rule}\nTotal scans performed: {total_cycles}\nSession ended at: {}\n",
        format_rfc3339(now)
    )
}
