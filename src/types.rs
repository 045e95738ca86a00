use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use time::format_description::well_known;
use time::OffsetDateTime;

/// Measurements taken for one responsive address during a single cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct HostProbe {
    pub addr: Ipv4Addr,
    /// Round-trip time of the echo probe; `None` if the reply could not be timed.
    pub latency_ms: Option<f64>,
    pub ssh_open: bool,
    pub mac: Option<String>,
    pub hostname: Option<String>,
}

/// Everything one cycle learned. Only responsive addresses appear here;
/// the registry infers staleness for the rest from elapsed time.
#[derive(Debug, Clone, Default)]
pub struct ScanSnapshot {
    pub hosts: Vec<HostProbe>,
}

impl ScanSnapshot {
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.hosts.iter().any(|h| h.addr == addr)
    }
}

/// Durable per-host state, one per address ever observed alive.
/// Records are created on first response and never removed; a host that
/// goes dark keeps its history and ages into a stale classification.
#[derive(Debug, Clone)]
pub struct HostRecord {
    pub addr: Ipv4Addr,
    pub hostname: Option<String>,
    pub mac: Option<String>,
    pub last_ping_ms: Option<f64>,
    pub ssh_open: bool,
    pub first_seen: OffsetDateTime,
    pub last_seen: OffsetDateTime,
    pub scan_count: u64,
}

impl HostRecord {
    pub fn staleness(&self, now: OffsetDateTime) -> Staleness {
        Staleness::classify(now, self.last_seen)
    }

    pub fn ping_quality(&self) -> PingQuality {
        PingQuality::classify(self.last_ping_ms)
    }
}

/// How long ago a host last answered a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Online,
    Recent,
    Old,
}

impl Staleness {
    /// Online under 10s since last response, Recent under 30s, Old beyond.
    pub fn classify(now: OffsetDateTime, last_seen: OffsetDateTime) -> Self {
        let age = (now - last_seen).as_seconds_f64();
        if age < 10.0 {
            Staleness::Online
        } else if age < 30.0 {
            Staleness::Recent
        } else {
            Staleness::Old
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Staleness::Online => "Online",
            Staleness::Recent => "Recent",
            Staleness::Old => "Old",
        }
    }
}

/// Coarse latency bucket for display purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingQuality {
    Excellent,
    Good,
    Fair,
    Slow,
}

impl PingQuality {
    /// Excellent under 10ms, Good through 50ms, Fair through 100ms,
    /// Slow beyond that or when no latency is available.
    pub fn classify(latency_ms: Option<f64>) -> Self {
        match latency_ms {
            Some(ms) if ms < 10.0 => PingQuality::Excellent,
            Some(ms) if ms <= 50.0 => PingQuality::Good,
            Some(ms) if ms <= 100.0 => PingQuality::Fair,
            _ => PingQuality::Slow,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            PingQuality::Excellent => "++",
            PingQuality::Good => "+",
            PingQuality::Fair => "~",
            PingQuality::Slow => "!",
        }
    }
}

/// Flattened, serializable row for the optional per-cycle JSON dump.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HostRow {
    pub ip: String,
    pub hostname: Option<String>,
    pub mac: Option<String>,
    pub ping_ms: Option<f64>,
    pub ssh_open: bool,
    pub first_seen: String,
    pub last_seen: String,
    pub scan_count: u64,
    pub status: String,
    pub newly_joined: bool,
}

impl HostRow {
    pub fn from_record(record: &HostRecord, now: OffsetDateTime, newly_joined: bool) -> Self {
        Self {
            ip: record.addr.to_string(),
            hostname: record.hostname.clone(),
            mac: record.mac.clone(),
            ping_ms: record.last_ping_ms,
            ssh_open: record.ssh_open,
            first_seen: format_rfc3339(record.first_seen),
            last_seen: format_rfc3339(record.last_seen),
            scan_count: record.scan_count,
            status: record.staleness(now).label().to_string(),
            newly_joined,
        }
    }
}

pub fn format_rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
