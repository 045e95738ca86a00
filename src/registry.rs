use crate::types::{HostRecord, ScanSnapshot};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::net::Ipv4Addr;
use time::OffsetDateTime;

/// What one merge produced, beyond the registry's own state change.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Addresses present this cycle that were absent from the previous
    /// cycle's snapshot. A host that flaps is reported again on each
    /// rejoin; this is a per-transition signal, not a once-ever flag.
    pub newly_joined: BTreeSet<Ipv4Addr>,
    /// Number of merges performed so far, this one included.
    pub cycle: u64,
}

/// Durable host state across cycles.
///
/// Owns the address -> record mapping plus exactly one prior snapshot's
/// address set (for the newly-joined comparison). Records are created on
/// first sighting and never deleted; hosts that stop answering keep their
/// history and are reclassified by elapsed time on read.
#[derive(Debug, Default)]
pub struct HostRegistry {
    records: BTreeMap<Ipv4Addr, HostRecord>,
    prev_cycle: HashSet<Ipv4Addr>,
    cycles: u64,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one cycle's snapshot into the registry.
    ///
    /// Per-field rules for an already-known address:
    /// - `last_seen`, `scan_count`, `last_ping_ms`, `ssh_open` always take
    ///   this cycle's values;
    /// - `hostname` and `mac` are overwritten only when the new lookup
    ///   produced a value, otherwise the last known value is retained
    ///   (ARP entries in particular persist even when not re-queried);
    /// - `first_seen` is set at creation and never touched again.
    ///
    /// Addresses missing from the snapshot are left entirely unmodified.
    pub fn merge(&mut self, snapshot: &ScanSnapshot, now: OffsetDateTime) -> MergeOutcome {
        self.cycles += 1;
        let mut current = HashSet::with_capacity(snapshot.hosts.len());

        for probe in &snapshot.hosts {
            current.insert(probe.addr);
            match self.records.get_mut(&probe.addr) {
                Some(record) => {
                    record.last_seen = now;
                    record.scan_count += 1;
                    record.last_ping_ms = probe.latency_ms;
                    record.ssh_open = probe.ssh_open;
                    if probe.hostname.is_some() {
                        record.hostname = probe.hostname.clone();
                    }
                    if probe.mac.is_some() {
                        record.mac = probe.mac.clone();
                    }
                }
                None => {
                    self.records.insert(
                        probe.addr,
                        HostRecord {
                            addr: probe.addr,
                            hostname: probe.hostname.clone(),
                            mac: probe.mac.clone(),
                            last_ping_ms: probe.latency_ms,
                            ssh_open: probe.ssh_open,
                            first_seen: now,
                            last_seen: now,
                            scan_count: 1,
                        },
                    );
                }
            }
        }

        let newly_joined: BTreeSet<Ipv4Addr> =
            current.difference(&self.prev_cycle).copied().collect();
        self.prev_cycle = current;

        MergeOutcome {
            newly_joined,
            cycle: self.cycles,
        }
    }

    /// Every record ever created, ascending by numeric address. The order
    /// is stable across cycles so a display can keep row positions.
    pub fn view(&self) -> Vec<&HostRecord> {
        self.records.values().collect()
    }

    pub fn get(&self, addr: Ipv4Addr) -> Option<&HostRecord> {
        self.records.get(&addr)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
