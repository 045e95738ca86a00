use crate::errors::ScanError;
use crate::probe;
use crate::types::{HostProbe, ScanSnapshot};
use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Knobs for one scan cycle. Defaults suit a /24 on a home network.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Upper bound on simultaneously probed addresses.
    pub concurrency: usize,
    pub ping_timeout: Duration,
    pub port_timeout: Duration,
    pub hostname_timeout: Duration,
    pub ssh_port: u16,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: 50,
            ping_timeout: Duration::from_secs(1),
            port_timeout: Duration::from_secs(1),
            hostname_timeout: Duration::from_millis(500),
            ssh_port: 22,
        }
    }
}

/// Probe every address once and collect the responsive ones.
///
/// - Limits in-flight probes with a `Semaphore`; each worker owns one
///   address's full probe sequence to completion.
/// - The echo probe runs first; the SSH, ARP, and hostname lookups run only
///   for addresses that answered, so dark addresses cost a single timeout.
/// - Returns only after every dispatched probe has finished or timed out:
///   a snapshot is never partial.
pub async fn run_cycle(addrs: &[Ipv4Addr], opts: &ScanOptions) -> ScanSnapshot {
    run_cycle_internal(addrs, opts, CancellationToken::new(), default_probe).await
}

/// Variant that accepts a `CancellationToken`. Cancellation stops handing
/// out new addresses; probes already in flight run out their own timeouts
/// rather than being killed mid-socket-operation. A cycle cut short this
/// way yields `ScanError::Interrupted` instead of a partial snapshot, so
/// callers can never merge one.
pub async fn run_cycle_with_cancel(
    addrs: &[Ipv4Addr],
    opts: &ScanOptions,
    cancel: CancellationToken,
) -> Result<ScanSnapshot, ScanError> {
    let snapshot = run_cycle_internal(addrs, opts, cancel.clone(), default_probe).await;
    if cancel.is_cancelled() {
        return Err(ScanError::Interrupted);
    }
    Ok(snapshot)
}

fn default_probe(
    addr: Ipv4Addr,
    opts: ScanOptions,
) -> impl Future<Output = Option<HostProbe>> + Send {
    async move { probe_host(addr, &opts).await }
}

async fn run_cycle_internal<F, Fut>(
    addrs: &[Ipv4Addr],
    opts: &ScanOptions,
    cancel: CancellationToken,
    probe_fn: F,
) -> ScanSnapshot
where
    F: Fn(Ipv4Addr, ScanOptions) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Option<HostProbe>> + Send + 'static,
{
    let sem = Arc::new(Semaphore::new(opts.concurrency.clamp(1, 512)));
    let mut set: JoinSet<Option<HostProbe>> = JoinSet::new();

    for &addr in addrs {
        if cancel.is_cancelled() {
            break;
        }
        let permit = sem
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore in scope");
        let opts = opts.clone();
        let probe_fn = probe_fn.clone();

        set.spawn(async move {
            let _permit = permit; // keep permit until the address is done
            probe_fn(addr, opts).await
        });
    }

    let mut hosts = Vec::new();
    while let Some(res) = set.join_next().await {
        if let Ok(Some(host)) = res {
            hosts.push(host);
        }
    }
    // Completion order depends on network timing; keep snapshots ordered.
    hosts.sort_by_key(|h| h.addr);
    ScanSnapshot { hosts }
}

/// One worker's job: reachability first, enrichment only on success. Any
/// individual probe failure degrades that field, never the whole host.
async fn probe_host(addr: Ipv4Addr, opts: &ScanOptions) -> Option<HostProbe> {
    let reply = probe::ping(addr, opts.ping_timeout).await;
    if !reply.reachable {
        return None;
    }

    let (ssh_open, mac, hostname) = tokio::join!(
        probe::check_port(addr, opts.ssh_port, opts.port_timeout),
        probe::lookup_mac(addr),
        probe::lookup_hostname(addr, opts.hostname_timeout),
    );

    Some(HostProbe {
        addr,
        latency_ms: reply.latency_ms,
        ssh_open,
        mac,
        hostname,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_host(addr: Ipv4Addr) -> HostProbe {
        HostProbe {
            addr,
            latency_ms: Some(1.0),
            ssh_open: false,
            mac: None,
            hostname: None,
        }
    }

    #[tokio::test]
    async fn empty_address_list_yields_empty_snapshot() {
        let snapshot = run_cycle(&[], &ScanOptions::default()).await;
        assert!(snapshot.hosts.is_empty());
    }

    #[tokio::test]
    async fn cancelled_cycle_is_reported_not_merged() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let addrs = vec![Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2)];
        let opts = ScanOptions {
            ping_timeout: Duration::from_millis(100),
            ..ScanOptions::default()
        };
        let start = std::time::Instant::now();
        let result = run_cycle_with_cancel(&addrs, &opts, cancel).await;
        assert!(matches!(result, Err(ScanError::Interrupted)));
        // Nothing was dispatched, so no probe timeout was paid.
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn one_slow_probe_does_not_serialize_the_cycle() {
        let addrs: Vec<Ipv4Addr> = (1..=8).map(|i| Ipv4Addr::new(192, 0, 2, i)).collect();
        let slow = Ipv4Addr::new(192, 0, 2, 5);
        let opts = ScanOptions {
            concurrency: 8,
            ..ScanOptions::default()
        };

        let start = std::time::Instant::now();
        let snapshot = run_cycle_internal(
            &addrs,
            &opts,
            CancellationToken::new(),
            move |addr, _opts| async move {
                let delay = if addr == slow {
                    Duration::from_millis(200)
                } else {
                    Duration::from_millis(10)
                };
                tokio::time::sleep(delay).await;
                Some(stub_host(addr))
            },
        )
        .await;
        let elapsed = start.elapsed();

        // The cycle waits for its slowest probe but runs the rest alongside
        // it: total time tracks one slow probe, not eight.
        assert_eq!(snapshot.hosts.len(), 8);
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn concurrency_limit_bounds_the_fan_out() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let addrs: Vec<Ipv4Addr> = (1..=6).map(|i| Ipv4Addr::new(192, 0, 2, i)).collect();
        let opts = ScanOptions {
            concurrency: 2,
            ..ScanOptions::default()
        };
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let in_flight_probe = in_flight.clone();
        let peak_probe = peak.clone();
        run_cycle_internal(
            &addrs,
            &opts,
            CancellationToken::new(),
            move |addr, _opts| {
                let in_flight = in_flight_probe.clone();
                let peak = peak_probe.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Some(stub_host(addr))
                }
            },
        )
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
