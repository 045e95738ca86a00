use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::{self, Instant};

/// Outcome of one reachability probe. A timeout or transport error is a
/// normal negative result, never an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingReply {
    pub reachable: bool,
    pub latency_ms: Option<f64>,
}

impl PingReply {
    pub const DARK: PingReply = PingReply {
        reachable: false,
        latency_ms: None,
    };
}

/// Send one ICMP echo via the system `ping` binary, bounded by `timeout`.
///
/// Latency is taken from the `time=` field of the ping output when present,
/// falling back to the measured wall-clock round trip of the command.
pub async fn ping(addr: Ipv4Addr, timeout: Duration) -> PingReply {
    let mut cmd = ping_command(addr, timeout);
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    // `ping -W` only takes whole seconds, so the process wait is just a
    // hint; the caller's budget is enforced here and the child is killed
    // on expiry.
    let start = Instant::now();
    let output = match time::timeout(timeout, cmd.output()).await {
        Ok(Ok(out)) => out,
        _ => return PingReply::DARK,
    };
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    if !output.status.success() {
        return PingReply::DARK;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    PingReply {
        reachable: true,
        latency_ms: Some(parse_latency_ms(&stdout).unwrap_or(elapsed_ms)),
    }
}

#[cfg(target_os = "windows")]
fn ping_command(addr: Ipv4Addr, timeout: Duration) -> Command {
    let wait_ms = timeout.as_millis().max(1).to_string();
    let target = addr.to_string();
    let mut cmd = Command::new("ping");
    cmd.args(["-n", "1", "-w", wait_ms.as_str(), target.as_str()]);
    cmd
}

#[cfg(not(target_os = "windows"))]
fn ping_command(addr: Ipv4Addr, timeout: Duration) -> Command {
    let wait_secs = timeout.as_secs().max(1).to_string();
    let target = addr.to_string();
    let mut cmd = Command::new("ping");
    cmd.args(["-c", "1", "-W", wait_secs.as_str(), target.as_str()]);
    cmd
}

/// Extract the reported round-trip time in milliseconds from ping output,
/// e.g. `64 bytes from 192.168.1.1: icmp_seq=1 ttl=64 time=3.42 ms`.
pub fn parse_latency_ms(output: &str) -> Option<f64> {
    let rest = output.split("time=").nth(1)?;
    let token = rest.split_whitespace().next()?;
    token.trim_end_matches("ms").parse::<f64>().ok()
}

/// TCP connect probe: true only when a handshake completes within `timeout`.
/// No protocol negotiation is attempted; refused, filtered, and timed-out
/// connections all report closed.
pub async fn check_port(addr: Ipv4Addr, port: u16, timeout: Duration) -> bool {
    let sockaddr = SocketAddr::new(IpAddr::V4(addr), port);
    matches!(
        time::timeout(timeout, TcpStream::connect(sockaddr)).await,
        Ok(Ok(_))
    )
}

/// Read the hardware address for `addr` from the system ARP cache.
///
/// The cache is populated as a side effect of successful reachability
/// probes, so this only works for hosts that recently answered. Incomplete
/// entries and lookup failures both yield `None`.
pub async fn lookup_mac(addr: Ipv4Addr) -> Option<String> {
    let target = addr.to_string();
    let mut cmd = Command::new("arp");
    cmd.args(["-n", target.as_str()])
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let output = time::timeout(Duration::from_secs(1), cmd.output())
        .await
        .ok()?
        .ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_arp_output(&stdout, &target)
}

/// Pick the MAC column out of `arp -n` output for the requested address.
pub fn parse_arp_output(output: &str, target: &str) -> Option<String> {
    for line in output.lines() {
        if !line.split_whitespace().any(|field| field.trim_matches(|c| c == '(' || c == ')') == target) {
            continue;
        }
        for field in line.split_whitespace() {
            if field.contains(':') && field != "(incomplete)" && looks_like_mac(field) {
                return Some(field.to_uppercase());
            }
        }
    }
    None
}

fn looks_like_mac(s: &str) -> bool {
    let parts: Vec<&str> = s.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Reverse-DNS lookup with a hard upper bound so one unresolvable host
/// cannot stall the whole cycle. The resolver call is blocking, so it runs
/// on the blocking pool.
pub async fn lookup_hostname(addr: Ipv4Addr, timeout: Duration) -> Option<String> {
    let ip = IpAddr::V4(addr);
    let task = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip).ok());
    match time::timeout(timeout, task).await {
        Ok(Ok(name)) => name,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_parsed_from_linux_ping_output() {
        let out = "64 bytes from 192.168.1.1: icmp_seq=1 ttl=64 time=3.42 ms\n";
        assert_eq!(parse_latency_ms(out), Some(3.42));
    }

    #[test]
    fn latency_parsed_without_space_before_unit() {
        let out = "Reply from 192.168.1.1: bytes=32 time=12ms TTL=64\n";
        assert_eq!(parse_latency_ms(out), Some(12.0));
    }

    #[test]
    fn latency_absent_when_no_time_field() {
        assert_eq!(parse_latency_ms("Request timeout for icmp_seq 0\n"), None);
    }

    #[test]
    fn arp_output_yields_mac_for_matching_line() {
        let out = "\
Address                  HWtype  HWaddress           Flags Mask            Iface
192.168.1.1              ether   a4:2b:b0:c1:d2:e3   C                     eth0
192.168.1.7              ether   (incomplete)                              eth0
";
        assert_eq!(
            parse_arp_output(out, "192.168.1.1"),
            Some("A4:2B:B0:C1:D2:E3".to_string())
        );
        assert_eq!(parse_arp_output(out, "192.168.1.7"), None);
        assert_eq!(parse_arp_output(out, "192.168.1.9"), None);
    }

    #[test]
    fn arp_output_handles_bsd_style_lines() {
        let out = "? (192.168.1.5) at 08:00:27:aa:bb:cc on en0 ifscope [ethernet]\n";
        assert_eq!(
            parse_arp_output(out, "192.168.1.5"),
            Some("08:00:27:AA:BB:CC".to_string())
        );
    }

    #[tokio::test]
    async fn dark_address_probe_honors_sub_second_timeout() {
        // TEST-NET-1 address; nothing answers there. Even though `-W` is
        // rounded up to a full second, the caller's budget must win.
        let start = std::time::Instant::now();
        let reply = ping(Ipv4Addr::new(192, 0, 2, 1), Duration::from_millis(100)).await;
        assert_eq!(reply, PingReply::DARK);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn closed_port_reports_false_quickly() {
        // Port 1 on loopback is essentially never listening.
        let open = check_port(Ipv4Addr::LOCALHOST, 1, Duration::from_millis(500)).await;
        assert!(!open);
    }
}
