use crate::errors::ScanError;
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Prefix lengths we can enumerate usable hosts for. /31 and /32 have no
/// room for a network/broadcast split and are rejected.
pub const MIN_PREFIX: u8 = 1;
pub const MAX_PREFIX: u8 = 30;

/// Detect the local machine's primary non-loopback IPv4 address.
///
/// Interfaces are examined in enumeration order and the first usable
/// address wins. Fails when the machine has no usable IPv4 address, which
/// is fatal at startup: without it there is no network to scan.
pub fn detect_local_ipv4() -> Result<Ipv4Addr, ScanError> {
    let ifaces = get_if_addrs()
        .map_err(|e| ScanError::InvalidNetwork(format!("interface enumeration failed: {e}")))?;
    for iface in ifaces {
        if let IfAddr::V4(v4) = iface.addr {
            let ip = v4.ip;
            if !ip.is_loopback() && !ip.is_unspecified() {
                return Ok(ip);
            }
        }
    }
    Err(ScanError::InvalidNetwork(
        "no non-loopback IPv4 interface found".to_string(),
    ))
}

/// Enumerate the usable host addresses of the network containing `local`
/// with the given prefix length, in ascending order.
///
/// The network and broadcast addresses are excluded. Pure and
/// deterministic; performs no I/O.
pub fn host_range(local: Ipv4Addr, prefix: u8) -> Result<Vec<Ipv4Addr>, ScanError> {
    if !(MIN_PREFIX..=MAX_PREFIX).contains(&prefix) {
        return Err(ScanError::InvalidNetwork(format!(
            "prefix length /{prefix} out of range [{MIN_PREFIX}, {MAX_PREFIX}]"
        )));
    }
    let net = Ipv4Net::new(local, prefix)
        .map_err(|e| ScanError::InvalidNetwork(format!("bad network {local}/{prefix}: {e}")))?
        .trunc();
    Ok(expand_hosts(net))
}

/// Parse a `a.b.c.d/len` string into its address and prefix parts.
pub fn parse_cidr(s: &str) -> Result<(Ipv4Addr, u8), ScanError> {
    let (addr, prefix) = s
        .split_once('/')
        .ok_or_else(|| ScanError::InvalidNetwork(format!("expected CIDR notation, got {s:?}")))?;
    let addr: Ipv4Addr = addr.trim().parse()?;
    let prefix: u8 = prefix
        .trim()
        .parse()
        .map_err(|_| ScanError::InvalidNetwork(format!("bad prefix length in {s:?}")))?;
    Ok((addr, prefix))
}

fn expand_hosts(net: Ipv4Net) -> Vec<Ipv4Addr> {
    // Inclusive numeric range of the network, minus network and broadcast.
    let start = u32::from(net.network());
    let end = u32::from(net.broadcast());
    if end <= start + 1 {
        return Vec::new();
    }
    (start + 1..end).map(Ipv4Addr::from).collect()
}
