use std::net::AddrParseError;
use thiserror::Error;

/// Errors surfaced by the scan core. Probe failures are not errors: a probe
/// that times out or is refused reports a negative result instead.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    #[error("invalid address: {0}")]
    AddrParse(#[from] AddrParseError),

    #[error("scan interrupted before completion")]
    Interrupted,
}
