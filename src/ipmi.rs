//! IPMI access layer: ipmitool transport, telemetry parsers, typed client.

use thiserror::Error;

pub mod client;
pub mod parser;
pub mod transport;

pub use client::IpmiClient;
pub use transport::{IpmiConnection, IpmiTransport, IpmitoolTransport};

/// Errors raised while talking to a BMC through ipmitool.
#[derive(Debug, Error)]
pub enum IpmiError {
    #[error("failed to launch ipmitool: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("ipmitool exited with {status}: {stderr}")]
    CommandFailed { status: i32, stderr: String },

    #[error("ipmitool did not complete within {0:?}")]
    Timeout(std::time::Duration),

    #[error("fan speed must be between 0 and 100, got {0}")]
    InvalidFanSpeed(i64),
}
