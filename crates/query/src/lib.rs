// Craftwatch Status Query
//
// Minimal Minecraft Server List Ping client: handshake, status request,
// JSON status response.

pub mod client;
pub mod codec;
pub mod status;

use std::time::Duration;
use thiserror::Error;

pub use client::{ServerAddress, StatusClient, DEFAULT_PORT};
pub use status::{ServerStatus, StatusResponse};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),
    #[error("could not resolve {host}: {reason}")]
    Resolve { host: String, reason: String },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection refused by {0}")]
    Refused(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueryError {
    /// Operator hint for the likely cause
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout(_) => {
                Some("Timeout - server may not be externally accessible (firewall/port forwarding?)")
            }
            Self::Refused(_) => Some("Connection refused - server may be offline or port blocked"),
            Self::Resolve { .. } => Some(
                "DNS error - check dynamic DNS configuration, internet connection and the domain",
            ),
            _ => None,
        }
    }
}
