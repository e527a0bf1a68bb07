use crate::codec::{handshake_packet, read_status_response, status_request_packet};
use crate::status::{ServerStatus, StatusResponse};
use crate::QueryError;
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

pub const DEFAULT_PORT: u16 = 25565;

/// `host[:port]` of a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn parse(input: &str) -> Result<Self, QueryError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(QueryError::InvalidAddress(input.to_string()));
        }

        // Bracketed IPv6: [::1]:25565
        if let Some(rest) = input.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| QueryError::InvalidAddress(input.to_string()))?;
            let port = match tail.strip_prefix(':') {
                Some(p) => parse_port(p, input)?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(QueryError::InvalidAddress(input.to_string())),
            };
            return Ok(Self {
                host: host.to_string(),
                port,
            });
        }

        match input.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => {
                if host.is_empty() {
                    return Err(QueryError::InvalidAddress(input.to_string()));
                }
                Ok(Self {
                    host: host.to_string(),
                    port: parse_port(port, input)?,
                })
            }
            // Bare IPv6 without brackets or no port at all
            _ => Ok(Self {
                host: input.to_string(),
                port: DEFAULT_PORT,
            }),
        }
    }
}

fn parse_port(port: &str, input: &str) -> Result<u16, QueryError> {
    port.parse::<u16>()
        .map_err(|_| QueryError::InvalidAddress(input.to_string()))
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Server List Ping client
#[derive(Debug, Clone)]
pub struct StatusClient {
    timeout: Duration,
}

impl StatusClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Query `address` for its status. The whole exchange (resolve, connect,
    /// request, response) shares one deadline.
    pub async fn status(&self, address: &ServerAddress) -> Result<ServerStatus, QueryError> {
        match tokio::time::timeout(self.timeout, self.exchange(address)).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout(self.timeout)),
        }
    }

    async fn exchange(&self, address: &ServerAddress) -> Result<ServerStatus, QueryError> {
        let target = resolve(address).await?;
        debug!("Querying {} ({})", address, target);

        let started = Instant::now();
        let mut stream = TcpStream::connect(target).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                QueryError::Refused(address.to_string())
            } else {
                QueryError::Io(e)
            }
        })?;

        stream
            .write_all(&handshake_packet(&address.host, address.port))
            .await?;
        stream.write_all(&status_request_packet()).await?;
        stream.flush().await?;

        let json = read_status_response(&mut stream).await?;
        let latency = started.elapsed();
        let response: StatusResponse = serde_json::from_str(&json)?;
        Ok(ServerStatus::from_response(response, latency))
    }
}

async fn resolve(address: &ServerAddress) -> Result<SocketAddr, QueryError> {
    let mut addrs = tokio::net::lookup_host((address.host.as_str(), address.port))
        .await
        .map_err(|e| QueryError::Resolve {
            host: address.host.clone(),
            reason: e.to_string(),
        })?;
    addrs.next().ok_or_else(|| QueryError::Resolve {
        host: address.host.clone(),
        reason: "no addresses returned".to_string(),
    })
}
