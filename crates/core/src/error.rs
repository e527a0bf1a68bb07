//! Craftwatch Error Types
//!
//! This module defines a layered error hierarchy:
//! - `DomainError`: failures of the monitor's own rules (config, log source, publish)
//! - `InfraError`: failures of the systems underneath (IO, serialization, network)
//! - `CraftwatchError`: top-level error that wraps both categories

use std::fmt;

/// Domain-level errors
#[derive(Debug)]
pub enum DomainError {
    /// Configuration file not found at the specified path
    ConfigNotFound { path: String },
    /// Configuration validation failed
    ConfigInvalid { field: String, reason: String },
    /// Configuration parsing failed
    ConfigParse { source: String },
    /// Log source missing or unreadable
    SourceUnavailable { source: String, reason: String },
    /// Publish attempt abandoned after its deadline
    PublishTimeout { after_ms: u64 },
    /// Publish attempt rejected by the sink
    Publish { reason: String },
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigNotFound { path } => write!(f, "Config not found: {}", path),
            Self::ConfigInvalid { field, reason } => {
                write!(f, "Config invalid [{}]: {}", field, reason)
            }
            Self::ConfigParse { source } => write!(f, "Config parse error: {}", source),
            Self::SourceUnavailable { source, reason } => {
                write!(f, "Source '{}' unavailable: {}", source, reason)
            }
            Self::PublishTimeout { after_ms } => {
                write!(f, "Publish timed out after {}ms", after_ms)
            }
            Self::Publish { reason } => write!(f, "Publish failed: {}", reason),
        }
    }
}

impl std::error::Error for DomainError {}

/// Infrastructure-level errors
#[derive(Debug)]
pub enum InfraError {
    /// IO operation failed
    Io(std::io::Error),
    /// JSON serialization/deserialization failed
    Json(serde_json::Error),
    /// YAML serialization/deserialization failed
    Yaml(serde_yml::Error),
    /// Network/HTTP request failed
    Network { url: String, reason: String },
}

impl fmt::Display for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Json(err) => write!(f, "JSON error: {}", err),
            Self::Yaml(err) => write!(f, "YAML error: {}", err),
            Self::Network { url, reason } => write!(f, "Network error [{}]: {}", url, reason),
        }
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Yaml(e) => Some(e),
            Self::Network { .. } => None,
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<serde_yml::Error> for InfraError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Yaml(err)
    }
}

/// Top-level error type for Craftwatch
///
/// Wraps both domain and infrastructure errors so callers can match on the
/// category they care about.
#[derive(Debug)]
pub enum CraftwatchError {
    /// Business logic error
    Domain(DomainError),
    /// Infrastructure/external system error
    Infra(InfraError),
    /// Generic error for edge cases
    Other(String),
}

impl fmt::Display for CraftwatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(e) => write!(f, "{}", e),
            Self::Infra(e) => write!(f, "{}", e),
            Self::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CraftwatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Domain(e) => Some(e),
            Self::Infra(e) => Some(e),
            Self::Other(_) => None,
        }
    }
}

impl From<DomainError> for CraftwatchError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<InfraError> for CraftwatchError {
    fn from(err: InfraError) -> Self {
        Self::Infra(err)
    }
}

impl From<std::io::Error> for CraftwatchError {
    fn from(err: std::io::Error) -> Self {
        Self::Infra(InfraError::Io(err))
    }
}

impl From<serde_json::Error> for CraftwatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Infra(InfraError::Json(err))
    }
}

impl From<serde_yml::Error> for CraftwatchError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Infra(InfraError::Yaml(err))
    }
}

impl CraftwatchError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigNotFound { path: path.into() })
    }

    pub fn config_parse_error(source: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigParse {
            source: source.into(),
        })
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// True for errors the monitor recovers from locally (backoff, next cycle).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Domain(
                DomainError::SourceUnavailable { .. }
                    | DomainError::PublishTimeout { .. }
                    | DomainError::Publish { .. }
            ) | Self::Infra(InfraError::Io(_) | InfraError::Network { .. })
        )
    }
}
