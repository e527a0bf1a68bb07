// Notification Sink Interface
//
// The publisher only needs three operations from a platform: create a
// message, edit it by id, and fetch it to check the id is still valid.

use async_trait::async_trait;
use craftwatch_core::{CraftwatchError, DomainError, InfraError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque id of a published message
pub type MessageId = String;

/// Rich status message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEmbed {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Unified sink trait
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Platform name (e.g., "discord")
    fn platform_name(&self) -> &str;

    /// Post a new message, returning its id
    async fn create_message(&self, embed: &StatusEmbed) -> Result<MessageId, SinkError>;

    /// Replace the content of an existing message
    async fn edit_message(&self, id: &MessageId, embed: &StatusEmbed) -> Result<(), SinkError>;

    /// Check that a message still exists
    async fn fetch_message(&self, id: &MessageId) -> Result<(), SinkError>;
}

/// Sink error type
#[derive(Debug)]
pub enum SinkError {
    /// The message id no longer refers to a message
    NotFound { id: MessageId },

    /// Request could not be sent or the response not read
    Http { platform: String, source: String },

    /// Platform answered with an error status
    Api { status: u16, body: String },

    /// Call exceeded its deadline
    Timeout { after: Duration },

    /// Persisted id could not be written
    Store { source: std::io::Error },
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SinkError::NotFound { id } => write!(f, "Message {} not found", id),
            SinkError::Http { platform, source } => {
                write!(f, "Request to {} failed: {}", platform, source)
            }
            SinkError::Api { status, body } => write!(f, "API error {}: {}", status, body),
            SinkError::Timeout { after } => write!(f, "Timed out after {:?}", after),
            SinkError::Store { source } => write!(f, "Failed to persist message id: {}", source),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Store { source } => Some(source),
            _ => None,
        }
    }
}

impl From<SinkError> for CraftwatchError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Timeout { after } => CraftwatchError::Domain(DomainError::PublishTimeout {
                after_ms: after.as_millis() as u64,
            }),
            SinkError::Http { platform, source } => CraftwatchError::Infra(InfraError::Network {
                url: platform,
                reason: source,
            }),
            SinkError::Store { source } => source.into(),
            SinkError::Api { status: 401, .. } => {
                CraftwatchError::config_invalid("discord.token", "Rejected by Discord (401)")
            }
            SinkError::Api { status: 403, .. } => CraftwatchError::config_invalid(
                "discord.channel_id",
                "Bot has no access to this channel (403)",
            ),
            other => CraftwatchError::Domain(DomainError::Publish {
                reason: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failures_are_fatal() {
        let err: CraftwatchError = SinkError::Api {
            status: 401,
            body: "401: Unauthorized".to_string(),
        }
        .into();
        assert!(!err.is_recoverable());

        let err: CraftwatchError = SinkError::Api {
            status: 403,
            body: "Missing Access".to_string(),
        }
        .into();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_transient_failures_are_recoverable() {
        let err: CraftwatchError = SinkError::Timeout {
            after: Duration::from_secs(5),
        }
        .into();
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Publish timed out after 5000ms");

        let err: CraftwatchError = SinkError::Api {
            status: 502,
            body: "Bad Gateway".to_string(),
        }
        .into();
        assert!(err.is_recoverable());
    }
}
