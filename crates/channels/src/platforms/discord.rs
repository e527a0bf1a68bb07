// Discord Platform Adapter
//
// Keeps one status message in a single channel using twilight-http: the
// message is created once, then edited in place.

use crate::adapter::{MessageId, SinkError, StatusEmbed, StatusSink};
use async_trait::async_trait;
use std::time::Duration;
use twilight_http::error::ErrorType;
use twilight_http::Client as HttpClient;
use twilight_model::channel::message::embed::{Embed, EmbedField};
use twilight_model::id::{
    marker::{ChannelMarker, MessageMarker},
    Id,
};
use twilight_model::util::Timestamp;

/// Discord adapter configuration
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Bot token
    pub bot_token: String,

    /// Channel holding the status message (raw snowflake or `<#id>` mention)
    pub channel_id: String,

    /// Optional `host:port` of an HTTP proxy in front of the API
    pub proxy: Option<String>,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: std::env::var("DISCORD_BOT_TOKEN").unwrap_or_default(),
            channel_id: String::new(),
            proxy: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Discord sink
pub struct DiscordSink {
    config: DiscordConfig,
    http: HttpClient,
}

impl DiscordSink {
    pub fn new(config: DiscordConfig) -> Self {
        let mut builder = HttpClient::builder()
            .token(config.bot_token.clone())
            .timeout(config.request_timeout);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(proxy.clone(), true);
        }
        Self {
            http: builder.build(),
            config,
        }
    }

    pub fn from_core(config: &craftwatch_core::config::DiscordConfig, timeout: Duration) -> Self {
        Self::new(DiscordConfig {
            bot_token: config.token.clone().unwrap_or_default(),
            channel_id: config.channel_id.clone(),
            proxy: config.proxy.clone(),
            request_timeout: timeout,
        })
    }

    /// Parse a snowflake, accepting the `<#123>` mention form
    pub fn parse_snowflake(identifier: &str) -> Option<u64> {
        let raw = identifier
            .trim()
            .trim_start_matches("<#")
            .trim_end_matches('>');
        if raw.is_empty() || raw.len() > 20 || !raw.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        raw.parse::<u64>().ok().filter(|id| *id != 0)
    }

    fn channel(&self) -> Result<Id<ChannelMarker>, SinkError> {
        Self::parse_snowflake(&self.config.channel_id)
            .map(Id::new)
            .ok_or_else(|| SinkError::Api {
                status: 400,
                body: format!("Invalid channel id '{}'", self.config.channel_id),
            })
    }

    fn message(id: &MessageId) -> Result<Id<MessageMarker>, SinkError> {
        Self::parse_snowflake(id)
            .map(Id::new)
            .ok_or_else(|| SinkError::NotFound { id: id.clone() })
    }

    fn map_error(&self, e: twilight_http::Error, id: Option<&MessageId>) -> SinkError {
        match e.kind() {
            ErrorType::Response { body, status, .. } => {
                let status = status.get();
                if let (404, Some(id)) = (status, id) {
                    return SinkError::NotFound { id: id.clone() };
                }
                if status == 403 {
                    tracing::error!(
                        "❌ Bot lacks permission to post in channel {}",
                        self.config.channel_id
                    );
                }
                SinkError::Api {
                    status,
                    body: String::from_utf8_lossy(body).into_owned(),
                }
            }
            ErrorType::Unauthorized => {
                tracing::error!("❌ Discord bot token is invalid or expired");
                SinkError::Api {
                    status: 401,
                    body: e.to_string(),
                }
            }
            ErrorType::RequestTimedOut => SinkError::Timeout {
                after: self.config.request_timeout,
            },
            _ => SinkError::Http {
                platform: "discord".to_string(),
                source: e.to_string(),
            },
        }
    }
}

/// Convert a status embed into the Discord model
pub fn to_discord(embed: &StatusEmbed) -> Embed {
    Embed {
        author: None,
        color: Some(embed.color),
        description: Some(embed.description.clone()),
        fields: embed
            .fields
            .iter()
            .map(|field| EmbedField {
                inline: field.inline,
                name: field.name.clone(),
                value: field.value.clone(),
            })
            .collect(),
        footer: None,
        image: None,
        kind: "rich".to_string(),
        provider: None,
        thumbnail: None,
        timestamp: embed
            .timestamp
            .as_deref()
            .and_then(|ts| Timestamp::parse(ts).ok()),
        title: Some(embed.title.clone()),
        url: None,
        video: None,
    }
}

#[async_trait]
impl StatusSink for DiscordSink {
    fn platform_name(&self) -> &str {
        "discord"
    }

    async fn create_message(&self, embed: &StatusEmbed) -> Result<MessageId, SinkError> {
        let channel = self.channel()?;
        let embeds = [to_discord(embed)];

        let response = self
            .http
            .create_message(channel)
            .embeds(&embeds)
            .await
            .map_err(|e| self.map_error(e, None))?;
        let message = response.model().await.map_err(|e| SinkError::Http {
            platform: "discord".to_string(),
            source: e.to_string(),
        })?;

        tracing::debug!("Created Discord message {}", message.id);
        Ok(message.id.to_string())
    }

    async fn edit_message(&self, id: &MessageId, embed: &StatusEmbed) -> Result<(), SinkError> {
        let channel = self.channel()?;
        let message = Self::message(id)?;
        let embeds = [to_discord(embed)];

        self.http
            .update_message(channel, message)
            .embeds(Some(&embeds))
            .await
            .map_err(|e| self.map_error(e, Some(id)))?;
        Ok(())
    }

    async fn fetch_message(&self, id: &MessageId) -> Result<(), SinkError> {
        let channel = self.channel()?;
        let message = Self::message(id)?;

        self.http
            .message(channel, message)
            .await
            .map_err(|e| self.map_error(e, Some(id)))?;
        Ok(())
    }
}
