use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// UUID the server uses for sample entries it anonymized
pub const ANONYMOUS_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Raw status JSON as sent by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub version: Option<VersionInfo>,
    pub players: PlayersInfo,
    #[serde(default)]
    pub description: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub protocol: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayersInfo {
    pub max: i64,
    pub online: i64,
    #[serde(default)]
    pub sample: Option<Vec<SamplePlayer>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplePlayer {
    pub name: String,
    #[serde(default)]
    pub id: String,
}

impl SamplePlayer {
    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_UUID
    }
}

/// Parsed status of one server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStatus {
    pub online: u32,
    pub max: u32,
    /// Named sample entries; `None` when the server sent no sample at all
    pub sample: Option<Vec<String>>,
    /// Sample entries carrying the anonymous UUID
    pub anonymous: u32,
    pub version: Option<String>,
    pub motd: String,
    pub latency: Duration,
}

impl ServerStatus {
    pub fn from_response(response: StatusResponse, latency: Duration) -> Self {
        let clamp = |n: i64| n.clamp(0, u32::MAX as i64) as u32;

        let (sample, anonymous) = match response.players.sample {
            None => (None, 0),
            Some(entries) => {
                let anonymous = entries.iter().filter(|p| p.is_anonymous()).count() as u32;
                let names = entries
                    .into_iter()
                    .filter(|p| !p.is_anonymous())
                    .map(|p| p.name)
                    .collect();
                (Some(names), anonymous)
            }
        };

        Self {
            online: clamp(response.players.online),
            max: clamp(response.players.max),
            sample,
            anonymous,
            version: response.version.map(|v| v.name),
            motd: response
                .description
                .as_ref()
                .map(flatten_text)
                .unwrap_or_default(),
            latency,
        }
    }
}

/// Flatten a chat component (plain string or `{text, extra}` tree) to text
pub fn flatten_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(items) => items.iter().map(flatten_text).collect(),
        JsonValue::Object(map) => {
            let mut out = map
                .get("text")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string();
            if let Some(extra) = map.get("extra") {
                out.push_str(&flatten_text(extra));
            }
            out
        }
        _ => String::new(),
    }
}
