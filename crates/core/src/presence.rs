//! Presence data model shared by the log tailer, the status poller and the
//! reconciliation controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Player name as it appears in the log or in a status sample
pub type PlayerName = String;

/// Where a signal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Log,
    Poll,
}

/// Discrete presence occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceKind {
    Joined(PlayerName),
    Left(PlayerName),
    ServerStarted,
    ServerStopping,
}

impl fmt::Display for PresenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined(name) => write!(f, "{} joined", name),
            Self::Left(name) => write!(f, "{} left", name),
            Self::ServerStarted => write!(f, "server started"),
            Self::ServerStopping => write!(f, "server stopping"),
        }
    }
}

/// Presence event tagged with its source and discovery order.
///
/// `sequence` is assigned by the producing source and strictly increases
/// within that source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    pub kind: PresenceKind,
    pub source: EventSource,
    pub sequence: u64,
    pub discovered_at: DateTime<Utc>,
}

impl PresenceEvent {
    pub fn new(kind: PresenceKind, source: EventSource, sequence: u64) -> Self {
        Self {
            kind,
            source,
            sequence,
            discovered_at: Utc::now(),
        }
    }
}

/// Which endpoint a poll verdict describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    External,
    Local,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External => write!(f, "external"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Result of one status query.
///
/// `player_names == None` means the server answered without disclosing
/// names, which is distinct from an empty list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollVerdict {
    pub reachable: bool,
    pub player_count: u32,
    pub max_count: u32,
    pub player_names: Option<Vec<PlayerName>>,
    /// Sample entries the server anonymized
    #[serde(default)]
    pub anonymous: u32,
    pub queried_at: DateTime<Utc>,
    pub endpoint_kind: EndpointKind,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub latency: Option<Duration>,
}

impl PollVerdict {
    pub fn unreachable(endpoint_kind: EndpointKind) -> Self {
        Self {
            reachable: false,
            player_count: 0,
            max_count: 0,
            player_names: None,
            anonymous: 0,
            queried_at: Utc::now(),
            endpoint_kind,
            version: None,
            latency: None,
        }
    }

    /// Players known to be present without a usable name
    pub fn obscured_count(&self) -> u32 {
        if !self.reachable {
            return 0;
        }
        match &self.player_names {
            None => self.player_count,
            Some(_) => self.anonymous,
        }
    }

    pub fn named_players(&self) -> BTreeSet<PlayerName> {
        self.player_names
            .iter()
            .flatten()
            .cloned()
            .collect()
    }
}

/// Input consumed by the reconciliation controller
#[derive(Debug, Clone)]
pub enum Signal {
    Presence(PresenceEvent),
    Verdict(PollVerdict),
}

impl Signal {
    pub fn source(&self) -> EventSource {
        match self {
            Self::Presence(event) => event.source,
            Self::Verdict(_) => EventSource::Poll,
        }
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        match self {
            Self::Presence(event) => event.discovered_at,
            Self::Verdict(verdict) => verdict.queried_at,
        }
    }
}

/// Consolidated status and roster.
///
/// Invariant: when `online` is false, `players` is empty and
/// `obscured_count` is zero. Only [`RosterState::applied`] produces new
/// states, and it enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterState {
    pub online: bool,
    pub players: BTreeSet<PlayerName>,
    pub obscured_count: u32,
    pub last_changed_at: DateTime<Utc>,
}

impl Default for RosterState {
    fn default() -> Self {
        Self {
            online: false,
            players: BTreeSet::new(),
            obscured_count: 0,
            last_changed_at: Utc::now(),
        }
    }
}

impl RosterState {
    pub fn is_consistent(&self) -> bool {
        self.online || (self.players.is_empty() && self.obscured_count == 0)
    }

    /// Number of players present, named or not
    pub fn headcount(&self) -> usize {
        self.players.len() + self.obscured_count as usize
    }

    /// Roster entries for display: sorted names, then one sentinel standing
    /// in for every obscured player.
    pub fn display_entries(&self) -> Vec<String> {
        let mut entries: Vec<String> = self.players.iter().cloned().collect();
        match self.obscured_count {
            0 => {}
            1 => entries.push("Player 1".to_string()),
            n => entries.push(format!("{} Players", n)),
        }
        entries
    }

    /// Same status and roster, ignoring timestamps
    pub fn same_presence(&self, other: &RosterState) -> bool {
        self.online == other.online
            && self.players == other.players
            && self.obscured_count == other.obscured_count
    }

    /// Pure transition. Returns the next state; `last_changed_at` only moves
    /// when status or roster actually changed.
    pub fn applied(&self, mutation: &RosterMutation, now: DateTime<Utc>) -> RosterState {
        let mut next = self.clone();
        match mutation {
            RosterMutation::SetOnline => {
                next.online = true;
            }
            RosterMutation::SetOffline => {
                next.online = false;
            }
            RosterMutation::AddPlayer(name) => {
                if next.online {
                    next.players.insert(name.clone());
                }
            }
            RosterMutation::RemovePlayer(name) => {
                next.players.remove(name);
            }
            RosterMutation::ReplaceRoster {
                online,
                players,
                obscured,
            } => {
                next.online = *online;
                next.players = players.clone();
                next.obscured_count = *obscured;
            }
        }

        if !next.online {
            next.players.clear();
            next.obscured_count = 0;
        }

        if !next.same_presence(self) {
            next.last_changed_at = now;
        }
        next
    }
}

/// Mutation accepted by the roster store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterMutation {
    SetOnline,
    SetOffline,
    AddPlayer(PlayerName),
    RemovePlayer(PlayerName),
    ReplaceRoster {
        online: bool,
        players: BTreeSet<PlayerName>,
        obscured: u32,
    },
}

impl RosterMutation {
    /// Online with an empty roster
    pub fn fresh_start() -> Self {
        Self::ReplaceRoster {
            online: true,
            players: BTreeSet::new(),
            obscured: 0,
        }
    }
}

/// What was last actually published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSnapshot {
    pub online: bool,
    pub players: BTreeSet<PlayerName>,
    pub obscured_count: u32,
    pub rendered_at: DateTime<Utc>,
}

impl NotificationSnapshot {
    pub fn of(state: &RosterState) -> Self {
        Self {
            online: state.online,
            players: state.players.clone(),
            obscured_count: state.obscured_count,
            rendered_at: Utc::now(),
        }
    }

    /// Forced offline rendering used on shutdown
    pub fn offline() -> Self {
        Self {
            online: false,
            players: BTreeSet::new(),
            obscured_count: 0,
            rendered_at: Utc::now(),
        }
    }

    /// Whether publishing `other` would render exactly what this snapshot did
    pub fn renders_same(&self, other: &NotificationSnapshot) -> bool {
        self.online == other.online
            && self.players == other.players
            && self.obscured_count == other.obscured_count
    }

    pub fn as_state(&self) -> RosterState {
        RosterState {
            online: self.online,
            players: self.players.clone(),
            obscured_count: self.obscured_count,
            last_changed_at: self.rendered_at,
        }
    }
}
