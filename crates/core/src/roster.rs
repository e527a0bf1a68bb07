// Roster Store
//
// The single source of truth for server status and the player roster.
// All writes go through `apply`, which serializes them behind one lock.

use crate::presence::{PlayerName, RosterMutation, RosterState};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

struct Inner {
    state: RosterState,
    /// Join time per present player, informational only
    sessions: HashMap<PlayerName, DateTime<Utc>>,
    /// Bumped on every change, for delta tracking
    version: u64,
}

/// Result of one `apply` call
#[derive(Debug, Clone)]
pub struct Applied {
    pub state: RosterState,
    pub changed: bool,
    pub version: u64,
}

/// Roster store
pub struct RosterStore {
    inner: RwLock<Inner>,
}

impl RosterStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: RosterState::default(),
                sessions: HashMap::new(),
                version: 0,
            }),
        }
    }

    /// Point-in-time copy of the current state
    pub async fn read(&self) -> RosterState {
        self.inner.read().await.state.clone()
    }

    /// Apply a mutation atomically and return the resulting state
    pub async fn apply(&self, mutation: RosterMutation) -> Applied {
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        let next = inner.state.applied(&mutation, now);
        debug_assert!(next.is_consistent());

        let changed = !next.same_presence(&inner.state);
        if changed {
            inner.sessions.retain(|name, _| next.players.contains(name));
            for name in &next.players {
                inner.sessions.entry(name.clone()).or_insert(now);
            }
            inner.version += 1;
        }
        inner.state = next;

        Applied {
            state: inner.state.clone(),
            changed,
            version: inner.version,
        }
    }

    /// Join timestamps of the players currently present
    pub async fn sessions(&self) -> HashMap<PlayerName, DateTime<Utc>> {
        self.inner.read().await.sessions.clone()
    }

    /// Current state version
    pub async fn version(&self) -> u64 {
        self.inner.read().await.version
    }
}

impl Default for RosterStore {
    fn default() -> Self {
        Self::new()
    }
}
