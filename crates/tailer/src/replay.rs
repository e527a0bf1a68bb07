//! Startup replay reducer.
//!
//! Joins and leaves are tallied per player as a signed counter; a lifecycle
//! line wipes the tally because a restart invalidates earlier sessions. At
//! end of scan only players with a strictly positive net count are present.

use craftwatch_core::{PlayerName, PresenceKind, RosterMutation};
use std::collections::{BTreeSet, HashMap};

/// Accumulates replayed events until end of scan
#[derive(Debug, Default)]
pub struct ReplayReducer {
    counts: HashMap<PlayerName, i64>,
    last_lifecycle: Option<PresenceKind>,
    events: usize,
}

impl ReplayReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, kind: &PresenceKind) {
        self.events += 1;
        match kind {
            PresenceKind::Joined(name) => {
                *self.counts.entry(name.clone()).or_insert(0) += 1;
            }
            PresenceKind::Left(name) => {
                *self.counts.entry(name.clone()).or_insert(0) -= 1;
            }
            PresenceKind::ServerStarted | PresenceKind::ServerStopping => {
                self.counts.clear();
                self.last_lifecycle = Some(kind.clone());
            }
        }
    }

    /// Net count for one player, clamped at zero
    pub fn count(&self, name: &str) -> u64 {
        self.counts
            .get(name)
            .map(|c| (*c).max(0) as u64)
            .unwrap_or(0)
    }

    pub fn finish(self) -> ReplayOutcome {
        let players: BTreeSet<PlayerName> = self
            .counts
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(name, _)| name)
            .collect();

        // Players seen after the last lifecycle line mean the server is up
        // even when its start line was not recognized.
        let online = match self.last_lifecycle {
            Some(PresenceKind::ServerStarted) => true,
            _ => !players.is_empty(),
        };

        ReplayOutcome {
            online,
            players: if online { players } else { BTreeSet::new() },
            saw_lifecycle: self.last_lifecycle.is_some(),
            events: self.events,
            lines: 0,
        }
    }
}

/// Roster reconstructed from the historical log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub online: bool,
    pub players: BTreeSet<PlayerName>,
    /// Whether any start/stop line was seen
    pub saw_lifecycle: bool,
    pub events: usize,
    pub lines: usize,
}

impl ReplayOutcome {
    /// Outcome for a log that could not be read
    pub fn empty() -> Self {
        ReplayOutcome {
            online: false,
            players: BTreeSet::new(),
            saw_lifecycle: false,
            events: 0,
            lines: 0,
        }
    }

    pub fn into_mutation(self) -> RosterMutation {
        RosterMutation::ReplaceRoster {
            online: self.online,
            players: self.players,
            obscured: 0,
        }
    }
}
