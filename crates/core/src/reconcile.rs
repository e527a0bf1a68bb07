//! Precedence policy between the log and the status poll.
//!
//! - Log join/leave lines edit the roster incrementally, and only while the
//!   server is online.
//! - Lifecycle lines flip status immediately and clear the roster.
//! - External poll verdicts decide online/offline and replace the roster
//!   wholesale. Local verdicts never touch it.

use crate::presence::{EndpointKind, PresenceKind, RosterMutation, RosterState, Signal};

/// Mutation a signal maps to, if any
pub fn mutation_for(signal: &Signal) -> Option<RosterMutation> {
    match signal {
        Signal::Presence(event) => Some(match &event.kind {
            PresenceKind::Joined(name) => RosterMutation::AddPlayer(name.clone()),
            PresenceKind::Left(name) => RosterMutation::RemovePlayer(name.clone()),
            PresenceKind::ServerStarted => RosterMutation::fresh_start(),
            PresenceKind::ServerStopping => RosterMutation::SetOffline,
        }),
        Signal::Verdict(verdict) => {
            if verdict.endpoint_kind != EndpointKind::External {
                return None;
            }
            if !verdict.reachable {
                return Some(RosterMutation::SetOffline);
            }
            Some(RosterMutation::ReplaceRoster {
                online: true,
                players: verdict.named_players(),
                obscured: verdict.obscured_count(),
            })
        }
    }
}

/// Pure reconciliation step
pub fn reconcile(state: &RosterState, signal: &Signal) -> RosterState {
    match mutation_for(signal) {
        Some(mutation) => state.applied(&mutation, signal.observed_at()),
        None => state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::{EventSource, PollVerdict, PresenceEvent};
    use std::collections::BTreeSet;

    fn log(kind: PresenceKind) -> Signal {
        Signal::Presence(PresenceEvent::new(kind, EventSource::Log, 0))
    }

    fn joined(name: &str) -> Signal {
        log(PresenceKind::Joined(name.to_string()))
    }

    fn external(names: Option<&[&str]>, count: u32) -> Signal {
        let mut verdict = PollVerdict::unreachable(EndpointKind::External);
        verdict.reachable = true;
        verdict.player_count = count;
        verdict.max_count = 20;
        verdict.player_names = names.map(|n| n.iter().map(|s| s.to_string()).collect());
        Signal::Verdict(verdict)
    }

    fn online(names: &[&str]) -> RosterState {
        reconcile(&RosterState::default(), &external(Some(names), names.len() as u32))
    }

    #[test]
    fn test_live_stop_clears_immediately() {
        let state = online(&["Alex", "Steve"]);
        let next = reconcile(&state, &log(PresenceKind::ServerStopping));
        assert!(!next.online);
        assert!(next.players.is_empty());
    }

    #[test]
    fn test_live_start_flips_online_with_empty_roster() {
        let next = reconcile(&RosterState::default(), &log(PresenceKind::ServerStarted));
        assert!(next.online);
        assert!(next.players.is_empty());

        let stale = online(&["Alex"]);
        let restarted = reconcile(&stale, &log(PresenceKind::ServerStarted));
        assert!(restarted.players.is_empty());
    }

    #[test]
    fn test_join_and_leave_while_online() {
        let state = online(&[]);
        let state = reconcile(&state, &joined("Alex"));
        let state = reconcile(&state, &joined("Steve"));
        let state = reconcile(&state, &log(PresenceKind::Left("Alex".to_string())));
        assert_eq!(
            state.players,
            ["Steve".to_string()].into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn test_unreachable_poll_forces_offline() {
        let state = online(&["Alex", "Steve"]);
        let verdict = Signal::Verdict(PollVerdict::unreachable(EndpointKind::External));
        let next = reconcile(&state, &verdict);
        assert!(!next.online);
        assert!(next.players.is_empty());
    }

    #[test]
    fn test_poll_replaces_rather_than_merges() {
        let state = online(&["Alex", "Steve"]);
        let next = reconcile(&state, &external(Some(&["Notch"]), 1));
        assert_eq!(
            next.players,
            ["Notch".to_string()].into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn test_hidden_names_become_one_sentinel() {
        let next = reconcile(&RosterState::default(), &external(None, 2));
        assert!(next.online);
        assert!(next.players.is_empty());
        assert_eq!(next.obscured_count, 2);
        assert_eq!(next.display_entries(), vec!["2 Players".to_string()]);
    }

    #[test]
    fn test_local_verdict_is_ignored() {
        let state = online(&["Alex"]);
        let mut local = PollVerdict::unreachable(EndpointKind::Local);
        local.reachable = true;
        local.player_count = 3;
        let next = reconcile(&state, &Signal::Verdict(local));
        assert_eq!(next, state);
    }
}
