// Reconciliation Controller
//
// Single consumer of presence events and poll verdicts. Applies the mapped
// mutation to the roster store, then hands the resulting state to the
// publisher without waiting for the write.

use chrono::Utc;
use craftwatch_core::{mutation_for, Applied, RosterMutation, RosterState, RosterStore, Signal};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct ReconciliationController {
    store: Arc<RosterStore>,
    updates: watch::Sender<RosterState>,
}

impl ReconciliationController {
    pub fn new(store: Arc<RosterStore>) -> Self {
        let (updates, _) = watch::channel(RosterState::default());
        Self { store, updates }
    }

    /// Receiver of every state produced by an applied mutation
    pub fn subscribe(&self) -> watch::Receiver<RosterState> {
        self.updates.subscribe()
    }

    pub fn store(&self) -> &Arc<RosterStore> {
        &self.store
    }

    /// Install the roster reconstructed by log replay
    pub async fn seed(&self, mutation: RosterMutation) -> Applied {
        let applied = self.commit(mutation).await;
        info!(
            "Initial state: online={}, players: {}",
            applied.state.online,
            describe(&applied.state)
        );
        applied
    }

    /// Apply one signal. `None` when the signal carries no roster change
    /// (local verdicts).
    pub async fn handle(&self, signal: Signal) -> Option<Applied> {
        let Some(mutation) = mutation_for(&signal) else {
            debug!("No roster change for {:?} signal", signal.source());
            return None;
        };
        let session = match &mutation {
            RosterMutation::RemovePlayer(name) => self
                .store
                .sessions()
                .await
                .get(name)
                .map(|joined_at| (name.clone(), *joined_at)),
            _ => None,
        };

        let applied = self.commit(mutation).await;
        if let Some((name, joined_at)) = session {
            debug!(
                "{} was online for {} min",
                name,
                (Utc::now() - joined_at).num_minutes()
            );
        }
        if applied.changed {
            info!(
                "Roster v{}: online={}, players: {}",
                applied.version,
                applied.state.online,
                describe(&applied.state)
            );
        }
        Some(applied)
    }

    /// Drain signals until cancelled or every source has hung up
    pub async fn run(self, mut rx: mpsc::Receiver<Signal>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                signal = rx.recv() => match signal {
                    Some(signal) => {
                        self.handle(signal).await;
                    }
                    None => break,
                },
            }
        }
        debug!("Controller stopped");
    }

    async fn commit(&self, mutation: RosterMutation) -> Applied {
        let applied = self.store.apply(mutation).await;
        self.updates.send_replace(applied.state.clone());
        applied
    }
}

fn describe(state: &RosterState) -> String {
    let entries = state.display_entries();
    if entries.is_empty() {
        "None".to_string()
    } else {
        entries.join(", ")
    }
}
