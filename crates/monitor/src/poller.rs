// Status Poller
//
// Periodically queries the external endpoint (authoritative) and the local
// endpoint (diagnostic only), and hands the verdicts to the controller.

use crate::diagnosis::{diagnose, Diagnosis};
use async_trait::async_trait;
use chrono::Utc;
use craftwatch_core::{Config, EndpointKind, PollVerdict, Signal};
use craftwatch_query::{QueryError, ServerAddress, ServerStatus, StatusClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Anything that can answer a status query
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn probe(&self, address: &ServerAddress) -> Result<ServerStatus, QueryError>;
}

#[async_trait]
impl StatusProbe for StatusClient {
    async fn probe(&self, address: &ServerAddress) -> Result<ServerStatus, QueryError> {
        self.status(address).await
    }
}

/// Verdicts from one poll cycle
#[derive(Debug, Clone)]
pub struct PollCycle {
    pub external: PollVerdict,
    pub local: Option<PollVerdict>,
    pub diagnosis: Diagnosis,
}

pub struct StatusPoller {
    probe: Arc<dyn StatusProbe>,
    external: ServerAddress,
    local: Option<ServerAddress>,
    interval: Duration,
    cooldown: Duration,
    force: Arc<Notify>,
}

impl StatusPoller {
    pub fn new(
        probe: Arc<dyn StatusProbe>,
        external: ServerAddress,
        local: Option<ServerAddress>,
        interval: Duration,
        cooldown: Duration,
        force: Arc<Notify>,
    ) -> Self {
        Self {
            probe,
            external,
            local,
            interval,
            cooldown,
            force,
        }
    }

    /// Build a poller backed by the network client
    pub fn from_config(config: &Config, force: Arc<Notify>) -> Result<Self, QueryError> {
        let probe = Arc::new(StatusClient::new(config.server.query_timeout()));
        Self::with_probe(config, probe, force)
    }

    pub fn with_probe(
        config: &Config,
        probe: Arc<dyn StatusProbe>,
        force: Arc<Notify>,
    ) -> Result<Self, QueryError> {
        let external = ServerAddress::parse(&config.server.address)?;
        let local = config
            .server
            .local_address
            .as_deref()
            .map(ServerAddress::parse)
            .transpose()?;

        Ok(Self::new(
            probe,
            external,
            local,
            config.poll.interval(),
            config.poll.force_cooldown(),
            force,
        ))
    }

    /// Query both endpoints concurrently and diagnose
    pub async fn cycle(&self) -> PollCycle {
        debug!("Trying to connect to external server: {}", self.external);

        let local_query = async {
            match &self.local {
                Some(address) => Some(self.probe.probe(address).await),
                None => None,
            }
        };
        let (external, local) = tokio::join!(self.probe.probe(&self.external), local_query);

        let external = match external {
            Ok(status) => {
                info!("External server online! {} players connected", status.online);
                match &status.sample {
                    Some(names) if !names.is_empty() => {
                        debug!("Player names from external server: {}", names.join(", "))
                    }
                    _ if status.online > 0 => debug!(
                        "Server has {} players but names not available (hide-online-players=true?)",
                        status.online
                    ),
                    _ => debug!("No players online"),
                }
                verdict_of(EndpointKind::External, &status)
            }
            Err(e) => {
                warn!("Error connecting to external server {}: {}", self.external, e);
                if let Some(hint) = e.hint() {
                    info!("{}", hint);
                }
                PollVerdict::unreachable(EndpointKind::External)
            }
        };

        let local = local.map(|result| match result {
            Ok(status) => {
                debug!("Local server working: {} players", status.online);
                if let Some(names) = status.sample.as_ref().filter(|n| !n.is_empty()) {
                    debug!("Local server players: {}", names.join(", "));
                }
                verdict_of(EndpointKind::Local, &status)
            }
            Err(e) => {
                debug!("Local server also failed: {}", e);
                PollVerdict::unreachable(EndpointKind::Local)
            }
        });

        let diagnosis = diagnose(local.as_ref().map(|v| v.reachable), external.reachable);
        diagnosis.log();

        PollCycle {
            external,
            local,
            diagnosis,
        }
    }

    /// Poll until cancelled. A normal cycle is followed by the full interval
    /// (cut short by a force-check); a forced cycle by the cooldown.
    pub async fn run(self, tx: mpsc::Sender<Signal>, cancel: CancellationToken) {
        info!(
            "Polling {} every {:?} (local: {})",
            self.external,
            self.interval,
            self.local
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        let mut forced = false;
        loop {
            let cycle = tokio::select! {
                _ = cancel.cancelled() => break,
                cycle = self.cycle() => cycle,
            };

            let mut signals = vec![Signal::Verdict(cycle.external)];
            signals.extend(cycle.local.map(Signal::Verdict));
            for signal in signals {
                if tx.send(signal).await.is_err() {
                    debug!("Controller gone, poller stopping");
                    return;
                }
            }

            if forced {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.cooldown) => {}
                }
                forced = self.force_pending().await;
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = self.force.notified() => forced = true,
                }
            }
            if forced {
                info!("Running forced server check");
            }
        }
        debug!("Poller stopped");
    }

    /// Take a force request that arrived during the cooldown, if any
    async fn force_pending(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.force.notified() => true,
            _ = std::future::ready(()) => false,
        }
    }
}

/// Verdict for a successful query.
///
/// An empty sample with a positive count and no anonymized entries is
/// treated like a missing sample.
pub fn verdict_of(endpoint_kind: EndpointKind, status: &ServerStatus) -> PollVerdict {
    let player_names = match &status.sample {
        Some(names) if names.is_empty() && status.anonymous == 0 && status.online > 0 => None,
        other => other.clone(),
    };

    PollVerdict {
        reachable: true,
        player_count: status.online,
        max_count: status.max,
        player_names,
        anonymous: status.anonymous,
        queried_at: Utc::now(),
        endpoint_kind,
        version: status.version.clone(),
        latency: Some(status.latency),
    }
}
