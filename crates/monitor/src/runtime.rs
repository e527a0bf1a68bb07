// Monitor runtime
//
// Wires the sources, the controller and the publisher together and owns
// their task lifetimes.

use crate::controller::ReconciliationController;
use crate::force_check::ForceCheck;
use crate::poller::{StatusPoller, StatusProbe};
use anyhow::{Context, Result};
use craftwatch_channels::{
    DiscordSink, MessageIdStore, NotificationPublisher, PublisherConfig, StatusSink,
};
use craftwatch_core::{Config, CraftwatchError, RosterStore, Signal};
use craftwatch_query::StatusClient;
use craftwatch_tailer::LogTailer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SIGNAL_BUFFER: usize = 256;

pub struct Monitor {
    config: Config,
    sink: Arc<dyn StatusSink>,
    probe: Arc<dyn StatusProbe>,
}

impl Monitor {
    /// Production wiring: Discord sink and network status client
    pub fn from_config(config: Config) -> Self {
        let sink = Arc::new(DiscordSink::from_core(
            &config.discord,
            config.publish.timeout(),
        ));
        let probe = Arc::new(StatusClient::new(config.server.query_timeout()));
        Self::new(config, sink, probe)
    }

    pub fn new(config: Config, sink: Arc<dyn StatusSink>, probe: Arc<dyn StatusProbe>) -> Self {
        Self {
            config,
            sink,
            probe,
        }
    }

    /// Run until `shutdown` is cancelled, then publish a final offline status
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let config = self.config;

        let publisher = Arc::new(NotificationPublisher::new(
            self.sink,
            MessageIdStore::new(&config.discord.message_id_path),
            PublisherConfig::from_core(&config),
        ));
        if let Err(e) = publisher.initialize().await {
            let e = CraftwatchError::from(e);
            if !e.is_recoverable() {
                return Err(anyhow::Error::new(e).context("Failed to set up status message"));
            }
            error!("Failed to set up status message, first publish will retry: {}", e);
        }

        let force = ForceCheck::new(
            &config.poll.force_check_file,
            config.poll.force_check_interval(),
        );
        let poller = StatusPoller::with_probe(&config, self.probe, force.handle())
            .context("Invalid server address")?;

        let controller = ReconciliationController::new(Arc::new(RosterStore::new()));
        let updates = controller.subscribe();

        let tailer = LogTailer::new(&config.log.path, config.log.idle_backoff());
        let (outcome, offset) = tailer.replay().await;
        controller.seed(outcome.into_mutation()).await;

        let (tx, rx) = mpsc::channel::<Signal>(SIGNAL_BUFFER);
        let tasks: Vec<JoinHandle<()>> = vec![
            tokio::spawn(publisher.clone().run(updates, shutdown.clone())),
            tokio::spawn(controller.run(rx, shutdown.clone())),
            tokio::spawn(tailer.run(offset, tx.clone(), shutdown.clone())),
            tokio::spawn(poller.run(tx, shutdown.clone())),
            tokio::spawn(force.run(shutdown.clone())),
        ];
        info!("Monitor running");

        shutdown.cancelled().await;
        info!("Shutdown requested, marking status offline");

        publisher
            .publish_final_offline(config.publish.shutdown_timeout())
            .await;

        for task in tasks {
            task.abort();
        }
        info!("Monitor stopped");
        Ok(())
    }
}
