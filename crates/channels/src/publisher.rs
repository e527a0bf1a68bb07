// Notification Publisher
//
// Owns the single status message: renders roster snapshots, applies the
// rate limit and dedup, and creates or edits the message through a sink.

use crate::adapter::{MessageId, SinkError, StatusEmbed, StatusSink};
use crate::render::{render, render_checking};
use crate::store::MessageIdStore;
use craftwatch_core::{NotificationSnapshot, RosterState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Publisher settings
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Minimum spacing between two external writes
    pub min_interval: Duration,

    /// Bound on a single create/edit call
    pub timeout: Duration,

    /// Message title
    pub title: String,
}

impl PublisherConfig {
    pub fn from_core(config: &craftwatch_core::Config) -> Self {
        Self {
            min_interval: config.publish.min_interval(),
            timeout: config.publish.timeout(),
            title: config.discord.title.clone(),
        }
    }
}

/// Result of one publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Existing message edited
    Published,
    /// New message created (first publish or the old one vanished)
    Created(MessageId),
    /// Dropped, too soon after the previous write
    RateLimited,
    /// Dropped, would render what is already shown
    Unchanged,
    /// Write attempted and failed; the next publish retries
    Failed(String),
    /// Final offline status already written
    Closed,
}

#[derive(Debug, Default)]
struct Gate {
    last_publish_at: Option<Instant>,
    last_snapshot: Option<NotificationSnapshot>,
}

pub struct NotificationPublisher {
    sink: Arc<dyn StatusSink>,
    store: MessageIdStore,
    config: PublisherConfig,
    gate: Mutex<Gate>,
    message: tokio::sync::Mutex<Option<MessageId>>,
    closed: AtomicBool,
}

impl NotificationPublisher {
    pub fn new(sink: Arc<dyn StatusSink>, store: MessageIdStore, config: PublisherConfig) -> Self {
        Self {
            sink,
            store,
            config,
            gate: Mutex::new(Gate::default()),
            message: tokio::sync::Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Currently targeted message id
    pub async fn message_id(&self) -> Option<MessageId> {
        self.message.lock().await.clone()
    }

    /// Load and validate the persisted id. If it is missing or no longer
    /// valid, post a "Checking..." placeholder and persist the new id.
    pub async fn initialize(&self) -> Result<MessageId, SinkError> {
        let mut message = self.message.lock().await;

        if let Some(id) = self.store.load().await {
            match self.bounded(self.sink.fetch_message(&id)).await {
                Ok(()) => {
                    tracing::info!("Editing existing message: {}", id);
                    *message = Some(id.clone());
                    return Ok(id);
                }
                Err(e) => {
                    tracing::warn!("Could not fetch previous message {}: {}", id, e);
                }
            }
        }

        let id = self
            .bounded(self.sink.create_message(&render_checking(&self.config.title)))
            .await?;
        self.store.save(&id).await?;
        tracing::info!(
            "New {} message sent: {} (id saved to {:?})",
            self.sink.platform_name(),
            id,
            self.store.path()
        );
        *message = Some(id.clone());
        Ok(id)
    }

    /// Publish the current roster state
    pub async fn publish(&self, state: &RosterState) -> PublishOutcome {
        if self.closed.load(Ordering::SeqCst) {
            return PublishOutcome::Closed;
        }
        let snapshot = NotificationSnapshot::of(state);

        {
            let Ok(mut gate) = self.gate.lock() else {
                return PublishOutcome::Failed("publisher gate poisoned".to_string());
            };
            if gate
                .last_snapshot
                .as_ref()
                .is_some_and(|last| last.renders_same(&snapshot))
            {
                return PublishOutcome::Unchanged;
            }
            let now = Instant::now();
            if gate
                .last_publish_at
                .is_some_and(|at| now.duration_since(at) < self.config.min_interval)
            {
                tracing::debug!("Publish skipped, within rate limit window");
                return PublishOutcome::RateLimited;
            }
            gate.last_publish_at = Some(now);
        }

        let embed = render(&snapshot, &self.config.title);
        let outcome = self.write(&embed).await;

        match &outcome {
            PublishOutcome::Published | PublishOutcome::Created(_) => {
                if let Ok(mut gate) = self.gate.lock() {
                    gate.last_snapshot = Some(snapshot);
                }
            }
            PublishOutcome::Failed(reason) => {
                tracing::error!("Failed to update status message: {}", reason);
            }
            _ => {}
        }
        outcome
    }

    /// Best-effort offline publish on shutdown. Bypasses rate limit and dedup
    /// and never creates a message. Later publishes are refused.
    pub async fn publish_final_offline(&self, deadline: Duration) -> bool {
        self.closed.store(true, Ordering::SeqCst);
        let embed = render(&NotificationSnapshot::offline(), &self.config.title);
        let attempt = async {
            let message = self.message.lock().await;
            match message.as_ref() {
                Some(id) => self.sink.edit_message(id, &embed).await.map(|_| true),
                None => Ok(false),
            }
        };

        match tokio::time::timeout(deadline, attempt).await {
            Ok(Ok(false)) => {
                tracing::warn!("Could not mark offline, no status message");
                false
            }
            Ok(Ok(true)) => {
                tracing::info!("Status marked as offline before closing");
                true
            }
            Ok(Err(e)) => {
                tracing::error!("Failed to mark status offline: {}", e);
                false
            }
            Err(_) => {
                tracing::error!("Timeout when marking status offline");
                false
            }
        }
    }

    /// Publish every roster state the controller hands over until cancelled.
    /// States that arrive while a write is in flight coalesce to the latest.
    /// A rate-limited state is republished once the window reopens.
    pub async fn run(self: Arc<Self>, mut rx: watch::Receiver<RosterState>, cancel: CancellationToken) {
        let mut retry_at: Option<Instant> = None;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = rx.borrow_and_update().clone();
                    retry_at = self.publish_latest(&state).await;
                }
                _ = tokio::time::sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    let state = rx.borrow_and_update().clone();
                    retry_at = self.publish_latest(&state).await;
                }
            }
        }
        tracing::debug!("Publisher stopped");
    }

    /// Publish `state`; returns when to try again if it was rate limited
    async fn publish_latest(&self, state: &RosterState) -> Option<Instant> {
        match self.publish(state).await {
            PublishOutcome::Created(id) => {
                tracing::info!("Status message recreated: {}", id);
                None
            }
            PublishOutcome::RateLimited => self.window_reopens_at(),
            outcome => {
                tracing::debug!("Publish outcome: {:?}", outcome);
                None
            }
        }
    }

    fn window_reopens_at(&self) -> Option<Instant> {
        let gate = self.gate.lock().ok()?;
        gate.last_publish_at.map(|at| at + self.config.min_interval)
    }

    async fn write(&self, embed: &StatusEmbed) -> PublishOutcome {
        let mut message = self.message.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return PublishOutcome::Closed;
        }

        if let Some(id) = message.clone() {
            match self.bounded(self.sink.edit_message(&id, embed)).await {
                Ok(()) => return PublishOutcome::Published,
                Err(SinkError::NotFound { .. }) => {
                    tracing::warn!("Status message {} is gone, creating a new one", id);
                }
                Err(e) => return PublishOutcome::Failed(e.to_string()),
            }
        }

        match self.bounded(self.sink.create_message(embed)).await {
            Ok(id) => {
                if let Err(e) = self.store.save(&id).await {
                    tracing::error!("{}", e);
                }
                *message = Some(id.clone());
                PublishOutcome::Created(id)
            }
            Err(e) => PublishOutcome::Failed(e.to_string()),
        }
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, SinkError>>,
    ) -> Result<T, SinkError> {
        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout {
                after: self.config.timeout,
            }),
        }
    }
}
