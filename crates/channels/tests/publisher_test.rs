use async_trait::async_trait;
use chrono::Utc;
use craftwatch_channels::{
    MessageId, MessageIdStore, NotificationPublisher, PublishOutcome, PublisherConfig, SinkError,
    StatusEmbed, StatusSink,
};
use craftwatch_core::RosterState;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeSink {
    next_id: AtomicU64,
    live: Mutex<HashSet<MessageId>>,
    created: Mutex<Vec<StatusEmbed>>,
    edited: Mutex<Vec<(MessageId, StatusEmbed)>>,
    failing: AtomicBool,
}

impl FakeSink {
    fn with_live(id: &str) -> Self {
        let sink = Self::default();
        sink.live.lock().unwrap().insert(id.to_string());
        sink
    }

    fn creates(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    fn edits(&self) -> usize {
        self.edited.lock().unwrap().len()
    }

    fn writes(&self) -> usize {
        self.creates() + self.edits()
    }

    fn last_edit(&self) -> Option<(MessageId, StatusEmbed)> {
        self.edited.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl StatusSink for FakeSink {
    fn platform_name(&self) -> &str {
        "fake"
    }

    async fn create_message(&self, embed: &StatusEmbed) -> Result<MessageId, SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Api {
                status: 500,
                body: "down".to_string(),
            });
        }
        let id = format!("{}", 1000 + self.next_id.fetch_add(1, Ordering::SeqCst));
        self.live.lock().unwrap().insert(id.clone());
        self.created.lock().unwrap().push(embed.clone());
        Ok(id)
    }

    async fn edit_message(&self, id: &MessageId, embed: &StatusEmbed) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Api {
                status: 500,
                body: "down".to_string(),
            });
        }
        if !self.live.lock().unwrap().contains(id) {
            return Err(SinkError::NotFound { id: id.clone() });
        }
        self.edited.lock().unwrap().push((id.clone(), embed.clone()));
        Ok(())
    }

    async fn fetch_message(&self, id: &MessageId) -> Result<(), SinkError> {
        if self.live.lock().unwrap().contains(id) {
            Ok(())
        } else {
            Err(SinkError::NotFound { id: id.clone() })
        }
    }
}

fn config() -> PublisherConfig {
    PublisherConfig {
        min_interval: Duration::from_secs(2),
        timeout: Duration::from_secs(5),
        title: "Minecraft Server Status".to_string(),
    }
}

fn online(players: &[&str]) -> RosterState {
    RosterState {
        online: true,
        players: players.iter().map(|p| p.to_string()).collect::<BTreeSet<_>>(),
        obscured_count: 0,
        last_changed_at: Utc::now(),
    }
}

fn publisher(sink: Arc<FakeSink>, dir: &TempDir) -> NotificationPublisher {
    NotificationPublisher::new(
        sink,
        MessageIdStore::new(dir.path().join("status_message_id.txt")),
        config(),
    )
}

#[tokio::test(start_paused = true)]
async fn two_publishes_within_min_interval_write_once() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(FakeSink::default());
    let publisher = publisher(sink.clone(), &dir);
    publisher.initialize().await.unwrap();
    assert_eq!(sink.creates(), 1);

    assert_eq!(publisher.publish(&online(&["Alex"])).await, PublishOutcome::Published);
    assert_eq!(
        publisher.publish(&online(&["Alex", "Steve"])).await,
        PublishOutcome::RateLimited
    );
    assert_eq!(sink.edits(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(
        publisher.publish(&online(&["Alex", "Steve"])).await,
        PublishOutcome::Published
    );
    assert_eq!(sink.edits(), 2);
    let (_, embed) = sink.last_edit().unwrap();
    assert_eq!(embed.fields[0].value, "2: Alex, Steve");
}

#[tokio::test(start_paused = true)]
async fn unchanged_snapshot_is_not_rewritten() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(FakeSink::default());
    let publisher = publisher(sink.clone(), &dir);
    publisher.initialize().await.unwrap();

    publisher.publish(&online(&["Alex"])).await;
    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(publisher.publish(&online(&["Alex"])).await, PublishOutcome::Unchanged);
    assert_eq!(sink.edits(), 1);
}

#[tokio::test]
async fn invalid_persisted_id_creates_exactly_one_message() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("status_message_id.txt");
    std::fs::write(&path, "999\n").unwrap();

    let sink = Arc::new(FakeSink::default());
    let publisher = publisher(sink.clone(), &dir);
    let id = publisher.initialize().await.unwrap();

    assert_eq!(sink.creates(), 1);
    assert_eq!(sink.created.lock().unwrap()[0].description, "Checking...");
    assert_ne!(id, "999");
    assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), id);
}

#[tokio::test]
async fn valid_persisted_id_is_reused() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("status_message_id.txt"), "42").unwrap();

    let sink = Arc::new(FakeSink::with_live("42"));
    let publisher = publisher(sink.clone(), &dir);
    assert_eq!(publisher.initialize().await.unwrap(), "42");
    assert_eq!(sink.creates(), 0);

    publisher.publish(&online(&[])).await;
    let (id, embed) = sink.last_edit().unwrap();
    assert_eq!(id, "42");
    assert_eq!(embed.fields[0].value, "0: None");
}

#[tokio::test]
async fn deleted_message_is_recreated_on_publish() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(FakeSink::default());
    let publisher = publisher(sink.clone(), &dir);
    let first = publisher.initialize().await.unwrap();
    sink.live.lock().unwrap().clear();

    let second = match publisher.publish(&online(&["Alex"])).await {
        PublishOutcome::Created(id) => id,
        other => panic!("expected a new message, got {:?}", other),
    };
    assert_ne!(first, second);
    assert_eq!(publisher.message_id().await, Some(second.clone()));
    let stored = std::fs::read_to_string(dir.path().join("status_message_id.txt")).unwrap();
    assert_eq!(stored.trim(), second);
}

#[tokio::test(start_paused = true)]
async fn failed_write_is_retried_by_next_publish() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(FakeSink::default());
    let publisher = publisher(sink.clone(), &dir);
    publisher.initialize().await.unwrap();

    sink.failing.store(true, Ordering::SeqCst);
    assert!(matches!(
        publisher.publish(&online(&["Alex"])).await,
        PublishOutcome::Failed(_)
    ));

    sink.failing.store(false, Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(publisher.publish(&online(&["Alex"])).await, PublishOutcome::Published);
}

#[tokio::test]
async fn final_offline_without_message_does_nothing() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(FakeSink::default());
    let publisher = publisher(sink.clone(), &dir);

    assert!(!publisher.publish_final_offline(Duration::from_secs(5)).await);
    assert_eq!(sink.writes(), 0);
}

#[tokio::test]
async fn final_offline_edits_existing_message_and_closes() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(FakeSink::default());
    let publisher = publisher(sink.clone(), &dir);

    publisher.initialize().await.unwrap();
    publisher.publish(&online(&["Alex"])).await;
    assert!(publisher.publish_final_offline(Duration::from_secs(5)).await);

    let (_, embed) = sink.last_edit().unwrap();
    assert_eq!(embed.description, "🔴 Offline");
    assert!(embed.fields.is_empty());

    assert_eq!(
        publisher.publish(&online(&["Alex", "Steve"])).await,
        PublishOutcome::Closed
    );
    assert_eq!(sink.last_edit().unwrap().1.description, "🔴 Offline");
}

#[tokio::test(start_paused = true)]
async fn rate_limited_state_is_published_when_window_reopens() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(FakeSink::default());
    let publisher = Arc::new(publisher(sink.clone(), &dir));
    publisher.initialize().await.unwrap();

    let (tx, rx) = watch::channel(RosterState::default());
    let cancel = CancellationToken::new();
    let task = tokio::spawn(publisher.clone().run(rx, cancel.clone()));

    tx.send_replace(online(&["Alex"]));
    tokio::time::sleep(Duration::from_millis(10)).await;
    tx.send_replace(online(&["Alex", "Steve"]));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(sink.edits(), 1);

    // No further state change arrives; the dropped state still lands
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.edits(), 2);
    assert_eq!(sink.last_edit().unwrap().1.fields[0].value, "2: Alex, Steve");

    cancel.cancel();
    task.await.unwrap();
}

/// Creates messages, but edits never complete
#[derive(Default)]
struct StuckSink {
    created: AtomicU64,
}

#[async_trait]
impl StatusSink for StuckSink {
    fn platform_name(&self) -> &str {
        "stuck"
    }

    async fn create_message(&self, _embed: &StatusEmbed) -> Result<MessageId, SinkError> {
        Ok(format!("{}", 1 + self.created.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_message(&self, _id: &MessageId, _embed: &StatusEmbed) -> Result<(), SinkError> {
        std::future::pending().await
    }

    async fn fetch_message(&self, id: &MessageId) -> Result<(), SinkError> {
        Err(SinkError::NotFound { id: id.clone() })
    }
}

#[tokio::test(start_paused = true)]
async fn final_offline_gives_up_at_deadline() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(StuckSink::default());
    let publisher = NotificationPublisher::new(
        sink.clone(),
        MessageIdStore::new(dir.path().join("status_message_id.txt")),
        config(),
    );
    publisher.initialize().await.unwrap();

    let started = tokio::time::Instant::now();
    assert!(!publisher.publish_final_offline(Duration::from_secs(3)).await);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3), "gave up early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(3100), "overran deadline: {:?}", elapsed);
    assert_eq!(sink.created.load(Ordering::SeqCst), 1);
}
