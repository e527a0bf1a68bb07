use async_trait::async_trait;
use craftwatch_channels::{MessageId, SinkError, StatusEmbed, StatusSink};
use craftwatch_core::Config;
use craftwatch_monitor::{Monitor, StatusProbe};
use craftwatch_query::{QueryError, ServerAddress, ServerStatus};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingSink {
    embeds: Mutex<Vec<StatusEmbed>>,
}

impl RecordingSink {
    fn last(&self) -> Option<StatusEmbed> {
        self.embeds.lock().unwrap().last().cloned()
    }

    fn any_field(&self, value: &str) -> bool {
        self.embeds
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.fields.iter().any(|f| f.value == value))
    }
}

#[async_trait]
impl StatusSink for RecordingSink {
    fn platform_name(&self) -> &str {
        "recording"
    }

    async fn create_message(&self, embed: &StatusEmbed) -> Result<MessageId, SinkError> {
        self.embeds.lock().unwrap().push(embed.clone());
        Ok("1".to_string())
    }

    async fn edit_message(&self, _id: &MessageId, embed: &StatusEmbed) -> Result<(), SinkError> {
        self.embeds.lock().unwrap().push(embed.clone());
        Ok(())
    }

    async fn fetch_message(&self, id: &MessageId) -> Result<(), SinkError> {
        Err(SinkError::NotFound { id: id.clone() })
    }
}

struct ExternalUp;

#[async_trait]
impl StatusProbe for ExternalUp {
    async fn probe(&self, address: &ServerAddress) -> Result<ServerStatus, QueryError> {
        if address.host != "play.example.net" {
            return Err(QueryError::Refused(address.to_string()));
        }
        Ok(ServerStatus {
            online: 2,
            max: 20,
            sample: Some(vec!["Alex".to_string(), "Steve".to_string()]),
            anonymous: 0,
            version: None,
            motd: String::new(),
            latency: Duration::from_millis(3),
        })
    }
}

fn config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.server.address = "play.example.net:25565".to_string();
    config.server.local_address = None;
    config.log.path = dir.path().join("latest.log");
    config.log.idle_backoff_ms = 20;
    config.poll.force_check_file = dir.path().join("force_server_check.trigger");
    config.discord.message_id_path = dir.path().join("status_message_id.txt");
    config.publish.min_interval_ms = 0;
    config
}

async fn wait_for(sink: &RecordingSink, value: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !sink.any_field(value) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never published {:?}", value));
}

#[tokio::test]
async fn replay_poll_and_shutdown_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let mut log = std::fs::File::create(&config.log.path).unwrap();
    writeln!(log, "[12:00:00] [Server thread/INFO]: Done (3.2s)!").unwrap();
    writeln!(log, "[12:01:00] [Server thread/INFO]: Alex joined the game").unwrap();
    log.flush().unwrap();

    let sink = Arc::new(RecordingSink::default());
    let monitor = Monitor::new(config.clone(), sink.clone(), Arc::new(ExternalUp));
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(monitor.run(shutdown.clone()));

    // Placeholder first, then the poll verdict replaces the replayed roster
    wait_for(&sink, "2: Alex, Steve").await;
    assert_eq!(
        sink.embeds.lock().unwrap()[0].description,
        "Checking..."
    );
    let stored = std::fs::read_to_string(&config.discord.message_id_path).unwrap();
    assert_eq!(stored.trim(), "1");

    shutdown.cancel();
    running.await.unwrap().unwrap();

    let last = sink.last().unwrap();
    assert_eq!(last.description, "🔴 Offline");
    assert!(last.fields.is_empty());
}

#[tokio::test]
async fn poll_verdict_lands_despite_rate_limit_after_seed() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.publish.min_interval_ms = 2000;
    std::fs::File::create(&config.log.path).unwrap();

    let sink = Arc::new(RecordingSink::default());
    let monitor = Monitor::new(config, sink.clone(), Arc::new(ExternalUp));
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(monitor.run(shutdown.clone()));

    // Replay of an empty log publishes offline; the poll arrives inside the
    // same rate-limit window and must still be shown once it reopens
    wait_for(&sink, "2: Alex, Steve").await;

    shutdown.cancel();
    running.await.unwrap().unwrap();
}

/// Creates messages, but edits hang forever
#[derive(Default)]
struct StuckSink;

#[async_trait]
impl StatusSink for StuckSink {
    fn platform_name(&self) -> &str {
        "stuck"
    }

    async fn create_message(&self, _embed: &StatusEmbed) -> Result<MessageId, SinkError> {
        Ok("1".to_string())
    }

    async fn edit_message(&self, _id: &MessageId, _embed: &StatusEmbed) -> Result<(), SinkError> {
        std::future::pending().await
    }

    async fn fetch_message(&self, id: &MessageId) -> Result<(), SinkError> {
        Err(SinkError::NotFound { id: id.clone() })
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_with_stuck_sink_ends_within_deadline() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    std::fs::File::create(&config.log.path).unwrap();
    let deadline = config.publish.shutdown_timeout();

    let monitor = Monitor::new(config, Arc::new(StuckSink), Arc::new(ExternalUp));
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(monitor.run(shutdown.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = tokio::time::Instant::now();
    shutdown.cancel();
    running.await.unwrap().unwrap();
    assert!(
        started.elapsed() <= deadline + Duration::from_millis(100),
        "shutdown took {:?}",
        started.elapsed()
    );
}
