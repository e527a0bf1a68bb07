// Force-check signal
//
// An operator (or another tool) drops a marker file; the watcher deletes it
// and wakes the poller. Deleting before notifying makes each marker fire at
// most once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct ForceCheck {
    marker: PathBuf,
    scan_interval: Duration,
    notify: Arc<Notify>,
}

impl ForceCheck {
    pub fn new(marker: impl Into<PathBuf>, scan_interval: Duration) -> Self {
        Self {
            marker: marker.into(),
            scan_interval,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Wake primitive the poller waits on
    pub fn handle(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Request a check without a marker file
    pub fn trigger(&self) {
        self.notify.notify_one();
    }

    /// Remove the marker if present. True when this call observed it.
    pub async fn consume_marker(&self) -> bool {
        match tokio::fs::remove_file(&self.marker).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to remove force-check marker {:?}: {}", self.marker, e);
                false
            }
        }
    }

    /// Scan for the marker every `scan_interval` until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        debug!(
            "Watching {:?} for force-check requests every {:?}",
            self.marker, self.scan_interval
        );
        loop {
            if self.consume_marker().await {
                info!("Force server check triggered");
                self.trigger();
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.scan_interval) => {}
            }
        }
    }
}

/// Create the marker file so a running monitor checks immediately
pub async fn request(marker: &Path) -> std::io::Result<()> {
    if let Some(parent) = marker.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(marker, b"").await
}
