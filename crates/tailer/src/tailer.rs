// Log Tailer
//
// Replays the server log once at startup, then follows appended lines and
// forwards each presence event to the controller as it arrives.

use crate::grammar::parse_line;
use crate::replay::{ReplayOutcome, ReplayReducer};
use crate::TailError;
use craftwatch_core::{EventSource, PresenceEvent, PresenceKind, Signal};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Log tailer
pub struct LogTailer {
    path: PathBuf,
    idle_backoff: Duration,
    sequence: u64,
}

impl LogTailer {
    pub fn new(path: impl Into<PathBuf>, idle_backoff: Duration) -> Self {
        Self {
            path: path.into(),
            idle_backoff,
            sequence: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan the whole log and reconstruct the roster.
    ///
    /// Returns the outcome plus the byte offset tailing should resume from.
    /// An unreadable log yields an empty outcome and offset 0.
    pub async fn replay(&self) -> (ReplayOutcome, u64) {
        info!("Scanning log file: {}", self.path.display());
        match replay_file(&self.path).await {
            Ok((outcome, offset)) => {
                info!(
                    "Replayed {} lines ({} presence events), online={}, players: {}",
                    outcome.lines,
                    outcome.events,
                    outcome.online,
                    join_or_none(&outcome.players)
                );
                (outcome, offset)
            }
            Err(e) => {
                error!("Failed to read log file: {}", e);
                (ReplayOutcome::empty(), 0)
            }
        }
    }

    /// Follow the log from `offset` until cancelled.
    ///
    /// Read errors and a missing file are logged and retried after the idle
    /// backoff; this never returns an error.
    pub async fn run(mut self, offset: u64, tx: mpsc::Sender<Signal>, cancel: CancellationToken) {
        info!("Tailing {} from byte {}", self.path.display(), offset);

        let mut position = offset;
        let mut reader: Option<BufReader<File>> = None;
        let mut pending: Vec<u8> = Vec::new();
        let mut open_failures: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if reader.is_none() {
                match open_at(&self.path, position).await {
                    Ok(r) => {
                        if open_failures > 0 {
                            info!("Log file {} is readable again", self.path.display());
                        }
                        open_failures = 0;
                        reader = Some(r);
                    }
                    Err(e) => {
                        if open_failures == 0 {
                            warn!("Cannot open log for tailing: {}", e);
                        }
                        open_failures += 1;
                        if !self.idle(&cancel).await {
                            break;
                        }
                        continue;
                    }
                }
            }
            let Some(active) = reader.as_mut() else {
                continue;
            };

            let mut chunk = Vec::new();
            match active.read_until(b'\n', &mut chunk).await {
                Ok(0) => {
                    if self.rotated(position).await {
                        info!("Log file {} was truncated or rotated, restarting from the beginning", self.path.display());
                        position = 0;
                        pending.clear();
                        reader = None;
                        continue;
                    }
                    if !self.idle(&cancel).await {
                        break;
                    }
                }
                Ok(n) => {
                    position += n as u64;
                    pending.extend_from_slice(&chunk);
                    if !pending.ends_with(b"\n") {
                        continue;
                    }
                    let line = String::from_utf8_lossy(&pending).into_owned();
                    pending.clear();

                    if let Some(kind) = parse_line(&line) {
                        let event = self.event(kind);
                        log_live_event(&event.kind);
                        if tx.send(Signal::Presence(event)).await.is_err() {
                            debug!("Controller channel closed, stopping tailer");
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!("Error reading log file: {}", TailError::from(e));
                    reader = None;
                    if !self.idle(&cancel).await {
                        break;
                    }
                }
            }
        }

        info!("Log tailer stopped");
    }

    fn event(&mut self, kind: PresenceKind) -> PresenceEvent {
        self.sequence += 1;
        PresenceEvent::new(kind, EventSource::Log, self.sequence)
    }

    /// Sleep for the idle backoff. Returns false when cancelled.
    async fn idle(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.idle_backoff) => true,
        }
    }

    async fn rotated(&self, position: u64) -> bool {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len() < position,
            Err(_) => false,
        }
    }
}

/// Replay a log file, returning the outcome and the offset just past the
/// last complete line.
pub async fn replay_file(path: &Path) -> Result<(ReplayOutcome, u64), TailError> {
    let file = File::open(path).await.map_err(|e| TailError::Unavailable {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);
    let mut reducer = ReplayReducer::new();
    let mut offset: u64 = 0;
    let mut lines = 0usize;
    let mut chunk = Vec::new();

    loop {
        chunk.clear();
        let n = reader.read_until(b'\n', &mut chunk).await?;
        if n == 0 || !chunk.ends_with(b"\n") {
            // EOF, or a line still being written; tailing picks it up whole
            break;
        }
        offset += n as u64;
        lines += 1;

        let line = String::from_utf8_lossy(&chunk);
        if let Some(kind) = parse_line(&line) {
            debug!("Replay: {}", kind);
            reducer.feed(&kind);
        }
    }

    let mut outcome = reducer.finish();
    outcome.lines = lines;
    Ok((outcome, offset))
}

async fn open_at(path: &Path, position: u64) -> Result<BufReader<File>, TailError> {
    let mut file = File::open(path).await.map_err(|e| TailError::Unavailable {
        path: path.display().to_string(),
        source: e,
    })?;
    file.seek(std::io::SeekFrom::Start(position)).await?;
    Ok(BufReader::new(file))
}

fn log_live_event(kind: &PresenceKind) {
    match kind {
        PresenceKind::Joined(name) => info!("[LOG] {} joined the server.", name),
        PresenceKind::Left(name) => info!("[LOG] {} left the server.", name),
        PresenceKind::ServerStarted => info!("[LOG] Server started"),
        PresenceKind::ServerStopping => info!("[LOG] Server stopping"),
    }
}

fn join_or_none<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    let joined = names
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "None".to_string()
    } else {
        joined
    }
}
