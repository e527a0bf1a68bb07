// Craftwatch Log Tailer
//
// Extracts presence events from the server's append-only log: one replay
// pass at startup, then live tailing.

pub mod grammar;
pub mod replay;
pub mod tailer;

use craftwatch_core::{CraftwatchError, DomainError};
use thiserror::Error;

pub use grammar::parse_line;
pub use replay::{ReplayOutcome, ReplayReducer};
pub use tailer::{replay_file, LogTailer};

#[derive(Debug, Error)]
pub enum TailError {
    #[error("log source {path} unavailable: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TailError> for CraftwatchError {
    fn from(err: TailError) -> Self {
        match err {
            TailError::Unavailable { path, source } => {
                CraftwatchError::Domain(DomainError::SourceUnavailable {
                    source: path,
                    reason: source.to_string(),
                })
            }
            TailError::Io(e) => e.into(),
        }
    }
}
