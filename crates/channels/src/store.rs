// Persisted message id
//
// A single opaque id in a text file. Writes go through a temp file and a
// rename so a crash never leaves a truncated id behind.

use crate::adapter::{MessageId, SinkError};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct MessageIdStore {
    path: PathBuf,
}

impl MessageIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored id, or `None` when the file is missing, unreadable or blank
    pub async fn load(&self) -> Option<MessageId> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let id = content.trim();
                if id.is_empty() {
                    None
                } else {
                    Some(id.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to read message id from {:?}: {}", self.path, e);
                None
            }
        }
    }

    pub async fn save(&self, id: &MessageId) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| SinkError::Store { source })?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, format!("{}\n", id))
            .await
            .map_err(|source| SinkError::Store { source })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| SinkError::Store { source })?;

        tracing::debug!("Saved message id {} to {:?}", id, self.path);
        Ok(())
    }
}
