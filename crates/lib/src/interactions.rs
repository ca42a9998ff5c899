//! Record of answered questions per tenant (question, answer, time).
//!
//! The pipeline records after every generated answer. Records are appended as JSON lines
//! to a file beside the tenants file, so they survive restarts and can be read back with
//! `assist interactions`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One answered customer question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub tenant_id: String,
    pub customer_id: String,
    pub question: String,
    pub answer: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum InteractionLogError {
    #[error("interaction log io: {0}")]
    Io(#[from] std::io::Error),
    #[error("interaction encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sink for answered questions. Errors are the caller's to log; they never block a reply.
#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn record(&self, interaction: Interaction) -> Result<(), InteractionLogError>;
}

/// Append-only JSON lines file, one [`Interaction`] per line.
pub struct JsonlInteractionLog {
    path: PathBuf,
    // Serializes appends from concurrent pipelines.
    write_lock: Mutex<()>,
}

impl JsonlInteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every readable record, oldest first. A missing file is an empty log; lines that do
    /// not parse are skipped with a warning.
    pub async fn read_all(&self) -> Result<Vec<Interaction>, InteractionLogError> {
        let s = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for (n, line) in s.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Interaction>(line) {
                Ok(i) => out.push(i),
                Err(e) => log::warn!(
                    "interactions: skipping line {} of {}: {}",
                    n + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(out)
    }

    /// Records for one tenant, oldest first.
    pub async fn for_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<Interaction>, InteractionLogError> {
        let mut all = self.read_all().await?;
        all.retain(|i| i.tenant_id == tenant_id);
        Ok(all)
    }
}

#[async_trait]
impl InteractionLog for JsonlInteractionLog {
    async fn record(&self, interaction: Interaction) -> Result<(), InteractionLogError> {
        let mut line = serde_json::to_string(&interaction)?;
        line.push('\n');
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
