use crate::coordinator::{HistoryEntry, HistorySink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Appends one JSON object per finished file.
pub struct JsonlHistory {
    path: PathBuf,
    // Serializes appends from concurrent tasks
    write_lock: Mutex<()>,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn load(&self) -> Result<Vec<HistoryEntry>> {
        read_entries(&self.path).await
    }
}

async fn read_entries(path: &Path) -> Result<Vec<HistoryEntry>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read history {}", path.display()))
        }
    };

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).context("Corrupt history entry"))
        .collect()
}

#[async_trait]
impl HistorySink for JsonlHistory {
    async fn record(&self, entry: HistoryEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut line = serde_json::to_string(&entry).context("Failed to encode history entry")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open history {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("Recorded {} in history", entry.file_path.display());
        Ok(())
    }
}

/// Used when no history file is configured.
pub struct NoHistory;

#[async_trait]
impl HistorySink for NoHistory {
    async fn record(&self, _entry: HistoryEntry) -> Result<()> {
        Ok(())
    }
}
