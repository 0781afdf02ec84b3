use crate::coordinator::{FileAccess, OpenIntent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::info;

/// Opens files with the desktop's default handler.
pub struct SystemFileAccess {
    opener: &'static str,
}

impl Default for SystemFileAccess {
    fn default() -> Self {
        let opener = if cfg!(target_os = "macos") {
            "open"
        } else if cfg!(target_os = "windows") {
            "explorer"
        } else {
            "xdg-open"
        };
        Self { opener }
    }
}

impl SystemFileAccess {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileAccess for SystemFileAccess {
    fn create_open_intent(&self, paths: &[PathBuf]) -> Option<OpenIntent> {
        let existing: Vec<PathBuf> = paths.iter().filter(|p| p.exists()).cloned().collect();
        if existing.is_empty() {
            None
        } else {
            Some(OpenIntent { paths: existing })
        }
    }

    async fn open_file(&self, paths: &[PathBuf]) -> Result<()> {
        let path = paths
            .iter()
            .find(|p| p.exists())
            .context("None of the downloaded files exist anymore")?;

        info!("Opening {}", path.display());
        let status = Command::new(self.opener)
            .arg(path)
            .status()
            .await
            .with_context(|| format!("Failed to run {}", self.opener))?;

        if !status.success() {
            return Err(anyhow::anyhow!("{} exited with {}", self.opener, status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_intent_only_for_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("video.mp4");
        std::fs::write(&present, b"data").unwrap();
        let missing = dir.path().join("gone.mp4");

        let files = SystemFileAccess::new();
        let intent = files
            .create_open_intent(&[missing.clone(), present.clone()])
            .unwrap();
        assert_eq!(intent.paths, vec![present]);
        assert!(files.create_open_intent(&[missing]).is_none());
        assert!(files.create_open_intent(&[]).is_none());
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let files = SystemFileAccess::new();
        let result = files.open_file(&[PathBuf::from("/nonexistent/video.mp4")]).await;
        assert!(result.is_err());
    }
}
