mod downloader;
mod types;
mod ytdlp;

pub use downloader::{Cancelled, Downloader, InfoFetcher, ProcessControl, ProgressFn};
pub use types::{DownloadPreferences, Format, Progress, VideoInfo};
pub use ytdlp::{parse_progress, YtDlpDownloader};

use anyhow::Result;
use tracing::info;

/// Fail early when the extraction engine is missing.
pub async fn test_setup(downloader: &dyn Downloader) -> Result<()> {
    info!("Testing media downloader setup...");

    if downloader.test_availability().await {
        info!("{} is available", downloader.name());
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} is not available. Please install it or set ytdlp.binary in the config.",
            downloader.name()
        ))
    }
}

/// Parse a playlist selection such as `1,3,5-7` into indices, keeping order.
pub fn parse_playlist_items(items: &str) -> Result<Vec<u32>> {
    let mut indices = Vec::new();
    for part in items.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: u32 = start.trim().parse()?;
                let end: u32 = end.trim().parse()?;
                if start == 0 || end < start {
                    anyhow::bail!("Invalid playlist range: {}", part);
                }
                indices.extend(start..=end);
            }
            None => {
                let index: u32 = part.parse()?;
                if index == 0 {
                    anyhow::bail!("Playlist indices start at 1");
                }
                indices.push(index);
            }
        }
    }
    if indices.is_empty() {
        anyhow::bail!("No playlist items selected");
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_playlist_items() {
        assert_eq!(parse_playlist_items("1,2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_playlist_items("5, 2-4").unwrap(), vec![5, 2, 3, 4]);
        assert_eq!(parse_playlist_items("7").unwrap(), vec![7]);
    }

    #[test]
    fn test_parse_playlist_items_rejects_invalid() {
        assert!(parse_playlist_items("").is_err());
        assert!(parse_playlist_items("0").is_err());
        assert!(parse_playlist_items("4-2").is_err());
        assert!(parse_playlist_items("a").is_err());
    }
}
