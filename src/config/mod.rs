use crate::media::DownloadPreferences;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub ytdlp: YtDlpConfig,
    pub download: DownloadConfig,
    pub history: HistoryConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct YtDlpConfig {
    pub binary: String,
    pub fetch_timeout_secs: u64,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            fetch_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DownloadConfig {
    pub output_dir: Option<PathBuf>,
    pub output_template: Option<String>,
    pub extract_audio: bool,
    pub format_id: Option<String>,
    pub cookies_file: Option<PathBuf>,
    pub embed_metadata: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HistoryConfig {
    /// JSON-lines file; history is not kept when unset
    pub path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config")
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging.format
    }

    /// Preferences every request starts from.
    pub fn default_preferences(&self) -> DownloadPreferences {
        DownloadPreferences {
            extract_audio: self.download.extract_audio,
            format_id: self.download.format_id.clone(),
            output_dir: self.download.output_dir.clone(),
            output_template: self.download.output_template.clone(),
            cookies_file: self.download.cookies_file.clone(),
            embed_metadata: self.download.embed_metadata,
        }
    }
}

/// Resolve the config file: explicit path, `CLIPFLOW_CONFIG`, then the
/// XDG and home config directories.
pub fn find_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(path) = std::env::var("CLIPFLOW_CONFIG") {
        return Some(PathBuf::from(path));
    }

    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        let config_path = Path::new(&xdg_config_home).join("clipflow/config.toml");
        if config_path.exists() {
            return Some(config_path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let config_path = home.join(".config/clipflow/config.toml");
        if config_path.exists() {
            return Some(config_path);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.get_logging_format(), "json");
        assert_eq!(config.ytdlp.binary, "yt-dlp");
        assert_eq!(config.ytdlp.fetch_timeout_secs, 30);
        assert!(config.notifications.enabled);
        assert_eq!(config.default_preferences(), DownloadPreferences::default());
    }

    #[test]
    fn test_parse_partial_config() {
        let config = Config::parse(
            r#"
            [logging]
            format = "pretty"

            [download]
            output_dir = "/media/videos"
            extract_audio = true
            "#,
        )
        .unwrap();

        assert_eq!(config.get_logging_format(), "pretty");
        assert_eq!(config.ytdlp.binary, "yt-dlp");
        let preferences = config.default_preferences();
        assert!(preferences.extract_audio);
        assert_eq!(preferences.output_dir, Some(PathBuf::from("/media/videos")));
        assert_eq!(preferences.format_id, None);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ytdlp]\nbinary = \"/opt/yt-dlp\"\nfetch_timeout_secs = 5").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.ytdlp.binary, "/opt/yt-dlp");
        assert_eq!(config.ytdlp.fetch_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        assert!(Config::parse("[download]\nextract_audio = \"yes\"").is_err());
        assert!(Config::from_file("/nonexistent/clipflow.toml").is_err());
    }

    #[test]
    fn test_explicit_config_path_wins() {
        assert_eq!(
            find_config_path(Some("/etc/clipflow.toml")),
            Some(PathBuf::from("/etc/clipflow.toml"))
        );
    }
}
