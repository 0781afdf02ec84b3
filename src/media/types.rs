use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Metadata for a single video as reported by the extraction engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    pub duration: Option<f64>,
    #[serde(rename = "filesize", deserialize_with = "lenient_size")]
    pub file_size: Option<u64>,
    #[serde(rename = "filesize_approx", deserialize_with = "lenient_size")]
    pub file_size_approx: Option<u64>,
    pub thumbnail: Option<String>,
    pub webpage_url: Option<String>,
    pub ext: String,
    pub formats: Vec<Format>,
}

impl VideoInfo {
    /// Exact size when known, otherwise the engine's estimate, otherwise zero.
    pub fn size_or_approx(&self) -> u64 {
        self.file_size.or(self.file_size_approx).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Format {
    pub format_id: String,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    #[serde(rename = "filesize", deserialize_with = "lenient_size")]
    pub file_size: Option<u64>,
    #[serde(rename = "filesize_approx", deserialize_with = "lenient_size")]
    pub file_size_approx: Option<u64>,
    pub format_note: Option<String>,
}

impl Format {
    pub fn size_or_approx(&self) -> u64 {
        self.file_size.or(self.file_size_approx).unwrap_or(0)
    }

    /// A format with no video stream but a real audio stream.
    pub fn is_audio_only(&self) -> bool {
        self.vcodec.as_deref() == Some("none") && self.acodec.as_deref() != Some("none")
    }
}

/// Per-request knobs handed through to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadPreferences {
    pub extract_audio: bool,
    pub format_id: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub output_template: Option<String>,
    pub cookies_file: Option<PathBuf>,
    pub embed_metadata: bool,
}

/// One progress report from a running download.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub percent: f32,
    pub speed: Option<String>,
    pub line: String,
}

// yt-dlp reports sizes as integers for most extractors but some emit floats.
fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }))
}
