use super::{
    downloader::{Cancelled, Downloader, InfoFetcher, ProcessControl, ProgressFn},
    types::{DownloadPreferences, Progress, VideoInfo},
};
use crate::config::YtDlpConfig;
use crate::coordinator::ActivityTracker;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    ffi::OsString,
    path::PathBuf,
    process::Stdio,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct YtDlpDownloader {
    binary: String,
    fetch_timeout: Duration,
    processes: Registry,
    next_generation: AtomicU64,
    activity: ActivityTracker,
}

type Registry = Arc<Mutex<HashMap<String, (u64, CancellationToken)>>>;

// Removes the task's entry from the process registry once its download ends.
struct Registration {
    task_id: String,
    generation: u64,
    token: CancellationToken,
    processes: Registry,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Ok(mut processes) = self.processes.lock() {
            // A newer download for the same id may have replaced us.
            if processes
                .get(&self.task_id)
                .is_some_and(|(generation, _)| *generation == self.generation)
            {
                processes.remove(&self.task_id);
            }
        }
    }
}

impl YtDlpDownloader {
    pub fn new(config: &YtDlpConfig, activity: ActivityTracker) -> Self {
        Self {
            binary: config.binary.clone(),
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            processes: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            activity,
        }
    }

    fn register(&self, task_id: &str) -> Registration {
        let token = CancellationToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut processes) = self.processes.lock() {
            if let Some((_, previous)) =
                processes.insert(task_id.to_string(), (generation, token.clone()))
            {
                warn!("Replacing running process registration for task {}", task_id);
                previous.cancel();
            }
        }
        Registration {
            task_id: task_id.to_string(),
            generation,
            token,
            processes: self.processes.clone(),
        }
    }

    fn fetch_args(
        url: &str,
        playlist_index: Option<u32>,
        preferences: &DownloadPreferences,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--dump-json".into(),
            "--no-download".into(),
            "--no-warnings".into(),
        ];
        match playlist_index {
            Some(index) => {
                args.push("--playlist-items".into());
                args.push(index.to_string().into());
            }
            None => args.push("--no-playlist".into()),
        }
        if let Some(cookies) = &preferences.cookies_file {
            args.push("--cookies".into());
            args.push(cookies.into());
        }
        args.push(url.into());
        args
    }

    fn download_args(
        info: &VideoInfo,
        playlist_url: &str,
        playlist_index: u32,
        preferences: &DownloadPreferences,
    ) -> Result<Vec<OsString>> {
        let mut args: Vec<OsString> = vec![
            "--newline".into(),
            "--progress".into(),
            "--no-warnings".into(),
            "--no-simulate".into(),
            "--print".into(),
            "after_move:filepath".into(),
        ];

        if let Some(dir) = &preferences.output_dir {
            args.push("--paths".into());
            args.push(dir.into());
        }
        if let Some(template) = &preferences.output_template {
            args.push("--output".into());
            args.push(template.into());
        }
        if preferences.extract_audio {
            args.push("--extract-audio".into());
        }
        if let Some(format_id) = preferences.format_id.as_deref().filter(|f| !f.is_empty()) {
            args.push("--format".into());
            args.push(format_id.into());
        }
        if preferences.embed_metadata {
            args.push("--embed-metadata".into());
        }
        if let Some(cookies) = &preferences.cookies_file {
            args.push("--cookies".into());
            args.push(cookies.into());
        }

        if !playlist_url.is_empty() && playlist_index > 0 {
            args.push("--playlist-items".into());
            args.push(playlist_index.to_string().into());
            args.push(playlist_url.into());
        } else {
            let url = info
                .webpage_url
                .as_deref()
                .filter(|u| !u.is_empty())
                .with_context(|| format!("No webpage URL in metadata for {}", info.id))?;
            args.push("--no-playlist".into());
            args.push(url.into());
        }

        Ok(args)
    }
}

/// Parse a `--newline` progress line such as
/// `[download]  42.5% of ~ 10.00MiB at  1.20MiB/s ETA 00:05`.
pub fn parse_progress(line: &str) -> Option<Progress> {
    let rest = line.strip_prefix("[download]")?;
    let mut tokens = rest.split_whitespace();
    let percent = tokens
        .next()?
        .strip_suffix('%')?
        .parse::<f32>()
        .ok()?
        .clamp(0.0, 100.0);

    let mut speed = None;
    while let Some(token) = tokens.next() {
        if token == "at" {
            speed = tokens
                .next()
                .filter(|s| !s.starts_with("Unknown"))
                .map(|s| s.to_string());
            break;
        }
    }

    Some(Progress {
        percent,
        speed,
        line: line.trim().to_string(),
    })
}

#[async_trait]
impl InfoFetcher for YtDlpDownloader {
    async fn fetch(
        &self,
        url: &str,
        playlist_index: Option<u32>,
        preferences: &DownloadPreferences,
    ) -> Result<VideoInfo> {
        debug!("Extracting metadata with yt-dlp for: {}", url);
        let _process = self.activity.track();

        let output = tokio::time::timeout(
            self.fetch_timeout,
            Command::new(&self.binary)
                .args(Self::fetch_args(url, playlist_index, preferences))
                .kill_on_drop(true)
                .output(),
        )
        .await
        .context("Media metadata extraction timed out")?
        .context("Failed to extract media metadata")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "Media metadata extraction failed: {}",
                error.trim()
            ));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        let first = json_str
            .lines()
            .find(|l| !l.trim().is_empty())
            .context("yt-dlp returned no metadata")?;

        let info: VideoInfo =
            serde_json::from_str(first).context("Failed to parse media metadata")?;
        debug!("yt-dlp metadata for {}: {}", info.id, info.title);

        Ok(info)
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn download(
        &self,
        info: &VideoInfo,
        playlist_url: &str,
        playlist_index: u32,
        preferences: &DownloadPreferences,
        on_progress: &ProgressFn<'_>,
    ) -> Result<Vec<PathBuf>> {
        info!("Downloading media with yt-dlp: {}", info.id);

        let args = Self::download_args(info, playlist_url, playlist_index, preferences)?;
        let registration = self.register(&info.id);
        let _process = self.activity.track();

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to spawn yt-dlp")?;

        let stdout = child.stdout.take().context("Failed to get yt-dlp stdout")?;
        let mut stderr = child.stderr.take().context("Failed to get yt-dlp stderr")?;

        let stderr_task = tokio::spawn(async move {
            let mut buffer = String::new();
            let _ = stderr.read_to_string(&mut buffer).await;
            buffer
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut files = Vec::new();

        loop {
            tokio::select! {
                _ = registration.token.cancelled() => {
                    info!("Killing yt-dlp process for task {}", info.id);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill yt-dlp: {}", e);
                    }
                    return Err(Cancelled { task_id: info.id.clone() }.into());
                }
                line = lines.next_line() => {
                    match line.context("Failed to read yt-dlp output")? {
                        Some(line) => {
                            if let Some(progress) = parse_progress(&line) {
                                on_progress(&progress);
                            } else if !line.starts_with('[') && !line.trim().is_empty() {
                                files.push(PathBuf::from(line.trim()));
                            } else {
                                debug!("yt-dlp: {}", line);
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        let status = child.wait().await.context("Failed to wait for yt-dlp")?;
        let error = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(anyhow::anyhow!("Media download failed: {}", error.trim()));
        }

        info!("yt-dlp produced {} file(s) for {}", files.len(), info.id);
        Ok(files)
    }

    async fn test_availability(&self) -> bool {
        let yt_dlp_available = match Command::new(&self.binary).arg("--version").output().await {
            Ok(output) => {
                if output.status.success() {
                    let version = String::from_utf8_lossy(&output.stdout);
                    info!("yt-dlp is available, version: {}", version.trim());
                    true
                } else {
                    warn!("yt-dlp command failed");
                    false
                }
            }
            Err(e) => {
                warn!("yt-dlp not found: {}", e);
                false
            }
        };

        // ffmpeg is needed for merging formats and audio extraction
        let ffmpeg_available = match Command::new("ffmpeg").arg("-version").output().await {
            Ok(output) => output.status.success(),
            Err(e) => {
                warn!("ffmpeg not found: {}", e);
                false
            }
        };

        if yt_dlp_available && !ffmpeg_available {
            warn!("yt-dlp will work but format merging and audio extraction will fail");
        }

        yt_dlp_available
    }
}

impl ProcessControl for YtDlpDownloader {
    fn destroy_process(&self, task_id: &str) {
        let token = match self.processes.lock() {
            Ok(processes) => processes.get(task_id).map(|(_, token)| token.clone()),
            Err(_) => None,
        };
        match token {
            Some(token) => {
                info!("Destroying yt-dlp process for task {}", task_id);
                token.cancel();
            }
            None => debug!("No running process for task {}", task_id),
        }
    }
}
