use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use clipflow::bridge::{
    ConsoleMessages, ConsoleNotifier, JsonlHistory, LoggingKeepAlive, NoHistory, SystemFileAccess,
};
use clipflow::config::{self, Config};
use clipflow::coordinator::{
    ActivityTracker, Collaborators, Coordinator, DownloadResult, ErrorState, HistorySink,
};
use clipflow::media::{self, InfoFetcher, VideoInfo, YtDlpDownloader};
use clipflow::utils;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Fetch info for a URL and download it
    Get {
        url: String,
        /// Extract audio only
        #[arg(long)]
        audio: bool,
        /// yt-dlp format selector
        #[arg(short, long)]
        format: Option<String>,
        /// Open the result when done
        #[arg(long)]
        open: bool,
    },
    /// Download selected entries of a playlist, e.g. `--items 1,3,5-7`
    Playlist {
        url: String,
        #[arg(short, long)]
        items: String,
    },
    /// List the formats of a URL, or download the selected ones
    Formats {
        url: String,
        #[arg(short, long, value_delimiter = ',')]
        select: Vec<String>,
    },
    /// Show downloaded files
    History,
    /// Check that yt-dlp and ffmpeg are installed
    Check,
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if config.get_logging_format() == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match config::find_config_path(args.config.as_deref()) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    init_logging(&config);

    info!("Starting clipflow...");

    let activity = ActivityTracker::new();
    let engine = Arc::new(YtDlpDownloader::new(&config.ytdlp, activity.clone()));
    let history: Arc<dyn HistorySink> = match &config.history.path {
        Some(path) => Arc::new(JsonlHistory::new(path)),
        None => Arc::new(NoHistory),
    };

    let coordinator = Arc::new(Coordinator::new(
        Collaborators {
            fetcher: engine.clone(),
            downloader: engine.clone(),
            process_control: engine.clone(),
            notifications: Arc::new(ConsoleNotifier::new(config.notifications.enabled)),
            messages: Arc::new(ConsoleMessages),
            files: Arc::new(SystemFileAccess::new()),
            history,
        },
        activity,
    ));
    coordinator.spawn_keep_alive(Arc::new(LoggingKeepAlive));
    spawn_state_logger(&coordinator);

    let preferences = config.default_preferences();

    match args.action {
        Action::Get {
            url,
            audio,
            format,
            open,
        } => {
            ensure_web_url(&url)?;
            let mut preferences = preferences;
            preferences.extract_audio |= audio;
            if format.is_some() {
                preferences.format_id = format;
            }
            let handle = coordinator.start_task(url, preferences)?;
            let files = wait_for_result(&coordinator, handle).await?;
            print_files(&files);
            if open && !coordinator.open_last_result().await {
                warn!("Could not open the downloaded file");
            }
        }
        Action::Playlist { url, items } => {
            ensure_web_url(&url)?;
            let indices = media::parse_playlist_items(&items)?;
            let handle = coordinator.start_playlist_by_indices(url, indices, preferences)?;
            let files = wait_for_result(&coordinator, handle).await?;
            print_files(&files);
        }
        Action::Formats { url, select } => {
            ensure_web_url(&url)?;
            let info = engine
                .fetch(&url, None, &preferences)
                .await
                .context("Failed to fetch media info")?;

            if select.is_empty() {
                print_formats(&info);
                return Ok(());
            }

            let formats = select
                .iter()
                .map(|id| {
                    info.formats
                        .iter()
                        .find(|f| &f.format_id == id)
                        .cloned()
                        .with_context(|| format!("Unknown format id: {}", id))
                })
                .collect::<Result<Vec<_>>>()?;

            let handle = coordinator.start_format_selection(info, formats, preferences)?;
            let files = wait_for_result(&coordinator, handle).await?;
            print_files(&files);
        }
        Action::History => {
            let Some(path) = &config.history.path else {
                println!("History is disabled; set history.path in the config");
                return Ok(());
            };
            for entry in JsonlHistory::new(path).load().await? {
                println!(
                    "{}\t{}\t{}",
                    entry.downloaded_at,
                    entry.title,
                    entry.file_path.display()
                );
            }
        }
        Action::Check => {
            media::test_setup(engine.as_ref()).await?;
        }
    }

    Ok(())
}

fn ensure_web_url(url: &str) -> Result<()> {
    if utils::is_web_url(url) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Not a web URL: {}", url))
    }
}

// Waits for the task, cancelling it on Ctrl-C.
async fn wait_for_result(
    coordinator: &Coordinator,
    mut handle: JoinHandle<DownloadResult>,
) -> Result<Vec<PathBuf>> {
    let result = tokio::select! {
        result = &mut handle => result,
        _ = tokio::signal::ctrl_c() => {
            coordinator.cancel();
            handle.await
        }
    };
    let files = result.context("Download task panicked")??;
    Ok(files)
}

fn spawn_state_logger(coordinator: &Coordinator) {
    let mut states = coordinator.subscribe_state();
    let mut errors = coordinator.subscribe_error();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = states.changed() => {
                    if changed.is_err() { break; }
                    let state = *states.borrow_and_update();
                    info!(%state, "Downloader state changed");
                }
                changed = errors.changed() => {
                    if changed.is_err() { break; }
                    if let ErrorState::Occurred { report, code } = errors.borrow_and_update().clone() {
                        warn!(?code, "{}", report);
                    }
                }
            }
        }
    });
}

fn print_files(files: &[PathBuf]) {
    for file in files {
        println!("{}", file.display());
    }
}

fn print_formats(info: &VideoInfo) {
    let duration = info.duration.map(|d| d.round() as u64).unwrap_or(0);
    println!("{} [{}]", info.title, utils::format_duration(duration));
    for format in &info.formats {
        println!(
            "{:<12} {:<6} {:<14} {:<14} {:>10}  {}",
            format.format_id,
            format.ext.as_deref().unwrap_or("-"),
            format.vcodec.as_deref().unwrap_or("-"),
            format.acodec.as_deref().unwrap_or("-"),
            utils::format_bytes(format.size_or_approx()),
            format.format_note.as_deref().unwrap_or("")
        );
    }
}
