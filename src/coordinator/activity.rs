use super::state::{DownloaderState, StateCell};
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

/// Counts external engine processes that are currently alive.
#[derive(Clone, Default)]
pub struct ActivityTracker {
    count: Arc<StateCell<usize>>,
}

/// Decrements the process count when dropped.
pub struct ProcessGuard {
    tracker: ActivityTracker,
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        self.tracker.process_finished();
    }
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_started(&self) {
        self.count.update(|count| *count += 1);
    }

    pub fn process_finished(&self) {
        self.count.update(|count| {
            if *count == 0 {
                warn!("Process finished with no process recorded as running");
            } else {
                *count -= 1;
            }
        });
    }

    /// Count a process for as long as the returned guard lives.
    pub fn track(&self) -> ProcessGuard {
        self.process_started();
        ProcessGuard {
            tracker: self.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.count.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }
}

/// Background service that keeps the host alive while work is in flight.
pub trait KeepAliveService: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

pub fn should_keep_alive(state: &DownloaderState, process_count: usize) -> bool {
    if process_count > 0 {
        return true;
    }
    match state {
        DownloaderState::Idle => false,
        DownloaderState::FetchingInfo
        | DownloaderState::DownloadingVideo
        | DownloaderState::DownloadingPlaylist { .. } => true,
    }
}

/// Start or stop `service` whenever the combination of state and process count
/// flips. Runs until either source is dropped.
pub fn spawn_keep_alive_monitor(
    mut state: watch::Receiver<DownloaderState>,
    mut processes: watch::Receiver<usize>,
    service: Arc<dyn KeepAliveService>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut running = None;
        loop {
            let wanted = should_keep_alive(&state.borrow_and_update(), *processes.borrow_and_update());
            if running != Some(wanted) {
                debug!(keep_alive = wanted, "Keep-alive service changed");
                if wanted {
                    service.start();
                } else {
                    service.stop();
                }
                running = Some(wanted);
            }

            tokio::select! {
                changed = state.changed() => if changed.is_err() { break },
                changed = processes.changed() => if changed.is_err() { break },
            }
        }
    })
}
