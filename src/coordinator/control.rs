//! Finalization, cancellation and error reporting.

use super::{lock, Coordinator, DownloaderState, ErrorState, Message, NotificationId, TaskError};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

impl Coordinator {
    /// Mark the active unit of work as complete. No-op when already idle.
    pub fn finish_processing(&self) {
        self.finalize(false);
    }

    pub(super) fn finalize(&self, keep_error: bool) {
        if self.state.get().is_idle() {
            return;
        }
        self.clear_progress(true);
        self.state.set(DownloaderState::Idle);
        if !keep_error {
            self.clear_error();
        }
    }

    // A finished task shows 100%; anything else resets to 0 and forgets the
    // last result so a stale success is never reopened.
    fn clear_progress(&self, finished: bool) {
        self.task.update(|task| {
            task.progress = if finished { 100.0 } else { 0.0 };
            task.progress_text.clear();
        });
        if !finished {
            *lock(&self.last_result) = None;
        }
    }

    /// Stop the active unit of work and return to idle.
    pub fn cancel(&self) {
        self.show(Message::TaskCanceled);
        let unit = {
            let mut current = lock(&self.current);
            current.take().and_then(|run| {
                info!("{}", Message::TaskCanceled);
                run.token.cancel();
                run.unit
            })
        };

        self.state.set(DownloaderState::Idle);
        self.clear_progress(false);
        self.flight.release();

        // Only a unit that is still downloading owns a process and a live notification
        let Some(unit) = unit else {
            return;
        };
        self.collaborators
            .process_control
            .destroy_process(&unit.task_id);
        self.collaborators
            .notifications
            .cancel_notification(unit.notification_id);
    }

    /// Surface a failure to the user and, for aborting errors, end the run.
    pub fn report_error(&self, err: &TaskError, notification_id: Option<NotificationId>) {
        let message = match err {
            TaskError::Cancelled => {
                debug!("Task cancelled, nothing to report");
                return;
            }
            TaskError::Busy => {
                self.show(Message::TaskRunning);
                return;
            }
            TaskError::Fetch { .. } => Message::FetchInfoFailed,
            TaskError::Download { .. } => Message::DownloadFailed,
        };

        error!(aborting = err.is_aborting(), "{:#}", err);
        self.show(message);
        self.error.set(ErrorState::Occurred {
            report: err.to_string(),
            code: err.code(),
        });

        if let Some(id) = notification_id {
            self.collaborators.notifications.finish_notification(
                id,
                None,
                Some(&Message::DownloadFailed.to_string()),
                None,
            );
        }

        if err.is_aborting() {
            self.state.set(DownloaderState::Idle);
            self.clear_progress(false);
        }
    }

    /// Files produced by the most recent successful unit of work.
    pub fn last_result(&self) -> Option<Vec<PathBuf>> {
        lock(&self.last_result).clone()
    }

    /// Open the files of the last finished task. Returns whether anything was opened.
    pub async fn open_last_result(&self) -> bool {
        if self.task.get().progress < 100.0 {
            debug!("Last task has not finished, nothing to open");
            return false;
        }
        let Some(files) = self.last_result() else {
            return false;
        };
        match self.collaborators.files.open_file(&files).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to open download result: {:#}", e);
                false
            }
        }
    }

    pub fn clear_error(&self) {
        self.error.set(ErrorState::None);
    }
}
