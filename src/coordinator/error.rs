use super::state::ErrorCode;
use crate::media::Cancelled;
use thiserror::Error;

/// Why a unit of work did not produce files.
///
/// `aborting` errors end the whole run; non-aborting ones only skip the
/// current playlist entry.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task cancelled")]
    Cancelled,

    #[error("another task is already running")]
    Busy,

    #[error("failed to fetch media info: {error:#}")]
    Fetch { error: anyhow::Error, aborting: bool },

    #[error("download failed: {error:#}")]
    Download { error: anyhow::Error, aborting: bool },
}

impl TaskError {
    pub fn fetch(error: anyhow::Error, aborting: bool) -> Self {
        if is_cancellation(&error) {
            TaskError::Cancelled
        } else {
            TaskError::Fetch { error, aborting }
        }
    }

    pub fn download(error: anyhow::Error, aborting: bool) -> Self {
        if is_cancellation(&error) {
            TaskError::Cancelled
        } else {
            TaskError::Download { error, aborting }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    pub fn is_aborting(&self) -> bool {
        match self {
            TaskError::Fetch { aborting, .. } | TaskError::Download { aborting, .. } => *aborting,
            TaskError::Cancelled | TaskError::Busy => false,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            TaskError::Fetch { .. } => ErrorCode::FetchInfo,
            TaskError::Download { .. } => ErrorCode::Download,
            TaskError::Cancelled | TaskError::Busy => ErrorCode::Unknown,
        }
    }
}

fn is_cancellation(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| cause.downcast_ref::<Cancelled>().is_some())
}
