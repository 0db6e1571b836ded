//! Terminal job failures and rendering failures.

use thiserror::Error;

use phylo_client::{AnalysisStartError, StatusPollError, UploadError};
use phylo_types::ValidationError;

/// Shown when the service reports `error` without a message.
pub const GENERIC_REMOTE_FAILURE: &str = "analysis failed on the server";

/// The job itself failed on the service side (`status: "error"`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteJobError {
    message: String,
}

impl RemoteJobError {
    /// Blank or missing messages fall back to [`GENERIC_REMOTE_FAILURE`].
    #[must_use]
    pub fn new(message: Option<&str>) -> Self {
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(GENERIC_REMOTE_FAILURE)
            .to_string();
        Self { message }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Everything that can end a session in `Failed`. Each variant displays as
/// the single message shown to the user.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    AnalysisStart(#[from] AnalysisStartError),
    #[error(transparent)]
    StatusPoll(#[from] StatusPollError),
    #[error(transparent)]
    RemoteJob(#[from] RemoteJobError),
}

impl JobError {
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Failures detected before anything was sent.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, JobError::Validation(_))
    }
}

/// A rendering capability call failed, or no capability is present.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("interactive tree view is unavailable")]
    Unavailable,
    #[error("no node selected")]
    NoTarget,
    #[error("{operation} failed: {message}")]
    Capability {
        operation: &'static str,
        message: String,
    },
}

impl RenderError {
    pub fn capability(operation: &'static str, message: impl Into<String>) -> Self {
        RenderError::Capability {
            operation,
            message: message.into(),
        }
    }
}
