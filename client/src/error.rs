//! Errors returned by [`AnalysisClient`](crate::AnalysisClient).
//!
//! Every operation has its own error type so callers can tell which step of
//! the job lifecycle failed. They all wrap a [`ServiceFailure`] and expose a
//! single user-facing [`message`](UploadError::message).

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Why one request did not produce a usable response.
#[derive(Debug, Error)]
pub enum ServiceFailure {
    #[error("HTTP {status}")]
    Http {
        status: StatusCode,
        /// `detail` field of a JSON error body, when the service sent one.
        detail: Option<String>,
        /// Raw (capped) error body.
        body: String,
    },
    #[error("{0}")]
    Transport(#[source] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[source] reqwest::Error),
}

impl ServiceFailure {
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            ServiceFailure::Http { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ServiceFailure::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[source] reqwest::Error),
    #[error("service url '{0}' cannot be used as a base")]
    UnsupportedBaseUrl(Url),
}

macro_rules! operation_error {
    ($(#[$meta:meta])* $name:ident, $generic:literal, prefix_detail: $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Error)]
        #[error("{message}")]
        pub struct $name {
            message: String,
            #[source]
            failure: ServiceFailure,
        }

        impl $name {
            pub const GENERIC_MESSAGE: &'static str = $generic;

            #[must_use]
            pub fn new(failure: ServiceFailure) -> Self {
                let message = user_message($generic, &failure, $prefix);
                Self { message, failure }
            }

            #[must_use]
            pub fn message(&self) -> &str {
                &self.message
            }

            #[must_use]
            pub fn failure(&self) -> &ServiceFailure {
                &self.failure
            }

            #[must_use]
            pub fn into_message(self) -> String {
                self.message
            }
        }
    };
}

operation_error!(
    /// `POST /upload` failed.
    UploadError, "upload failed", prefix_detail: false
);
operation_error!(
    /// `POST /analyze/{job_id}` failed.
    AnalysisStartError, "failed to start analysis", prefix_detail: false
);
operation_error!(
    /// `GET /status/{job_id}` failed. Always prefixed so a poll failure is
    /// distinguishable from a job that reported its own error.
    StatusPollError, "failed to check status", prefix_detail: true
);
operation_error!(DownloadError, "download failed", prefix_detail: false);
operation_error!(
    RenderFetchError, "could not load the tree rendering", prefix_detail: false
);
operation_error!(RerenderError, "failed to re-render tree", prefix_detail: false);

/// Service detail when present, else the generic text plus the cause.
fn user_message(generic: &str, failure: &ServiceFailure, prefix_detail: bool) -> String {
    match failure.detail() {
        Some(detail) if prefix_detail => format!("{generic}: {detail}"),
        Some(detail) => detail.to_string(),
        None => format!("{generic}: {failure}"),
    }
}

/// Pull a human-readable `detail` out of a JSON error body.
///
/// Accepts `{"detail": "text"}` and the list form
/// `{"detail": [{"msg": "..."}, ...]}` used for request validation errors.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}
