//! Resolved configuration types shared across crates.
//!
//! Raw TOML deserialization structs (with `Option` fields) stay private in
//! `phylo-config`. The config loader resolves them into these types at the
//! parse boundary, so existence of a value is the proof of its validity.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MIN_PROGRESS_VISIBLE: Duration = Duration::from_millis(1200);
pub const DEFAULT_SELECTION_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimingsError {
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("selection interval must be greater than zero")]
    ZeroSelectionInterval,
}

/// Cadences of the two periodic tasks and the anti-flicker hold.
///
/// Invariant: both intervals are non-zero (a zero tokio interval panics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    poll_interval: Duration,
    min_progress_visible: Duration,
    selection_interval: Duration,
}

impl Timings {
    pub fn new(
        poll_interval: Duration,
        min_progress_visible: Duration,
        selection_interval: Duration,
    ) -> Result<Self, TimingsError> {
        if poll_interval.is_zero() {
            return Err(TimingsError::ZeroPollInterval);
        }
        if selection_interval.is_zero() {
            return Err(TimingsError::ZeroSelectionInterval);
        }
        Ok(Self {
            poll_interval,
            min_progress_visible,
            selection_interval,
        })
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Shortest time the progress view stays up, measured from polling start.
    #[must_use]
    pub const fn min_progress_visible(&self) -> Duration {
        self.min_progress_visible
    }

    #[must_use]
    pub const fn selection_interval(&self) -> Duration {
        self.selection_interval
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_progress_visible: DEFAULT_MIN_PROGRESS_VISIBLE,
            selection_interval: DEFAULT_SELECTION_INTERVAL,
        }
    }
}
