//! Job status snapshots and step-code display text.

use std::borrow::Cow;
use std::fmt;

use serde::Deserialize;

/// Phrase shown when the service reports no step at all.
pub const GENERIC_STEP_TEXT: &str = "Processing...";
/// Phrase shown while the completion view is being held back.
pub const FINALIZING_STEP_TEXT: &str = "Finalizing...";

/// Known step codes and their display phrases. Open table: unknown codes
/// are shown verbatim by [`describe_step`].
const STEP_PHRASES: &[(&str, &str)] = &[
    ("alignment", "Aligning sequences with MAFFT..."),
    ("alignment_done", "Alignment finished!"),
    ("merging_files", "Merging files..."),
    ("trimming", "Curating alignment with trimAl..."),
    ("trimming_done", "Curation finished!"),
    ("skipping_alignment", "Matrix already aligned, skipping..."),
    ("tree_building", "Building phylogenetic tree..."),
];

/// Map a step code to display text.
#[must_use]
pub fn describe_step(step: Option<&str>) -> Cow<'static, str> {
    let Some(step) = step.filter(|s| !s.is_empty()) else {
        return Cow::Borrowed(GENERIC_STEP_TEXT);
    };
    STEP_PHRASES
        .iter()
        .find(|(code, _)| *code == step)
        .map_or_else(|| Cow::Owned(step.to_string()), |(_, phrase)| Cow::Borrowed(*phrase))
}

/// Job status as reported by the service.
///
/// The vocabulary is open: only `completed` and `error` are terminal, every
/// other value (including ones this client has never seen) means "still going".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Error,
    Other(String),
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "error" => JobStatus::Error,
            _ => JobStatus::Other(value),
        }
    }
}

impl JobStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Other(raw) => raw,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Progress(u8);

impl Progress {
    pub const ZERO: Progress = Progress(0);
    pub const COMPLETE: Progress = Progress(100);

    /// Clamp a service-reported value. Missing or NaN reads as zero.
    #[must_use]
    pub fn from_reported(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Self(v.round().clamp(0.0, 100.0) as u8),
            _ => Self::ZERO,
        }
    }

    #[must_use]
    pub const fn percent(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// One immutable read of job status. Never merged with earlier reads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusSnapshot {
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusSnapshot {
    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress::from_reported(self.progress)
    }

    #[must_use]
    pub fn step_text(&self) -> Cow<'static, str> {
        describe_step(self.step.as_deref())
    }
}
