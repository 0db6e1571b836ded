//! Core domain types for Phylo.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application, including the
//! Input Builder ([`request::build`]), which validates user input before any
//! network call is made.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod ids;
pub mod request;
mod settings;
mod status;
mod tree;
mod workflow;

pub use ids::{Generation, JobId, NodeId, Seq};
pub use request::{
    AlignmentSource, FormPart, FormValue, InputFields, SequenceInput, SubmissionRequest, Upload,
    ValidationError,
};
pub use settings::{
    DEFAULT_MIN_PROGRESS_VISIBLE, DEFAULT_POLL_INTERVAL, DEFAULT_SELECTION_INTERVAL, Timings,
    TimingsError,
};
pub use status::{
    FINALIZING_STEP_TEXT, GENERIC_STEP_TEXT, JobStatus, Progress, StatusSnapshot, describe_step,
};
pub use tree::{
    ActiveSelection, ArtifactKind, MAX_LABEL_CHARS, RenderSize, RenderType, Toggled, TreeView,
    UnknownRenderType, truncate_label,
};
pub use workflow::{
    AnalysisParams, DEFAULT_BOOTSTRAP_REPLICATES, DEFAULT_OUTGROUP, Outgroup, TreeTool,
    UnknownTreeTool, UnknownWorkflowMode, WorkflowMode,
};
