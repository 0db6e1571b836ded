//! Job lifecycle and tree interaction for Phylo.
//!
//! This crate owns the state machines that sit between user input and the
//! analysis service: the [`Session`] drives submit, start, and status polling
//! for one job at a time; the [`RenderAdapter`] decides once whether the
//! finished tree is interactive or shown as raw text. No terminal code lives
//! here.
//!
//! Background work (status polling, selection tracking) runs in owned tasks
//! that are aborted when their handle drops. Events carry a
//! [`Generation`](phylo_types::Generation) and a [`Seq`](phylo_types::Seq) so
//! late results from a replaced job or tree are discarded.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod artifact;
mod controller;
mod error;
mod poller;
mod render;
mod service;
mod session;
#[cfg(test)]
mod test_support;
mod tracker;

pub use artifact::{ArtifactDisplay, ArtifactPane};
pub use controller::TreeController;
pub use error::{GENERIC_REMOTE_FAILURE, JobError, RemoteJobError, RenderError};
pub use poller::{PollDecision, PollEvent, PollEventKind, PollTask, ProgressTracker};
pub use render::{FALLBACK_PREVIEW_CHARS, NodeInfo, RenderAdapter, TextFallback, TreeRenderer};
pub use service::{AnalysisService, ServiceFut};
pub use session::{Phase, Session};
pub use tracker::{SelectionChange, SelectionEvent, SelectionTracker};

pub use phylo_client;
pub use phylo_types;
