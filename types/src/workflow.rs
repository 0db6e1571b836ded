//! Workflow mode and tree-building parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outgroup used when the user leaves the field blank.
pub const DEFAULT_OUTGROUP: &str = "uncisetus";

/// Bootstrap replicates requested when nothing else is configured.
pub const DEFAULT_BOOTSTRAP_REPLICATES: u32 = 1000;

/// The three mutually exclusive input shapes a job can be submitted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowMode {
    /// Mode 1: an already aligned matrix.
    PreAligned,
    /// Mode 2: add new sequences to an existing (or the service default) alignment.
    AugmentAlignment,
    /// Mode 3: align a raw matrix from scratch.
    AlignFromScratch,
}

impl WorkflowMode {
    pub const ALL: [WorkflowMode; 3] = [
        WorkflowMode::PreAligned,
        WorkflowMode::AugmentAlignment,
        WorkflowMode::AlignFromScratch,
    ];

    /// Value of the `workflow_mode` form field.
    #[must_use]
    pub const fn wire_value(self) -> &'static str {
        match self {
            WorkflowMode::PreAligned => "1",
            WorkflowMode::AugmentAlignment => "2",
            WorkflowMode::AlignFromScratch => "3",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            WorkflowMode::PreAligned => "Aligned matrix",
            WorkflowMode::AugmentAlignment => "Add sequences to alignment",
            WorkflowMode::AlignFromScratch => "Align from scratch",
        }
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_value())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown workflow mode '{0}' (expected 1, 2 or 3)")]
pub struct UnknownWorkflowMode(pub String);

impl FromStr for WorkflowMode {
    type Err = UnknownWorkflowMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(WorkflowMode::PreAligned),
            "2" => Ok(WorkflowMode::AugmentAlignment),
            "3" => Ok(WorkflowMode::AlignFromScratch),
            other => Err(UnknownWorkflowMode(other.to_string())),
        }
    }
}

/// Tree inference tool run after alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeTool {
    /// Stop after alignment; no tree is built.
    Skip,
    FastTree,
    /// IQ-TREE with ultrafast bootstrap. The only tool that uses replicates.
    #[default]
    IqTree,
}

impl TreeTool {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TreeTool::Skip => "skip",
            TreeTool::FastTree => "fasttree",
            TreeTool::IqTree => "iqtree",
        }
    }

    #[must_use]
    pub const fn supports_bootstrap(self) -> bool {
        matches!(self, TreeTool::IqTree)
    }
}

impl fmt::Display for TreeTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown tree tool '{0}' (expected skip, fasttree or iqtree)")]
pub struct UnknownTreeTool(pub String);

impl FromStr for TreeTool {
    type Err = UnknownTreeTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(TreeTool::Skip),
            "fasttree" => Ok(TreeTool::FastTree),
            "iqtree" => Ok(TreeTool::IqTree),
            _ => Err(UnknownTreeTool(s.to_string())),
        }
    }
}

/// Tool choice plus replicate count, as sent with the start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisParams {
    pub tool: TreeTool,
    pub bootstrap_replicates: u32,
}

impl AnalysisParams {
    #[must_use]
    pub const fn new(tool: TreeTool, bootstrap_replicates: u32) -> Self {
        Self {
            tool,
            bootstrap_replicates,
        }
    }

    /// Replicates that actually matter for the chosen tool.
    #[must_use]
    pub const fn effective_bootstrap(&self) -> Option<u32> {
        if self.tool.supports_bootstrap() {
            Some(self.bootstrap_replicates)
        } else {
            None
        }
    }
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self::new(TreeTool::default(), DEFAULT_BOOTSTRAP_REPLICATES)
    }
}

/// Outgroup taxon name. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outgroup(String);

impl Outgroup {
    /// Use `raw` when it has content, otherwise [`DEFAULT_OUTGROUP`].
    #[must_use]
    pub fn or_default(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if !value.is_empty() => Self(value.to_string()),
            _ => Self::default(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Outgroup {
    fn default() -> Self {
        Self(DEFAULT_OUTGROUP.to_string())
    }
}

impl fmt::Display for Outgroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
