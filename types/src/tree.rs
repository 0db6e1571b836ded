//! Tree view state: what the user has done to the rendered tree.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::NodeId;

/// Longest node label shown in the node-actions affordance before truncation.
pub const MAX_LABEL_CHARS: usize = 35;
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderType {
    #[default]
    Rectangular,
    Circular,
    Radial,
    Diagonal,
    Hierarchical,
}

impl RenderType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RenderType::Rectangular => "rectangular",
            RenderType::Circular => "circular",
            RenderType::Radial => "radial",
            RenderType::Diagonal => "diagonal",
            RenderType::Hierarchical => "hierarchical",
        }
    }
}

impl fmt::Display for RenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown render type '{0}'")]
pub struct UnknownRenderType(pub String);

impl FromStr for RenderType {
    type Err = UnknownRenderType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rectangular" => Ok(RenderType::Rectangular),
            "circular" => Ok(RenderType::Circular),
            "radial" => Ok(RenderType::Radial),
            "diagonal" => Ok(RenderType::Diagonal),
            "hierarchical" => Ok(RenderType::Hierarchical),
            _ => Err(UnknownRenderType(s.to_string())),
        }
    }
}

/// Result artifacts the service offers for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Newick tree description.
    Tree,
    Alignment,
    /// Server-rendered SVG image.
    TreeSvg,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Tree,
        ArtifactKind::Alignment,
        ArtifactKind::TreeSvg,
    ];

    /// Path segment used by the download endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Tree => "tree",
            ArtifactKind::Alignment => "alignment",
            ArtifactKind::TreeSvg => "tree_svg",
        }
    }

    /// Suggested local file name.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::Tree => "phylogenetic_tree.nwk",
            ArtifactKind::Alignment => "alignment.fasta",
            ArtifactKind::TreeSvg => "phylogenetic_tree.svg",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel dimensions for a server-side re-render. `None` lets the service choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderSize {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl RenderSize {
    #[must_use]
    pub const fn new(width: Option<u32>, height: Option<u32>) -> Self {
        Self { width, height }
    }
}

/// Result of a toggle: whether the id ended up in the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    On,
    Off,
}

impl Toggled {
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Toggled::On)
    }
}

/// Everything the user has changed about how the loaded tree is shown.
///
/// Invariants: `rotated` and `collapsed` are sets with toggle semantics;
/// `root_override` holds at most one id and is replaced, never accumulated.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeView {
    description: String,
    render_type: RenderType,
    root_override: Option<NodeId>,
    collapsed: BTreeSet<NodeId>,
    rotated: BTreeSet<NodeId>,
    selected: BTreeSet<NodeId>,
    zoom: f64,
}

impl TreeView {
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            render_type: RenderType::default(),
            root_override: None,
            collapsed: BTreeSet::new(),
            rotated: BTreeSet::new(),
            selected: BTreeSet::new(),
            zoom: 1.0,
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn render_type(&self) -> RenderType {
        self.render_type
    }

    pub fn set_render_type(&mut self, render_type: RenderType) {
        self.render_type = render_type;
    }

    #[must_use]
    pub fn root_override(&self) -> Option<&NodeId> {
        self.root_override.as_ref()
    }

    /// Restore the natural root. Returns the override that was in place.
    pub fn clear_root_override(&mut self) -> Option<NodeId> {
        self.root_override.take()
    }

    /// Replace the root override. Returns the previous one.
    pub fn set_root_override(&mut self, id: NodeId) -> Option<NodeId> {
        self.root_override.replace(id)
    }

    #[must_use]
    pub fn rotated(&self) -> &BTreeSet<NodeId> {
        &self.rotated
    }

    #[must_use]
    pub fn collapsed(&self) -> &BTreeSet<NodeId> {
        &self.collapsed
    }

    #[must_use]
    pub fn selected(&self) -> &BTreeSet<NodeId> {
        &self.selected
    }

    pub fn set_selected(&mut self, selected: BTreeSet<NodeId>) {
        self.selected = selected;
    }

    /// What toggling `id` in the rotated set would produce, without applying it.
    #[must_use]
    pub fn rotate_outcome(&self, id: &NodeId) -> Toggled {
        flip(&self.rotated, id)
    }

    #[must_use]
    pub fn collapse_outcome(&self, id: &NodeId) -> Toggled {
        flip(&self.collapsed, id)
    }

    pub fn toggle_rotated(&mut self, id: &NodeId) -> Toggled {
        toggle(&mut self.rotated, id)
    }

    pub fn toggle_collapsed(&mut self, id: &NodeId) -> Toggled {
        toggle(&mut self.collapsed, id)
    }

    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Adjust zoom by `delta`, never dropping below a small positive floor.
    pub fn zoom_by(&mut self, delta: f64) -> f64 {
        self.zoom = (self.zoom + delta).max(0.1);
        self.zoom
    }

    /// Drop root override, rotations, collapses and selection together.
    pub fn reset(&mut self) {
        self.root_override = None;
        self.rotated.clear();
        self.collapsed.clear();
        self.selected.clear();
        self.zoom = 1.0;
    }

    /// True when nothing has been changed since load (render type aside).
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        self.root_override.is_none()
            && self.rotated.is_empty()
            && self.collapsed.is_empty()
            && self.selected.is_empty()
    }
}

fn flip(set: &BTreeSet<NodeId>, id: &NodeId) -> Toggled {
    if set.contains(id) {
        Toggled::Off
    } else {
        Toggled::On
    }
}

fn toggle(set: &mut BTreeSet<NodeId>, id: &NodeId) -> Toggled {
    if set.remove(id) {
        Toggled::Off
    } else {
        set.insert(id.clone());
        Toggled::On
    }
}

/// Shorten `label` to [`MAX_LABEL_CHARS`] characters plus an ellipsis.
#[must_use]
pub fn truncate_label(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        return label.to_string();
    }
    let mut out: String = label.chars().take(MAX_LABEL_CHARS).collect();
    out.push_str(ELLIPSIS);
    out
}

/// The node the user most recently selected, with a display-ready label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSelection {
    id: NodeId,
    label: String,
}

impl ActiveSelection {
    /// `label` is the resolved node label, if the lookup found one.
    #[must_use]
    pub fn new(id: NodeId, label: Option<&str>) -> Self {
        let raw = label.filter(|l| !l.is_empty()).unwrap_or(id.as_str());
        let label = truncate_label(raw);
        Self { id, label }
    }

    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}
