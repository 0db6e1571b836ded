//! Rendering capability and the adapter chosen at load time.
//!
//! A [`TreeRenderer`] is whatever can draw a tree and let the user pick
//! nodes. When none is available the adapter degrades to
//! [`TextFallback`]: the raw tree description, shown for manual copy, with
//! every manipulation disabled. That degradation is not an error.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;

use phylo_types::{Generation, NodeId, RenderType, Timings};

use crate::controller::TreeController;
use crate::error::RenderError;

/// A node as the renderer knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub label: Option<String>,
}

/// Drawing and picking capability for a loaded tree.
///
/// Methods take `&self`; implementors synchronise internally so the
/// selection tracker can read while manipulations run.
pub trait TreeRenderer: Send + Sync {
    fn load(&self, description: &str) -> Result<(), RenderError>;
    fn set_type(&self, render_type: RenderType) -> Result<(), RenderError>;
    fn zoom(&self, delta: f64) -> Result<(), RenderError>;
    fn fit(&self) -> Result<(), RenderError>;
    fn export_raster(&self) -> Result<Vec<u8>, RenderError>;
    fn set_label_visibility(&self, visible: bool) -> Result<(), RenderError>;
    fn set_label_alignment(&self, aligned: bool) -> Result<(), RenderError>;

    fn selected_ids(&self) -> Result<BTreeSet<NodeId>, RenderError>;
    fn find_node_by_id(&self, id: &NodeId) -> Option<NodeInfo>;

    /// `None` restores the natural root.
    fn set_root(&self, id: Option<&NodeId>) -> Result<(), RenderError>;
    fn set_rotated(&self, id: &NodeId, rotated: bool) -> Result<(), RenderError>;
    fn set_collapsed(&self, id: &NodeId, collapsed: bool) -> Result<(), RenderError>;
    fn clear_selection(&self) -> Result<(), RenderError>;

    /// Push-based selection updates. When present the tracker subscribes
    /// instead of diffing `selected_ids` on a timer.
    fn selection_notifier(&self) -> Option<watch::Receiver<BTreeSet<NodeId>>> {
        None
    }
}

/// Characters of the description shown while collapsed.
pub const FALLBACK_PREVIEW_CHARS: usize = 80;

/// Raw tree description for environments without a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFallback {
    description: String,
    expanded: bool,
}

impl TextFallback {
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            expanded: false,
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
    }

    pub fn toggle_expanded(&mut self) -> bool {
        self.expanded = !self.expanded;
        self.expanded
    }

    /// The full description when expanded, otherwise a one-line preview.
    #[must_use]
    pub fn visible_text(&self) -> Cow<'_, str> {
        let first_line = self.description.lines().next().unwrap_or_default();
        let fits = first_line.len() == self.description.trim_end().len()
            && first_line.chars().count() <= FALLBACK_PREVIEW_CHARS;
        if self.expanded || fits {
            return Cow::Borrowed(&self.description);
        }
        let mut preview: String = first_line.chars().take(FALLBACK_PREVIEW_CHARS).collect();
        preview.push_str("...");
        Cow::Owned(preview)
    }
}

#[derive(Debug)]
pub enum RenderAdapter {
    Interactive(TreeController),
    TextFallback(TextFallback),
}

impl RenderAdapter {
    /// Pick the variant once. A renderer that fails to load the description
    /// is treated the same as no renderer.
    pub fn load(
        renderer: Option<Arc<dyn TreeRenderer>>,
        description: impl Into<String>,
        generation: Generation,
        timings: Timings,
    ) -> Self {
        let description = description.into();
        let Some(renderer) = renderer else {
            tracing::info!("No tree renderer available; showing raw description");
            return RenderAdapter::TextFallback(TextFallback::new(description));
        };
        if let Err(e) = renderer.load(&description) {
            tracing::warn!(error = %e, "Tree renderer failed to load; showing raw description");
            return RenderAdapter::TextFallback(TextFallback::new(description));
        }
        RenderAdapter::Interactive(TreeController::new(
            renderer,
            description,
            generation,
            timings.selection_interval(),
        ))
    }

    #[must_use]
    pub fn controls_enabled(&self) -> bool {
        matches!(self, RenderAdapter::Interactive(_))
    }

    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            RenderAdapter::Interactive(controller) => controller.view().description(),
            RenderAdapter::TextFallback(fallback) => fallback.description(),
        }
    }

    #[must_use]
    pub fn interactive(&self) -> Option<&TreeController> {
        match self {
            RenderAdapter::Interactive(controller) => Some(controller),
            RenderAdapter::TextFallback(_) => None,
        }
    }

    /// Entry point for every manipulation and view operation.
    /// Fails with [`RenderError::Unavailable`] in fallback mode.
    pub fn interactive_mut(&mut self) -> Result<&mut TreeController, RenderError> {
        match self {
            RenderAdapter::Interactive(controller) => Ok(controller),
            RenderAdapter::TextFallback(_) => Err(RenderError::Unavailable),
        }
    }

    #[must_use]
    pub fn fallback(&self) -> Option<&TextFallback> {
        match self {
            RenderAdapter::TextFallback(fallback) => Some(fallback),
            RenderAdapter::Interactive(_) => None,
        }
    }

    pub fn fallback_mut(&mut self) -> Option<&mut TextFallback> {
        match self {
            RenderAdapter::TextFallback(fallback) => Some(fallback),
            RenderAdapter::Interactive(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeRenderer;

    const NEWICK: &str = "((A:0.1,B:0.2)n1:0.3,C:0.4);";

    #[tokio::test]
    async fn missing_renderer_falls_back_to_text() {
        let mut adapter =
            RenderAdapter::load(None, NEWICK, Generation::default(), Timings::default());

        assert!(!adapter.controls_enabled());
        assert_eq!(adapter.description(), NEWICK);
        assert_eq!(
            adapter.interactive_mut().map(|_| ()),
            Err(RenderError::Unavailable)
        );

        let fallback = adapter.fallback_mut().unwrap();
        assert!(!fallback.is_expanded());
        assert!(fallback.toggle_expanded());
        assert_eq!(fallback.description(), NEWICK);
    }

    #[tokio::test]
    async fn failed_load_also_falls_back() {
        let renderer = FakeRenderer::new().failing_load();
        let adapter = RenderAdapter::load(
            Some(renderer),
            NEWICK,
            Generation::default(),
            Timings::default(),
        );
        assert!(adapter.fallback().is_some());
    }

    #[tokio::test]
    async fn working_renderer_is_interactive() {
        let renderer = FakeRenderer::new();
        let adapter = RenderAdapter::load(
            Some(renderer.clone()),
            NEWICK,
            Generation::default(),
            Timings::default(),
        );
        assert!(adapter.controls_enabled());
        assert_eq!(renderer.loaded().as_deref(), Some(NEWICK));
        assert!(adapter.interactive().unwrap().view().is_pristine());
    }

    #[test]
    fn collapsed_fallback_shows_a_preview() {
        let long = format!("({});", ["taxon"; 40].join(","));
        let mut fallback = TextFallback::new(long.clone());

        let preview = fallback.visible_text();
        assert_eq!(preview.chars().count(), FALLBACK_PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));
        assert!(long.starts_with(preview.trim_end_matches("...")));

        fallback.set_expanded(true);
        assert_eq!(fallback.visible_text(), long);

        assert_eq!(TextFallback::new(NEWICK).visible_text(), NEWICK);
    }
}
