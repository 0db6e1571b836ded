//! Selection tracking and tree manipulation for an interactive renderer.
//!
//! Every manipulation goes to the renderer first and only touches the
//! [`TreeView`] when the renderer accepted it. Failures are returned and
//! logged.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use phylo_types::{ActiveSelection, Generation, NodeId, RenderType, Seq, Toggled, TreeView};

use crate::error::RenderError;
use crate::render::TreeRenderer;
use crate::tracker::{SelectionChange, SelectionEvent, SelectionTracker};

fn log_failure(operation: &'static str) -> impl Fn(&RenderError) {
    move |e| tracing::warn!(operation, error = %e, "Tree operation failed")
}

pub struct TreeController {
    renderer: Arc<dyn TreeRenderer>,
    view: TreeView,
    active: Option<ActiveSelection>,
    tracker: SelectionTracker,
    generation: Generation,
    last_seq: Seq,
}

impl fmt::Debug for TreeController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeController")
            .field("view", &self.view)
            .field("active", &self.active)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl TreeController {
    /// `renderer` must already hold `description`.
    pub fn new(
        renderer: Arc<dyn TreeRenderer>,
        description: String,
        generation: Generation,
        selection_interval: Duration,
    ) -> Self {
        let tracker = SelectionTracker::spawn(Arc::clone(&renderer), generation, selection_interval);
        Self {
            renderer,
            view: TreeView::new(description),
            active: None,
            tracker,
            generation,
            last_seq: Seq::default(),
        }
    }

    #[must_use]
    pub fn view(&self) -> &TreeView {
        &self.view
    }

    #[must_use]
    pub fn active_selection(&self) -> Option<&ActiveSelection> {
        self.active.as_ref()
    }

    /// Whether the node-actions affordance should be shown.
    #[must_use]
    pub fn affordance_visible(&self) -> bool {
        self.active.is_some()
    }

    #[must_use]
    pub fn tracker(&self) -> &SelectionTracker {
        &self.tracker
    }

    /// Apply one selection event. Returns whether it changed anything.
    pub fn apply_selection(&mut self, event: SelectionEvent) -> bool {
        if event.generation != self.generation || event.seq <= self.last_seq {
            return false;
        }
        self.last_seq = event.seq;
        match event.change {
            SelectionChange::Selected { active, ids } => {
                tracing::debug!(node = %active.id(), label = active.label(), "Node selected");
                self.view.set_selected(ids);
                self.active = Some(active);
            }
            SelectionChange::Cleared => {
                self.view.set_selected(BTreeSet::new());
                self.active = None;
            }
        }
        true
    }

    pub fn poll_selection_events(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.tracker.try_recv_event() {
            if self.apply_selection(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next selection change and apply it.
    pub async fn next_selection_change(&mut self) -> Option<&ActiveSelection> {
        loop {
            let event = self.tracker.recv_event().await?;
            if self.apply_selection(event) {
                return self.active.as_ref();
            }
        }
    }

    /// Make the active selection the root.
    pub fn reroot(&mut self) -> Result<NodeId, RenderError> {
        self.selected_target()
            .and_then(|id| self.reroot_at(id))
            .inspect_err(log_failure("reroot"))
    }

    /// Make `raw` the root. The id is not checked against the tree.
    pub fn reroot_by_id(&mut self, raw: &str) -> Result<NodeId, RenderError> {
        typed_target(raw)
            .and_then(|id| self.reroot_at(id))
            .inspect_err(log_failure("reroot"))
    }

    pub fn rotate(&mut self) -> Result<Toggled, RenderError> {
        self.selected_target()
            .and_then(|id| self.rotate_at(&id))
            .inspect_err(log_failure("rotate"))
    }

    pub fn rotate_by_id(&mut self, raw: &str) -> Result<Toggled, RenderError> {
        typed_target(raw)
            .and_then(|id| self.rotate_at(&id))
            .inspect_err(log_failure("rotate"))
    }

    pub fn collapse(&mut self) -> Result<Toggled, RenderError> {
        self.selected_target()
            .and_then(|id| self.collapse_at(&id))
            .inspect_err(log_failure("collapse"))
    }

    pub fn collapse_by_id(&mut self, raw: &str) -> Result<Toggled, RenderError> {
        typed_target(raw)
            .and_then(|id| self.collapse_at(&id))
            .inspect_err(log_failure("collapse"))
    }

    pub fn clear_selection(&mut self) -> Result<(), RenderError> {
        self.renderer
            .clear_selection()
            .inspect_err(log_failure("clear selection"))?;
        self.forget_selection();
        Ok(())
    }

    /// Undo rerooting, rotations, collapses and selection, then fit.
    pub fn reset(&mut self) -> Result<(), RenderError> {
        self.reset_renderer().inspect_err(log_failure("reset"))?;
        self.view.reset();
        self.forget_selection();
        self.renderer.fit().inspect_err(log_failure("fit"))
    }

    pub fn set_render_type(&mut self, render_type: RenderType) -> Result<(), RenderError> {
        self.renderer
            .set_type(render_type)
            .inspect_err(log_failure("set render type"))?;
        self.view.set_render_type(render_type);
        Ok(())
    }

    pub fn zoom(&mut self, delta: f64) -> Result<f64, RenderError> {
        self.renderer.zoom(delta).inspect_err(log_failure("zoom"))?;
        Ok(self.view.zoom_by(delta))
    }

    pub fn fit(&self) -> Result<(), RenderError> {
        self.renderer.fit().inspect_err(log_failure("fit"))
    }

    pub fn set_label_visibility(&self, visible: bool) -> Result<(), RenderError> {
        self.renderer
            .set_label_visibility(visible)
            .inspect_err(log_failure("label visibility"))
    }

    pub fn set_label_alignment(&self, aligned: bool) -> Result<(), RenderError> {
        self.renderer
            .set_label_alignment(aligned)
            .inspect_err(log_failure("label alignment"))
    }

    pub fn export_raster(&self) -> Result<Vec<u8>, RenderError> {
        self.renderer
            .export_raster()
            .inspect_err(log_failure("export"))
    }

    fn selected_target(&self) -> Result<NodeId, RenderError> {
        self.active
            .as_ref()
            .map(|active| active.id().clone())
            .ok_or(RenderError::NoTarget)
    }

    fn reroot_at(&mut self, id: NodeId) -> Result<NodeId, RenderError> {
        self.renderer.set_root(Some(&id))?;
        self.view.set_root_override(id.clone());
        tracing::info!(node = %id, "Rerooted tree");
        Ok(id)
    }

    fn rotate_at(&mut self, id: &NodeId) -> Result<Toggled, RenderError> {
        let outcome = self.view.rotate_outcome(id);
        self.renderer.set_rotated(id, outcome.is_on())?;
        Ok(self.view.toggle_rotated(id))
    }

    fn collapse_at(&mut self, id: &NodeId) -> Result<Toggled, RenderError> {
        let outcome = self.view.collapse_outcome(id);
        self.renderer.set_collapsed(id, outcome.is_on())?;
        Ok(self.view.toggle_collapsed(id))
    }

    /// Undo overrides one renderer call at a time, dropping each from the
    /// view as soon as the renderer accepts it. On failure the view still
    /// holds exactly the overrides the renderer kept.
    fn reset_renderer(&mut self) -> Result<(), RenderError> {
        if self.view.root_override().is_some() {
            self.renderer.set_root(None)?;
            self.view.clear_root_override();
        }
        let rotated: Vec<NodeId> = self.view.rotated().iter().cloned().collect();
        for id in rotated {
            self.renderer.set_rotated(&id, false)?;
            self.view.toggle_rotated(&id);
        }
        let collapsed: Vec<NodeId> = self.view.collapsed().iter().cloned().collect();
        for id in collapsed {
            self.renderer.set_collapsed(&id, false)?;
            self.view.toggle_collapsed(&id);
        }
        self.renderer.clear_selection()
    }

    fn forget_selection(&mut self) {
        self.tracker.forget();
        self.view.set_selected(BTreeSet::new());
        self.active = None;
    }
}

fn typed_target(raw: &str) -> Result<NodeId, RenderError> {
    NodeId::parse_typed(raw).ok_or(RenderError::NoTarget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeRenderer;
    use tokio::time;

    const NEWICK: &str = "((A,B)n1,(C,D)n2);";

    fn controller(renderer: &Arc<FakeRenderer>) -> TreeController {
        TreeController::new(
            renderer.clone(),
            NEWICK.to_string(),
            Generation::default(),
            Duration::from_millis(200),
        )
    }

    fn node(id: &str) -> NodeId {
        NodeId::new(id)
    }

    #[tokio::test(start_paused = true)]
    async fn long_label_shows_truncated_affordance() {
        let renderer = FakeRenderer::new();
        renderer.label("node_42", "Taxon_alpha_extremely_long_species_name_example");
        let mut tree = controller(&renderer);
        assert!(!tree.affordance_visible());

        renderer.select(&["node_42"]);
        let active = tree.next_selection_change().await.unwrap().clone();

        assert_eq!(active.id(), &node("node_42"));
        assert_eq!(active.label(), "Taxon_alpha_extremely_long_species_...");
        assert!(tree.affordance_visible());
        assert!(tree.view().selected().contains(&node("node_42")));

        renderer.select(&[]);
        assert!(tree.next_selection_change().await.is_none());
        assert!(!tree.affordance_visible());
    }

    #[tokio::test]
    async fn manipulations_need_a_target() {
        let renderer = FakeRenderer::new();
        let mut tree = controller(&renderer);
        assert_eq!(tree.reroot(), Err(RenderError::NoTarget));
        assert_eq!(tree.rotate(), Err(RenderError::NoTarget));
        assert_eq!(tree.collapse_by_id("   "), Err(RenderError::NoTarget));
        assert!(renderer.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reroot_uses_active_selection_and_replaces() {
        let renderer = FakeRenderer::new();
        let mut tree = controller(&renderer);

        renderer.select(&["n1"]);
        tree.next_selection_change().await;
        assert_eq!(tree.reroot(), Ok(node("n1")));

        assert_eq!(tree.reroot_by_id(" n2 "), Ok(node("n2")));
        assert_eq!(tree.view().root_override(), Some(&node("n2")));
        assert_eq!(
            renderer.calls(),
            vec!["set_root(n1)".to_string(), "set_root(n2)".to_string()]
        );
    }

    #[tokio::test]
    async fn rotate_twice_is_identity() {
        let renderer = FakeRenderer::new();
        let mut tree = controller(&renderer);

        assert_eq!(tree.rotate_by_id("n1"), Ok(Toggled::On));
        assert_eq!(tree.rotate_by_id("n1"), Ok(Toggled::Off));
        assert!(tree.view().rotated().is_empty());
        assert_eq!(
            renderer.calls(),
            vec![
                "set_rotated(n1, true)".to_string(),
                "set_rotated(n1, false)".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn collapse_toggles_by_id() {
        let renderer = FakeRenderer::new();
        let mut tree = controller(&renderer);
        assert_eq!(tree.collapse_by_id("n2"), Ok(Toggled::On));
        assert!(tree.view().collapsed().contains(&node("n2")));
        assert_eq!(tree.collapse_by_id("n2"), Ok(Toggled::Off));
        assert!(tree.view().collapsed().is_empty());
    }

    #[tokio::test]
    async fn failed_renderer_call_leaves_view_untouched() {
        let renderer = FakeRenderer::new();
        let mut tree = controller(&renderer);
        renderer.fail_next("renderer busy");

        let err = tree.rotate_by_id("n1").unwrap_err();
        assert_eq!(err, RenderError::capability("set_rotated", "renderer busy"));
        assert!(tree.view().rotated().is_empty());

        assert_eq!(tree.rotate_by_id("n1"), Ok(Toggled::On));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_selection_hides_affordance() {
        let renderer = FakeRenderer::new();
        let mut tree = controller(&renderer);
        renderer.select(&["n1"]);
        tree.next_selection_change().await;

        tree.clear_selection().unwrap();
        assert!(!tree.affordance_visible());
        assert!(tree.view().selected().is_empty());
        assert!(renderer.selected_ids().unwrap().is_empty());

        time::sleep(Duration::from_millis(600)).await;
        tree.poll_selection_events();
        assert!(!tree.affordance_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restores_everything_and_fits() {
        let renderer = FakeRenderer::new();
        let mut tree = controller(&renderer);
        renderer.select(&["n1"]);
        tree.next_selection_change().await;
        tree.reroot().unwrap();
        tree.rotate_by_id("n2").unwrap();
        tree.collapse_by_id("n1").unwrap();

        tree.reset().unwrap();

        assert!(tree.view().is_pristine());
        assert!(!tree.affordance_visible());
        let calls = renderer.calls();
        assert!(calls.contains(&"set_root(-)".to_string()));
        assert!(calls.contains(&"set_rotated(n2, false)".to_string()));
        assert!(calls.contains(&"set_collapsed(n1, false)".to_string()));
        assert_eq!(calls.last().map(String::as_str), Some("fit"));
    }

    #[tokio::test]
    async fn view_operations_pass_through() {
        let renderer = FakeRenderer::new();
        let mut tree = controller(&renderer);

        tree.set_render_type(RenderType::Circular).unwrap();
        assert_eq!(tree.view().render_type(), RenderType::Circular);
        assert!((tree.zoom(0.5).unwrap() - 1.5).abs() < f64::EPSILON);
        tree.fit().unwrap();
        tree.set_label_visibility(false).unwrap();
        tree.set_label_alignment(true).unwrap();
        assert_eq!(tree.export_raster().unwrap(), b"PNG".to_vec());

        assert_eq!(
            renderer.calls(),
            vec![
                "set_type(circular)".to_string(),
                "zoom(0.5)".to_string(),
                "fit".to_string(),
                "labels(false)".to_string(),
                "align(true)".to_string(),
                "export".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reselecting_after_clear_is_surfaced() {
        let renderer = FakeRenderer::new();
        let mut tree = controller(&renderer);
        renderer.select(&["n1"]);
        tree.next_selection_change().await;

        tree.clear_selection().unwrap();
        renderer.select(&["n1"]);
        time::sleep(Duration::from_millis(1000)).await;
        tree.poll_selection_events();

        assert!(tree.affordance_visible());
        assert_eq!(tree.active_selection().map(ActiveSelection::id), Some(&node("n1")));
        assert!(tree.view().selected().contains(&node("n1")));
    }

    #[tokio::test(start_paused = true)]
    async fn reselecting_after_reset_is_surfaced() {
        let renderer = FakeRenderer::new();
        let mut tree = controller(&renderer);
        renderer.select(&["n1"]);
        tree.next_selection_change().await;

        tree.reset().unwrap();
        renderer.select(&["n1"]);
        time::sleep(Duration::from_millis(1000)).await;
        tree.poll_selection_events();

        assert!(tree.affordance_visible());
    }

    #[tokio::test]
    async fn partial_reset_keeps_view_in_step_with_renderer() {
        let renderer = FakeRenderer::new();
        let mut tree = controller(&renderer);
        tree.rotate_by_id("n1").unwrap();
        tree.rotate_by_id("n2").unwrap();
        tree.collapse_by_id("n3").unwrap();

        renderer.fail_after(1, "renderer busy");
        let err = tree.reset().unwrap_err();
        assert_eq!(err, RenderError::capability("set_rotated", "renderer busy"));

        assert!(renderer.calls().contains(&"set_rotated(n1, false)".to_string()));
        assert_eq!(tree.view().rotated().iter().collect::<Vec<_>>(), vec![&node("n2")]);
        assert!(tree.view().collapsed().contains(&node("n3")));

        tree.reset().unwrap();
        assert!(tree.view().is_pristine());
    }
}
