//! Background task that notices selection changes in the renderer.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use phylo_types::{ActiveSelection, Generation, NodeId, Seq};

use crate::render::TreeRenderer;

const SELECTION_EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    /// `active` is the first selected id, with its resolved label.
    Selected {
        active: ActiveSelection,
        ids: BTreeSet<NodeId>,
    },
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEvent {
    pub generation: Generation,
    pub seq: Seq,
    pub change: SelectionChange,
}

/// Owned handle to the selection task. Dropping it aborts the task.
#[derive(Debug)]
pub struct SelectionTracker {
    join_handle: JoinHandle<()>,
    event_rx: mpsc::Receiver<SelectionEvent>,
    observing: bool,
    baseline: Baseline,
}

impl SelectionTracker {
    /// Subscribe to the renderer's notifier when it has one, otherwise diff
    /// `selected_ids` every `interval`.
    pub fn spawn(
        renderer: Arc<dyn TreeRenderer>,
        generation: Generation,
        interval: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(SELECTION_EVENT_CHANNEL_CAPACITY);
        let notifier = renderer.selection_notifier();
        let observing = notifier.is_some();
        let baseline = Baseline::default();
        let mut differ = Differ {
            renderer,
            tx,
            generation,
            seq: Seq::default(),
            last: baseline.clone(),
        };
        let join_handle = match notifier {
            Some(notifier) => tokio::spawn(async move { differ.observe(notifier).await }),
            None => tokio::spawn(async move { differ.poll(interval).await }),
        };
        Self {
            join_handle,
            event_rx: rx,
            observing,
            baseline,
        }
    }

    /// True when driven by the renderer's notifier rather than a timer.
    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn try_recv_event(&mut self) -> Option<SelectionEvent> {
        self.event_rx.try_recv().ok()
    }

    pub async fn recv_event(&mut self) -> Option<SelectionEvent> {
        self.event_rx.recv().await
    }

    /// Drop anything already queued.
    pub fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.event_rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    /// Drop queued events and treat the selection as empty from now on, so
    /// the next non-empty set is reported even if it equals the old one.
    pub fn forget(&mut self) -> usize {
        self.baseline.lock().clear();
        self.discard_pending()
    }
}

/// Last selection the task reported, shared with the handle so a clear on
/// the controller side resets what counts as a change.
#[derive(Debug, Clone, Default)]
struct Baseline(Arc<Mutex<BTreeSet<NodeId>>>);

impl Baseline {
    fn lock(&self) -> MutexGuard<'_, BTreeSet<NodeId>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SelectionTracker {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

struct Differ {
    renderer: Arc<dyn TreeRenderer>,
    tx: mpsc::Sender<SelectionEvent>,
    generation: Generation,
    seq: Seq,
    last: Baseline,
}

impl Differ {
    async fn poll(&mut self, period: Duration) {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let current = match self.renderer.selected_ids() {
                Ok(current) => current,
                Err(e) => {
                    tracing::debug!(error = %e, "Could not read selection");
                    continue;
                }
            };
            if !self.push(current).await {
                return;
            }
        }
    }

    async fn observe(&mut self, mut notifier: watch::Receiver<BTreeSet<NodeId>>) {
        // `changed` only fires for later sends; report what is already selected.
        let initial = notifier.borrow_and_update().clone();
        if !self.push(initial).await {
            return;
        }
        while notifier.changed().await.is_ok() {
            let current = notifier.borrow_and_update().clone();
            if !self.push(current).await {
                return;
            }
        }
    }

    /// Emit when `current` differs from the last set seen. False once the
    /// receiver is gone.
    async fn push(&mut self, current: BTreeSet<NodeId>) -> bool {
        let Some(change) = self.diff(current) else {
            return true;
        };
        self.seq = self.seq.next();
        let event = SelectionEvent {
            generation: self.generation,
            seq: self.seq,
            change,
        };
        self.tx.send(event).await.is_ok()
    }

    fn diff(&self, current: BTreeSet<NodeId>) -> Option<SelectionChange> {
        let mut last = self.last.lock();
        if *last == current {
            return None;
        }
        let change = match current.first() {
            None => SelectionChange::Cleared,
            Some(first) => {
                let label = self
                    .renderer
                    .find_node_by_id(first)
                    .and_then(|node| node.label);
                SelectionChange::Selected {
                    active: ActiveSelection::new(first.clone(), label.as_deref()),
                    ids: current.clone(),
                }
            }
        };
        *last = current;
        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeRenderer;

    fn node(id: &str) -> NodeId {
        NodeId::new(id)
    }

    #[tokio::test(start_paused = true)]
    async fn diff_emits_only_on_change() {
        let renderer = FakeRenderer::new();
        let mut tracker =
            SelectionTracker::spawn(renderer.clone(), Generation::default(), Duration::from_millis(200));
        assert!(!tracker.is_observing());

        time::sleep(Duration::from_millis(450)).await;
        assert!(tracker.try_recv_event().is_none());

        renderer.select(&["node_42"]);
        let event = tracker.recv_event().await.unwrap();
        let SelectionChange::Selected { active, ids } = event.change else {
            panic!("expected selection");
        };
        assert_eq!(active.id(), &node("node_42"));
        assert_eq!(ids.len(), 1);

        time::sleep(Duration::from_millis(1000)).await;
        assert!(tracker.try_recv_event().is_none());

        renderer.select(&[]);
        let event = tracker.recv_event().await.unwrap();
        assert_eq!(event.change, SelectionChange::Cleared);
        assert_eq!(event.seq.value(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn label_falls_back_to_id() {
        let renderer = FakeRenderer::new();
        renderer.unlabelled("unlabelled");
        renderer.select(&["unlabelled"]);
        let mut tracker =
            SelectionTracker::spawn(renderer.clone(), Generation::default(), Duration::from_millis(200));
        let event = tracker.recv_event().await.unwrap();
        let SelectionChange::Selected { active, .. } = event.change else {
            panic!("expected selection");
        };
        assert_eq!(active.label(), "unlabelled");
    }

    #[tokio::test(start_paused = true)]
    async fn notifier_is_preferred_over_diffing() {
        let renderer = FakeRenderer::with_notifier();
        let mut tracker =
            SelectionTracker::spawn(renderer.clone(), Generation::default(), Duration::from_millis(200));
        assert!(tracker.is_observing());

        renderer.notify(&["n7"]);
        let event = tracker.recv_event().await.unwrap();
        assert!(matches!(event.change, SelectionChange::Selected { .. }));

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(renderer.selected_ids_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_node_uses_raw_id_as_label() {
        let renderer = FakeRenderer::new();
        renderer.select(&["ghost_node"]);
        assert!(renderer.find_node_by_id(&node("ghost_node")).is_none());

        let mut tracker =
            SelectionTracker::spawn(renderer.clone(), Generation::default(), Duration::from_millis(200));
        let event = tracker.recv_event().await.unwrap();
        let SelectionChange::Selected { active, .. } = event.change else {
            panic!("expected selection");
        };
        assert_eq!(active.id(), &node("ghost_node"));
        assert_eq!(active.label(), "ghost_node");
    }

    #[tokio::test(start_paused = true)]
    async fn notifier_reports_selection_present_at_spawn() {
        let renderer = FakeRenderer::with_notifier();
        renderer.notify(&["n7"]);
        let mut tracker =
            SelectionTracker::spawn(renderer.clone(), Generation::default(), Duration::from_millis(200));

        let event = tracker.recv_event().await.unwrap();
        let SelectionChange::Selected { active, .. } = event.change else {
            panic!("expected selection");
        };
        assert_eq!(active.id(), &node("n7"));
        assert_eq!(event.seq.value(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn forget_reports_same_selection_again() {
        let renderer = FakeRenderer::new();
        renderer.select(&["n1"]);
        let mut tracker =
            SelectionTracker::spawn(renderer.clone(), Generation::default(), Duration::from_millis(200));
        tracker.recv_event().await.unwrap();

        tracker.forget();
        let event = tracker.recv_event().await.unwrap();
        assert!(matches!(event.change, SelectionChange::Selected { .. }));
        assert_eq!(event.seq.value(), 2);
    }
}
