//! In-memory doubles for the service and the renderer.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use phylo_client::{
    AnalysisStartError, RenderFetchError, RerenderError, ServiceFailure, StatusCode,
    StatusPollError, UploadError,
};
use phylo_types::{
    AnalysisParams, JobId, JobStatus, NodeId, RenderSize, RenderType, StatusSnapshot,
    SubmissionRequest,
};

use crate::error::RenderError;
use crate::render::{NodeInfo, TreeRenderer};
use crate::service::{AnalysisService, ServiceFut};

pub(crate) fn snapshot(status: &str, progress: Option<f64>, step: Option<&str>) -> StatusSnapshot {
    StatusSnapshot {
        status: JobStatus::from(status.to_string()),
        progress,
        step: step.map(str::to_string),
        message: None,
    }
}

/// Paused-clock timings land on exact millisecond deadlines; allow a tick.
pub(crate) fn assert_close(actual: Duration, expected: Duration) {
    let diff = actual.abs_diff(expected);
    assert!(
        diff <= Duration::from_millis(2),
        "expected ~{expected:?}, got {actual:?}"
    );
}

fn http_failure(status: StatusCode, detail: Option<&str>) -> ServiceFailure {
    ServiceFailure::Http {
        status,
        detail: detail.map(str::to_string),
        body: String::new(),
    }
}

#[derive(Default)]
struct Script {
    statuses: VecDeque<StatusSnapshot>,
    status_failure: Option<String>,
    upload_rejection: Option<String>,
    latency: Duration,
    rendering: Option<String>,
    rerender: Option<Result<String, String>>,
    submitted: Vec<SubmissionRequest>,
    started: Vec<(JobId, AnalysisParams)>,
    rerender_sizes: Vec<RenderSize>,
}

/// Service double that replays a fixed list of status snapshots. The last
/// snapshot repeats once the list is exhausted.
#[derive(Default)]
pub(crate) struct ScriptedService {
    script: Mutex<Script>,
    submit_calls: AtomicUsize,
    start_calls: AtomicUsize,
    status_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedService {
    pub(crate) fn with_statuses(statuses: Vec<StatusSnapshot>) -> Arc<Self> {
        let service = Self::default();
        service.lock().statuses = statuses.into();
        Arc::new(service)
    }

    pub(crate) fn failing_status(reason: &str) -> Arc<Self> {
        let service = Self::default();
        service.lock().status_failure = Some(reason.to_string());
        Arc::new(service)
    }

    pub(crate) fn with_latency(self: Arc<Self>, latency: Duration) -> Arc<Self> {
        self.lock().latency = latency;
        self
    }

    pub(crate) fn rejecting_upload(self: Arc<Self>, detail: &str) -> Arc<Self> {
        self.lock().upload_rejection = Some(detail.to_string());
        self
    }

    pub(crate) fn with_rendering(self: Arc<Self>, svg: &str) -> Arc<Self> {
        self.lock().rendering = Some(svg.to_string());
        self
    }

    pub(crate) fn set_rerender(&self, outcome: Result<String, String>) {
        self.lock().rerender = Some(outcome);
    }

    pub(crate) fn submitted(&self) -> Vec<SubmissionRequest> {
        self.lock().submitted.clone()
    }

    pub(crate) fn started(&self) -> Vec<(JobId, AnalysisParams)> {
        self.lock().started.clone()
    }

    pub(crate) fn rerender_sizes(&self) -> Vec<RenderSize> {
        self.lock().rerender_sizes.clone()
    }

    pub(crate) fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn next_status(&self) -> Result<StatusSnapshot, StatusPollError> {
        let mut script = self.lock();
        if let Some(reason) = &script.status_failure {
            return Err(StatusPollError::new(http_failure(
                StatusCode::BAD_GATEWAY,
                Some(reason),
            )));
        }
        let next = if script.statuses.len() > 1 {
            script.statuses.pop_front()
        } else {
            script.statuses.front().cloned()
        };
        Ok(next.unwrap_or_else(|| snapshot("running", None, None)))
    }
}

impl AnalysisService for ScriptedService {
    fn submit(&self, request: SubmissionRequest) -> ServiceFut<'_, JobId, UploadError> {
        Box::pin(async move {
            let n = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let mut script = self.lock();
            if let Some(detail) = &script.upload_rejection {
                return Err(UploadError::new(http_failure(
                    StatusCode::BAD_REQUEST,
                    Some(detail),
                )));
            }
            script.submitted.push(request);
            Ok(JobId::new(format!("job-{n}")))
        })
    }

    fn start<'a>(
        &'a self,
        job_id: &'a JobId,
        params: AnalysisParams,
    ) -> ServiceFut<'a, (), AnalysisStartError> {
        Box::pin(async move {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            self.lock().started.push((job_id.clone(), params));
            Ok(())
        })
    }

    fn status<'a>(&'a self, _job_id: &'a JobId) -> ServiceFut<'a, StatusSnapshot, StatusPollError> {
        Box::pin(async move {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let latency = self.lock().latency;
            if !latency.is_zero() {
                time::sleep(latency).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.next_status()
        })
    }

    fn rendered_description<'a>(
        &'a self,
        _job_id: &'a JobId,
    ) -> ServiceFut<'a, String, RenderFetchError> {
        Box::pin(async move {
            self.lock()
                .rendering
                .clone()
                .ok_or_else(|| RenderFetchError::new(http_failure(StatusCode::NOT_FOUND, None)))
        })
    }

    fn rerender<'a>(
        &'a self,
        _job_id: &'a JobId,
        size: RenderSize,
    ) -> ServiceFut<'a, String, RerenderError> {
        Box::pin(async move {
            let mut script = self.lock();
            script.rerender_sizes.push(size);
            match script.rerender.clone() {
                Some(Ok(svg)) => Ok(svg),
                Some(Err(detail)) => Err(RerenderError::new(http_failure(
                    StatusCode::BAD_REQUEST,
                    Some(&detail),
                ))),
                None => Err(RerenderError::new(http_failure(
                    StatusCode::NOT_FOUND,
                    None,
                ))),
            }
        })
    }
}

#[derive(Default)]
struct Canvas {
    loaded: Option<String>,
    fail_load: bool,
    /// Successful manipulations still allowed before the scripted failure.
    fail_after: Option<(usize, String)>,
    selected: BTreeSet<NodeId>,
    /// Nodes the renderer knows about. Lookups of anything else miss.
    nodes: BTreeMap<NodeId, Option<String>>,
    calls: Vec<String>,
}

/// Renderer double that records every manipulation it receives.
#[derive(Default)]
pub(crate) struct FakeRenderer {
    canvas: Mutex<Canvas>,
    notifier: Option<watch::Sender<BTreeSet<NodeId>>>,
    selected_ids_calls: AtomicUsize,
}

impl FakeRenderer {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_notifier() -> Arc<Self> {
        let (tx, _rx) = watch::channel(BTreeSet::new());
        Arc::new(Self {
            notifier: Some(tx),
            ..Self::default()
        })
    }

    pub(crate) fn failing_load(self: Arc<Self>) -> Arc<Self> {
        self.canvas().fail_load = true;
        self
    }

    pub(crate) fn label(&self, id: &str, label: &str) {
        self.canvas()
            .nodes
            .insert(NodeId::new(id), Some(label.to_string()));
    }

    /// A node that exists but carries no label.
    pub(crate) fn unlabelled(&self, id: &str) {
        self.canvas().nodes.insert(NodeId::new(id), None);
    }

    /// Simulate the user picking nodes.
    pub(crate) fn select(&self, ids: &[&str]) {
        self.canvas().selected = ids.iter().map(|id| NodeId::new(*id)).collect();
    }

    pub(crate) fn notify(&self, ids: &[&str]) {
        let set: BTreeSet<NodeId> = ids.iter().map(|id| NodeId::new(*id)).collect();
        if let Some(tx) = &self.notifier {
            tx.send_replace(set);
        }
    }

    pub(crate) fn fail_next(&self, message: &str) {
        self.fail_after(0, message);
    }

    /// Let `successes` manipulations through, then fail the next one.
    pub(crate) fn fail_after(&self, successes: usize, message: &str) {
        self.canvas().fail_after = Some((successes, message.to_string()));
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.canvas().calls.clone()
    }

    pub(crate) fn loaded(&self) -> Option<String> {
        self.canvas().loaded.clone()
    }

    pub(crate) fn selected_ids_calls(&self) -> usize {
        self.selected_ids_calls.load(Ordering::SeqCst)
    }

    fn canvas(&self) -> MutexGuard<'_, Canvas> {
        self.canvas.lock().unwrap()
    }

    fn record(&self, operation: &'static str, call: String) -> Result<(), RenderError> {
        let mut canvas = self.canvas();
        match canvas.fail_after.take() {
            Some((0, message)) => return Err(RenderError::capability(operation, message)),
            Some((n, message)) => canvas.fail_after = Some((n - 1, message)),
            None => {}
        }
        canvas.calls.push(call);
        Ok(())
    }
}

impl TreeRenderer for FakeRenderer {
    fn load(&self, description: &str) -> Result<(), RenderError> {
        let mut canvas = self.canvas();
        if canvas.fail_load {
            return Err(RenderError::capability("load", "unparseable tree"));
        }
        canvas.loaded = Some(description.to_string());
        Ok(())
    }

    fn set_type(&self, render_type: RenderType) -> Result<(), RenderError> {
        self.record("set_type", format!("set_type({render_type})"))
    }

    fn zoom(&self, delta: f64) -> Result<(), RenderError> {
        self.record("zoom", format!("zoom({delta})"))
    }

    fn fit(&self) -> Result<(), RenderError> {
        self.record("fit", "fit".to_string())
    }

    fn export_raster(&self) -> Result<Vec<u8>, RenderError> {
        self.record("export_raster", "export".to_string())?;
        Ok(b"PNG".to_vec())
    }

    fn set_label_visibility(&self, visible: bool) -> Result<(), RenderError> {
        self.record("set_label_visibility", format!("labels({visible})"))
    }

    fn set_label_alignment(&self, aligned: bool) -> Result<(), RenderError> {
        self.record("set_label_alignment", format!("align({aligned})"))
    }

    fn selected_ids(&self) -> Result<BTreeSet<NodeId>, RenderError> {
        self.selected_ids_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.canvas().selected.clone())
    }

    fn find_node_by_id(&self, id: &NodeId) -> Option<NodeInfo> {
        let label = self.canvas().nodes.get(id).cloned()?;
        Some(NodeInfo {
            id: id.clone(),
            label,
        })
    }

    fn set_root(&self, id: Option<&NodeId>) -> Result<(), RenderError> {
        let target = id.map_or("-", NodeId::as_str);
        self.record("set_root", format!("set_root({target})"))
    }

    fn set_rotated(&self, id: &NodeId, rotated: bool) -> Result<(), RenderError> {
        self.record("set_rotated", format!("set_rotated({id}, {rotated})"))
    }

    fn set_collapsed(&self, id: &NodeId, collapsed: bool) -> Result<(), RenderError> {
        self.record("set_collapsed", format!("set_collapsed({id}, {collapsed})"))
    }

    fn clear_selection(&self) -> Result<(), RenderError> {
        self.record("clear_selection", "clear_selection".to_string())?;
        self.canvas().selected.clear();
        Ok(())
    }

    fn selection_notifier(&self) -> Option<watch::Receiver<BTreeSet<NodeId>>> {
        self.notifier.as_ref().map(watch::Sender::subscribe)
    }
}
