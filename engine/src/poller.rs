//! Progress polling for one running job.
//!
//! [`ProgressTracker`] holds the display rules (clamping, monotonic progress,
//! the minimum-visible hold) with no I/O. [`PollTask`] drives it from a
//! spawned task: one poll immediately, then one per interval, each request
//! awaited before the next tick so requests never overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use phylo_types::{
    FINALIZING_STEP_TEXT, Generation, JobId, JobStatus, Progress, Seq, StatusSnapshot, Timings,
};

use crate::error::{JobError, RemoteJobError};
use crate::service::AnalysisService;

const POLL_EVENT_CHANNEL_CAPACITY: usize = 64;

/// What the poll loop should do after one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDecision {
    Continue { progress: Progress, step_text: String },
    /// Show 100% now and finish after `hold`.
    Complete { hold: Duration },
    Fail(RemoteJobError),
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started: Instant,
    displayed: Progress,
    min_visible: Duration,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(started: Instant, min_visible: Duration) -> Self {
        Self {
            started,
            displayed: Progress::ZERO,
            min_visible,
        }
    }

    #[must_use]
    pub fn displayed(&self) -> Progress {
        self.displayed
    }

    pub fn observe(&mut self, snapshot: &StatusSnapshot, now: Instant) -> PollDecision {
        match snapshot.status {
            JobStatus::Completed => {
                self.displayed = Progress::COMPLETE;
                let elapsed = now.saturating_duration_since(self.started);
                PollDecision::Complete {
                    hold: self.min_visible.saturating_sub(elapsed),
                }
            }
            JobStatus::Error => PollDecision::Fail(RemoteJobError::new(snapshot.message.as_deref())),
            _ => {
                self.displayed = self.displayed.max(snapshot.progress());
                PollDecision::Continue {
                    progress: self.displayed,
                    step_text: snapshot.step_text().into_owned(),
                }
            }
        }
    }
}

#[derive(Debug)]
pub enum PollEventKind {
    Progress { progress: Progress, step_text: String },
    Completed,
    Failed(JobError),
}

/// One event from a poll task, stamped so stale ones can be discarded.
#[derive(Debug)]
pub struct PollEvent {
    pub generation: Generation,
    pub seq: Seq,
    pub kind: PollEventKind,
}

/// Owned handle to a running poll task. Dropping it aborts the task.
#[derive(Debug)]
pub struct PollTask {
    job_id: JobId,
    generation: Generation,
    join_handle: JoinHandle<()>,
    event_rx: mpsc::Receiver<PollEvent>,
}

impl PollTask {
    pub fn spawn(
        service: Arc<dyn AnalysisService>,
        job_id: JobId,
        generation: Generation,
        timings: Timings,
    ) -> Self {
        let (tx, rx) = mpsc::channel(POLL_EVENT_CHANNEL_CAPACITY);
        let task_job = job_id.clone();
        let join_handle = tokio::spawn(async move {
            run(service.as_ref(), &task_job, generation, timings, &tx).await;
        });
        Self {
            job_id,
            generation,
            join_handle,
            event_rx: rx,
        }
    }

    #[must_use]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn try_recv_event(&mut self) -> Option<PollEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Wait for the next event. `None` once the task has finished and its
    /// events are drained.
    pub async fn recv_event(&mut self) -> Option<PollEvent> {
        self.event_rx.recv().await
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    pub fn abort(&self) {
        self.join_handle.abort();
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

struct Emitter<'a> {
    tx: &'a mpsc::Sender<PollEvent>,
    generation: Generation,
    seq: Seq,
}

impl Emitter<'_> {
    /// False once the receiver is gone.
    async fn emit(&mut self, kind: PollEventKind) -> bool {
        self.seq = self.seq.next();
        let event = PollEvent {
            generation: self.generation,
            seq: self.seq,
            kind,
        };
        self.tx.send(event).await.is_ok()
    }
}

async fn run(
    service: &dyn AnalysisService,
    job_id: &JobId,
    generation: Generation,
    timings: Timings,
    tx: &mpsc::Sender<PollEvent>,
) {
    let mut tracker = ProgressTracker::new(Instant::now(), timings.min_progress_visible());
    let mut emitter = Emitter {
        tx,
        generation,
        seq: Seq::default(),
    };
    let mut interval = time::interval(timings.poll_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let snapshot = match service.status(job_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Status poll failed");
                emitter.emit(PollEventKind::Failed(e.into())).await;
                return;
            }
        };

        match tracker.observe(&snapshot, Instant::now()) {
            PollDecision::Continue {
                progress,
                step_text,
            } => {
                if !emitter
                    .emit(PollEventKind::Progress {
                        progress,
                        step_text,
                    })
                    .await
                {
                    return;
                }
            }
            PollDecision::Complete { hold } => {
                tracing::info!(job_id = %job_id, hold_ms = hold.as_millis(), "Job completed");
                let shown = emitter
                    .emit(PollEventKind::Progress {
                        progress: Progress::COMPLETE,
                        step_text: FINALIZING_STEP_TEXT.to_string(),
                    })
                    .await;
                if !shown {
                    return;
                }
                if !hold.is_zero() {
                    time::sleep(hold).await;
                }
                emitter.emit(PollEventKind::Completed).await;
                return;
            }
            PollDecision::Fail(err) => {
                tracing::warn!(job_id = %job_id, message = err.message(), "Job reported an error");
                emitter.emit(PollEventKind::Failed(err.into())).await;
                return;
            }
        }
    }
}
