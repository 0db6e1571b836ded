//! Job lifecycle: validate, upload, start, then follow progress to a
//! terminal state.
//!
//! The [`Session`] is owned by the caller. Each submission bumps its
//! [`Generation`] and replaces the poll task, so events from an earlier job
//! are recognised and dropped.

use std::fmt;
use std::sync::Arc;

use phylo_types::{
    AnalysisParams, GENERIC_STEP_TEXT, Generation, InputFields, JobId, Progress, Seq, Timings,
    WorkflowMode, request,
};

use crate::error::JobError;
use crate::poller::{PollEvent, PollEventKind, PollTask};
use crate::service::AnalysisService;

const POLL_STOPPED_MESSAGE: &str = "status polling stopped unexpectedly";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    Polling {
        job_id: JobId,
        progress: Progress,
        step_text: String,
    },
    Completed {
        job_id: JobId,
    },
    Failed {
        message: String,
    },
}

impl Phase {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed { .. } | Phase::Failed { .. })
    }

    #[must_use]
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Phase::Polling { job_id, .. } | Phase::Completed { job_id } => Some(job_id),
            _ => None,
        }
    }
}

pub struct Session {
    service: Arc<dyn AnalysisService>,
    timings: Timings,
    generation: Generation,
    last_seq: Seq,
    phase: Phase,
    poll: Option<PollTask>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("generation", &self.generation)
            .field("last_seq", &self.last_seq)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(service: Arc<dyn AnalysisService>, timings: Timings) -> Self {
        Self {
            service,
            timings,
            generation: Generation::default(),
            last_seq: Seq::default(),
            phase: Phase::Idle,
            poll: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub fn service(&self) -> &Arc<dyn AnalysisService> {
        &self.service
    }

    /// Validate, upload and start a job, then begin polling it.
    ///
    /// Any earlier job is abandoned first. On failure the session is left in
    /// [`Phase::Failed`] and the same error is returned.
    pub async fn submit(
        &mut self,
        mode: WorkflowMode,
        fields: &InputFields,
        params: AnalysisParams,
    ) -> Result<JobId, JobError> {
        self.begin(Phase::Submitting);

        let submission = match request::build(mode, fields) {
            Ok(submission) => submission,
            Err(e) => return Err(self.fail(e.into())),
        };

        let service = Arc::clone(&self.service);
        let job_id = match service.submit(submission).await {
            Ok(job_id) => job_id,
            Err(e) => return Err(self.fail(e.into())),
        };
        if let Err(e) = service.start(&job_id, params).await {
            return Err(self.fail(e.into()));
        }

        tracing::info!(job_id = %job_id, generation = %self.generation, "Polling job progress");
        self.poll = Some(PollTask::spawn(
            service,
            job_id.clone(),
            self.generation,
            self.timings,
        ));
        self.phase = Phase::Polling {
            job_id: job_id.clone(),
            progress: Progress::ZERO,
            step_text: GENERIC_STEP_TEXT.to_string(),
        };
        Ok(job_id)
    }

    /// Abandon whatever is in flight and return to `Idle`.
    pub fn cancel(&mut self) {
        self.begin(Phase::Idle);
    }

    /// Apply one poll event. Returns whether it changed the session.
    ///
    /// Events from an older generation, out-of-order events, and anything
    /// arriving after a terminal phase are ignored.
    pub fn apply(&mut self, event: PollEvent) -> bool {
        if event.generation != self.generation {
            tracing::debug!(
                event_generation = %event.generation,
                generation = %self.generation,
                "Discarding stale poll event"
            );
            return false;
        }
        if event.seq <= self.last_seq {
            return false;
        }
        let Phase::Polling {
            job_id,
            progress,
            step_text,
        } = &mut self.phase
        else {
            return false;
        };
        self.last_seq = event.seq;

        match event.kind {
            PollEventKind::Progress {
                progress: reported,
                step_text: text,
            } => {
                *progress = (*progress).max(reported);
                *step_text = text;
            }
            PollEventKind::Completed => {
                let job_id = job_id.clone();
                self.poll = None;
                self.phase = Phase::Completed { job_id };
            }
            PollEventKind::Failed(err) => {
                self.fail(err);
            }
        }
        true
    }

    /// Drain and apply whatever events are ready without waiting.
    pub fn poll_events(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.poll.as_mut().and_then(PollTask::try_recv_event) {
            if self.apply(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next poll event. `None` when no task is running or the
    /// task has ended.
    pub async fn next_event(&mut self) -> Option<PollEvent> {
        self.poll.as_mut()?.recv_event().await
    }

    /// Follow the job until it is terminal, calling `on_update` after every
    /// applied event.
    pub async fn run_to_completion(&mut self, mut on_update: impl FnMut(&Phase)) -> &Phase {
        while !self.phase.is_terminal() {
            let Some(event) = self.next_event().await else {
                if matches!(self.phase, Phase::Polling { .. }) {
                    self.fail_with_message(POLL_STOPPED_MESSAGE.to_string());
                    on_update(&self.phase);
                }
                break;
            };
            if self.apply(event) {
                on_update(&self.phase);
            }
        }
        &self.phase
    }

    fn begin(&mut self, phase: Phase) {
        // Dropping the task aborts it.
        self.poll = None;
        self.generation = self.generation.next();
        self.last_seq = Seq::default();
        self.phase = phase;
    }

    fn fail(&mut self, err: JobError) -> JobError {
        self.fail_with_message(err.message());
        err
    }

    fn fail_with_message(&mut self, message: String) {
        tracing::warn!(generation = %self.generation, message = %message, "Job failed");
        self.poll = None;
        self.phase = Phase::Failed { message };
    }
}
