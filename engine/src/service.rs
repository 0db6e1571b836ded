//! The seam between the engine and the analysis service.

use std::future::Future;
use std::pin::Pin;

use phylo_client::{
    AnalysisClient, AnalysisStartError, RenderFetchError, RerenderError, StatusPollError,
    UploadError,
};
use phylo_types::{AnalysisParams, JobId, RenderSize, StatusSnapshot, SubmissionRequest};

pub type ServiceFut<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Remote operations the job lifecycle and the results view depend on.
pub trait AnalysisService: Send + Sync {
    fn submit(&self, request: SubmissionRequest) -> ServiceFut<'_, JobId, UploadError>;

    fn start<'a>(
        &'a self,
        job_id: &'a JobId,
        params: AnalysisParams,
    ) -> ServiceFut<'a, (), AnalysisStartError>;

    fn status<'a>(&'a self, job_id: &'a JobId) -> ServiceFut<'a, StatusSnapshot, StatusPollError>;

    fn rendered_description<'a>(
        &'a self,
        job_id: &'a JobId,
    ) -> ServiceFut<'a, String, RenderFetchError>;

    fn rerender<'a>(
        &'a self,
        job_id: &'a JobId,
        size: RenderSize,
    ) -> ServiceFut<'a, String, RerenderError>;
}

impl AnalysisService for AnalysisClient {
    fn submit(&self, request: SubmissionRequest) -> ServiceFut<'_, JobId, UploadError> {
        Box::pin(AnalysisClient::submit(self, request))
    }

    fn start<'a>(
        &'a self,
        job_id: &'a JobId,
        params: AnalysisParams,
    ) -> ServiceFut<'a, (), AnalysisStartError> {
        Box::pin(AnalysisClient::start(self, job_id, params))
    }

    fn status<'a>(&'a self, job_id: &'a JobId) -> ServiceFut<'a, StatusSnapshot, StatusPollError> {
        Box::pin(AnalysisClient::status(self, job_id))
    }

    fn rendered_description<'a>(
        &'a self,
        job_id: &'a JobId,
    ) -> ServiceFut<'a, String, RenderFetchError> {
        Box::pin(AnalysisClient::rendered_description(self, job_id))
    }

    fn rerender<'a>(
        &'a self,
        job_id: &'a JobId,
        size: RenderSize,
    ) -> ServiceFut<'a, String, RerenderError> {
        Box::pin(AnalysisClient::rerender(self, job_id, size))
    }
}
