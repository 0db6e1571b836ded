//! The server-rendered tree image shown in the results view.
//!
//! Load and re-render failures become an inline error block in place of the
//! image; they never fail the session, and downloads stay available.

use phylo_types::{JobId, RenderSize};

use crate::service::AnalysisService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactDisplay {
    Loading,
    /// SVG markup from the service.
    Rendered(String),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct ArtifactPane {
    job_id: JobId,
    display: ArtifactDisplay,
}

impl ArtifactPane {
    #[must_use]
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            display: ArtifactDisplay::Loading,
        }
    }

    #[must_use]
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    #[must_use]
    pub fn display(&self) -> &ArtifactDisplay {
        &self.display
    }

    pub async fn load(&mut self, service: &dyn AnalysisService) -> &ArtifactDisplay {
        self.display = match service.rendered_description(&self.job_id).await {
            Ok(svg) => ArtifactDisplay::Rendered(svg),
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Could not load tree rendering");
                ArtifactDisplay::Error(e.into_message())
            }
        };
        &self.display
    }

    /// Replace the artifact wholesale with a render at `size`.
    pub async fn rerender(
        &mut self,
        service: &dyn AnalysisService,
        size: RenderSize,
    ) -> &ArtifactDisplay {
        self.display = match service.rerender(&self.job_id, size).await {
            Ok(svg) => ArtifactDisplay::Rendered(svg),
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Re-render failed");
                ArtifactDisplay::Error(e.into_message())
            }
        };
        &self.display
    }
}
