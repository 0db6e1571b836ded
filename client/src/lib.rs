//! HTTP client for the phylogenetic analysis service.
//!
//! # Endpoints
//!
//! | Method | Operation | Path |
//! |--------|-----------|------|
//! | [`AnalysisClient::submit`] | multipart POST | `/upload` |
//! | [`AnalysisClient::start`] | POST | `/analyze/{job_id}?tree_tool=&bootstrap=` |
//! | [`AnalysisClient::status`] | GET | `/status/{job_id}` |
//! | [`AnalysisClient::download`] | GET | `/download/{job_id}/{kind}` |
//! | [`AnalysisClient::rendered_description`] | GET | `/results/{job_id}/svg-content` |
//! | [`AnalysisClient::rerender`] | POST (JSON) | `/results/{job_id}/rerender` |
//!
//! # Error Handling
//!
//! Each operation is one-shot: there is no retry. A non-success response is
//! turned into the operation's error type, carrying the service's `detail`
//! when the body has one. Error bodies are read with a size cap.

mod error;

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use phylo_types::{
    AnalysisParams, ArtifactKind, FormPart, FormValue, JobId, RenderSize, StatusSnapshot,
    SubmissionRequest,
};

pub use error::{
    AnalysisStartError, ClientBuildError, DownloadError, RenderFetchError, RerenderError,
    ServiceFailure, StatusPollError, UploadError,
};
pub use phylo_types;
pub use reqwest::StatusCode;

// TCP keepalive idle time; interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

const USER_AGENT: &str = concat!("phylo/", env!("CARGO_PKG_VERSION"));

/// Shared builder settings for every client talking to the service.
///
/// No `https_only`: the service is usually reached over plain HTTP on localhost.
#[must_use]
pub fn base_client_builder(connect_timeout: Duration) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(USER_AGENT)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    job_id: JobId,
}

#[derive(Debug, Deserialize)]
struct SvgContentResponse {
    svg_content: String,
}

/// Client bound to one service base URL.
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AnalysisClient {
    pub fn new(base_url: Url, connect_timeout: Duration) -> Result<Self, ClientBuildError> {
        let http = base_client_builder(connect_timeout)
            .build()
            .map_err(ClientBuildError::Http)?;
        Self::with_http_client(base_url, http)
    }

    pub fn with_http_client(
        base_url: Url,
        http: reqwest::Client,
    ) -> Result<Self, ClientBuildError> {
        if base_url.cannot_be_a_base() {
            return Err(ClientBuildError::UnsupportedBaseUrl(base_url));
        }
        Ok(Self { http, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Upload the validated inputs. Returns the job id the service assigned.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<JobId, UploadError> {
        let mode = request.mode();
        let form = multipart_form(request.into_form_parts());
        tracing::info!(mode = mode.wire_value(), "Uploading analysis input");

        let response = send(self.http.post(self.endpoint(&["upload"])).multipart(form))
            .await
            .map_err(UploadError::new)?;
        let body: UploadResponse = decode(response).await.map_err(UploadError::new)?;

        tracing::info!(job_id = %body.job_id, "Upload accepted");
        Ok(body.job_id)
    }

    /// Ask the service to begin processing an uploaded job.
    pub async fn start(
        &self,
        job_id: &JobId,
        params: AnalysisParams,
    ) -> Result<(), AnalysisStartError> {
        let mut url = self.endpoint(&["analyze", job_id.as_str()]);
        url.query_pairs_mut()
            .append_pair("tree_tool", params.tool.as_str())
            .append_pair("bootstrap", &params.bootstrap_replicates.to_string());

        tracing::info!(
            job_id = %job_id,
            tool = params.tool.as_str(),
            bootstrap = params.bootstrap_replicates,
            "Starting analysis"
        );
        send(self.http.post(url))
            .await
            .map_err(AnalysisStartError::new)?;
        Ok(())
    }

    pub async fn status(&self, job_id: &JobId) -> Result<StatusSnapshot, StatusPollError> {
        let response = send(self.http.get(self.endpoint(&["status", job_id.as_str()])))
            .await
            .map_err(StatusPollError::new)?;
        let snapshot: StatusSnapshot = decode(response).await.map_err(StatusPollError::new)?;
        tracing::debug!(
            job_id = %job_id,
            status = %snapshot.status,
            progress = ?snapshot.progress,
            step = ?snapshot.step,
            "Status polled"
        );
        Ok(snapshot)
    }

    /// Fetch a finished artifact as raw bytes.
    pub async fn download(
        &self,
        job_id: &JobId,
        kind: ArtifactKind,
    ) -> Result<Vec<u8>, DownloadError> {
        let url = self.endpoint(&["download", job_id.as_str(), kind.as_str()]);
        let response = send(self.http.get(url))
            .await
            .map_err(DownloadError::new)?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::new(ServiceFailure::Transport(e)))?;
        tracing::debug!(job_id = %job_id, kind = kind.as_str(), len = bytes.len(), "Downloaded artifact");
        Ok(bytes.to_vec())
    }

    /// The rendered tree (SVG markup) produced at the end of the job.
    pub async fn rendered_description(&self, job_id: &JobId) -> Result<String, RenderFetchError> {
        let url = self.endpoint(&["results", job_id.as_str(), "svg-content"]);
        let response = send(self.http.get(url))
            .await
            .map_err(RenderFetchError::new)?;
        let body: SvgContentResponse = decode(response).await.map_err(RenderFetchError::new)?;
        Ok(body.svg_content)
    }

    /// Ask the service to render the tree again at new dimensions.
    pub async fn rerender(&self, job_id: &JobId, size: RenderSize) -> Result<String, RerenderError> {
        let url = self.endpoint(&["results", job_id.as_str(), "rerender"]);
        tracing::info!(job_id = %job_id, width = ?size.width, height = ?size.height, "Re-rendering tree");
        let response = send(self.http.post(url).json(&size))
            .await
            .map_err(RerenderError::new)?;
        let body: SvgContentResponse = decode(response).await.map_err(RerenderError::new)?;
        Ok(body.svg_content)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Cannot fail: the constructor rejects cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn multipart_form(parts: Vec<FormPart>) -> Form {
    parts.into_iter().fold(Form::new(), |form, part| match part.value {
        FormValue::Text(text) => form.text(part.name, text),
        FormValue::File(upload) => {
            let (file_name, bytes) = upload.into_parts();
            form.part(part.name, Part::bytes(bytes).file_name(file_name))
        }
    })
}

async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ServiceFailure> {
    let response = request.send().await.map_err(ServiceFailure::Transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = read_capped_error_body(response).await;
    let detail = error::extract_detail(&body);
    tracing::warn!(%status, detail = ?detail, "Service returned an error");
    Err(ServiceFailure::Http {
        status,
        detail,
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ServiceFailure> {
    response.json::<T>().await.map_err(ServiceFailure::Decode)
}
