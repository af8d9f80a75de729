// HTTP client for the external discovery engine

use crate::config::ScraperConfig;
use crate::errors::ScraperError;
use crate::models::{Candidate, FilterParams};
use crate::poll::{poll_until, retry_once, PollConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Delay before the single retry of a connection-level failure
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Parameters for one scraping job against one source
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub source: String,
    pub keywords: Vec<String>,
    pub max_results: u32,
    pub filters: FilterParams,
}

/// Remote job state as reported by the discovery engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RemoteState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteState::Succeeded | RemoteState::Failed)
    }
}

/// Status snapshot of a remote job
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteJobStatus {
    pub status: RemoteState,
    #[serde(default)]
    pub results_count: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitJobRequest<'a> {
    source: &'a str,
    keywords: &'a [String],
    max_results: u32,
    #[serde(skip_serializing_if = "is_empty_filters")]
    filters: &'a FilterParams,
}

fn is_empty_filters(filters: &&FilterParams) -> bool {
    **filters == FilterParams::default()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitJobResponse {
    job_id: String,
}

/// Client interface to the discovery engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScraperClient: Send + Sync {
    /// Cheap connectivity probe, used before dispatching a run
    async fn health_check(&self) -> Result<(), ScraperError>;

    /// Submit a scraping job; returns the remote job id
    async fn submit_job(&self, request: &JobRequest) -> Result<String, ScraperError>;

    /// Fetch the current status of a remote job
    async fn job_status(&self, job_id: &str) -> Result<RemoteJobStatus, ScraperError>;

    /// Fetch the candidate tenders produced by a finished job
    async fn fetch_results(&self, job_id: &str) -> Result<Vec<Candidate>, ScraperError>;
}

/// Drive a remote job to a terminal state within the polling budget
pub async fn wait_for_terminal(
    client: &dyn ScraperClient,
    job_id: &str,
    poll: &PollConfig,
) -> Result<RemoteJobStatus, ScraperError> {
    let status = poll_until(poll, || async {
        let status = client.job_status(job_id).await?;
        debug!(job_id = %job_id, status = ?status.status, "Polled remote job");
        Ok(if status.status.is_terminal() {
            Some(status)
        } else {
            None
        })
    })
    .await?;

    status.ok_or_else(|| ScraperError::Timeout {
        job_id: job_id.to_string(),
        seconds: poll.max_wait.as_secs(),
    })
}

/// reqwest-based implementation of [`ScraperClient`]
pub struct HttpScraperClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScraperClient {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .timeout(Duration::from_secs(config.connect_timeout_seconds * 2))
            .build()
            .map_err(|e| ScraperError::Connectivity(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_transport_error(e: reqwest::Error) -> ScraperError {
        if e.is_connect() || e.is_timeout() {
            ScraperError::Connectivity(e.to_string())
        } else {
            ScraperError::InvalidResponse(e.to_string())
        }
    }

    async fn do_health_check(&self) -> Result<(), ScraperError> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ScraperError::Connectivity(format!(
                "Health endpoint returned {}",
                response.status()
            )))
        }
    }

    async fn do_submit_job(&self, request: &JobRequest) -> Result<String, ScraperError> {
        let body = SubmitJobRequest {
            source: &request.source,
            keywords: &request.keywords,
            max_results: request.max_results,
            filters: &request.filters,
        };

        let response = self
            .client
            .post(self.url("/jobs"))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(ScraperError::SubmissionRejected {
                source_name: request.source.clone(),
                reason,
            });
        }

        let parsed: SubmitJobResponse = response
            .json()
            .await
            .map_err(|e| ScraperError::InvalidResponse(e.to_string()))?;

        Ok(parsed.job_id)
    }

    async fn do_job_status(&self, job_id: &str) -> Result<RemoteJobStatus, ScraperError> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}", job_id)))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(ScraperError::InvalidResponse(format!(
                "Status endpoint returned {} for job {}",
                response.status(),
                job_id
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ScraperError::InvalidResponse(e.to_string()))
    }

    async fn do_fetch_results(&self, job_id: &str) -> Result<Vec<Candidate>, ScraperError> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}/results", job_id)))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            return Err(ScraperError::InvalidResponse(format!(
                "Results endpoint returned {} for job {}",
                response.status(),
                job_id
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ScraperError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ScraperClient for HttpScraperClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), ScraperError> {
        retry_once(RETRY_DELAY, ScraperError::is_connection_level, || {
            self.do_health_check()
        })
        .await
    }

    #[instrument(skip(self, request), fields(source = %request.source))]
    async fn submit_job(&self, request: &JobRequest) -> Result<String, ScraperError> {
        let job_id = retry_once(RETRY_DELAY, ScraperError::is_connection_level, || {
            self.do_submit_job(request)
        })
        .await?;

        debug!(source = %request.source, job_id = %job_id, "Job submitted");
        Ok(job_id)
    }

    #[instrument(skip(self))]
    async fn job_status(&self, job_id: &str) -> Result<RemoteJobStatus, ScraperError> {
        retry_once(RETRY_DELAY, ScraperError::is_connection_level, || {
            self.do_job_status(job_id)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_results(&self, job_id: &str) -> Result<Vec<Candidate>, ScraperError> {
        let candidates = retry_once(RETRY_DELAY, ScraperError::is_connection_level, || {
            self.do_fetch_results(job_id)
        })
        .await?;

        if candidates.is_empty() {
            warn!(job_id = %job_id, "Finished job produced no candidates");
        }

        Ok(candidates)
    }
}
