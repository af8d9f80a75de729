// Domain models for monitoring configs, scraping jobs, tenders and notifications

use crate::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Structured filter parameters applied by the discovery engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_estimated_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_estimated_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
}

/// A named watch: which sources to scan, what to look for, who to tell
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonitoringConfig {
    pub id: Uuid,
    pub name: String,
    #[sqlx(json)]
    pub keywords: Vec<String>,
    #[sqlx(json)]
    pub sources: Vec<String>,
    #[sqlx(json)]
    pub filters: FilterParams,
    #[sqlx(json)]
    pub recipients: Vec<String>,
    pub active: bool,
    pub send_empty_reports: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitoringConfig {
    /// Validate a config at the load boundary; invalid configs never enter a run
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()));
        }
        if self.sources.is_empty() {
            return Err(ValidationError::MissingField("sources".to_string()));
        }
        if self.keywords.is_empty() {
            return Err(ValidationError::MissingField("keywords".to_string()));
        }
        if self.recipients.is_empty() {
            return Err(ValidationError::MissingField("recipients".to_string()));
        }
        for recipient in &self.recipients {
            if !recipient.contains('@') || recipient.trim().len() < 3 {
                return Err(ValidationError::InvalidFieldValue {
                    field: "recipients".to_string(),
                    reason: format!("'{}' is not a valid email address", recipient),
                });
            }
        }
        if let (Some(min), Some(max)) = (
            self.filters.min_estimated_value,
            self.filters.max_estimated_value,
        ) {
            if min > max {
                return Err(ValidationError::InvalidFieldValue {
                    field: "filters".to_string(),
                    reason: "min_estimated_value exceeds max_estimated_value".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Lifecycle of a single scraping job dispatched to the discovery engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "timed_out" => Ok(JobStatus::TimedOut),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One scraping job against one source, tracked in `scraping_jobs`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScrapingJob {
    pub id: Uuid,
    /// Remote job id assigned by the discovery engine on submission
    pub remote_job_id: Option<String>,
    pub config_name: String,
    pub source: String,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub results_count: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScrapingJob {
    pub fn new(config_name: &str, source: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_job_id: None,
            config_name: config_name.to_string(),
            source: source.to_string(),
            status: JobStatus::Pending,
            results_count: 0,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn mark_running(&mut self, remote_job_id: &str) {
        self.remote_job_id = Some(remote_job_id.to_string());
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_succeeded(&mut self, results_count: i32) {
        self.status = JobStatus::Succeeded;
        self.results_count = results_count;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: &str) {
        self.status = JobStatus::Failed;
        self.error = Some(error.to_string());
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_timed_out(&mut self) {
        self.status = JobStatus::TimedOut;
        self.error = Some("job timed out".to_string());
        self.completed_at = Some(Utc::now());
    }
}

/// Candidate tender as returned by the discovery engine, before filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub tender_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub source: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub posting_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_value: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub keywords_found: Vec<String>,
    #[serde(default)]
    pub relevance_score: f64,
}

/// A tender accepted by the filter and persisted in `tenders`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoredTender {
    pub id: Uuid,
    pub dedup_key: String,
    pub tender_id: Option<String>,
    pub title: String,
    pub description: String,
    pub source: String,
    pub source_url: String,
    pub posting_date: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_value: Option<f64>,
    pub location: Option<String>,
    #[sqlx(json)]
    pub keywords_found: Vec<String>,
    pub relevance_score: f64,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredTender {
    pub fn from_candidate(candidate: &Candidate, dedup_key: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            dedup_key,
            tender_id: candidate.tender_id.clone(),
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            source: candidate.source.clone(),
            source_url: candidate.source_url.clone(),
            posting_date: candidate.posting_date,
            deadline: candidate.deadline,
            estimated_value: candidate.estimated_value,
            location: candidate.location.clone(),
            keywords_found: candidate.keywords_found.clone(),
            relevance_score: candidate.relevance_score,
            notified: false,
            created_at: Utc::now(),
        }
    }
}

/// Audit record of one notification attempt, tracked in `notification_log`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationLogEntry {
    pub id: Uuid,
    pub config_name: String,
    #[sqlx(json)]
    pub recipients: Vec<String>,
    pub subject: String,
    #[sqlx(json)]
    pub tender_ids: Vec<Uuid>,
    pub success: bool,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl NotificationLogEntry {
    pub fn sent(
        config_name: &str,
        recipients: &[String],
        subject: &str,
        tender_ids: Vec<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            config_name: config_name.to_string(),
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            tender_ids,
            success: true,
            error: None,
            sent_at: Utc::now(),
        }
    }

    pub fn failed(
        config_name: &str,
        recipients: &[String],
        subject: &str,
        tender_ids: Vec<Uuid>,
        error: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            config_name: config_name.to_string(),
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            tender_ids,
            success: false,
            error: Some(error.to_string()),
            sent_at: Utc::now(),
        }
    }
}

/// What triggered a monitoring run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Scheduled,
    Manual,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Scheduled => write!(f, "scheduled"),
            TriggerSource::Manual => write!(f, "manual"),
        }
    }
}

/// Phases of the run coordinator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    AcquiringLease,
    Dispatching,
    Aggregating,
    Deciding,
    Notifying,
    Completed,
    Aborted,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Idle => "idle",
            RunPhase::AcquiringLease => "acquiring_lease",
            RunPhase::Dispatching => "dispatching",
            RunPhase::Aggregating => "aggregating",
            RunPhase::Deciding => "deciding",
            RunPhase::Notifying => "notifying",
            RunPhase::Completed => "completed",
            RunPhase::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// What the coordinator decided to send at the end of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationDecision {
    DetailedReport,
    EmptyReport,
    Suppressed,
}

/// Outcome of the notification phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAttempt {
    pub decision: NotificationDecision,
    pub success: bool,
    pub error: Option<String>,
}

/// Summary of one monitoring run, emitted to the audit log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub config_name: String,
    pub trigger: TriggerSource,
    pub phase: RunPhase,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub sources_total: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    pub jobs_timed_out: usize,
    pub candidates_seen: usize,
    pub tenders_stored: usize,
    pub duplicates_discarded: usize,
    pub irrelevant_discarded: usize,
    pub notification: Option<NotificationAttempt>,
    pub abort_reason: Option<String>,
    pub warnings: Vec<String>,
}

impl RunOutcome {
    pub fn started(config_name: &str, trigger: TriggerSource, sources_total: usize) -> Self {
        Self {
            config_name: config_name.to_string(),
            trigger,
            phase: RunPhase::AcquiringLease,
            started_at: Utc::now(),
            finished_at: None,
            sources_total,
            jobs_succeeded: 0,
            jobs_failed: 0,
            jobs_timed_out: 0,
            candidates_seen: 0,
            tenders_stored: 0,
            duplicates_discarded: 0,
            irrelevant_discarded: 0,
            notification: None,
            abort_reason: None,
            warnings: Vec::new(),
        }
    }

    pub fn abort(&mut self, reason: &str) {
        self.phase = RunPhase::Aborted;
        self.abort_reason = Some(reason.to_string());
        self.finished_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.phase = RunPhase::Completed;
        self.finished_at = Some(Utc::now());
    }
}
