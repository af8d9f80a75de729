// Run coordinator: drives one monitoring run end to end

use crate::audit::AuditLog;
use crate::config::Settings;
use crate::db::repositories::{JobStore, TenderStore};
use crate::dedup::DedupFilter;
use crate::errors::{LeaseError, RunError, ScraperError};
use crate::lease::LeaseRegistry;
use crate::mailer::Mailer;
use crate::models::{
    Candidate, JobStatus, MonitoringConfig, NotificationAttempt, NotificationDecision,
    NotificationLogEntry, RunOutcome, RunPhase, ScrapingJob, StoredTender, TriggerSource,
};
use crate::poll::PollConfig;
use crate::report;
use crate::scraper::{wait_for_terminal, JobRequest, RemoteState, ScraperClient};
use crate::telemetry;
use chrono::Utc;
use std::cmp;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Timing and concurrency knobs for a run
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub job_timeout: Duration,
    pub poll_interval: Duration,
    pub max_concurrent_jobs: usize,
    pub max_results: u32,
    pub lease_ttl: Duration,
    /// Cap on total run duration regardless of source count
    pub max_run: Duration,
}

impl CoordinatorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            job_timeout: Duration::from_secs(settings.scraper.job_timeout_seconds),
            poll_interval: Duration::from_secs(settings.scraper.poll_interval_seconds),
            max_concurrent_jobs: settings.scraper.max_concurrent_jobs,
            max_results: settings.scraper.max_results,
            lease_ttl: Duration::from_secs(settings.scan.lease_ttl_seconds),
            max_run: Duration::from_secs(settings.scan.max_run_seconds),
        }
    }
}

/// Orchestrates one monitoring run: lease, dispatch, aggregate, decide,
/// notify. Collaborators come in behind traits so the whole state machine is
/// testable without external services.
pub struct RunCoordinator {
    scraper: Arc<dyn ScraperClient>,
    tenders: Arc<dyn TenderStore>,
    jobs: Arc<dyn JobStore>,
    leases: Arc<dyn LeaseRegistry>,
    mailer: Arc<dyn Mailer>,
    audit: AuditLog,
    filter: DedupFilter,
    config: CoordinatorConfig,
}

/// What one source task produced
struct SourceResult {
    job: ScrapingJob,
    candidates: Vec<Candidate>,
}

/// Everything one spawned source task needs, owned
struct SourceTask {
    scraper: Arc<dyn ScraperClient>,
    jobs: Arc<dyn JobStore>,
    request: JobRequest,
    job: ScrapingJob,
    poll: PollConfig,
    semaphore: Arc<Semaphore>,
}

impl SourceTask {
    async fn run(mut self) -> SourceResult {
        let _permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.job.mark_failed("dispatcher shut down");
                return self.finish(Vec::new()).await;
            }
        };

        let remote_id = match self.scraper.submit_job(&self.request).await {
            Ok(id) => id,
            Err(e) => {
                self.job.mark_failed(&e.to_string());
                return self.finish(Vec::new()).await;
            }
        };

        self.job.mark_running(&remote_id);
        if let Err(e) = self.jobs.update(&self.job).await {
            warn!(job_id = %self.job.id, error = %e, "Failed to record running status");
        }

        let candidates = match wait_for_terminal(&*self.scraper, &remote_id, &self.poll).await {
            Ok(status) if status.status == RemoteState::Succeeded => {
                match self.scraper.fetch_results(&remote_id).await {
                    Ok(candidates) => {
                        self.job.mark_succeeded(candidates.len() as i32);
                        candidates
                    }
                    Err(e) => {
                        self.job.mark_failed(&e.to_string());
                        Vec::new()
                    }
                }
            }
            Ok(status) => {
                let message = status
                    .error
                    .unwrap_or_else(|| "job failed remotely".to_string());
                self.job.mark_failed(&message);
                Vec::new()
            }
            Err(ScraperError::Timeout { .. }) => {
                self.job.mark_timed_out();
                Vec::new()
            }
            Err(e) => {
                self.job.mark_failed(&e.to_string());
                Vec::new()
            }
        };

        self.finish(candidates).await
    }

    async fn finish(self, candidates: Vec<Candidate>) -> SourceResult {
        if let Err(e) = self.jobs.update(&self.job).await {
            warn!(job_id = %self.job.id, error = %e, "Failed to record terminal job status");
        }
        telemetry::record_job_status(&self.job.config_name, &self.job.source, self.job.status);

        SourceResult {
            job: self.job,
            candidates,
        }
    }
}

impl RunCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scraper: Arc<dyn ScraperClient>,
        tenders: Arc<dyn TenderStore>,
        jobs: Arc<dyn JobStore>,
        leases: Arc<dyn LeaseRegistry>,
        mailer: Arc<dyn Mailer>,
        audit: AuditLog,
        filter: DedupFilter,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            scraper,
            tenders,
            jobs,
            leases,
            mailer,
            audit,
            filter,
            config,
        }
    }

    /// Execute one monitoring run for `config`.
    ///
    /// Expected obstacles (held lease, unreachable engine, per-source
    /// failures) end up on the returned outcome; `Err` means the run hit a
    /// failure it could not degrade around.
    #[instrument(skip(self, config), fields(config_name = %config.name, trigger = %trigger))]
    pub async fn run(
        &self,
        config: &MonitoringConfig,
        trigger: TriggerSource,
    ) -> Result<RunOutcome, RunError> {
        config.validate().map_err(|e| RunError::InvalidConfig {
            name: config.name.clone(),
            source: e,
        })?;

        let mut outcome = RunOutcome::started(&config.name, trigger, config.sources.len());

        let _guard = match self
            .leases
            .try_acquire(&config.name, self.config.lease_ttl)
            .await
        {
            Ok(guard) => guard,
            Err(LeaseError::AlreadyHeld { .. }) => {
                outcome.abort("run already in progress");
                self.audit.record_run_outcome(&outcome);
                return Ok(outcome);
            }
            Err(LeaseError::Backend(e)) => {
                // Without the lease backend we cannot guarantee exclusivity
                outcome.abort(&format!("lease backend unavailable: {}", e));
                self.audit.record_run_outcome(&outcome);
                return Ok(outcome);
            }
        };

        outcome.phase = RunPhase::Dispatching;
        if let Err(e) = self.scraper.health_check().await {
            outcome.abort(&format!("discovery engine unavailable: {}", e));
            self.audit.record_run_outcome(&outcome);
            return Ok(outcome);
        }

        let results = self.dispatch(config, &mut outcome).await;

        outcome.phase = RunPhase::Aggregating;
        let mut candidates: Vec<Candidate> = Vec::new();
        for result in results {
            match result.job.status {
                JobStatus::Succeeded => {
                    outcome.jobs_succeeded += 1;
                    candidates.extend(result.candidates);
                }
                JobStatus::TimedOut => outcome.jobs_timed_out += 1,
                _ => {
                    outcome.jobs_failed += 1;
                    if let Some(error) = &result.job.error {
                        outcome
                            .warnings
                            .push(format!("{}: {}", result.job.source, error));
                    }
                }
            }
        }
        outcome.candidates_seen = candidates.len();

        outcome.phase = RunPhase::Deciding;
        let summary = self.filter.ingest(&candidates, &*self.tenders).await?;
        outcome.tenders_stored = summary.accepted.len();
        outcome.duplicates_discarded = summary.exact_duplicates + summary.near_duplicates;
        outcome.irrelevant_discarded = summary.irrelevant;
        outcome.warnings.extend(summary.warnings);

        outcome.phase = RunPhase::Notifying;
        let decision = if !summary.accepted.is_empty() {
            NotificationDecision::DetailedReport
        } else if config.send_empty_reports {
            NotificationDecision::EmptyReport
        } else {
            NotificationDecision::Suppressed
        };

        outcome.notification = Some(
            self.notify(config, decision, &summary.accepted, &mut outcome.warnings)
                .await?,
        );

        outcome.complete();
        self.audit.record_run_outcome(&outcome);
        Ok(outcome)
    }

    /// Fan scraping jobs out over the sources, bounded by the semaphore and
    /// the run-level deadline. Partial results are kept.
    async fn dispatch(
        &self,
        config: &MonitoringConfig,
        outcome: &mut RunOutcome,
    ) -> Vec<SourceResult> {
        let run_budget = cmp::min(
            self.config.job_timeout * config.sources.len().max(1) as u32,
            self.config.max_run,
        );
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs));
        let poll = PollConfig::new(self.config.poll_interval, self.config.job_timeout);

        let max_results = config
            .filters
            .max_results
            .unwrap_or(self.config.max_results);

        let mut join_set: JoinSet<SourceResult> = JoinSet::new();
        let mut in_flight: HashMap<Uuid, ScrapingJob> = HashMap::new();

        for source in &config.sources {
            let job = ScrapingJob::new(&config.name, source);
            if let Err(e) = self.jobs.create(&job).await {
                warn!(source = %source, error = %e, "Failed to record scraping job");
                outcome.jobs_failed += 1;
                outcome
                    .warnings
                    .push(format!("{}: could not record job: {}", source, e));
                continue;
            }
            in_flight.insert(job.id, job.clone());

            let task = SourceTask {
                scraper: self.scraper.clone(),
                jobs: self.jobs.clone(),
                request: JobRequest {
                    source: source.clone(),
                    keywords: config.keywords.clone(),
                    max_results,
                    filters: config.filters.clone(),
                },
                job,
                poll,
                semaphore: semaphore.clone(),
            };
            join_set.spawn(task.run());
        }

        let deadline = tokio::time::Instant::now() + run_budget;
        let mut results: Vec<SourceResult> = Vec::new();

        loop {
            tokio::select! {
                next = join_set.join_next() => {
                    match next {
                        Some(Ok(result)) => {
                            in_flight.remove(&result.job.id);
                            results.push(result);
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Source task aborted");
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        config_name = %config.name,
                        budget_seconds = run_budget.as_secs(),
                        "Run deadline reached, cancelling remaining jobs"
                    );
                    join_set.abort_all();
                    while let Some(next) = join_set.join_next().await {
                        if let Ok(result) = next {
                            in_flight.remove(&result.job.id);
                            results.push(result);
                        }
                    }
                    break;
                }
            }
        }

        // Jobs cancelled by the run deadline never reached a terminal status
        for (_, mut job) in in_flight {
            job.mark_timed_out();
            if let Err(e) = self.jobs.update(&job).await {
                warn!(job_id = %job.id, error = %e, "Failed to record cancelled job");
            }
            telemetry::record_job_status(&job.config_name, &job.source, job.status);
            results.push(SourceResult {
                job,
                candidates: Vec::new(),
            });
        }

        results
    }

    /// Decide, compose, deliver, and audit the notification for a run
    async fn notify(
        &self,
        config: &MonitoringConfig,
        decision: NotificationDecision,
        accepted: &[StoredTender],
        warnings: &mut Vec<String>,
    ) -> Result<NotificationAttempt, RunError> {
        if decision == NotificationDecision::Suppressed {
            telemetry::record_notification(&config.name, decision, true);
            return Ok(NotificationAttempt {
                decision,
                success: true,
                error: None,
            });
        }

        let now = Utc::now();
        let message = match decision {
            NotificationDecision::DetailedReport => {
                report::detailed_report(&config.name, accepted, now)?
            }
            NotificationDecision::EmptyReport => {
                report::empty_report(&config.name, config.sources.len(), now)?
            }
            NotificationDecision::Suppressed => unreachable!(),
        };

        let tender_ids: Vec<Uuid> = accepted.iter().map(|t| t.id).collect();
        let send_result = self.mailer.send(&config.recipients, &message).await;
        telemetry::record_notification(&config.name, decision, send_result.is_ok());

        let entry = match &send_result {
            Ok(()) => NotificationLogEntry::sent(
                &config.name,
                &config.recipients,
                &message.subject,
                tender_ids.clone(),
            ),
            Err(e) => NotificationLogEntry::failed(
                &config.name,
                &config.recipients,
                &message.subject,
                tender_ids.clone(),
                &e.to_string(),
            ),
        };
        self.audit.record_notification(entry).await;

        match send_result {
            Ok(()) => {
                if decision == NotificationDecision::DetailedReport {
                    if let Err(e) = self.tenders.mark_notified(&tender_ids).await {
                        warn!(error = %e, "Failed to flag tenders as notified");
                        warnings.push(format!("could not flag tenders as notified: {}", e));
                    }
                }
                Ok(NotificationAttempt {
                    decision,
                    success: true,
                    error: None,
                })
            }
            Err(e) => {
                // Tenders stay stored; the delivery failure is on the record
                warnings.push(format!("notification delivery failed: {}", e));
                Ok(NotificationAttempt {
                    decision,
                    success: false,
                    error: Some(e.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DedupConfig;
    use crate::db::repositories::{MockJobStore, MockNotificationStore, MockTenderStore};
    use crate::errors::{DatabaseError, NotificationError};
    use crate::mailer::MockMailer;
    use crate::models::FilterParams;
    use crate::scraper::{MockScraperClient, RemoteJobStatus};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory lease registry with real acquire/release semantics
    struct TestLeases {
        held: Arc<Mutex<HashSet<String>>>,
    }

    impl TestLeases {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                held: Arc::new(Mutex::new(HashSet::new())),
            })
        }
    }

    #[async_trait]
    impl LeaseRegistry for TestLeases {
        async fn try_acquire(
            &self,
            config_name: &str,
            _ttl: Duration,
        ) -> Result<crate::lease::LeaseGuard, LeaseError> {
            let mut held = self.held.lock().unwrap();
            if !held.insert(config_name.to_string()) {
                return Err(LeaseError::AlreadyHeld {
                    resource: config_name.to_string(),
                });
            }
            let set = self.held.clone();
            let key = config_name.to_string();
            Ok(crate::lease::LeaseGuard::new(key.clone(), move || {
                set.lock().unwrap().remove(&key);
            }))
        }

        async fn is_held(&self, config_name: &str) -> Result<bool, LeaseError> {
            Ok(self.held.lock().unwrap().contains(config_name))
        }
    }

    fn monitoring_config(sources: &[&str], send_empty_reports: bool) -> MonitoringConfig {
        MonitoringConfig {
            id: Uuid::new_v4(),
            name: "it-tenders".to_string(),
            keywords: vec!["software".to_string(), "network".to_string()],
            sources: sources.iter().map(|s| s.to_string()).collect(),
            filters: FilterParams::default(),
            recipients: vec!["team@example.com".to_string()],
            active: true,
            send_empty_reports,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            job_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(20),
            max_concurrent_jobs: 5,
            max_results: 50,
            lease_ttl: Duration::from_secs(60),
            max_run: Duration::from_secs(5),
        }
    }

    fn candidate(source: &str, id: &str, title: &str, relevance: f64) -> Candidate {
        Candidate {
            tender_id: Some(id.to_string()),
            title: title.to_string(),
            description: String::new(),
            source: source.to_string(),
            source_url: format!("https://{}.example/{}", source, id),
            posting_date: Some(Utc::now()),
            deadline: None,
            estimated_value: None,
            location: None,
            keywords_found: vec!["software".to_string()],
            relevance_score: relevance,
        }
    }

    fn permissive_job_store() -> MockJobStore {
        let mut jobs = MockJobStore::new();
        jobs.expect_create().returning(|_| Ok(()));
        jobs.expect_update().returning(|_| Ok(()));
        jobs
    }

    fn succeeded_status() -> RemoteJobStatus {
        RemoteJobStatus {
            status: RemoteState::Succeeded,
            results_count: None,
            error: None,
        }
    }

    struct Harness {
        scraper: MockScraperClient,
        tenders: MockTenderStore,
        jobs: MockJobStore,
        mailer: MockMailer,
        notifications: MockNotificationStore,
        leases: Arc<TestLeases>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                scraper: MockScraperClient::new(),
                tenders: MockTenderStore::new(),
                jobs: permissive_job_store(),
                mailer: MockMailer::new(),
                notifications: MockNotificationStore::new(),
                leases: TestLeases::new(),
            }
        }

        fn build(self) -> RunCoordinator {
            self.build_with(fast_config())
        }

        fn build_with(self, config: CoordinatorConfig) -> RunCoordinator {
            RunCoordinator::new(
                Arc::new(self.scraper),
                Arc::new(self.tenders),
                Arc::new(self.jobs),
                self.leases,
                Arc::new(self.mailer),
                AuditLog::new(Arc::new(self.notifications)),
                DedupFilter::new(DedupConfig {
                    similarity_threshold: 0.8,
                    min_relevance_score: 0.3,
                    recent_window: 50,
                }),
                config,
            )
        }
    }

    #[tokio::test]
    async fn test_held_lease_aborts_without_touching_engine() {
        let mut harness = Harness::new();
        harness.jobs = MockJobStore::new();
        let leases = harness.leases.clone();
        let coordinator = harness.build();

        let _guard = leases
            .try_acquire("it-tenders", Duration::from_secs(60))
            .await
            .unwrap();

        let config = monitoring_config(&["ted"], false);
        let outcome = coordinator
            .run(&config, TriggerSource::Manual)
            .await
            .unwrap();

        assert_eq!(outcome.phase, RunPhase::Aborted);
        assert_eq!(outcome.abort_reason.as_deref(), Some("run already in progress"));
    }

    #[tokio::test]
    async fn test_lease_is_released_after_completed_run() {
        let mut harness = Harness::new();
        harness
            .scraper
            .expect_health_check()
            .returning(|| Ok(()));
        harness
            .scraper
            .expect_submit_job()
            .returning(|req| Ok(format!("remote-{}", req.source)));
        harness
            .scraper
            .expect_job_status()
            .returning(|_| Ok(succeeded_status()));
        harness
            .scraper
            .expect_fetch_results()
            .returning(|_| Ok(vec![]));
        let leases = harness.leases.clone();
        let coordinator = harness.build();

        let config = monitoring_config(&["ted"], false);
        let outcome = coordinator
            .run(&config, TriggerSource::Scheduled)
            .await
            .unwrap();
        assert_eq!(outcome.phase, RunPhase::Completed);

        // Release runs synchronously in the guard callback here
        let second = leases
            .try_acquire("it-tenders", Duration::from_secs(60))
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_engine_aborts_before_dispatch() {
        let mut harness = Harness::new();
        harness.jobs = MockJobStore::new();
        harness
            .scraper
            .expect_health_check()
            .returning(|| Err(ScraperError::Connectivity("refused".to_string())));
        let coordinator = harness.build();

        let config = monitoring_config(&["ted", "vvz"], false);
        let outcome = coordinator
            .run(&config, TriggerSource::Scheduled)
            .await
            .unwrap();

        assert_eq!(outcome.phase, RunPhase::Aborted);
        assert!(outcome
            .abort_reason
            .unwrap()
            .contains("discovery engine unavailable"));
        assert_eq!(outcome.jobs_succeeded + outcome.jobs_failed, 0);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successful_results() {
        let mut harness = Harness::new();
        harness.scraper.expect_health_check().returning(|| Ok(()));
        harness.scraper.expect_submit_job().returning(|req| {
            if req.source == "vvz" {
                Err(ScraperError::SubmissionRejected {
                    source_name: "vvz".to_string(),
                    reason: "unknown source".to_string(),
                })
            } else {
                Ok(format!("remote-{}", req.source))
            }
        });
        harness
            .scraper
            .expect_job_status()
            .returning(|_| Ok(succeeded_status()));
        harness
            .scraper
            .expect_fetch_results()
            .returning(|_| Ok(vec![candidate("ted", "t-1", "Fiber network build-out", 0.9)]));

        harness.tenders.expect_recent_by_source().returning(|_, _| Ok(vec![]));
        harness
            .tenders
            .expect_exists_by_dedup_key()
            .returning(|_| Ok(false));
        harness.tenders.expect_insert().times(1).returning(|_| Ok(()));
        harness
            .tenders
            .expect_mark_notified()
            .times(1)
            .returning(|ids| Ok(ids.len() as u64));

        harness.mailer.expect_send().times(1).returning(|_, _| Ok(()));
        harness
            .notifications
            .expect_append()
            .times(1)
            .withf(|entry| entry.success)
            .returning(|_| Ok(()));

        let coordinator = harness.build();
        let config = monitoring_config(&["ted", "vvz"], false);
        let outcome = coordinator
            .run(&config, TriggerSource::Scheduled)
            .await
            .unwrap();

        assert_eq!(outcome.phase, RunPhase::Completed);
        assert_eq!(outcome.jobs_succeeded, 1);
        assert_eq!(outcome.jobs_failed, 1);
        assert_eq!(outcome.tenders_stored, 1);
        assert!(outcome.warnings.iter().any(|w| w.contains("vvz")));
        let notification = outcome.notification.unwrap();
        assert_eq!(notification.decision, NotificationDecision::DetailedReport);
        assert!(notification.success);
    }

    #[tokio::test]
    async fn test_stuck_job_times_out_and_run_completes() {
        let mut harness = Harness::new();
        harness.scraper.expect_health_check().returning(|| Ok(()));
        harness
            .scraper
            .expect_submit_job()
            .returning(|req| Ok(format!("remote-{}", req.source)));
        harness.scraper.expect_job_status().returning(|_| {
            Ok(RemoteJobStatus {
                status: RemoteState::Running,
                results_count: None,
                error: None,
            })
        });
        harness.tenders.expect_recent_by_source().returning(|_, _| Ok(vec![]));

        let coordinator = harness.build();
        let config = monitoring_config(&["ted"], false);
        let outcome = coordinator
            .run(&config, TriggerSource::Scheduled)
            .await
            .unwrap();

        assert_eq!(outcome.phase, RunPhase::Completed);
        assert_eq!(outcome.jobs_timed_out, 1);
        assert_eq!(outcome.candidates_seen, 0);
        assert_eq!(
            outcome.notification.unwrap().decision,
            NotificationDecision::Suppressed
        );
    }

    #[tokio::test]
    async fn test_run_deadline_cancels_stuck_jobs_and_keeps_partial_results() {
        // The run budget expires while "vvz" is still polling; "ted" has
        // already delivered. The stuck job must land as timed out and the
        // fetched results must survive into the report.
        let mut harness = Harness::new();
        harness.scraper.expect_health_check().returning(|| Ok(()));
        harness
            .scraper
            .expect_submit_job()
            .returning(|req| Ok(format!("remote-{}", req.source)));
        harness.scraper.expect_job_status().returning(|job_id| {
            if job_id == "remote-ted" {
                Ok(succeeded_status())
            } else {
                Ok(RemoteJobStatus {
                    status: RemoteState::Running,
                    results_count: None,
                    error: None,
                })
            }
        });
        harness
            .scraper
            .expect_fetch_results()
            .returning(|_| Ok(vec![candidate("ted", "t-1", "Fiber network build-out", 0.9)]));

        harness.tenders.expect_recent_by_source().returning(|_, _| Ok(vec![]));
        harness
            .tenders
            .expect_exists_by_dedup_key()
            .returning(|_| Ok(false));
        harness.tenders.expect_insert().times(1).returning(|_| Ok(()));
        harness
            .tenders
            .expect_mark_notified()
            .times(1)
            .returning(|ids| Ok(ids.len() as u64));

        harness.mailer.expect_send().times(1).returning(|_, _| Ok(()));
        harness
            .notifications
            .expect_append()
            .times(1)
            .returning(|_| Ok(()));

        let leases = harness.leases.clone();
        // Per-job timeout far beyond the run budget: only the run deadline
        // can stop the stuck source
        let coordinator = harness.build_with(CoordinatorConfig {
            job_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(20),
            max_concurrent_jobs: 5,
            max_results: 50,
            lease_ttl: Duration::from_secs(60),
            max_run: Duration::from_millis(300),
        });

        let config = monitoring_config(&["ted", "vvz"], false);
        let outcome = coordinator
            .run(&config, TriggerSource::Scheduled)
            .await
            .unwrap();

        assert_eq!(outcome.phase, RunPhase::Completed);
        assert_eq!(outcome.jobs_succeeded, 1);
        assert_eq!(outcome.jobs_timed_out, 1);
        assert_eq!(outcome.jobs_failed, 0);
        assert_eq!(outcome.candidates_seen, 1);
        assert_eq!(outcome.tenders_stored, 1);
        assert_eq!(
            outcome.notification.unwrap().decision,
            NotificationDecision::DetailedReport
        );

        // Guard dropped on return, even though a task was cancelled mid-poll
        assert!(!leases.is_held("it-tenders").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_run_sends_report_only_when_opted_in() {
        for (send_empty, expected_sends) in [(true, 1usize), (false, 0usize)] {
            let mut harness = Harness::new();
            harness.scraper.expect_health_check().returning(|| Ok(()));
            harness
                .scraper
                .expect_submit_job()
                .returning(|req| Ok(format!("remote-{}", req.source)));
            harness
                .scraper
                .expect_job_status()
                .returning(|_| Ok(succeeded_status()));
            harness
                .scraper
                .expect_fetch_results()
                .returning(|_| Ok(vec![]));

            harness
                .mailer
                .expect_send()
                .times(expected_sends)
                .withf(|_, message| message.subject.starts_with("No new opportunities"))
                .returning(|_, _| Ok(()));
            harness
                .notifications
                .expect_append()
                .times(expected_sends)
                .returning(|_| Ok(()));

            let coordinator = harness.build();
            let config = monitoring_config(&["ted"], send_empty);
            let outcome = coordinator
                .run(&config, TriggerSource::Scheduled)
                .await
                .unwrap();

            assert_eq!(outcome.phase, RunPhase::Completed);
            let expected_decision = if send_empty {
                NotificationDecision::EmptyReport
            } else {
                NotificationDecision::Suppressed
            };
            assert_eq!(outcome.notification.unwrap().decision, expected_decision);
        }
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_tenders_unnotified() {
        let mut harness = Harness::new();
        harness.scraper.expect_health_check().returning(|| Ok(()));
        harness
            .scraper
            .expect_submit_job()
            .returning(|req| Ok(format!("remote-{}", req.source)));
        harness
            .scraper
            .expect_job_status()
            .returning(|_| Ok(succeeded_status()));
        harness
            .scraper
            .expect_fetch_results()
            .returning(|_| Ok(vec![candidate("ted", "t-1", "Fiber network build-out", 0.9)]));

        harness.tenders.expect_recent_by_source().returning(|_, _| Ok(vec![]));
        harness
            .tenders
            .expect_exists_by_dedup_key()
            .returning(|_| Ok(false));
        harness.tenders.expect_insert().returning(|_| Ok(()));
        harness.tenders.expect_mark_notified().times(0);

        harness
            .mailer
            .expect_send()
            .returning(|_, _| Err(NotificationError::Transport("connection reset".to_string())));
        harness
            .notifications
            .expect_append()
            .times(1)
            .withf(|entry| !entry.success && entry.error.is_some())
            .returning(|_| Ok(()));

        let coordinator = harness.build();
        let config = monitoring_config(&["ted"], false);
        let outcome = coordinator
            .run(&config, TriggerSource::Scheduled)
            .await
            .unwrap();

        assert_eq!(outcome.phase, RunPhase::Completed);
        assert_eq!(outcome.tenders_stored, 1);
        let notification = outcome.notification.unwrap();
        assert!(!notification.success);
        assert!(notification.error.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_end_to_end_scan_filters_and_reports() {
        // Two sources; five candidates: one exact duplicate of a stored
        // tender, one in-batch duplicate, one irrelevant, two accepted.
        let mut harness = Harness::new();
        harness.scraper.expect_health_check().returning(|| Ok(()));
        harness
            .scraper
            .expect_submit_job()
            .returning(|req| Ok(format!("remote-{}", req.source)));
        harness
            .scraper
            .expect_job_status()
            .returning(|_| Ok(succeeded_status()));
        harness.scraper.expect_fetch_results().returning(|job_id| {
            if job_id == "remote-ted" {
                Ok(vec![
                    candidate("ted", "t-1", "Fiber network build-out", 0.9),
                    candidate("ted", "t-1", "Fiber network build-out", 0.9),
                    candidate("ted", "t-2", "Office chairs", 0.1),
                ])
            } else {
                Ok(vec![
                    candidate("vvz", "v-1", "Datacenter cooling upgrade", 0.8),
                    candidate("vvz", "v-old", "Already stored tender", 0.9),
                ])
            }
        });

        harness.tenders.expect_recent_by_source().returning(|_, _| Ok(vec![]));
        harness
            .tenders
            .expect_exists_by_dedup_key()
            .returning(|key| Ok(key == "vvz:v-old"));
        harness.tenders.expect_insert().times(2).returning(|_| Ok(()));
        harness
            .tenders
            .expect_mark_notified()
            .times(1)
            .withf(|ids| ids.len() == 2)
            .returning(|ids| Ok(ids.len() as u64));

        harness
            .mailer
            .expect_send()
            .times(1)
            .withf(|recipients, message| {
                recipients.len() == 1
                    && recipients[0] == "team@example.com"
                    && message.subject == "2 new opportunities (it-tenders)"
            })
            .returning(|_, _| Ok(()));
        harness
            .notifications
            .expect_append()
            .times(1)
            .withf(|entry| entry.success && entry.tender_ids.len() == 2)
            .returning(|_| Ok(()));

        let coordinator = harness.build();
        let config = monitoring_config(&["ted", "vvz"], false);
        let outcome = coordinator
            .run(&config, TriggerSource::Scheduled)
            .await
            .unwrap();

        assert_eq!(outcome.phase, RunPhase::Completed);
        assert_eq!(outcome.jobs_succeeded, 2);
        assert_eq!(outcome.candidates_seen, 5);
        assert_eq!(outcome.tenders_stored, 2);
        assert_eq!(outcome.duplicates_discarded, 2);
        assert_eq!(outcome.irrelevant_discarded, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_lease() {
        let harness = Harness::new();
        let coordinator = harness.build();

        let mut config = monitoring_config(&["ted"], false);
        config.recipients.clear();

        let err = coordinator
            .run(&config, TriggerSource::Manual)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_store_failure_during_ingest_is_fatal() {
        let mut harness = Harness::new();
        harness.scraper.expect_health_check().returning(|| Ok(()));
        harness
            .scraper
            .expect_submit_job()
            .returning(|req| Ok(format!("remote-{}", req.source)));
        harness
            .scraper
            .expect_job_status()
            .returning(|_| Ok(succeeded_status()));
        harness
            .scraper
            .expect_fetch_results()
            .returning(|_| Ok(vec![candidate("ted", "t-1", "Fiber network build-out", 0.9)]));
        harness
            .tenders
            .expect_recent_by_source()
            .returning(|_, _| Err(DatabaseError::ConnectionFailed("pool closed".to_string())));

        let coordinator = harness.build();
        let config = monitoring_config(&["ted"], false);
        let err = coordinator
            .run(&config, TriggerSource::Scheduled)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Database(_)));
    }
}
