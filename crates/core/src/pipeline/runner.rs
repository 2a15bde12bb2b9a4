use crate::delivery::ReportNotifier;
use crate::domain::report::{HistoryEntry, Report, ReportFrequency, ReportStatus};
use crate::guard::{idempotency_key, IdempotencyManager};
use crate::pipeline::{ReportError, ReportPipeline};
use crate::storage::repository::HistorySink;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const TASK_NAME: &str = "generate_report";

#[derive(Debug, Clone)]
pub struct ReportJob {
    pub company_id: String,
    pub frequency: ReportFrequency,
    pub as_of: NaiveDate,
    pub recipient: Option<String>,
    /// Generate only: no dedup, delivery or history.
    pub dry_run: bool,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Same `(company, frequency, as_of)` already ran inside the dedup window.
    Skipped,
    /// Generated without a recipient to deliver to.
    Generated(Box<Report>),
    Delivered(Box<Report>),
    DeliveryFailed { report: Box<Report>, error: String },
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Generated(_) => "generated",
            Self::Delivered(_) => "delivered",
            Self::DeliveryFailed { .. } => "delivery_failed",
        }
    }

    pub fn report(&self) -> Option<&Report> {
        match self {
            Self::Skipped => None,
            Self::Generated(r) | Self::Delivered(r) => Some(r),
            Self::DeliveryFailed { report, .. } => Some(report),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Side-effecting wrapper around [`ReportPipeline`]: dedup, delivery and the audit trail.
#[derive(Clone)]
pub struct ReportRunner {
    pipeline: Arc<ReportPipeline>,
    idempotency: IdempotencyManager,
    notifier: Option<Arc<dyn ReportNotifier>>,
    history: Option<Arc<dyn HistorySink>>,
    dedup_ttl: Duration,
    concurrency: usize,
}

impl ReportRunner {
    pub fn new(
        pipeline: Arc<ReportPipeline>,
        idempotency: IdempotencyManager,
        notifier: Option<Arc<dyn ReportNotifier>>,
        history: Option<Arc<dyn HistorySink>>,
        dedup_ttl: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            pipeline,
            idempotency,
            notifier,
            history,
            dedup_ttl,
            concurrency: concurrency.max(1),
        }
    }

    pub fn pipeline(&self) -> &ReportPipeline {
        &self.pipeline
    }

    pub async fn run(&self, job: ReportJob) -> Result<RunOutcome, ReportError> {
        let started = Instant::now();

        if job.dry_run {
            let report = self
                .pipeline
                .generate(&job.company_id, job.frequency, job.as_of)
                .await?;
            return Ok(RunOutcome::Generated(Box::new(report)));
        }

        let as_of = job.as_of.to_string();
        let key = idempotency_key(&[&job.company_id, job.frequency.as_str(), &as_of]);
        if self
            .idempotency
            .is_duplicate(TASK_NAME, &key, self.dedup_ttl)
            .await
        {
            tracing::info!(
                company_id = %job.company_id,
                frequency = job.frequency.as_str(),
                as_of = %job.as_of,
                "report already generated for this period; skipping"
            );
            return Ok(RunOutcome::Skipped);
        }

        let report = match self
            .pipeline
            .generate(&job.company_id, job.frequency, job.as_of)
            .await
        {
            Ok(report) => report,
            Err(err) => {
                let elapsed_ms = started.elapsed().as_millis() as i64;
                tracing::error!(
                    company_id = %job.company_id,
                    frequency = job.frequency.as_str(),
                    elapsed_ms,
                    error = %err,
                    "report generation failed"
                );
                self.record(&job, ReportStatus::Failed, None, false, Some(err.to_string()), elapsed_ms)
                    .await;
                self.idempotency.clear(TASK_NAME, &key).await;
                return Err(err);
            }
        };

        let Some(recipient) = job.recipient.as_deref() else {
            let elapsed_ms = started.elapsed().as_millis() as i64;
            self.record(&job, ReportStatus::Success, Some(&report), false, None, elapsed_ms)
                .await;
            self.idempotency
                .mark_completed(TASK_NAME, &key, self.dedup_ttl.saturating_mul(24))
                .await;
            return Ok(RunOutcome::Generated(Box::new(report)));
        };

        let delivery = match &self.notifier {
            Some(notifier) => notifier.send(recipient, &report).await,
            None => Err(anyhow::anyhow!("no notifier configured")),
        };
        let elapsed_ms = started.elapsed().as_millis() as i64;

        match delivery {
            Ok(()) => {
                tracing::info!(
                    company_id = %job.company_id,
                    recipient,
                    elapsed_ms,
                    "report delivered"
                );
                self.record(&job, ReportStatus::Success, Some(&report), true, None, elapsed_ms)
                    .await;
                self.idempotency
                    .mark_completed(TASK_NAME, &key, self.dedup_ttl.saturating_mul(24))
                    .await;
                Ok(RunOutcome::Delivered(Box::new(report)))
            }
            Err(err) => {
                let error = format!("{err:#}");
                tracing::error!(
                    company_id = %job.company_id,
                    recipient,
                    elapsed_ms,
                    error = %error,
                    "report delivery failed"
                );
                self.record(
                    &job,
                    ReportStatus::Failed,
                    Some(&report),
                    false,
                    Some(error.clone()),
                    elapsed_ms,
                )
                .await;
                // The pending key is left to expire so a later run can resend.
                Ok(RunOutcome::DeliveryFailed {
                    report: Box::new(report),
                    error,
                })
            }
        }
    }

    /// Every active target for `frequency`, at most `concurrency` at a time.
    pub async fn run_batch(
        &self,
        frequency: ReportFrequency,
        as_of: NaiveDate,
    ) -> anyhow::Result<BatchSummary> {
        let targets = self.pipeline.active_targets(frequency).await?;
        let mut summary = BatchSummary {
            total: targets.len(),
            ..BatchSummary::default()
        };
        tracing::info!(
            frequency = frequency.as_str(),
            %as_of,
            total = summary.total,
            concurrency = self.concurrency,
            "starting report batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for target in targets {
            let Some(recipient) = target.recipient else {
                tracing::warn!(company_id = %target.company_id, "no recipient configured; counted as failed");
                summary.failed += 1;
                continue;
            };

            let runner = self.clone();
            let semaphore = semaphore.clone();
            let job = ReportJob {
                company_id: target.company_id,
                frequency,
                as_of,
                recipient: Some(recipient),
                dry_run: false,
            };
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                anyhow::Ok(runner.run(job).await)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(Ok(RunOutcome::Skipped))) => summary.skipped += 1,
                Ok(Ok(Ok(RunOutcome::Delivered(_) | RunOutcome::Generated(_)))) => summary.success += 1,
                Ok(Ok(Ok(RunOutcome::DeliveryFailed { .. }))) | Ok(Ok(Err(_))) => summary.failed += 1,
                Ok(Err(err)) => {
                    tracing::error!(error = %format!("{err:#}"), "batch job could not start");
                    summary.failed += 1;
                }
                Err(err) => {
                    tracing::error!(error = %err, "batch job panicked");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            frequency = frequency.as_str(),
            total = summary.total,
            success = summary.success,
            failed = summary.failed,
            skipped = summary.skipped,
            "report batch finished"
        );
        Ok(summary)
    }

    /// Best-effort: a history failure is logged, never returned.
    async fn record(
        &self,
        job: &ReportJob,
        status: ReportStatus,
        report: Option<&Report>,
        delivered: bool,
        error: Option<String>,
        elapsed_ms: i64,
    ) {
        let Some(history) = &self.history else {
            return;
        };

        let entry = HistoryEntry {
            company_id: job.company_id.clone(),
            frequency: job.frequency,
            as_of_date: job.as_of,
            status,
            delivery_method: job
                .recipient
                .as_ref()
                .and(self.notifier.as_ref())
                .map(|n| n.channel()),
            recipient: job.recipient.clone(),
            delivered,
            report: report.and_then(|r| serde_json::to_value(r).ok()),
            error,
            elapsed_ms,
            created_at: Utc::now(),
        };

        if let Err(err) = history.record(&entry).await {
            tracing::error!(
                company_id = %job.company_id,
                error = %format!("{err:#}"),
                "failed to write report history"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportSettings;
    use crate::guard::MemoryStore;
    use crate::recommend::RecommendationSynthesizer;
    use crate::testkit::{d, FakeRepos, MemoryHistory, RecordingNotifier};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(3600);

    fn repos() -> FakeRepos {
        FakeRepos::default()
            .with_company("c1", "Chez Mama")
            .with_sales(d(2025, 7, 1), 500_000.0, 20)
            .with_expenses(d(2025, 7, 1), 300_000.0)
    }

    struct Harness {
        runner: ReportRunner,
        notifier: Arc<RecordingNotifier>,
        history: Arc<MemoryHistory>,
    }

    fn harness(repos: FakeRepos, notifier: RecordingNotifier, history: MemoryHistory) -> Harness {
        let pipeline = ReportPipeline::with_repositories(
            Arc::new(repos),
            &ReportSettings::default(),
            RecommendationSynthesizer::fallback_only(),
        );
        let notifier = Arc::new(notifier);
        let history = Arc::new(history);
        let runner = ReportRunner::new(
            Arc::new(pipeline),
            IdempotencyManager::new(Arc::new(MemoryStore::new())),
            Some(notifier.clone()),
            Some(history.clone()),
            TTL,
            5,
        );
        Harness {
            runner,
            notifier,
            history,
        }
    }

    fn job(recipient: Option<&str>) -> ReportJob {
        ReportJob {
            company_id: "c1".into(),
            frequency: ReportFrequency::Monthly,
            as_of: d(2025, 7, 31),
            recipient: recipient.map(str::to_string),
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn duplicate_submission_sends_once() {
        let h = harness(repos(), RecordingNotifier::default(), MemoryHistory::default());

        let first = h.runner.run(job(Some("42"))).await.unwrap();
        assert_eq!(first.as_str(), "delivered");
        let second = h.runner.run(job(Some("42"))).await.unwrap();
        assert_eq!(second.as_str(), "skipped");

        assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
        let entries = h.history.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, ReportStatus::Success);
        assert!(entries[0].delivered);
        assert!(entries[0].report.is_some());
    }

    #[tokio::test]
    async fn oversized_dedup_ttl_does_not_overflow() {
        let pipeline = ReportPipeline::with_repositories(
            Arc::new(repos()),
            &ReportSettings::default(),
            RecommendationSynthesizer::fallback_only(),
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let runner = ReportRunner::new(
            Arc::new(pipeline),
            IdempotencyManager::new(Arc::new(MemoryStore::new())),
            Some(notifier.clone()),
            None,
            Duration::MAX,
            1,
        );

        assert_eq!(runner.run(job(Some("42"))).await.unwrap().as_str(), "delivered");
        assert_eq!(runner.run(job(Some("42"))).await.unwrap().as_str(), "skipped");
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn generation_failure_records_and_allows_retry() {
        let mut r = repos();
        r.fail_sales = true;
        let h = harness(r, RecordingNotifier::default(), MemoryHistory::default());

        let err = h.runner.run(job(Some("42"))).await.unwrap_err();
        assert!(matches!(err, ReportError::DataUnavailable { .. }));
        // Key was cleared, so the retry is not treated as a duplicate.
        assert!(h.runner.run(job(Some("42"))).await.is_err());

        let entries = h.history.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.status == ReportStatus::Failed && e.report.is_none()));
        assert!(entries[0].error.as_deref().unwrap_or_default().contains("sales totals unavailable"));
        assert!(h.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_recorded_not_raised() {
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        let h = harness(repos(), notifier, MemoryHistory::default());

        let outcome = h.runner.run(job(Some("42"))).await.unwrap();
        match &outcome {
            RunOutcome::DeliveryFailed { error, .. } => assert!(error.contains("502")),
            other => panic!("unexpected {}", other.as_str()),
        }
        let entries = h.history.entries.lock().unwrap();
        assert_eq!(entries[0].status, ReportStatus::Failed);
        assert!(!entries[0].delivered);
        assert!(entries[0].report.is_some());
    }

    #[tokio::test]
    async fn history_failure_never_fails_the_run() {
        let history = MemoryHistory {
            fail: true,
            ..Default::default()
        };
        let h = harness(repos(), RecordingNotifier::default(), history);
        let outcome = h.runner.run(job(Some("42"))).await.unwrap();
        assert_eq!(outcome.as_str(), "delivered");
    }

    #[tokio::test]
    async fn dry_run_bypasses_dedup_and_history() {
        let h = harness(repos(), RecordingNotifier::default(), MemoryHistory::default());
        let mut j = job(Some("42"));
        j.dry_run = true;

        for _ in 0..2 {
            let outcome = h.runner.run(j.clone()).await.unwrap();
            assert_eq!(outcome.as_str(), "generated");
            assert_eq!(outcome.report().map(|r| r.company_id.as_str()), Some("c1"));
        }
        assert!(h.notifier.sent.lock().unwrap().is_empty());
        assert!(h.history.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_counts_outcomes() {
        let r = repos()
            .with_company("c2", "Boutique Ndolo")
            .with_company("c3", "Pharmacie Bali")
            .with_target("c1", Some("11"))
            .with_target("c2", None)
            .with_target("c3", Some("33"))
            .with_target("missing", Some("44"));
        let h = harness(r, RecordingNotifier::default(), MemoryHistory::default());

        let summary = h
            .runner
            .run_batch(ReportFrequency::Monthly, d(2025, 7, 31))
            .await
            .unwrap();
        assert_eq!(
            summary,
            BatchSummary {
                total: 4,
                success: 2,
                failed: 2,
                skipped: 0
            }
        );

        let again = h
            .runner
            .run_batch(ReportFrequency::Monthly, d(2025, 7, 31))
            .await
            .unwrap();
        assert_eq!(again.skipped, 2);
        assert_eq!(h.notifier.sent.lock().unwrap().len(), 2);

        let weekly = h
            .runner
            .run_batch(ReportFrequency::Weekly, d(2025, 7, 31))
            .await
            .unwrap();
        assert_eq!(weekly.total, 0);
    }

    struct SlowNotifier {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ReportNotifier for SlowNotifier {
        fn channel(&self) -> crate::domain::report::DeliveryMethod {
            crate::domain::report::DeliveryMethod::Telegram
        }

        async fn send(&self, _: &str, _: &Report) -> anyhow::Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn batch_respects_concurrency_limit() {
        let mut r = FakeRepos::default();
        for i in 0..6 {
            let id = format!("c{i}");
            r = r.with_company(&id, "Shop").with_target(&id, Some("1"));
        }
        let pipeline = ReportPipeline::with_repositories(
            Arc::new(r),
            &ReportSettings::default(),
            RecommendationSynthesizer::fallback_only(),
        );
        let notifier = Arc::new(SlowNotifier {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let runner = ReportRunner::new(
            Arc::new(pipeline),
            IdempotencyManager::new(Arc::new(MemoryStore::new())),
            Some(notifier.clone()),
            None,
            TTL,
            2,
        );

        let summary = runner
            .run_batch(ReportFrequency::Monthly, d(2025, 7, 31))
            .await
            .unwrap();
        assert_eq!(summary.success, 6);
        assert_eq!(notifier.peak.load(Ordering::SeqCst), 2);
    }
}
