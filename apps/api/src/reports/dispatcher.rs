//! Job Dispatcher: accepts report requests and runs each accepted job as its
//! own tokio task.
//!
//! The report is claimed (and left in `processing`) before `submit` returns,
//! so the caller can poll it immediately. There is no durable queue: a process
//! restart strands in-flight reports, which `resubmit` recovers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::models::interview::InterviewRecord;
use crate::models::report::{ReportFamily, ReportRecord, ReportStatus};
use crate::reports::analyzer::ReportAnalyzer;
use crate::reports::pipeline::{run_job, Job, JobOutcome, DEFAULT_JOB_TITLE};
use crate::reports::state_machine::{decide_claim, ClaimPolicy, SubmitError, SubmitMode};
use crate::reports::store::ReportStores;
use crate::transcript::TranscriptSource;

/// An accepted submission.
#[derive(Debug)]
pub struct Accepted {
    pub report_id: Uuid,
    pub interview_id: Uuid,
    pub family: ReportFamily,
    pub status: ReportStatus,
    /// The background job. Dropping the handle detaches it.
    pub job: JoinHandle<JobOutcome>,
}

#[derive(Clone)]
pub struct ReportDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    stores: ReportStores,
    source: Arc<dyn TranscriptSource>,
    analyzer: ReportAnalyzer,
    stale_after: chrono::Duration,
    /// report id -> job id of the job running for it in this process
    in_flight: Mutex<HashMap<Uuid, Uuid>>,
}

impl DispatcherInner {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<Uuid, Uuid>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, report_id: Uuid, job_id: Uuid) {
        let mut in_flight = self.in_flight();
        if in_flight.get(&report_id) == Some(&job_id) {
            in_flight.remove(&report_id);
        }
    }
}

impl ReportDispatcher {
    pub fn new(
        stores: ReportStores,
        source: Arc<dyn TranscriptSource>,
        analyzer: ReportAnalyzer,
        stale_after: Duration,
    ) -> Self {
        let stale_after = chrono::Duration::from_std(stale_after)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        Self {
            inner: Arc::new(DispatcherInner {
                stores,
                source,
                analyzer,
                stale_after,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn stores(&self) -> &ReportStores {
        &self.inner.stores
    }

    /// Generate a report for an interview. Rejected while a report is
    /// processing or waiting, or once it is complete.
    pub async fn submit(
        &self,
        family: ReportFamily,
        interview_id: Uuid,
    ) -> Result<Accepted, SubmitError> {
        self.accept(family, interview_id, SubmitMode::Fresh).await
    }

    /// Re-run a report that is waiting on the provider or stuck in processing.
    pub async fn resubmit(
        &self,
        family: ReportFamily,
        interview_id: Uuid,
    ) -> Result<Accepted, SubmitError> {
        self.accept(family, interview_id, SubmitMode::Resubmit).await
    }

    async fn accept(
        &self,
        family: ReportFamily,
        interview_id: Uuid,
        mode: SubmitMode,
    ) -> Result<Accepted, SubmitError> {
        let store = self.inner.stores.get(family).clone();
        let running = self.inner.in_flight().keys().copied().collect();
        let stale_after = self.inner.stale_after;

        let decide = move |interview: &InterviewRecord, existing: Option<&ReportRecord>| {
            decide_claim(
                interview,
                existing,
                &ClaimPolicy {
                    mode,
                    now: Utc::now(),
                    stale_after,
                    in_flight: &running,
                },
            )
        };
        let (interview, report) = store.claim_report(interview_id, &decide).await?;

        let job = Job {
            family,
            report_id: report.id,
            job_id: report.job_id,
            interview_id,
            conversation_id: interview.conversation().unwrap_or_default().to_string(),
            job_title: interview
                .job_title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_JOB_TITLE.to_string()),
        };

        self.inner.in_flight().insert(job.report_id, job.job_id);

        info!(
            family = %family,
            report_id = %job.report_id,
            interview_id = %interview_id,
            ?mode,
            "Report job accepted"
        );

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let outcome = run_job(
                inner.stores.get(job.family).as_ref(),
                inner.source.as_ref(),
                &inner.analyzer,
                &job,
            )
            .await;
            inner.finish(job.report_id, job.job_id);
            outcome
        });

        Ok(Accepted {
            report_id: report.id,
            interview_id,
            family,
            status: report.status,
            job: handle,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
