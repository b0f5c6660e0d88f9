//! One report-generation job: fetch, normalize, analyze, persist.
//!
//! Stages run strictly in sequence. Every outcome is written back through the
//! store's job-guarded update path; nothing is returned to the HTTP caller,
//! which was answered when the job was accepted.

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::report::{CompletedReport, ReportFamily, ReportStatus};
use crate::reports::analyzer::ReportAnalyzer;
use crate::reports::state_machine::job_sources;
use crate::reports::store::ReportStore;
use crate::transcript::normalizer::{call_duration_secs, normalize, transcript_summary};
use crate::transcript::{TranscriptSource, TranscriptState};

pub const DEFAULT_JOB_TITLE: &str = "Unknown Position";
pub const EMPTY_TRANSCRIPT_MESSAGE: &str = "No transcript data found in conversation response";

/// Everything a job needs, captured when it was accepted.
#[derive(Debug, Clone)]
pub struct Job {
    pub family: ReportFamily,
    pub report_id: Uuid,
    /// Ownership token; writes from a superseded job are ignored.
    pub job_id: Uuid,
    pub interview_id: Uuid,
    pub conversation_id: String,
    pub job_title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Complete,
    Waiting,
    Failed(String),
    /// A newer job owns the report; nothing was written.
    Superseded,
}

/// Result of the fetch/analyze stages, before anything is persisted.
#[derive(Debug)]
enum Step {
    Waiting(String),
    Failed(String),
    Complete(Box<CompletedReport>),
}

pub async fn run_job(
    store: &dyn ReportStore,
    source: &dyn TranscriptSource,
    analyzer: &ReportAnalyzer,
    job: &Job,
) -> JobOutcome {
    info!(
        family = %job.family,
        report_id = %job.report_id,
        interview_id = %job.interview_id,
        conversation_id = %job.conversation_id,
        "Report job started"
    );

    let step = evaluate(source, analyzer, job).await;

    match persist(store, job, step).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(report_id = %job.report_id, "Failed to persist report outcome: {e}");
            let reason = format!("Failed to save report: {e}");
            // Best effort: the store itself may be what is failing
            if let Err(e) = store
                .save_status(
                    job.report_id,
                    job.job_id,
                    &job_sources(ReportStatus::Failed),
                    ReportStatus::Failed,
                    Some(&reason),
                )
                .await
            {
                error!(report_id = %job.report_id, "Could not mark report failed: {e}");
            }
            JobOutcome::Failed(reason)
        }
    }
}

async fn evaluate(source: &dyn TranscriptSource, analyzer: &ReportAnalyzer, job: &Job) -> Step {
    let fetch = source.fetch(&job.conversation_id).await;

    match fetch.state {
        TranscriptState::StillProcessing { provider_status } => Step::Waiting(format!(
            "Conversation is still processing with status: {provider_status}"
        )),
        TranscriptState::Unavailable { last_error } => {
            Step::Failed(format!("Failed to fetch conversation: {last_error}"))
        }
        TranscriptState::Ready => {
            let turns = normalize(&fetch.payload);
            let summary = transcript_summary(&fetch.payload);
            let duration_secs = call_duration_secs(&fetch.payload);

            let analysis = if !turns.is_empty() {
                analyzer.analyze(&turns, &job.job_title).await
            } else if let Some(summary) = &summary {
                analyzer.analyze_summary(summary, &job.job_title).await
            } else {
                return Step::Failed(EMPTY_TRANSCRIPT_MESSAGE.to_string());
            };

            match analysis {
                Ok(content) => Step::Complete(Box::new(CompletedReport {
                    transcript: turns,
                    transcript_summary: summary,
                    content,
                    duration_secs,
                })),
                Err(e) => Step::Failed(format!("Report analysis failed: {e}")),
            }
        }
    }
}

async fn persist(store: &dyn ReportStore, job: &Job, step: Step) -> Result<JobOutcome, AppError> {
    let (saved, outcome) = match step {
        Step::Waiting(reason) => {
            let saved = store
                .save_status(
                    job.report_id,
                    job.job_id,
                    &job_sources(ReportStatus::Waiting),
                    ReportStatus::Waiting,
                    Some(&reason),
                )
                .await?;
            (saved, JobOutcome::Waiting)
        }
        Step::Failed(reason) => {
            let saved = store
                .save_status(
                    job.report_id,
                    job.job_id,
                    &job_sources(ReportStatus::Failed),
                    ReportStatus::Failed,
                    Some(&reason),
                )
                .await?;
            (saved, JobOutcome::Failed(reason))
        }
        Step::Complete(report) => {
            let saved = store
                .save_content(job.report_id, job.job_id, &report)
                .await?;
            (saved, JobOutcome::Complete)
        }
    };

    if !saved {
        warn!(
            report_id = %job.report_id,
            job_id = %job.job_id,
            "Report was claimed by a newer job, discarding result"
        );
        return Ok(JobOutcome::Superseded);
    }

    match &outcome {
        JobOutcome::Failed(reason) => error!(
            family = %job.family,
            report_id = %job.report_id,
            conversation_id = %job.conversation_id,
            "Report generation failed: {reason}"
        ),
        other => info!(
            family = %job.family,
            report_id = %job.report_id,
            conversation_id = %job.conversation_id,
            outcome = ?other,
            "Report job finished"
        ),
    }

    Ok(outcome)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
