//! Report State Machine: legal status changes and the rules for claiming a
//! report when a generation job is submitted.
//!
//! ```text
//! (none)     ──claim──────────► processing
//! processing ──provider busy──► waiting
//! processing ──analyzed───────► complete
//! processing ──fetch failed───► failed
//! waiting    ──resubmit───────► processing
//! waiting    ──later job──────► complete | failed
//! failed     ──submit─────────► processing   (same record reused)
//! ```
//!
//! `complete` is left only by deleting the report, which also resets the
//! owning interview.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::interview::InterviewRecord;
use crate::models::report::{ReportRecord, ReportStatus};

/// Whether `from -> to` is a legal status change.
pub fn can_transition(from: ReportStatus, to: ReportStatus) -> bool {
    use ReportStatus::*;
    matches!(
        (from, to),
        (Processing, Waiting)
            | (Processing, Complete)
            | (Processing, Failed)
            | (Processing, Processing)
            | (Waiting, Complete)
            | (Waiting, Failed)
            | (Waiting, Processing)
            | (Failed, Processing)
    )
}

/// Statuses a running job may move a report out of when it writes `to`.
pub fn job_sources(to: ReportStatus) -> Vec<ReportStatus> {
    ReportStatus::ALL
        .into_iter()
        .filter(|from| !from.is_terminal() && *from != to && can_transition(*from, to))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// Normal "generate report" request.
    Fresh,
    /// Explicit recovery of a waiting or stuck report.
    Resubmit,
}

/// What a successful submission does to the report table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Create,
    Reuse { report_id: Uuid },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Interview {0} not found")]
    InterviewNotFound(Uuid),

    #[error("Interview {0} has no conversation id yet")]
    NoConversation(Uuid),

    #[error("Report {report_id} is already {status}")]
    InProgress {
        report_id: Uuid,
        status: ReportStatus,
    },

    #[error("Report {0} is already complete; delete it to regenerate")]
    AlreadyComplete(Uuid),

    #[error("Another report job was accepted for interview {0}")]
    Raced(Uuid),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<sqlx::Error> for SubmitError {
    fn from(e: sqlx::Error) -> Self {
        SubmitError::Store(AppError::Database(e))
    }
}

impl From<SubmitError> for AppError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::InterviewNotFound(_) => AppError::NotFound(e.to_string()),
            SubmitError::NoConversation(_) => AppError::Validation(e.to_string()),
            SubmitError::InProgress { .. }
            | SubmitError::AlreadyComplete(_)
            | SubmitError::Raced(_) => AppError::Conflict(e.to_string()),
            SubmitError::Store(inner) => inner,
        }
    }
}

/// Inputs to the claim decision that do not come from storage.
#[derive(Debug, Clone, Copy)]
pub struct ClaimPolicy<'a> {
    pub mode: SubmitMode,
    pub now: DateTime<Utc>,
    /// A non-terminal report untouched for this long counts as stuck.
    pub stale_after: Duration,
    /// Reports whose job is running in this process.
    pub in_flight: &'a HashSet<Uuid>,
}

/// Decides whether a submission for `interview` may proceed, given its
/// current report. Runs while the interview row is locked.
pub fn decide_claim(
    interview: &InterviewRecord,
    existing: Option<&ReportRecord>,
    policy: &ClaimPolicy<'_>,
) -> Result<Claim, SubmitError> {
    if interview.conversation().is_none() {
        return Err(SubmitError::NoConversation(interview.id));
    }

    let Some(report) = existing else {
        return Ok(Claim::Create);
    };

    let reuse = Claim::Reuse {
        report_id: report.id,
    };
    let in_progress = SubmitError::InProgress {
        report_id: report.id,
        status: report.status,
    };

    match (report.status, policy.mode) {
        (ReportStatus::Complete, _) => Err(SubmitError::AlreadyComplete(report.id)),
        (ReportStatus::Failed, _) => Ok(reuse),
        (ReportStatus::Processing | ReportStatus::Waiting, SubmitMode::Fresh) => Err(in_progress),
        (_, SubmitMode::Resubmit) if policy.in_flight.contains(&report.id) => Err(in_progress),
        (ReportStatus::Waiting, SubmitMode::Resubmit) => Ok(reuse),
        (ReportStatus::Processing, SubmitMode::Resubmit) => {
            if policy.now - report.updated_at >= policy.stale_after {
                Ok(reuse)
            } else {
                Err(in_progress)
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
