//! Persistence seam for reports and the interviews that own them.
//!
//! The pipeline is written once against [`ReportStore`]; regular and guest
//! interviews each get a [`PgReportStore`] pointed at their own tables.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::interview::{InterviewRecord, INTERVIEW_STATUS_DONE, INTERVIEW_STATUS_PASSED};
use crate::models::report::{CompletedReport, ReportContent, ReportFamily, ReportRecord, ReportStatus};
use crate::models::transcript::TranscriptTurn;
use crate::reports::state_machine::{job_sources, Claim, SubmitError};

/// Claim rule evaluated by [`ReportStore::claim_report`] while the interview is locked.
pub type ClaimDecider<'a> =
    dyn Fn(&InterviewRecord, Option<&ReportRecord>) -> Result<Claim, SubmitError> + Send + Sync + 'a;

/// Identifiers of a deleted report and the interview that was reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeletedReport {
    pub report_id: Uuid,
    pub interview_id: Uuid,
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn load_interview(&self, interview_id: Uuid) -> Result<Option<InterviewRecord>, AppError>;

    async fn load_report(&self, report_id: Uuid) -> Result<Option<ReportRecord>, AppError>;

    /// The interview's most recent report, looked up by interview id.
    async fn load_report_for_interview(
        &self,
        interview_id: Uuid,
    ) -> Result<Option<ReportRecord>, AppError>;

    /// Atomically evaluates `decide` against the interview and its current
    /// report, then creates or reuses the report in `processing` with a fresh
    /// `job_id` and links it to the interview.
    async fn claim_report(
        &self,
        interview_id: Uuid,
        decide: &ClaimDecider<'_>,
    ) -> Result<(InterviewRecord, ReportRecord), SubmitError>;

    /// Moves the report to `to` if it is owned by `job_id` and currently in
    /// one of `from`. Mirrors the status onto the interview. Returns false
    /// when the guard did not match (the job was superseded).
    async fn save_status(
        &self,
        report_id: Uuid,
        job_id: Uuid,
        from: &[ReportStatus],
        to: ReportStatus,
        error_message: Option<&str>,
    ) -> Result<bool, AppError>;

    /// Persists a finished analysis and marks report and interview complete.
    /// Same ownership guard as [`ReportStore::save_status`].
    async fn save_content(
        &self,
        report_id: Uuid,
        job_id: Uuid,
        report: &CompletedReport,
    ) -> Result<bool, AppError>;

    /// Deletes the report and resets its interview to the pre-report state.
    async fn delete_report(&self, report_id: Uuid) -> Result<Option<DeletedReport>, AppError>;
}

/// One store per report family.
#[derive(Clone)]
pub struct ReportStores {
    regular: Arc<dyn ReportStore>,
    guest: Arc<dyn ReportStore>,
}

impl ReportStores {
    pub fn new(regular: Arc<dyn ReportStore>, guest: Arc<dyn ReportStore>) -> Self {
        Self { regular, guest }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::new(
            Arc::new(PgReportStore::regular(pool.clone())),
            Arc::new(PgReportStore::guest(pool)),
        )
    }

    pub fn get(&self, family: ReportFamily) -> &Arc<dyn ReportStore> {
        match family {
            ReportFamily::Regular => &self.regular,
            ReportFamily::Guest => &self.guest,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL adapter
// ────────────────────────────────────────────────────────────────────────────

/// Table layout of one report family.
#[derive(Debug)]
struct FamilyTables {
    family: ReportFamily,
    interviews: &'static str,
    reports: &'static str,
    /// Report column referencing the interview.
    owner_column: &'static str,
    /// Guest reports carry the candidate's email copied from the interview.
    copies_email: bool,
}

static REGULAR_TABLES: FamilyTables = FamilyTables {
    family: ReportFamily::Regular,
    interviews: "interviews",
    reports: "reports",
    owner_column: "interview_id",
    copies_email: false,
};

static GUEST_TABLES: FamilyTables = FamilyTables {
    family: ReportFamily::Guest,
    interviews: "guest_interviews",
    reports: "guest_reports",
    owner_column: "guest_interview_id",
    copies_email: true,
};

#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
    tables: &'static FamilyTables,
}

#[derive(Debug, FromRow)]
struct InterviewRow {
    id: Uuid,
    job_title: Option<String>,
    status: String,
    conversation_id: Option<String>,
    report_id: Option<Uuid>,
    report_status: Option<String>,
    candidate_email: Option<String>,
}

impl TryFrom<InterviewRow> for InterviewRecord {
    type Error = AppError;

    fn try_from(row: InterviewRow) -> Result<Self, Self::Error> {
        let report_status = row
            .report_status
            .as_deref()
            .map(str::parse::<ReportStatus>)
            .transpose()?;

        Ok(InterviewRecord {
            id: row.id,
            job_title: row.job_title,
            status: row.status,
            conversation_id: row.conversation_id,
            report_id: row.report_id,
            report_status,
            candidate_email: row.candidate_email,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReportRow {
    id: Uuid,
    interview_id: Uuid,
    job_id: Uuid,
    status: String,
    conversation_id: Option<String>,
    transcript: Option<Json<Vec<TranscriptTurn>>>,
    transcript_summary: Option<String>,
    report_content: Option<Json<ReportContent>>,
    summary: Option<String>,
    strengths: Option<Json<Vec<String>>>,
    weaknesses: Option<Json<Vec<String>>>,
    recommendation: Option<String>,
    score: Option<i32>,
    duration_secs: Option<f64>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReportRow> for ReportRecord {
    type Error = AppError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        Ok(ReportRecord {
            id: row.id,
            interview_id: row.interview_id,
            job_id: row.job_id,
            status: row.status.parse()?,
            conversation_id: row.conversation_id,
            transcript: row.transcript.map(|j| j.0).unwrap_or_default(),
            transcript_summary: row.transcript_summary,
            report_content: row.report_content.map(|j| j.0),
            summary: row.summary,
            strengths: row.strengths.map(|j| j.0).unwrap_or_default(),
            weaknesses: row.weaknesses.map(|j| j.0).unwrap_or_default(),
            recommendation: row.recommendation,
            score: row.score,
            duration_secs: row.duration_secs,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn status_texts(statuses: &[ReportStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

impl PgReportStore {
    pub fn regular(pool: PgPool) -> Self {
        Self {
            pool,
            tables: &REGULAR_TABLES,
        }
    }

    pub fn guest(pool: PgPool) -> Self {
        Self {
            pool,
            tables: &GUEST_TABLES,
        }
    }

    fn interview_select(&self, lock: bool) -> String {
        let email = if self.tables.copies_email {
            "candidate_email"
        } else {
            "NULL::TEXT AS candidate_email"
        };
        format!(
            "SELECT id, job_title, status, conversation_id, report_id, report_status, {email} \
             FROM {} WHERE id = $1{}",
            self.tables.interviews,
            if lock { " FOR UPDATE" } else { "" }
        )
    }

    fn report_columns(&self) -> String {
        format!(
            "id, {} AS interview_id, job_id, status, conversation_id, transcript, \
             transcript_summary, report_content, summary, strengths, weaknesses, \
             recommendation, score, duration_secs, error_message, created_at, updated_at",
            self.tables.owner_column
        )
    }

    fn latest_report_select(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY created_at DESC LIMIT 1",
            self.report_columns(),
            self.tables.reports,
            self.tables.owner_column
        )
    }

    fn insert_report_sql(&self) -> String {
        let (email_column, email_value) = if self.tables.copies_email {
            (", candidate_email", ", $5")
        } else {
            ("", "")
        };
        format!(
            "INSERT INTO {reports} (id, {owner}, job_id, status, conversation_id, transcript, \
             strengths, weaknesses{email_column}) \
             VALUES ($1, $2, $3, 'processing', $4, '[]', '[]', '[]'{email_value}) \
             RETURNING {columns}",
            reports = self.tables.reports,
            owner = self.tables.owner_column,
            columns = self.report_columns(),
        )
    }

    /// Locks the interview owning report `$1`. Every writer takes the
    /// interview lock before touching the report, same order as claims.
    fn lock_owner_sql(&self) -> String {
        format!(
            "SELECT id FROM {} WHERE id = (SELECT {} FROM {} WHERE id = $1) FOR UPDATE",
            self.tables.interviews, self.tables.owner_column, self.tables.reports
        )
    }

    async fn lock_owner(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        report_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(&self.lock_owner_sql())
            .bind(report_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(())
    }

    fn reset_report_sql(&self) -> String {
        format!(
            "UPDATE {} SET job_id = $2, status = 'processing', conversation_id = $3, \
             transcript = '[]', transcript_summary = NULL, report_content = NULL, summary = NULL, \
             strengths = '[]', weaknesses = '[]', recommendation = NULL, score = NULL, \
             duration_secs = NULL, error_message = NULL, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            self.tables.reports,
            self.report_columns()
        )
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn load_interview(&self, interview_id: Uuid) -> Result<Option<InterviewRecord>, AppError> {
        sqlx::query_as::<_, InterviewRow>(&self.interview_select(false))
            .bind(interview_id)
            .fetch_optional(&self.pool)
            .await?
            .map(InterviewRecord::try_from)
            .transpose()
    }

    async fn load_report(&self, report_id: Uuid) -> Result<Option<ReportRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            self.report_columns(),
            self.tables.reports
        );
        sqlx::query_as::<_, ReportRow>(&sql)
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ReportRecord::try_from)
            .transpose()
    }

    async fn load_report_for_interview(
        &self,
        interview_id: Uuid,
    ) -> Result<Option<ReportRecord>, AppError> {
        sqlx::query_as::<_, ReportRow>(&self.latest_report_select())
            .bind(interview_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ReportRecord::try_from)
            .transpose()
    }

    async fn claim_report(
        &self,
        interview_id: Uuid,
        decide: &ClaimDecider<'_>,
    ) -> Result<(InterviewRecord, ReportRecord), SubmitError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent submissions for the same interview
        let mut interview: InterviewRecord =
            sqlx::query_as::<_, InterviewRow>(&self.interview_select(true))
                .bind(interview_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(SubmitError::InterviewNotFound(interview_id))?
                .try_into()?;

        let existing: Option<ReportRecord> =
            sqlx::query_as::<_, ReportRow>(&self.latest_report_select())
                .bind(interview_id)
                .fetch_optional(&mut *tx)
                .await?
                .map(ReportRecord::try_from)
                .transpose()?;

        let claim = decide(&interview, existing.as_ref())?;
        let job_id = Uuid::new_v4();
        let conversation_id = interview.conversation().map(str::to_string);

        let row = match claim {
            Claim::Create => {
                let sql = self.insert_report_sql();
                let mut insert = sqlx::query_as::<_, ReportRow>(&sql)
                    .bind(Uuid::new_v4())
                    .bind(interview_id)
                    .bind(job_id)
                    .bind(&conversation_id);
                if self.tables.copies_email {
                    insert = insert.bind(interview.candidate_email.clone().unwrap_or_default());
                }
                insert.fetch_one(&mut *tx).await
            }
            Claim::Reuse { report_id } => {
                sqlx::query_as::<_, ReportRow>(&self.reset_report_sql())
                    .bind(report_id)
                    .bind(job_id)
                    .bind(&conversation_id)
                    .fetch_one(&mut *tx)
                    .await
            }
        }
        .map_err(|e| {
            if is_unique_violation(&e) {
                SubmitError::Raced(interview_id)
            } else {
                SubmitError::from(e)
            }
        })?;
        let report = ReportRecord::try_from(row)?;

        sqlx::query(&format!(
            "UPDATE {} SET report_id = $2, report_status = $3 WHERE id = $1",
            self.tables.interviews
        ))
        .bind(interview_id)
        .bind(report.id)
        .bind(ReportStatus::Processing.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        interview.report_id = Some(report.id);
        interview.report_status = Some(ReportStatus::Processing);

        info!(
            family = %self.tables.family,
            report_id = %report.id,
            interview_id = %interview_id,
            job_id = %job_id,
            ?claim,
            "Report claimed for generation"
        );

        Ok((interview, report))
    }

    async fn save_status(
        &self,
        report_id: Uuid,
        job_id: Uuid,
        from: &[ReportStatus],
        to: ReportStatus,
        error_message: Option<&str>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        self.lock_owner(&mut tx, report_id).await?;

        let owner: Option<Uuid> = sqlx::query_scalar(&format!(
            "UPDATE {} SET status = $3, error_message = $4, updated_at = now() \
             WHERE id = $1 AND job_id = $2 AND status = ANY($5) RETURNING {}",
            self.tables.reports, self.tables.owner_column
        ))
        .bind(report_id)
        .bind(job_id)
        .bind(to.as_str())
        .bind(error_message)
        .bind(status_texts(from))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(interview_id) = owner else {
            return Ok(false);
        };

        sqlx::query(&format!(
            "UPDATE {} SET report_status = $2 WHERE id = $1 AND report_id = $3",
            self.tables.interviews
        ))
        .bind(interview_id)
        .bind(to.as_str())
        .bind(report_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn save_content(
        &self,
        report_id: Uuid,
        job_id: Uuid,
        report: &CompletedReport,
    ) -> Result<bool, AppError> {
        let content = &report.content;
        let mut tx = self.pool.begin().await?;
        self.lock_owner(&mut tx, report_id).await?;

        let owner: Option<Uuid> = sqlx::query_scalar(&format!(
            "UPDATE {} SET status = $3, transcript = $4, transcript_summary = $5, \
             report_content = $6, summary = $7, strengths = $8, weaknesses = $9, \
             recommendation = $10, score = $11, duration_secs = $12, error_message = NULL, \
             updated_at = now() \
             WHERE id = $1 AND job_id = $2 AND status = ANY($13) RETURNING {}",
            self.tables.reports, self.tables.owner_column
        ))
        .bind(report_id)
        .bind(job_id)
        .bind(ReportStatus::Complete.as_str())
        .bind(Json(&report.transcript))
        .bind(&report.transcript_summary)
        .bind(Json(content))
        .bind(&content.summary)
        .bind(Json(&content.strengths))
        .bind(Json(&content.weaknesses))
        .bind(&content.recommendation)
        .bind(content.score)
        .bind(report.duration_secs)
        .bind(status_texts(&job_sources(ReportStatus::Complete)))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(interview_id) = owner else {
            return Ok(false);
        };

        sqlx::query(&format!(
            "UPDATE {} SET report_status = $2, status = $3 WHERE id = $1 AND report_id = $4",
            self.tables.interviews
        ))
        .bind(interview_id)
        .bind(ReportStatus::Complete.as_str())
        .bind(INTERVIEW_STATUS_DONE)
        .bind(report_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_report(&self, report_id: Uuid) -> Result<Option<DeletedReport>, AppError> {
        let mut tx = self.pool.begin().await?;
        self.lock_owner(&mut tx, report_id).await?;

        let owner: Option<Uuid> = sqlx::query_scalar(&format!(
            "DELETE FROM {} WHERE id = $1 RETURNING {}",
            self.tables.reports, self.tables.owner_column
        ))
        .bind(report_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(interview_id) = owner else {
            return Ok(None);
        };

        sqlx::query(&format!(
            "UPDATE {} SET report_id = NULL, report_status = NULL, status = $2 WHERE id = $1",
            self.tables.interviews
        ))
        .bind(interview_id)
        .bind(INTERVIEW_STATUS_PASSED)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            family = %self.tables.family,
            report_id = %report_id,
            interview_id = %interview_id,
            "Report deleted, interview reset"
        );

        Ok(Some(DeletedReport {
            report_id,
            interview_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_pool() -> PgPool {
        sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/karzo_test")
            .unwrap()
    }

    #[tokio::test]
    async fn test_guest_sql_uses_guest_tables() {
        let store = PgReportStore::guest(lazy_pool());
        let insert = store.insert_report_sql();
        assert!(insert.starts_with("INSERT INTO guest_reports (id, guest_interview_id"));
        assert!(insert.contains("candidate_email"));
        assert!(insert.contains("$5"));
        assert!(store.interview_select(true).ends_with("FROM guest_interviews WHERE id = $1 FOR UPDATE"));
    }

    #[tokio::test]
    async fn test_regular_sql_has_no_email() {
        let store = PgReportStore::regular(lazy_pool());
        let insert = store.insert_report_sql();
        assert!(insert.starts_with("INSERT INTO reports (id, interview_id"));
        assert!(!insert.contains("candidate_email"));
        assert!(!insert.contains("$5"));
        assert!(store.interview_select(false).contains("NULL::TEXT AS candidate_email"));
        assert!(store
            .latest_report_select()
            .contains("WHERE interview_id = $1 ORDER BY created_at DESC"));
    }

    #[tokio::test]
    async fn test_writers_lock_interview_row() {
        let regular = PgReportStore::regular(lazy_pool()).lock_owner_sql();
        assert_eq!(
            regular,
            "SELECT id FROM interviews WHERE id = \
             (SELECT interview_id FROM reports WHERE id = $1) FOR UPDATE"
        );

        let guest = PgReportStore::guest(lazy_pool()).lock_owner_sql();
        assert!(guest.starts_with("SELECT id FROM guest_interviews"));
        assert!(guest.contains("(SELECT guest_interview_id FROM guest_reports WHERE id = $1)"));
    }
}
