//! In-memory [`ReportStore`] with the same guards as the Postgres adapter.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::interview::{InterviewRecord, INTERVIEW_STATUS_DONE, INTERVIEW_STATUS_PASSED};
use crate::models::report::{CompletedReport, ReportRecord, ReportStatus};
use crate::reports::state_machine::{job_sources, Claim, SubmitError};
use crate::reports::store::{ClaimDecider, DeletedReport, ReportStore};

#[derive(Default)]
struct Tables {
    interviews: HashMap<Uuid, InterviewRecord>,
    reports: HashMap<Uuid, ReportRecord>,
}

#[derive(Default)]
pub struct MemoryReportStore {
    tables: Mutex<Tables>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an interview that finished its call.
    pub fn add_interview(&self, conversation_id: Option<&str>, job_title: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().interviews.insert(
            id,
            InterviewRecord {
                id,
                job_title: job_title.map(str::to_string),
                status: INTERVIEW_STATUS_PASSED.to_string(),
                conversation_id: conversation_id.map(str::to_string),
                report_id: None,
                report_status: None,
                candidate_email: None,
            },
        );
        id
    }

    pub fn interview(&self, id: Uuid) -> Option<InterviewRecord> {
        self.tables.lock().unwrap().interviews.get(&id).cloned()
    }

    pub fn report(&self, id: Uuid) -> Option<ReportRecord> {
        self.tables.lock().unwrap().reports.get(&id).cloned()
    }

    pub fn report_count(&self) -> usize {
        self.tables.lock().unwrap().reports.len()
    }

    /// Rewrites a report in place, for setting up stuck or aged records.
    pub fn update_report(&self, id: Uuid, edit: impl FnOnce(&mut ReportRecord)) {
        if let Some(report) = self.tables.lock().unwrap().reports.get_mut(&id) {
            edit(report);
        }
    }

    fn latest_for(tables: &Tables, interview_id: Uuid) -> Option<ReportRecord> {
        tables
            .reports
            .values()
            .filter(|r| r.interview_id == interview_id)
            .max_by_key(|r| r.created_at)
            .cloned()
    }

    fn mirror_status(tables: &mut Tables, report_id: Uuid, status: ReportStatus) -> Option<Uuid> {
        let interview_id = tables.reports.get(&report_id)?.interview_id;
        let interview = tables.interviews.get_mut(&interview_id)?;
        if interview.report_id == Some(report_id) {
            interview.report_status = Some(status);
        }
        Some(interview_id)
    }

    fn owned_by(report: &ReportRecord, job_id: Uuid, from: &[ReportStatus]) -> bool {
        report.job_id == job_id && from.contains(&report.status)
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn load_interview(&self, interview_id: Uuid) -> Result<Option<InterviewRecord>, AppError> {
        Ok(self.interview(interview_id))
    }

    async fn load_report(&self, report_id: Uuid) -> Result<Option<ReportRecord>, AppError> {
        Ok(self.report(report_id))
    }

    async fn load_report_for_interview(
        &self,
        interview_id: Uuid,
    ) -> Result<Option<ReportRecord>, AppError> {
        Ok(Self::latest_for(&self.tables.lock().unwrap(), interview_id))
    }

    async fn claim_report(
        &self,
        interview_id: Uuid,
        decide: &ClaimDecider<'_>,
    ) -> Result<(InterviewRecord, ReportRecord), SubmitError> {
        let mut tables = self.tables.lock().unwrap();

        let interview = tables
            .interviews
            .get(&interview_id)
            .cloned()
            .ok_or(SubmitError::InterviewNotFound(interview_id))?;
        let existing = Self::latest_for(&tables, interview_id);

        let claim = decide(&interview, existing.as_ref())?;
        let now = Utc::now();
        let job_id = Uuid::new_v4();
        let conversation_id = interview.conversation().map(str::to_string);

        let report = match claim {
            Claim::Create => {
                let active = tables.reports.values().any(|r| {
                    r.interview_id == interview_id && !r.status.is_terminal()
                });
                if active {
                    return Err(SubmitError::Raced(interview_id));
                }
                ReportRecord {
                    id: Uuid::new_v4(),
                    interview_id,
                    job_id,
                    status: ReportStatus::Processing,
                    conversation_id,
                    transcript: Vec::new(),
                    transcript_summary: None,
                    report_content: None,
                    summary: None,
                    strengths: Vec::new(),
                    weaknesses: Vec::new(),
                    recommendation: None,
                    score: None,
                    duration_secs: None,
                    error_message: None,
                    created_at: now,
                    updated_at: now,
                }
            }
            Claim::Reuse { report_id } => {
                let previous = tables
                    .reports
                    .get(&report_id)
                    .ok_or_else(|| AppError::NotFound(format!("Report {report_id} not found")))?;
                ReportRecord {
                    id: report_id,
                    interview_id,
                    job_id,
                    status: ReportStatus::Processing,
                    conversation_id,
                    transcript: Vec::new(),
                    transcript_summary: None,
                    report_content: None,
                    summary: None,
                    strengths: Vec::new(),
                    weaknesses: Vec::new(),
                    recommendation: None,
                    score: None,
                    duration_secs: None,
                    error_message: None,
                    created_at: previous.created_at,
                    updated_at: now,
                }
            }
        };

        tables.reports.insert(report.id, report.clone());
        let linked = tables
            .interviews
            .get_mut(&interview_id)
            .ok_or(SubmitError::InterviewNotFound(interview_id))?;
        linked.report_id = Some(report.id);
        linked.report_status = Some(ReportStatus::Processing);

        Ok((linked.clone(), report))
    }

    async fn save_status(
        &self,
        report_id: Uuid,
        job_id: Uuid,
        from: &[ReportStatus],
        to: ReportStatus,
        error_message: Option<&str>,
    ) -> Result<bool, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let Some(report) = tables.reports.get_mut(&report_id) else {
            return Ok(false);
        };
        if !Self::owned_by(report, job_id, from) {
            return Ok(false);
        }

        report.status = to;
        report.error_message = error_message.map(str::to_string);
        report.updated_at = Utc::now();
        Self::mirror_status(&mut tables, report_id, to);
        Ok(true)
    }

    async fn save_content(
        &self,
        report_id: Uuid,
        job_id: Uuid,
        completed: &CompletedReport,
    ) -> Result<bool, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let Some(report) = tables.reports.get_mut(&report_id) else {
            return Ok(false);
        };
        if !Self::owned_by(report, job_id, &job_sources(ReportStatus::Complete)) {
            return Ok(false);
        }

        let content = &completed.content;
        report.status = ReportStatus::Complete;
        report.transcript = completed.transcript.clone();
        report.transcript_summary = completed.transcript_summary.clone();
        report.report_content = Some(content.clone());
        report.summary = Some(content.summary.clone());
        report.strengths = content.strengths.clone();
        report.weaknesses = content.weaknesses.clone();
        report.recommendation = Some(content.recommendation.clone());
        report.score = Some(content.score);
        report.duration_secs = completed.duration_secs;
        report.error_message = None;
        report.updated_at = Utc::now();

        if let Some(interview_id) = Self::mirror_status(&mut tables, report_id, ReportStatus::Complete) {
            if let Some(interview) = tables.interviews.get_mut(&interview_id) {
                if interview.report_id == Some(report_id) {
                    interview.status = INTERVIEW_STATUS_DONE.to_string();
                }
            }
        }
        Ok(true)
    }

    async fn delete_report(&self, report_id: Uuid) -> Result<Option<DeletedReport>, AppError> {
        let mut tables = self.tables.lock().unwrap();
        let Some(report) = tables.reports.remove(&report_id) else {
            return Ok(None);
        };

        if let Some(interview) = tables.interviews.get_mut(&report.interview_id) {
            interview.report_id = None;
            interview.report_status = None;
            interview.status = INTERVIEW_STATUS_PASSED.to_string();
        }

        Ok(Some(DeletedReport {
            report_id,
            interview_id: report.interview_id,
        }))
    }
}
