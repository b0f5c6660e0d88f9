use serde::Serialize;
use uuid::Uuid;

use crate::models::report::ReportStatus;

/// Interview lifecycle values the report pipeline writes. Other values
/// (`pending`, `processing`, ...) belong to the interview CRUD and pass through.
pub const INTERVIEW_STATUS_DONE: &str = "done";
/// Pre-report value an interview returns to when its report is deleted.
pub const INTERVIEW_STATUS_PASSED: &str = "passed";

/// The slice of an interview (regular or guest) that report generation reads.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewRecord {
    pub id: Uuid,
    pub job_title: Option<String>,
    pub status: String,
    pub conversation_id: Option<String>,
    pub report_id: Option<Uuid>,
    pub report_status: Option<ReportStatus>,
    /// Guest interviews only.
    pub candidate_email: Option<String>,
}

impl InterviewRecord {
    /// The conversation id, if one has been recorded and is not blank.
    pub fn conversation(&self) -> Option<&str> {
        self.conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}
