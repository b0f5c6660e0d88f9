use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::transcript::TranscriptTurn;

/// Lifecycle of a report record. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Processing,
    Waiting,
    Complete,
    Failed,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 4] = [
        ReportStatus::Processing,
        ReportStatus::Waiting,
        ReportStatus::Complete,
        ReportStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Processing => "processing",
            ReportStatus::Waiting => "waiting",
            ReportStatus::Complete => "complete",
            ReportStatus::Failed => "failed",
        }
    }

    /// No further automatic transition happens from a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, ReportStatus::Complete | ReportStatus::Failed)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(ReportStatus::Processing),
            "waiting" => Ok(ReportStatus::Waiting),
            "complete" => Ok(ReportStatus::Complete),
            "failed" => Ok(ReportStatus::Failed),
            other => Err(anyhow::anyhow!("unknown report status '{other}'")),
        }
    }
}

/// Regular interviews belong to registered candidates; guest interviews to
/// candidates who came through an invitation link. Same lifecycle, separate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFamily {
    Regular,
    Guest,
}

impl fmt::Display for ReportFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFamily::Regular => f.write_str("regular"),
            ReportFamily::Guest => f.write_str("guest"),
        }
    }
}

/// What the analysis was based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisBasis {
    Transcript,
    Summary,
}

/// How much the score can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisQuality {
    /// Model evaluation of a complete transcript or a provider summary.
    Full,
    /// Too few turns to evaluate; score capped and strengths withheld.
    Incomplete,
    /// The model answered with something unreadable; placeholder content.
    Fallback,
}

/// Structured evaluation produced by the report analyzer.
///
/// `score` is always on the 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportContent {
    pub score: i32,
    pub summary: String,
    pub feedback: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendation: String,
    pub basis: AnalysisBasis,
    pub quality: AnalysisQuality,
}

/// Everything a successful job writes onto its report in one go.
#[derive(Debug, Clone)]
pub struct CompletedReport {
    pub transcript: Vec<TranscriptTurn>,
    pub transcript_summary: Option<String>,
    pub content: ReportContent,
    pub duration_secs: Option<f64>,
}

/// A report (regular or guest) as the pipeline sees it.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord {
    pub id: Uuid,
    pub interview_id: Uuid,
    /// Token of the job that currently owns this record.
    #[serde(skip_serializing)]
    pub job_id: Uuid,
    pub status: ReportStatus,
    pub conversation_id: Option<String>,
    pub transcript: Vec<TranscriptTurn>,
    pub transcript_summary: Option<String>,
    pub report_content: Option<ReportContent>,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendation: Option<String>,
    pub score: Option<i32>,
    pub duration_secs: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
