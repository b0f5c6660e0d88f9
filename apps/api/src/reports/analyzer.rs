//! Report Analyzer: turns a transcript (or the provider's summary of it) into a
//! scored evaluation using the language model.
//!
//! Scores leave this module on the 0–100 scale and are never rescaled later.
//! A transcript with too few turns still yields a report, with the score capped
//! and strengths withheld. A model reply that cannot be read yields a labelled
//! fallback report instead of an error.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::prompts::EVIDENCE_INSTRUCTION;
use crate::llm_client::{strip_json_fences, LanguageModel, LlmError};
use crate::models::report::{AnalysisBasis, AnalysisQuality, ReportContent};
use crate::models::transcript::{Speaker, TranscriptTurn};
use crate::reports::prompts::{
    ANALYSIS_SYSTEM, FULL_TRANSCRIPT_PROMPT_TEMPLATE, INCOMPLETE_TRANSCRIPT_PROMPT_TEMPLATE,
    SUMMARY_PROMPT_TEMPLATE,
};

pub const MIN_CANDIDATE_TURNS: usize = 2;
pub const MIN_INTERVIEWER_TURNS: usize = 2;
pub const MAX_SCORE: i32 = 100;
/// Highest score an incomplete transcript can receive.
pub const INCOMPLETE_SCORE_CEILING: i32 = 30;
/// Score of the placeholder report written when the model reply is unreadable.
pub const FALLBACK_SCORE: i32 = 50;

pub const COMPLETE_INTERVIEW_ADVICE: &str = "Complete the interview process";
const INCOMPLETE_NOTE: &str = "The transcript is incomplete and cannot be properly analyzed.";
const INCOMPLETE_RECOMMENDATION: &str = "Insufficient information to make a recommendation";
const FALLBACK_TEXT: &str =
    "Automatic analysis failed: the evaluation could not be read. Review the transcript manually.";
const FALLBACK_RECOMMENDATION: &str = "Manual review required";

const SCORE_FIELDS: &[&str] = &["score", "overall_score"];
const SUMMARY_FIELDS: &[&str] = &["summary"];
const FEEDBACK_FIELDS: &[&str] = &["feedback", "detailed_feedback"];
const RECOMMENDATION_FIELDS: &[&str] = &["recommendation"];
const STRENGTH_FIELDS: &[&str] = &["strengths"];
const WEAKNESS_FIELDS: &[&str] = &["weaknesses", "improvements", "areas_for_improvement"];

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("language model call failed: {0}")]
    Model(#[from] LlmError),
}

/// Speaker tallies behind the completeness rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnCounts {
    pub total: usize,
    pub candidate: usize,
    pub interviewer: usize,
}

impl TurnCounts {
    pub fn of(turns: &[TranscriptTurn]) -> Self {
        let mut counts = TurnCounts {
            total: turns.len(),
            candidate: 0,
            interviewer: 0,
        };
        for turn in turns {
            match turn.speaker() {
                Speaker::Candidate => counts.candidate += 1,
                Speaker::Interviewer => counts.interviewer += 1,
                Speaker::Other => {}
            }
        }
        counts
    }

    pub fn is_complete(&self) -> bool {
        self.candidate >= MIN_CANDIDATE_TURNS && self.interviewer >= MIN_INTERVIEWER_TURNS
    }
}

#[derive(Clone)]
pub struct ReportAnalyzer {
    model: Arc<dyn LanguageModel>,
}

impl ReportAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Evaluates a normalized transcript for `job_title`.
    ///
    /// Only a failed model call on a complete transcript is an error; an
    /// incomplete transcript always produces a constrained report.
    pub async fn analyze(
        &self,
        turns: &[TranscriptTurn],
        job_title: &str,
    ) -> Result<ReportContent, AnalysisError> {
        let counts = TurnCounts::of(turns);
        let transcript = render_transcript(turns);

        info!(
            turns = counts.total,
            candidate_turns = counts.candidate,
            interviewer_turns = counts.interviewer,
            complete = counts.is_complete(),
            "Analyzing transcript"
        );

        if !counts.is_complete() {
            return Ok(self.analyze_incomplete(&counts, &transcript, job_title).await);
        }

        let prompt = FULL_TRANSCRIPT_PROMPT_TEMPLATE
            .replace("{evidence_instruction}", EVIDENCE_INSTRUCTION)
            .replace("{job_title}", job_title)
            .replace("{transcript}", &transcript);

        let reply = self.model.complete(&prompt, ANALYSIS_SYSTEM).await?;
        Ok(read_reply(&reply, AnalysisBasis::Transcript))
    }

    /// Evaluates the provider's call summary when no turns are available.
    pub async fn analyze_summary(
        &self,
        summary: &str,
        job_title: &str,
    ) -> Result<ReportContent, AnalysisError> {
        info!(summary_len = summary.len(), "Analyzing transcript summary");

        let prompt = SUMMARY_PROMPT_TEMPLATE
            .replace("{evidence_instruction}", EVIDENCE_INSTRUCTION)
            .replace("{job_title}", job_title)
            .replace("{summary}", summary);

        let reply = self.model.complete(&prompt, ANALYSIS_SYSTEM).await?;
        Ok(read_reply(&reply, AnalysisBasis::Summary))
    }

    async fn analyze_incomplete(
        &self,
        counts: &TurnCounts,
        transcript: &str,
        job_title: &str,
    ) -> ReportContent {
        let prompt = INCOMPLETE_TRANSCRIPT_PROMPT_TEMPLATE
            .replace("{job_title}", job_title)
            .replace("{turn_count}", &counts.total.to_string())
            .replace("{candidate_turns}", &counts.candidate.to_string())
            .replace("{interviewer_turns}", &counts.interviewer.to_string())
            .replace("{transcript}", transcript);

        match self.model.complete(&prompt, ANALYSIS_SYSTEM).await {
            Ok(reply) => match parse_reply(&reply) {
                Some(parsed) => constrain_incomplete(parsed),
                None => {
                    warn!("Unreadable model reply for incomplete transcript, using default");
                    incomplete_content()
                }
            },
            Err(e) => {
                warn!("Model call failed for incomplete transcript, using default: {e}");
                incomplete_content()
            }
        }
    }
}

/// Renders turns as `ROLE: message` paragraphs for the prompt.
pub fn render_transcript(turns: &[TranscriptTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.to_uppercase(), t.message))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fields recovered from a model reply before any business rule is applied.
#[derive(Debug, Clone, PartialEq)]
struct ParsedReply {
    score: i32,
    summary: Option<String>,
    feedback: Option<String>,
    recommendation: Option<String>,
    strengths: Vec<String>,
    weaknesses: Vec<String>,
}

fn read_reply(reply: &str, basis: AnalysisBasis) -> ReportContent {
    match parse_reply(reply) {
        Some(parsed) => full_content(parsed, basis),
        None => {
            warn!(?basis, "Model reply could not be parsed, writing fallback report");
            fallback_content(basis)
        }
    }
}

/// Lenient reader: tolerates code fences, prose around the object, alternate
/// key names, numeric strings and out-of-range scores. Needs a score and at
/// least one free-text field.
fn parse_reply(reply: &str) -> Option<ParsedReply> {
    let object = extract_object(reply)?;

    let score = SCORE_FIELDS
        .iter()
        .filter_map(|field| object.get(*field))
        .find_map(score_value)?;

    let summary = first_string(&object, SUMMARY_FIELDS);
    let feedback = first_string(&object, FEEDBACK_FIELDS);
    let recommendation = first_string(&object, RECOMMENDATION_FIELDS);
    if summary.is_none() && feedback.is_none() && recommendation.is_none() {
        return None;
    }

    Some(ParsedReply {
        score,
        summary,
        feedback,
        recommendation,
        strengths: string_list(&object, STRENGTH_FIELDS),
        weaknesses: string_list(&object, WEAKNESS_FIELDS),
    })
}

fn extract_object(reply: &str) -> Option<Value> {
    let text = strip_json_fences(reply);
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn score_value(value: &Value) -> Option<i32> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, MAX_SCORE as f64) as i32)
}

fn first_string(object: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| object.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// A list field may come back as an array of strings or as a single string.
fn string_list(object: &Value, fields: &[&str]) -> Vec<String> {
    for field in fields {
        match object.get(*field) {
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            Some(Value::String(s)) if !s.trim().is_empty() => return vec![s.trim().to_string()],
            _ => {}
        }
    }
    Vec::new()
}

fn full_content(parsed: ParsedReply, basis: AnalysisBasis) -> ReportContent {
    let ParsedReply {
        score,
        summary,
        feedback,
        recommendation,
        strengths,
        weaknesses,
    } = parsed;

    let feedback = feedback
        .or_else(|| summary.clone())
        .or_else(|| recommendation.clone())
        .unwrap_or_default();

    ReportContent {
        score,
        summary: summary.unwrap_or_else(|| feedback.clone()),
        feedback,
        strengths,
        weaknesses,
        recommendation: recommendation.unwrap_or_default(),
        basis,
        quality: AnalysisQuality::Full,
    }
}

fn constrain_incomplete(parsed: ParsedReply) -> ReportContent {
    let mut feedback = parsed
        .feedback
        .or_else(|| parsed.summary.clone())
        .unwrap_or_else(|| INCOMPLETE_NOTE.to_string());
    if !feedback.to_lowercase().contains("incomplete") {
        feedback = format!("{INCOMPLETE_NOTE} {feedback}");
    }

    let mut weaknesses = parsed.weaknesses;
    if weaknesses.is_empty() {
        weaknesses.push(COMPLETE_INTERVIEW_ADVICE.to_string());
    }

    ReportContent {
        score: parsed.score.min(INCOMPLETE_SCORE_CEILING),
        summary: parsed.summary.unwrap_or_else(|| INCOMPLETE_NOTE.to_string()),
        feedback,
        strengths: Vec::new(),
        weaknesses,
        recommendation: parsed
            .recommendation
            .unwrap_or_else(|| INCOMPLETE_RECOMMENDATION.to_string()),
        basis: AnalysisBasis::Transcript,
        quality: AnalysisQuality::Incomplete,
    }
}

fn incomplete_content() -> ReportContent {
    ReportContent {
        score: 0,
        summary: INCOMPLETE_NOTE.to_string(),
        feedback: INCOMPLETE_NOTE.to_string(),
        strengths: Vec::new(),
        weaknesses: vec![COMPLETE_INTERVIEW_ADVICE.to_string()],
        recommendation: INCOMPLETE_RECOMMENDATION.to_string(),
        basis: AnalysisBasis::Transcript,
        quality: AnalysisQuality::Incomplete,
    }
}

fn fallback_content(basis: AnalysisBasis) -> ReportContent {
    ReportContent {
        score: FALLBACK_SCORE,
        summary: FALLBACK_TEXT.to_string(),
        feedback: FALLBACK_TEXT.to_string(),
        strengths: Vec::new(),
        weaknesses: Vec::new(),
        recommendation: FALLBACK_RECOMMENDATION.to_string(),
        basis,
        quality: AnalysisQuality::Fallback,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
