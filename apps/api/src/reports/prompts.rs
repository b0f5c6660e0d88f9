// All LLM prompt constants for report analysis.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for every report analysis call.
pub const ANALYSIS_SYSTEM: &str = "You are an expert interview analyst evaluating candidates \
    for hiring managers. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Prompt for a transcript with enough turns to evaluate.
/// Replace: {evidence_instruction}, {job_title}, {transcript}
pub const FULL_TRANSCRIPT_PROMPT_TEMPLATE: &str = r#"{evidence_instruction}

You have been given the transcript of a job interview for a {job_title} position.

Analyze the interview and provide:
1. A score from 0-100 (where 100 is perfect) based on the candidate's performance
2. A short summary of the interview (3-5 sentences)
3. Detailed feedback on the candidate's interview performance
4. 3-5 key strengths demonstrated in the interview
5. 3-5 areas for improvement
6. A recommendation: one of "reject", "consider", "strong consider", "hire"

Return a JSON object with this EXACT schema:
{
  "score": 72,
  "summary": "<summary>",
  "feedback": "<detailed feedback>",
  "strengths": ["strength1", "strength2"],
  "weaknesses": ["improvement1", "improvement2"],
  "recommendation": "consider"
}

INTERVIEW TRANSCRIPT:
{transcript}"#;

/// Prompt for a transcript too short to evaluate.
/// Replace: {job_title}, {turn_count}, {candidate_turns}, {interviewer_turns}, {transcript}
pub const INCOMPLETE_TRANSCRIPT_PROMPT_TEMPLATE: &str = r#"You have been given a transcript of a job interview for a {job_title} position.

IMPORTANT: The transcript is INCOMPLETE. It only contains {turn_count} turns with {candidate_turns} candidate responses and {interviewer_turns} interviewer questions.

Based on this incomplete transcript, provide:
1. A low score (0-30 out of 100) reflecting the incomplete nature of the transcript
2. Feedback explaining that the transcript is incomplete and cannot be properly analyzed
3. No strengths (empty array) since there is not enough information
4. Improvement suggestions, starting with "Complete the interview process"

Return a JSON object with this EXACT schema:
{
  "score": 10,
  "feedback": "The transcript is incomplete and cannot be properly analyzed...",
  "strengths": [],
  "weaknesses": ["Complete the interview process"]
}

INCOMPLETE TRANSCRIPT:
{transcript}"#;

/// Prompt for the provider's call summary when no turns are available.
/// Replace: {evidence_instruction}, {job_title}, {summary}
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"{evidence_instruction}

Analyze this interview transcript summary for a {job_title} position and provide:
1. A brief summary of the interview (3-5 sentences)
2. 3-5 strengths of the candidate
3. 2-3 areas for improvement
4. A specific recommendation: one of "reject", "consider", "strong consider", "hire"
5. An overall score from 0-100

Return a JSON object with this EXACT schema:
{
  "summary": "<summary>",
  "strengths": ["strength1", "strength2"],
  "weaknesses": ["improvement1", "improvement2"],
  "recommendation": "consider",
  "score": 65
}

INTERVIEW TRANSCRIPT SUMMARY:
{summary}"#;
