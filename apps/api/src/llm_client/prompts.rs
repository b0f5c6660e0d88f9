// Shared prompt constants.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Keeps evaluations tied to what was actually said in the interview.
pub const EVIDENCE_INSTRUCTION: &str = "\
    CRITICAL: Base every strength and weakness on something the candidate actually said. \
    Do NOT credit skills the candidate never demonstrated. \
    If the material does not support a claim, leave it out.";
