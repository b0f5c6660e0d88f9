use serde::{Deserialize, Serialize};

/// Who produced a transcript turn, as far as scoring is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Candidate,
    Interviewer,
    Other,
}

impl Speaker {
    /// `user`/`candidate` speak for the candidate; `agent`/`assistant`/`interviewer`
    /// for the voice agent. Anything else is a free-text label.
    pub fn classify(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "user" | "candidate" => Speaker::Candidate,
            "agent" | "assistant" | "interviewer" => Speaker::Interviewer,
            _ => Speaker::Other,
        }
    }
}

/// One utterance of a conversation. Persisted verbatim on the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub role: String,
    pub message: String,
}

impl TranscriptTurn {
    pub fn new(role: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            message: message.into(),
        }
    }

    pub fn speaker(&self) -> Speaker {
        Speaker::classify(&self.role)
    }
}
