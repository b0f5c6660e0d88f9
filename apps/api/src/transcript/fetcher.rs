//! Transcript Fetcher: retrieves a conversation from the ElevenLabs API.
//!
//! The provider has exposed conversations under more than one path and id
//! format over time, so a fetch walks an ordered list of endpoint candidates
//! and stops at the first response that carries usable data or a definite
//! "still processing" answer.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::normalizer;
use super::search::{first_match, Attempt};

pub const CONVERSATION_PREFIX: &str = "conv_";
/// Provider status of a conversation whose transcript is final.
pub const DONE_STATUS: &str = "done";
const ERROR_BODY_LIMIT: usize = 200;

/// Where a fetch ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptState {
    Ready,
    /// The provider knows the conversation but has not finished it yet.
    StillProcessing { provider_status: String },
    /// Every endpoint candidate failed.
    Unavailable { last_error: String },
}

#[derive(Debug, Clone)]
pub struct TranscriptFetch {
    /// Raw provider payload; `Null` when nothing usable came back.
    pub payload: Value,
    pub state: TranscriptState,
}

impl TranscriptFetch {
    pub fn ready(payload: Value) -> Self {
        Self {
            payload,
            state: TranscriptState::Ready,
        }
    }

    pub fn still_processing(payload: Value, provider_status: impl Into<String>) -> Self {
        Self {
            payload,
            state: TranscriptState::StillProcessing {
                provider_status: provider_status.into(),
            },
        }
    }

    pub fn unavailable(last_error: impl Into<String>) -> Self {
        Self {
            payload: Value::Null,
            state: TranscriptState::Unavailable {
                last_error: last_error.into(),
            },
        }
    }
}

/// Anything that can produce a conversation payload for a conversation id.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Never fails outright: exhaustion is reported as [`TranscriptState::Unavailable`].
    async fn fetch(&self, conversation_id: &str) -> TranscriptFetch;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlShape {
    /// `/v1/convai/conversations/{id}`
    Convai,
    /// `/v1/conversations/{id}`
    Bare,
}

impl UrlShape {
    const ALL: [UrlShape; 2] = [UrlShape::Convai, UrlShape::Bare];

    fn path(self, conversation_id: &str) -> String {
        match self {
            UrlShape::Convai => format!("/v1/convai/conversations/{conversation_id}"),
            UrlShape::Bare => format!("/v1/conversations/{conversation_id}"),
        }
    }
}

/// Spelling of the API-key header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderShape {
    Canonical,
    Lowercase,
}

impl HeaderShape {
    const ALL: [HeaderShape; 2] = [HeaderShape::Canonical, HeaderShape::Lowercase];

    pub fn name(self) -> &'static str {
        match self {
            HeaderShape::Canonical => "Xi-Api-Key",
            HeaderShape::Lowercase => "xi-api-key",
        }
    }
}

/// One concrete request to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub conversation_id: String,
    pub url: UrlShape,
    pub header: HeaderShape,
}

impl Endpoint {
    pub fn path(&self) -> String {
        self.url.path(&self.conversation_id)
    }
}

/// Id spellings to try: the `conv_`-prefixed form first, then the id as given.
pub fn conversation_id_variants(conversation_id: &str) -> Vec<String> {
    let raw = conversation_id.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let prefixed = if raw.starts_with(CONVERSATION_PREFIX) {
        raw.to_string()
    } else {
        format!("{CONVERSATION_PREFIX}{raw}")
    };

    let mut variants = vec![prefixed];
    if !variants.iter().any(|v| v == raw) {
        variants.push(raw.to_string());
    }
    variants
}

/// Full candidate list in probe order: id variant, then URL shape, then header spelling.
pub fn endpoint_candidates(conversation_id: &str) -> Vec<Endpoint> {
    conversation_id_variants(conversation_id)
        .into_iter()
        .flat_map(|id| {
            UrlShape::ALL.into_iter().flat_map(move |url| {
                let id = id.clone();
                HeaderShape::ALL.into_iter().map(move |header| Endpoint {
                    conversation_id: id.clone(),
                    url,
                    header,
                })
            })
        })
        .collect()
}

/// Decides whether a 200 response ends the search.
pub fn classify(payload: Value) -> Attempt<TranscriptFetch> {
    if !payload.is_object() {
        return Attempt::Miss("response is not a JSON object".to_string());
    }

    if let Some(status) = payload.get("status").and_then(Value::as_str) {
        if status != DONE_STATUS {
            let status = status.to_string();
            return Attempt::Hit(TranscriptFetch::still_processing(payload, status));
        }
    }

    if normalizer::has_transcript_field(&payload)
        || normalizer::transcript_summary(&payload).is_some()
    {
        Attempt::Hit(TranscriptFetch::ready(payload))
    } else {
        Attempt::Miss("response missing transcript fields".to_string())
    }
}

/// ElevenLabs conversational-AI client.
#[derive(Clone)]
pub struct ElevenLabsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ElevenLabsClient {
    /// `timeout` bounds each individual request, not the whole search.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build ElevenLabs HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn probe(&self, endpoint: &Endpoint) -> Attempt<TranscriptFetch> {
        let attempt = self.request(endpoint).await;
        match &attempt {
            Attempt::Hit(fetch) => info!(
                path = %endpoint.path(),
                url_shape = ?endpoint.url,
                state = ?fetch.state,
                "Conversation endpoint answered"
            ),
            Attempt::Miss(reason) => warn!(
                path = %endpoint.path(),
                url_shape = ?endpoint.url,
                header_shape = ?endpoint.header,
                "Conversation endpoint attempt failed: {reason}"
            ),
        }
        attempt
    }

    async fn request(&self, endpoint: &Endpoint) -> Attempt<TranscriptFetch> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        debug!(url = %url, header = endpoint.header.name(), "Requesting conversation");

        let response = match self
            .client
            .get(&url)
            .header(endpoint.header.name(), &self.api_key)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Attempt::Miss(format!("request to {url} failed: {e}")),
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Attempt::Miss(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate(&body, ERROR_BODY_LIMIT)
            ));
        }

        let payload = match response.json::<Value>().await {
            Ok(v) => v,
            Err(e) => return Attempt::Miss(format!("invalid JSON from {url}: {e}")),
        };

        classify(payload)
    }
}

#[async_trait]
impl TranscriptSource for ElevenLabsClient {
    async fn fetch(&self, conversation_id: &str) -> TranscriptFetch {
        let candidates = endpoint_candidates(conversation_id);

        match first_match(&candidates, |endpoint| self.probe(endpoint)).await {
            Ok(fetch) => fetch,
            Err(exhausted) => {
                warn!(
                    conversation_id,
                    "All ElevenLabs endpoint candidates failed: {}",
                    exhausted.describe()
                );
                let last_error = exhausted
                    .last_error
                    .unwrap_or_else(|| "no endpoints to try".to_string());
                TranscriptFetch::unavailable(format!(
                    "All requests to ElevenLabs API failed. Last error: {last_error}"
                ))
            }
        }
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
