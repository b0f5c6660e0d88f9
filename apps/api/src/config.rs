use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::DEFAULT_ANTHROPIC_API_URL;

pub const DEFAULT_ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub elevenlabs_api_key: String,
    pub elevenlabs_base_url: String,
    pub anthropic_api_key: String,
    pub anthropic_api_url: String,
    /// Per provider attempt.
    pub transcript_timeout: Duration,
    /// Per model call, retries included separately.
    pub llm_timeout: Duration,
    /// A non-terminal report untouched for longer may be resubmitted.
    pub report_stale_after: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            elevenlabs_api_key: require_env("ELEVENLABS_API_KEY")?,
            elevenlabs_base_url: std::env::var("ELEVENLABS_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_ELEVENLABS_BASE_URL.to_string()),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            anthropic_api_url: std::env::var("ANTHROPIC_API_URL")
                .unwrap_or_else(|_| DEFAULT_ANTHROPIC_API_URL.to_string()),
            transcript_timeout: secs_env("TRANSCRIPT_TIMEOUT_SECS", 30)?,
            llm_timeout: secs_env("LLM_TIMEOUT_SECS", 45)?,
            report_stale_after: secs_env("REPORT_STALE_AFTER_SECS", 900)?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn secs_env(key: &str, default: u64) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => parse_secs(key, &raw),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .with_context(|| format!("{key} must be a whole number of seconds, got '{raw}'"))
}
