//! Error taxonomy
//!
//! Two families: `ConfigError` is fatal and surfaces before any network call;
//! `CallFailure` is scoped to a single provider call and never aborts the run.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ai::providers::ProviderId;
use crate::ai::retry::is_retryable_status;

/// Configuration resolution error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Requested provider id does not exist in the catalog
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Requested provider has no API key stored
    #[error("no API key configured for {0}; run `chorus config {key} <api_key>`", key = .0.storage_key())]
    MissingApiKey(ProviderId),

    /// Requested provider is disabled in the config file
    #[error("provider {0} is disabled in the config file")]
    ProviderDisabled(ProviderId),

    /// Nothing usable after filtering
    #[error("no providers configured; run `chorus init` and add an API key")]
    NoProvidersConfigured,

    /// Config file missing
    #[error("config file not found at {0}; run `chorus init`")]
    NotInitialized(PathBuf),

    /// Config file exists but cannot be parsed
    #[error("malformed config file: {0}")]
    Malformed(#[from] serde_json::Error),

    /// IO error while reading or writing the config file
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Category of a per-provider call failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The call did not complete within its timeout
    Timeout,
    /// The provider rejected the call with HTTP 429
    RateLimited,
    /// Connection-level or HTTP-level failure
    Transport,
    /// The provider returned a 2xx payload we could not extract text from
    Parse,
}

impl FailureKind {
    /// Short human-readable label, used in rendered failure rows
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::RateLimited => "rate limited",
            FailureKind::Transport => "transport error",
            FailureKind::Parse => "unparseable response",
        }
    }
}

/// A single failed provider call
///
/// Carries everything the retry policy and the normalizer need: the failure
/// category, a human-readable message, the HTTP status when one was received,
/// and a server-provided Retry-After when present.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CallFailure {
    pub kind: FailureKind,
    pub message: String,
    pub status: Option<u16>,
    pub retry_after: Option<Duration>,
}

impl CallFailure {
    /// Call exceeded its time budget
    pub fn timeout(budget: Duration) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: format!("timed out after {}ms", budget.as_millis()),
            status: None,
            retry_after: None,
        }
    }

    /// Connection-level failure with no HTTP status
    pub fn connect(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transport,
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    /// Non-2xx HTTP response; 429 is classified as a rate limit
    pub fn http(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let kind = if status == 429 {
            FailureKind::RateLimited
        } else {
            FailureKind::Transport
        };
        let snippet: String = body.chars().take(200).collect();
        Self {
            kind,
            message: format!("HTTP {}: {}", status, snippet.trim()),
            status: Some(status),
            retry_after,
        }
    }

    /// 2xx payload that could not be decoded or had no text content
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Parse,
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    /// Whether the retry policy may re-attempt after this failure
    ///
    /// Timeouts, rate limits, and 5xx responses are retryable; auth errors,
    /// other 4xx, connection failures, and parse failures are terminal.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            FailureKind::Timeout | FailureKind::RateLimited => true,
            FailureKind::Transport => self.status.map(is_retryable_status).unwrap_or(false),
            FailureKind::Parse => false,
        }
    }
}
