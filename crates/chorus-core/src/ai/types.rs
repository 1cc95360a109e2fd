//! Result types flowing through the pipeline
//!
//! A `RequestJob` produces exactly one `RawResult`, which the normalizer maps
//! to exactly one `NormalizedResult`. Failures travel the same path as
//! successes; nothing is dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::providers::ProviderId;
use crate::error::{CallFailure, FailureKind};

/// One unit of dispatch work
#[derive(Debug, Clone)]
pub struct RequestJob {
    pub provider: ProviderId,
    pub model: String,
    pub prompt: String,
    pub timeout: Duration,
}

/// Outcome of one provider call after retries settled
///
/// `model` is the model actually used on the final attempt, which may differ
/// from the default after a free-tier downgrade.
#[derive(Debug)]
pub struct RawResult {
    pub provider: ProviderId,
    pub model: String,
    pub outcome: Result<Value, CallFailure>,
    pub elapsed: Duration,
    pub attempts: u32,
}

impl RawResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Success/failure marker on a normalized result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Failure,
}

/// Token accounting extracted from a provider payload, when reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A provider response in the common shape
///
/// For failures, `text` carries the human-readable failure message and
/// `confidence`/`token_usage` are absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub provider: ProviderId,
    pub provider_name: String,
    pub model: String,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    pub elapsed_ms: u64,
    pub attempts: u32,
}

impl NormalizedResult {
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}
