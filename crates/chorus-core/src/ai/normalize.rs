//! Response normalization
//!
//! Maps every `RawResult` to exactly one `NormalizedResult`. Success payloads
//! go through a per-format text extractor; a 2xx payload with no extractable
//! text becomes a parse failure rather than an empty success. Failures carry
//! their kind and a human-readable message. This mapping is total: no payload
//! shape makes it panic or drop a result.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::confidence;
use super::providers::{ApiFormat, ProviderId, ResolvedProvider};
use super::types::{NormalizedResult, RawResult, ResultStatus, TokenUsage};
use crate::error::CallFailure;

/// Shape a settled call into the common result record
pub fn normalize(raw: RawResult, provider: &ResolvedProvider) -> NormalizedResult {
    let elapsed_ms = raw.elapsed.as_millis() as u64;

    match raw.outcome {
        Ok(payload) => {
            match extract_text(&payload, provider.spec.api_format)
                .map(|text| clean_text(&text))
                .filter(|text| !text.is_empty())
            {
                Some(text) => {
                    let score = confidence::score(&text);
                    NormalizedResult {
                        provider: raw.provider,
                        provider_name: provider.spec.name.clone(),
                        model: raw.model,
                        status: ResultStatus::Success,
                        failure_kind: None,
                        confidence: Some(score),
                        token_usage: extract_usage(&payload, provider.spec.api_format),
                        text,
                        elapsed_ms,
                        attempts: raw.attempts,
                    }
                }
                None => failure_result(
                    raw.provider,
                    provider,
                    raw.model,
                    CallFailure::parse("no text content in response payload"),
                    elapsed_ms,
                    raw.attempts,
                ),
            }
        }
        Err(failure) => failure_result(
            raw.provider,
            provider,
            raw.model,
            failure,
            elapsed_ms,
            raw.attempts,
        ),
    }
}

fn failure_result(
    id: ProviderId,
    provider: &ResolvedProvider,
    model: String,
    failure: CallFailure,
    elapsed_ms: u64,
    attempts: u32,
) -> NormalizedResult {
    NormalizedResult {
        provider: id,
        provider_name: provider.spec.name.clone(),
        model,
        status: ResultStatus::Failure,
        failure_kind: Some(failure.kind),
        text: failure.message,
        confidence: None,
        token_usage: None,
        elapsed_ms,
        attempts,
    }
}

/// Extract the assistant text from a provider-native payload
fn extract_text(payload: &Value, format: ApiFormat) -> Option<String> {
    match format {
        ApiFormat::OpenAi => payload
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|t| t.as_str())
            .map(String::from),
        // Thinking blocks may precede text blocks; only text blocks count
        ApiFormat::Anthropic => payload
            .get("content")
            .and_then(|c| c.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|block| {
                        if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                            block.get("text").and_then(|t| t.as_str())
                        } else {
                            None
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("")
            }),
        ApiFormat::Google => payload
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|parts| parts.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("")
            }),
    }
}

/// Extract token accounting when the payload reports it
fn extract_usage(payload: &Value, format: ApiFormat) -> Option<TokenUsage> {
    let count = |v: &Value, key: &str| v.get(key).and_then(|n| n.as_u64()).unwrap_or(0);

    match format {
        ApiFormat::OpenAi => payload.get("usage").map(|usage| TokenUsage {
            prompt_tokens: count(usage, "prompt_tokens"),
            completion_tokens: count(usage, "completion_tokens"),
            total_tokens: count(usage, "total_tokens"),
        }),
        ApiFormat::Anthropic => payload.get("usage").map(|usage| {
            let prompt = count(usage, "input_tokens");
            let completion = count(usage, "output_tokens");
            TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            }
        }),
        ApiFormat::Google => payload.get("usageMetadata").map(|usage| TokenUsage {
            prompt_tokens: count(usage, "promptTokenCount"),
            completion_tokens: count(usage, "candidatesTokenCount"),
            total_tokens: count(usage, "totalTokenCount"),
        }),
    }
}

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n+").expect("static pattern compiles"));

/// Strip whitespace artifacts: collapse runs of blank lines, trim the ends
fn clean_text(text: &str) -> String {
    BLANK_RUNS.replace_all(text.trim(), "\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::providers::{get_provider, ProviderId};
    use crate::error::FailureKind;
    use serde_json::json;
    use std::time::Duration;

    fn resolved(id: ProviderId) -> ResolvedProvider {
        let spec = get_provider(id).unwrap();
        ResolvedProvider {
            spec,
            api_key: "test-key".to_string(),
            base_url: spec.base_url.clone(),
        }
    }

    fn raw_success(id: ProviderId, payload: Value) -> RawResult {
        RawResult {
            provider: id,
            model: "test-model".to_string(),
            outcome: Ok(payload),
            elapsed: Duration::from_millis(1200),
            attempts: 1,
        }
    }

    #[test]
    fn test_openai_format_extraction() {
        let payload = json!({
            "choices": [{"message": {"role": "assistant", "content": "The answer is 42."}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let result = normalize(
            raw_success(ProviderId::Zhipu, payload),
            &resolved(ProviderId::Zhipu),
        );

        assert!(result.is_success());
        assert_eq!(result.text, "The answer is 42.");
        assert_eq!(result.elapsed_ms, 1200);
        let usage = result.token_usage.unwrap();
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_anthropic_format_skips_thinking_blocks() {
        let payload = json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "Hello"},
                {"type": "text", "text": " world"}
            ],
            "usage": {"input_tokens": 7, "output_tokens": 3}
        });
        let result = normalize(
            raw_success(ProviderId::Anthropic, payload),
            &resolved(ProviderId::Anthropic),
        );

        assert!(result.is_success());
        assert_eq!(result.text, "Hello world");
        let usage = result.token_usage.unwrap();
        assert_eq!(usage.total_tokens, 10);
    }

    #[test]
    fn test_google_format_extraction() {
        let payload = json!({
            "candidates": [{
                "content": {"parts": [{"text": "Bonjour"}], "role": "model"}
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
        });
        let result = normalize(
            raw_success(ProviderId::Google, payload),
            &resolved(ProviderId::Google),
        );

        assert!(result.is_success());
        assert_eq!(result.text, "Bonjour");
        assert_eq!(result.token_usage.unwrap().prompt_tokens, 4);
    }

    #[test]
    fn test_unparseable_payload_becomes_parse_failure() {
        let payload = json!({"unexpected": "shape"});
        let result = normalize(
            raw_success(ProviderId::Zhipu, payload),
            &resolved(ProviderId::Zhipu),
        );

        assert!(!result.is_success());
        assert_eq!(result.failure_kind, Some(FailureKind::Parse));
    }

    #[test]
    fn test_empty_text_becomes_parse_failure() {
        let payload = json!({"choices": [{"message": {"content": "   "}}]});
        let result = normalize(
            raw_success(ProviderId::Zhipu, payload),
            &resolved(ProviderId::Zhipu),
        );

        assert!(!result.is_success());
        assert_eq!(result.failure_kind, Some(FailureKind::Parse));
    }

    #[test]
    fn test_failure_maps_to_failure_result() {
        let raw = RawResult {
            provider: ProviderId::Silicon,
            model: "Qwen/Qwen2.5-7B-Instruct".to_string(),
            outcome: Err(CallFailure::timeout(Duration::from_secs(2))),
            elapsed: Duration::from_secs(2),
            attempts: 2,
        };
        let result = normalize(raw, &resolved(ProviderId::Silicon));

        assert!(!result.is_success());
        assert_eq!(result.failure_kind, Some(FailureKind::Timeout));
        assert_eq!(result.attempts, 2);
        assert!(result.text.contains("timed out"));
        assert!(result.confidence.is_none());
        assert!(result.token_usage.is_none());
    }

    #[test]
    fn test_clean_text_collapses_blank_runs() {
        let cleaned = clean_text("  first\n\n\n\nsecond\n \n\nthird  \n");
        assert_eq!(cleaned, "first\n\nsecond\n\nthird");
    }

    #[test]
    fn test_missing_usage_is_none() {
        let payload = json!({"choices": [{"message": {"content": "hi"}}]});
        let result = normalize(
            raw_success(ProviderId::Zhipu, payload),
            &resolved(ProviderId::Zhipu),
        );
        assert!(result.token_usage.is_none());
    }
}
