//! AI provider layer
//!
//! Fans a prompt out to the resolved providers, normalizes each provider's
//! native payload, and aggregates the results into a single report.

pub mod client;
pub mod confidence;
pub mod dispatch;
pub mod normalize;
pub mod providers;
pub mod report;
pub mod retry;
pub mod types;

pub use client::HttpTransport;
pub use dispatch::{dispatch, ChatTransport, DispatchOptions};
pub use report::{aggregate, AggregatedReport};

use providers::ResolvedProvider;

/// Run the full pipeline: dispatch, normalize each result, aggregate
///
/// Produces exactly one report entry per resolved provider, failures
/// included.
pub async fn compare(
    transport: &dyn ChatTransport,
    providers: &[ResolvedProvider],
    prompt: &str,
    options: &DispatchOptions,
) -> AggregatedReport {
    let raw = dispatch::dispatch(transport, providers, prompt, options).await;
    let normalized = raw
        .into_iter()
        .zip(providers.iter())
        .map(|(result, provider)| normalize::normalize(result, provider))
        .collect();
    report::aggregate(normalized)
}

#[cfg(test)]
mod tests {
    use super::providers::{get_provider, ProviderId};
    use super::*;
    use crate::error::CallFailure;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn resolved(id: ProviderId) -> ResolvedProvider {
        let spec = get_provider(id).unwrap();
        ResolvedProvider {
            spec,
            api_key: "test-key".to_string(),
            base_url: spec.base_url.clone(),
        }
    }

    /// Succeeds for Zhipu, errors for Silicon, hangs for everyone else
    struct MixedTransport;

    #[async_trait]
    impl ChatTransport for MixedTransport {
        async fn send(
            &self,
            provider: &ResolvedProvider,
            _model: &str,
            _prompt: &str,
        ) -> Result<Value, CallFailure> {
            match provider.id() {
                ProviderId::Zhipu => {
                    Ok(json!({"choices": [{"message": {"content": "forty-two"}}]}))
                }
                ProviderId::Silicon => Err(CallFailure::http(401, "bad key", None)),
                _ => futures::future::pending().await,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_compare_yields_one_entry_per_provider() {
        let providers = vec![
            resolved(ProviderId::Zhipu),
            resolved(ProviderId::Silicon),
            resolved(ProviderId::Google),
        ];
        let options = DispatchOptions {
            request_timeout: Duration::from_secs(1),
            ..DispatchOptions::default()
        };

        let report = compare(&MixedTransport, &providers, "hello", &options).await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.summary.success_count, 1);
        assert_eq!(report.summary.failure_count, 2);
        assert_eq!(report.summary.fastest, Some(ProviderId::Zhipu));
        assert_eq!(report.results[0].text, "forty-two");
    }
}
