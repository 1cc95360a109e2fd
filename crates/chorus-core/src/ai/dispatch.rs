//! Concurrent request dispatch
//!
//! Fans one prompt out to every resolved provider, one task per provider,
//! joined at a barrier. Each call is bounded by the per-request timeout (and
//! an optional overall deadline) and settles into exactly one `RawResult` in
//! the slot matching its provider's position. One provider's failure never
//! cancels or delays the others.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use super::providers::ResolvedProvider;
use super::retry::RetryPolicy;
use super::types::{RawResult, RequestJob};
use crate::config::ChorusConfig;
use crate::constants;
use crate::error::CallFailure;

/// Seam between the dispatcher and the network
///
/// The production implementation is `client::HttpTransport`; tests substitute
/// a scripted transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue one chat-completion call and return the provider-native payload
    async fn send(
        &self,
        provider: &ResolvedProvider,
        model: &str,
        prompt: &str,
    ) -> Result<Value, CallFailure>;
}

/// Knobs for one dispatch cycle
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Time budget for each individual call
    pub request_timeout: Duration,
    /// Optional deadline across the whole dispatch
    pub overall_timeout: Option<Duration>,
    /// Retry behavior for transient failures
    pub retry: RetryPolicy,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            request_timeout: constants::http::REQUEST_TIMEOUT,
            overall_timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl DispatchOptions {
    /// Options derived from the loaded configuration
    pub fn from_config(config: &ChorusConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            overall_timeout: config.overall_timeout(),
            retry: RetryPolicy {
                max_attempts: config.settings.max_attempts.max(1),
                ..RetryPolicy::default()
            },
        }
    }
}

/// Fan a prompt out to all providers and wait for every call to settle
///
/// Returns one `RawResult` per provider, positionally aligned with the input
/// slice. Never fails as a whole: per-provider problems are captured in the
/// corresponding slot.
pub async fn dispatch(
    transport: &dyn ChatTransport,
    providers: &[ResolvedProvider],
    prompt: &str,
    options: &DispatchOptions,
) -> Vec<RawResult> {
    let deadline = options.overall_timeout.map(|t| Instant::now() + t);
    let jobs = providers.iter().map(|provider| {
        let job = RequestJob {
            provider: provider.id(),
            model: provider.spec.default_model().id.clone(),
            prompt: prompt.to_string(),
            timeout: options.request_timeout,
        };
        run_job(transport, provider, job, options, deadline)
    });
    join_all(jobs).await
}

/// Remaining budget for one call, or None when the overall deadline passed
fn call_budget(request_timeout: Duration, deadline: Option<Instant>) -> Option<Duration> {
    match deadline {
        None => Some(request_timeout),
        Some(deadline) => {
            let now = Instant::now();
            if now >= deadline {
                None
            } else {
                Some(request_timeout.min(deadline - now))
            }
        }
    }
}

/// Drive one provider call through the retry state machine until terminal
async fn run_job(
    transport: &dyn ChatTransport,
    provider: &ResolvedProvider,
    job: RequestJob,
    options: &DispatchOptions,
    deadline: Option<Instant>,
) -> RawResult {
    let started = Instant::now();
    let mut model = job.model;
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let Some(budget) = call_budget(job.timeout, deadline) else {
            return RawResult {
                provider: job.provider,
                model,
                outcome: Err(CallFailure::timeout(Duration::ZERO)),
                elapsed: started.elapsed(),
                attempts,
            };
        };

        let outcome = match timeout(budget, transport.send(provider, &model, &job.prompt)).await {
            Ok(result) => result,
            Err(_) => Err(CallFailure::timeout(budget)),
        };

        match outcome {
            Ok(payload) => {
                debug!(provider = %provider.id(), attempts, "provider call succeeded");
                return RawResult {
                    provider: job.provider,
                    model,
                    outcome: Ok(payload),
                    elapsed: started.elapsed(),
                    attempts,
                };
            }
            Err(failure) => {
                let budget_left = attempts < options.retry.max_attempts;
                if failure.is_retryable() && budget_left {
                    let delay = options.retry.backoff_delay(attempts, failure.retry_after);
                    let crosses_deadline =
                        deadline.is_some_and(|d| Instant::now() + delay >= d);
                    if !crosses_deadline {
                        warn!(
                            provider = %provider.id(),
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            "retrying after failure: {}",
                            failure
                        );
                        sleep(delay).await;
                        // Downgrade to the next free-tier model when one exists
                        if let Some(next) = provider.spec.fallback_model(&model) {
                            model = next.id.clone();
                        }
                        continue;
                    }
                }
                return RawResult {
                    provider: job.provider,
                    model,
                    outcome: Err(failure),
                    elapsed: started.elapsed(),
                    attempts,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::providers::{get_provider, ProviderId};
    use serde_json::json;
    use std::collections::HashMap;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn resolved(id: ProviderId) -> ResolvedProvider {
        let spec = get_provider(id).unwrap();
        ResolvedProvider {
            spec,
            api_key: "test-key".to_string(),
            base_url: spec.base_url.clone(),
        }
    }

    fn ok_payload() -> Value {
        json!({"choices": [{"message": {"content": "ok"}}]})
    }

    enum Script {
        Reply { delay: Duration, payload: Value },
        Fail { delay: Duration, failure: CallFailure },
        Hang,
    }

    /// Transport that replays a per-provider script, recording calls
    struct ScriptedTransport {
        scripts: Mutex<HashMap<ProviderId, VecDeque<Script>>>,
        calls: Mutex<Vec<(ProviderId, String)>>,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<(ProviderId, Vec<Script>)>) -> Self {
            Self {
                scripts: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|(id, s)| (id, s.into_iter().collect()))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(ProviderId, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(
            &self,
            provider: &ResolvedProvider,
            model: &str,
            _prompt: &str,
        ) -> Result<Value, CallFailure> {
            self.calls
                .lock()
                .unwrap()
                .push((provider.id(), model.to_string()));
            let script = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&provider.id())
                .and_then(|queue| queue.pop_front());
            match script {
                Some(Script::Reply { delay, payload }) => {
                    sleep(delay).await;
                    Ok(payload)
                }
                Some(Script::Fail { delay, failure }) => {
                    sleep(delay).await;
                    Err(failure)
                }
                Some(Script::Hang) => futures::future::pending().await,
                None => Ok(ok_payload()),
            }
        }
    }

    fn no_jitter_options(request_timeout: Duration) -> DispatchOptions {
        DispatchOptions {
            request_timeout,
            overall_timeout: None,
            retry: RetryPolicy {
                jitter: false,
                ..RetryPolicy::default()
            },
        }
    }

    fn single_attempt_options(request_timeout: Duration) -> DispatchOptions {
        DispatchOptions {
            request_timeout,
            overall_timeout: None,
            retry: RetryPolicy {
                max_attempts: 1,
                jitter: false,
                ..RetryPolicy::default()
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_result_per_provider() {
        let providers = vec![
            resolved(ProviderId::Zhipu),
            resolved(ProviderId::Silicon),
            resolved(ProviderId::OpenAi),
        ];
        let transport = ScriptedTransport::new(vec![
            (
                ProviderId::Zhipu,
                vec![Script::Reply {
                    delay: Duration::from_millis(100),
                    payload: ok_payload(),
                }],
            ),
            (
                ProviderId::Silicon,
                vec![Script::Fail {
                    delay: Duration::from_millis(50),
                    failure: CallFailure::http(401, "bad key", None),
                }],
            ),
            (ProviderId::OpenAi, vec![Script::Hang]),
        ]);

        let options = single_attempt_options(Duration::from_secs(2));
        let results = dispatch(&transport, &providers, "hello", &options).await;

        assert_eq!(results.len(), 3);
        // Slots align with input positions
        assert_eq!(results[0].provider, ProviderId::Zhipu);
        assert_eq!(results[1].provider, ProviderId::Silicon);
        assert_eq!(results[2].provider, ProviderId::OpenAi);

        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        let timeout_failure = results[2].outcome.as_ref().unwrap_err();
        assert_eq!(timeout_failure.kind, crate::error::FailureKind::Timeout);
        assert!(results[2].elapsed >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_does_not_delay_others() {
        let providers = vec![resolved(ProviderId::Zhipu), resolved(ProviderId::Silicon)];
        let transport = ScriptedTransport::new(vec![
            (
                ProviderId::Zhipu,
                vec![Script::Reply {
                    delay: Duration::from_secs(1),
                    payload: ok_payload(),
                }],
            ),
            (ProviderId::Silicon, vec![Script::Hang]),
        ]);

        let options = single_attempt_options(Duration::from_secs(2));
        let started = Instant::now();
        let results = dispatch(&transport, &providers, "hello", &options).await;
        let wall = started.elapsed();

        // Wall clock is the max of the per-provider times, not the sum
        assert!(wall >= Duration::from_secs(2));
        assert!(wall < Duration::from_millis(2500));

        assert!(results[0].is_success());
        assert!(results[0].elapsed >= Duration::from_secs(1));
        assert!(results[0].elapsed < Duration::from_millis(1500));
        assert!(!results[1].is_success());
        assert!(results[1].elapsed >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retries_on_free_fallback_model() {
        let providers = vec![resolved(ProviderId::Zhipu)];
        let transport = ScriptedTransport::new(vec![(
            ProviderId::Zhipu,
            vec![
                Script::Fail {
                    delay: Duration::from_millis(10),
                    failure: CallFailure::http(429, "slow down", None),
                },
                Script::Reply {
                    delay: Duration::from_millis(10),
                    payload: ok_payload(),
                },
            ],
        )]);

        let options = no_jitter_options(Duration::from_secs(5));
        let results = dispatch(&transport, &providers, "hello", &options).await;

        assert!(results[0].is_success());
        assert_eq!(results[0].attempts, 2);

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, "glm-4-flash");
        // Second attempt downgraded to the next free-tier model
        assert_eq!(calls[1].1, "glm-4-flashx");
        assert_eq!(results[0].model, "glm-4-flashx");
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget_is_bounded() {
        let providers = vec![resolved(ProviderId::Zhipu)];
        let rate_limited = || CallFailure::http(429, "slow down", None);
        let transport = ScriptedTransport::new(vec![(
            ProviderId::Zhipu,
            vec![
                Script::Fail {
                    delay: Duration::from_millis(10),
                    failure: rate_limited(),
                },
                Script::Fail {
                    delay: Duration::from_millis(10),
                    failure: rate_limited(),
                },
                Script::Fail {
                    delay: Duration::from_millis(10),
                    failure: rate_limited(),
                },
            ],
        )]);

        let options = no_jitter_options(Duration::from_secs(5));
        let results = dispatch(&transport, &providers, "hello", &options).await;

        assert!(!results[0].is_success());
        assert_eq!(results[0].attempts, 2);
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_failure_is_terminal() {
        let providers = vec![resolved(ProviderId::Zhipu)];
        let transport = ScriptedTransport::new(vec![(
            ProviderId::Zhipu,
            vec![Script::Fail {
                delay: Duration::from_millis(10),
                failure: CallFailure::http(401, "bad key", None),
            }],
        )]);

        let options = no_jitter_options(Duration::from_secs(5));
        let results = dispatch(&transport, &providers, "hello", &options).await;

        assert!(!results[0].is_success());
        assert_eq!(results[0].attempts, 1);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_deadline_caps_slow_calls() {
        let providers = vec![resolved(ProviderId::Zhipu)];
        let transport = ScriptedTransport::new(vec![(ProviderId::Zhipu, vec![Script::Hang])]);

        let options = DispatchOptions {
            request_timeout: Duration::from_secs(30),
            overall_timeout: Some(Duration::from_secs(1)),
            retry: RetryPolicy {
                jitter: false,
                ..RetryPolicy::default()
            },
        };

        let started = Instant::now();
        let results = dispatch(&transport, &providers, "hello", &options).await;
        let wall = started.elapsed();

        assert!(wall >= Duration::from_secs(1));
        assert!(wall < Duration::from_millis(1500));
        let failure = results[0].outcome.as_ref().unwrap_err();
        assert_eq!(failure.kind, crate::error::FailureKind::Timeout);
    }
}
