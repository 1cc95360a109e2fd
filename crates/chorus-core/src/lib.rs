//! Chorus Core - Shared library for the multi-provider comparison pipeline
//!
//! This crate provides the core functionality for the Chorus CLI:
//! - Provider registry with built-in catalog and config-file resolution
//! - Concurrent request dispatch with per-call timeouts
//! - Response normalization across provider wire formats
//! - Retry with free-tier model fallback
//! - Result aggregation and summary statistics

pub mod ai;
pub mod config;
pub mod constants;
pub mod error;
pub mod paths;

// Re-exports for convenience
pub use ai::dispatch::{dispatch, ChatTransport, DispatchOptions};
pub use ai::providers::{builtin_providers, get_provider, ProviderId, Registry, ResolvedProvider};
pub use ai::report::{aggregate, AggregatedReport, ReportSummary};
pub use ai::types::{NormalizedResult, RawResult, ResultStatus, TokenUsage};
pub use config::ChorusConfig;
pub use error::{CallFailure, ConfigError, FailureKind};
