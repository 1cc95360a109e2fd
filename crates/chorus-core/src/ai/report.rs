//! Result aggregation
//!
//! Merges normalized results into the final report. Input order (provider
//! priority order) is preserved; summary fields come from a single scan with
//! ties broken by input position. Deterministic: identical inputs always
//! produce identical reports.

use serde::{Deserialize, Serialize};

use super::providers::ProviderId;
use super::types::NormalizedResult;

/// Summary statistics over one dispatch cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Successful provider with the lowest elapsed time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fastest: Option<ProviderId>,
    /// Successful provider with the highest confidence score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_confident: Option<ProviderId>,
    /// Mean confidence over successes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_confidence: Option<f32>,
    /// Mean elapsed milliseconds over successes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_elapsed_ms: Option<u64>,
}

/// The final product of one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub results: Vec<NormalizedResult>,
    pub summary: ReportSummary,
}

/// Fold normalized results into a report
pub fn aggregate(results: Vec<NormalizedResult>) -> AggregatedReport {
    let mut success_count = 0usize;
    let mut fastest: Option<(u64, ProviderId)> = None;
    let mut most_confident: Option<(f32, ProviderId)> = None;
    let mut confidence_sum = 0.0f32;
    let mut elapsed_sum = 0u64;

    for result in &results {
        if !result.is_success() {
            continue;
        }
        success_count += 1;
        elapsed_sum += result.elapsed_ms;

        // Strict comparisons keep the earliest entry on ties
        if fastest.is_none_or(|(best, _)| result.elapsed_ms < best) {
            fastest = Some((result.elapsed_ms, result.provider));
        }
        if let Some(confidence) = result.confidence {
            confidence_sum += confidence;
            if most_confident.is_none_or(|(best, _)| confidence > best) {
                most_confident = Some((confidence, result.provider));
            }
        }
    }

    let summary = ReportSummary {
        total: results.len(),
        success_count,
        failure_count: results.len() - success_count,
        fastest: fastest.map(|(_, id)| id),
        most_confident: most_confident.map(|(_, id)| id),
        average_confidence: (success_count > 0).then(|| confidence_sum / success_count as f32),
        average_elapsed_ms: (success_count > 0).then(|| elapsed_sum / success_count as u64),
    };

    AggregatedReport { results, summary }
}
