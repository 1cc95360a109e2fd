//! Markdown rendering of aggregated reports
//!
//! Four modes: a compact table, numbered detailed sections, a combined view
//! with summary statistics and recommendations, and raw JSON.

use anyhow::Result;
use clap::ValueEnum;

use chorus_core::ai::report::AggregatedReport;
use chorus_core::ai::types::{NormalizedResult, TokenUsage};

/// How to render the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// One table row per provider
    Table,
    /// Full per-provider sections
    Detailed,
    /// Statistics, overview table, answers, failures, recommendations
    Combined,
    /// The serialized report
    Json,
}

/// Render a report in the chosen mode
pub fn render(report: &AggregatedReport, mode: OutputMode) -> Result<String> {
    Ok(match mode {
        OutputMode::Table => render_table(report),
        OutputMode::Detailed => render_detailed(report),
        OutputMode::Combined => render_combined(report),
        OutputMode::Json => serde_json::to_string_pretty(report)?,
    })
}

fn render_table(report: &AggregatedReport) -> String {
    let mut lines = vec![
        "| Provider | Model | Status | Preview | Confidence | Time |".to_string(),
        "|----------|-------|--------|---------|------------|------|".to_string(),
    ];

    for result in &report.results {
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} |",
            result.provider_name,
            result.model,
            status_label(result),
            preview(&result.text, 50),
            format_confidence(result.confidence),
            format_secs(result.elapsed_ms),
        ));
    }

    lines.join("\n")
}

fn render_detailed(report: &AggregatedReport) -> String {
    let sections: Vec<String> = report
        .results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            if result.is_success() {
                format!(
                    "### {}. {} ({})\n\n\
                     **Status**: success\n\
                     **Confidence**: {}\n\
                     **Time**: {}\n\
                     **Tokens**: {}\n\n\
                     {}",
                    i + 1,
                    result.provider_name,
                    result.model,
                    format_confidence(result.confidence),
                    format_secs(result.elapsed_ms),
                    format_usage(result.token_usage.as_ref()),
                    fenced(&result.text),
                )
            } else {
                format!(
                    "### {}. {} ({})\n\n\
                     **Status**: {}\n\
                     **Error**: {}\n\
                     **Time**: {}",
                    i + 1,
                    result.provider_name,
                    result.model,
                    status_label(result),
                    result.text,
                    format_secs(result.elapsed_ms),
                )
            }
        })
        .collect();

    sections.join("\n\n---\n\n")
}

fn render_combined(report: &AggregatedReport) -> String {
    let summary = &report.summary;
    let mut parts = Vec::new();

    let success_rate = if summary.total > 0 {
        summary.success_count as f64 / summary.total as f64 * 100.0
    } else {
        0.0
    };

    let mut stats = vec![
        "## Summary".to_string(),
        String::new(),
        "| Metric | Value |".to_string(),
        "|--------|-------|".to_string(),
        format!("| Providers asked | {} |", summary.total),
        format!("| Succeeded | {} |", summary.success_count),
        format!("| Failed | {} |", summary.failure_count),
        format!("| Success rate | {:.1}% |", success_rate),
    ];
    if let Some(confidence) = summary.average_confidence {
        stats.push(format!("| Average confidence | {:.1}/10 |", confidence));
    }
    if let Some(elapsed) = summary.average_elapsed_ms {
        stats.push(format!("| Average time | {} |", format_secs(elapsed)));
    }
    if let Some(fastest) = summary.fastest {
        stats.push(format!("| Fastest | {} |", fastest));
    }
    if let Some(most_confident) = summary.most_confident {
        stats.push(format!("| Most confident | {} |", most_confident));
    }
    parts.push(stats.join("\n"));

    parts.push(format!("## Overview\n\n{}", render_table(report)));

    let successes: Vec<&NormalizedResult> =
        report.results.iter().filter(|r| r.is_success()).collect();
    let failures: Vec<&NormalizedResult> =
        report.results.iter().filter(|r| !r.is_success()).collect();

    if !successes.is_empty() {
        let answers: Vec<String> = successes
            .iter()
            .map(|r| format!("**[{}]**: {}", r.provider_name, preview(&r.text, 200)))
            .collect();
        parts.push(format!("## Answers\n\n{}", answers.join("\n\n")));
    } else {
        parts.push("## Answers\n\nEvery provider call failed; no answers to show.".to_string());
    }

    if !failures.is_empty() {
        let failed: Vec<String> = failures
            .iter()
            .map(|r| format!("**[{}]**: {}", r.provider_name, r.text))
            .collect();
        parts.push(format!("## Failures\n\n{}", failed.join("\n\n")));
    }

    if let Some(recommendations) = recommendations(&successes) {
        parts.push(format!("## Recommendations\n\n{}", recommendations));
    }

    parts.join("\n\n")
}

/// Advice lines for the combined view; only with two or more answers
fn recommendations(successes: &[&NormalizedResult]) -> Option<String> {
    if successes.len() < 2 {
        return None;
    }

    let mut lines = Vec::new();

    let high: Vec<&str> = successes
        .iter()
        .filter(|r| r.confidence.unwrap_or(0.0) >= 8.0)
        .map(|r| r.provider_name.as_str())
        .collect();
    if !high.is_empty() {
        lines.push(format!(
            "- High-confidence answers ({}): consider these first",
            high.join(", ")
        ));
    }

    let medium = successes
        .iter()
        .filter(|r| {
            let c = r.confidence.unwrap_or(0.0);
            (6.0..8.0).contains(&c)
        })
        .count();
    if medium > 0 {
        lines.push(format!(
            "- Medium-confidence answers ({}): useful as supporting reference",
            medium
        ));
    }

    lines.push("- Multiple providers answered: cross-check before acting on any single one".to_string());

    let fast = successes.iter().filter(|r| r.elapsed_ms < 2000).count();
    if fast > 0 {
        lines.push(format!(
            "- Fast responders ({}): good candidates for quick iteration",
            fast
        ));
    }

    Some(lines.join("\n"))
}

fn status_label(result: &NormalizedResult) -> String {
    if result.is_success() {
        "ok".to_string()
    } else {
        match result.failure_kind {
            Some(kind) => format!("failed ({})", kind.label()),
            None => "failed".to_string(),
        }
    }
}

/// Single-line excerpt safe to embed in a markdown table cell
fn preview(text: &str, max_chars: usize) -> String {
    let flattened = text.replace('\n', " ").replace('|', "\\|");
    if flattened.chars().count() <= max_chars {
        flattened
    } else {
        let truncated: String = flattened.chars().take(max_chars).collect();
        format!("{}...", truncated.trim_end())
    }
}

/// Fence long or code-bearing answers so they render as a block
fn fenced(text: &str) -> String {
    if text.contains("```") {
        return text.to_string();
    }
    if text.lines().count() > 10 {
        format!("```\n{}\n```", text)
    } else {
        text.to_string()
    }
}

fn format_confidence(confidence: Option<f32>) -> String {
    match confidence {
        Some(c) => format!("{:.1}/10", c),
        None => "-".to_string(),
    }
}

fn format_secs(elapsed_ms: u64) -> String {
    format!("{:.2}s", elapsed_ms as f64 / 1000.0)
}

fn format_usage(usage: Option<&TokenUsage>) -> String {
    match usage {
        Some(u) => format!(
            "{} total ({} prompt, {} completion)",
            u.total_tokens, u.prompt_tokens, u.completion_tokens
        ),
        None => "not reported".to_string(),
    }
}
