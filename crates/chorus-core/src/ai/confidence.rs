//! Confidence heuristic
//!
//! A deterministic text-quality proxy on a 0-10 scale. Not a calibrated
//! metric; downstream code may rely only on the range and on the documented
//! monotonicity:
//!
//! - base score 5
//! - up to +2 for length, saturating at ~800 characters
//! - +1 for visible structure (code fences or list items)
//! - -1.5 when the text hedges or refuses
//! - -2 when the text embeds provider error markers
//! - clamped to [0, 10]

/// Phrases that indicate hedging or refusal
const HEDGING_MARKERS: &[&str] = &[
    "i'm not sure",
    "i am not sure",
    "i cannot",
    "i can't",
    "as an ai",
    "i don't know",
    "i do not know",
    "unable to",
];

/// Fragments that indicate an error page leaked into the completion
const ERROR_MARKERS: &[&str] = &[
    "internal server error",
    "service unavailable",
    "something went wrong",
];

/// Score a response text on the 0-10 scale
pub fn score(text: &str) -> f32 {
    let mut score = 5.0f32;
    let lower = text.to_lowercase();

    score += length_bonus(text);

    if has_structure(text) {
        score += 1.0;
    }
    if HEDGING_MARKERS.iter().any(|m| lower.contains(m)) {
        score -= 1.5;
    }
    if ERROR_MARKERS.iter().any(|m| lower.contains(m)) {
        score -= 2.0;
    }

    score.clamp(0.0, 10.0)
}

/// Saturating length bonus: 0 for empty, +2 from ~800 characters up
fn length_bonus(text: &str) -> f32 {
    (text.chars().count() as f32 / 400.0).min(2.0)
}

/// Code fences or list items count as structure
fn has_structure(text: &str) -> bool {
    if text.contains("```") {
        return true;
    }
    text.lines().any(|line| {
        let trimmed = line.trim_start();
        trimmed.starts_with("- ")
            || trimmed.starts_with("* ")
            || trimmed
                .split_once(". ")
                .is_some_and(|(head, _)| head.chars().all(|c| c.is_ascii_digit()) && !head.is_empty())
    })
}
