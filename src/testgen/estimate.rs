// src/testgen/estimate.rs
//
// Coverage estimation: ask the model for a bare number, fall back to a
// closed-form heuristic on any failure. Neither path may return less than
// what was already generated.

use tracing::warn;

use crate::llm::{prompt, ChatRequest, ModelService};
use crate::testgen::parse;

const EST_TEMPERATURE: f32 = 0.2;
const EST_MAX_TOKENS: u32 = 50;
const SAMPLE_CHARS: usize = 6000;

/// UI terms whose density scales the heuristic; the Vietnamese entries
/// cover the bilingual requirement documents this tool is pointed at.
const UI_KEYWORDS: [&str; 21] = [
    "button", "form", "field", "input", "dropdown", "checkbox", "radio", "menu", "page", "screen",
    "click", "select", "navigate", "display", "show", "validate", "giao diện", "nút", "trường",
    "chọn", "hiển thị",
];

pub async fn estimate_required_test_cases(
    model: &dyn ModelService,
    requirement_text: &str,
    generated_count: usize,
) -> usize {
    let sample: String = requirement_text.chars().take(SAMPLE_CHARS).collect();
    let request = ChatRequest::new(
        prompt::estimate_prompt(&sample, generated_count),
        EST_TEMPERATURE,
        EST_MAX_TOKENS,
    );

    match model.complete(request).await {
        Ok(completion) => match parse::first_integer(&completion.text) {
            Some(n) => (n as usize).max(generated_count),
            None => {
                warn!(reply = %completion.text, "no number in estimate reply, using heuristic");
                heuristic_estimate(requirement_text, generated_count)
            }
        },
        Err(err) => {
            warn!(error = %err, "estimate call failed, using heuristic");
            heuristic_estimate(requirement_text, generated_count)
        }
    }
}

/// Length tier scaled by UI-keyword density, floored at 1.5x of what was
/// already generated.
pub fn heuristic_estimate(requirement_text: &str, generated_count: usize) -> usize {
    let chars = requirement_text.chars().count();
    let base: f64 = if chars < 5000 {
        30.0
    } else if chars < 15000 {
        60.0
    } else {
        100.0
    };

    let lower = requirement_text.to_lowercase();
    let keyword_hits: usize = UI_KEYWORDS.iter().map(|k| lower.matches(k).count()).sum();
    let factor = (keyword_hits as f64 / 20.0).min(2.0);

    let estimate = (base * (1.0 + factor * 0.5)) as usize;
    estimate.max((generated_count as f64 * 1.5) as usize)
}
