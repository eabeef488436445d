// src/testgen/engine.rs
//
// Batch protocol: three themed calls (happy path, validation, edge cases)
// when the target is large enough, one call otherwise. Batch 1 failing
// fails the run; a later batch failing keeps what was already collected.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::error::Result;
use crate::llm::{prompt, ChatRequest, LlmPrompt, ModelService};
use crate::testgen::parse::{self, ParsedBatch, ParsedCase};
use crate::types::{BatchBreakdown, BatchStat, GenerationOutcome, TestCase};

pub const BATCH_SIZE: usize = 30;
pub const MULTI_BATCH_THRESHOLD: usize = 70;
const GEN_TEMPERATURE: f32 = 0.7;
const GEN_MAX_TOKENS: u32 = 12000;

const BATCH_KEYS: [&str; 3] = ["batch1_happy_path", "batch2_validation", "batch3_edge_cases"];
const BATCH_NAMES: [&str; 3] =
    ["UI Happy Path (MainFlow)", "UI Validation", "UI Boundary (Edge Cases)"];

pub struct TestCaseGenerator<'a> {
    model: &'a dyn ModelService,
}

impl<'a> TestCaseGenerator<'a> {
    pub fn new(model: &'a dyn ModelService) -> Self {
        Self { model }
    }

    /// Produce up to `target_count` test cases from requirement text.
    pub async fn generate(
        &self,
        requirement_text: &str,
        target_count: usize,
        batch_mode: bool,
    ) -> GenerationOutcome {
        if batch_mode && target_count >= MULTI_BATCH_THRESHOLD {
            self.generate_three_batches(requirement_text, target_count).await
        } else {
            self.generate_single_batch(requirement_text, target_count).await
        }
    }

    async fn generate_three_batches(
        &self,
        requirement_text: &str,
        target_count: usize,
    ) -> GenerationOutcome {
        type PromptFn = fn(&str, usize) -> LlmPrompt;
        let builders: [PromptFn; 3] =
            [prompt::happy_path_prompt, prompt::validation_prompt, prompt::edge_cases_prompt];
        let sizes = [BATCH_SIZE, BATCH_SIZE, target_count - 2 * BATCH_SIZE];

        let mut counts = [0usize; 3];
        let mut collected: Vec<ParsedCase> = Vec::new();

        for i in 0..3 {
            info!(batch = BATCH_KEYS[i], requested = sizes[i], "running generation batch");
            match self.run_batch(builders[i](requirement_text, sizes[i])).await {
                Ok(batch) => {
                    info!(
                        batch = BATCH_KEYS[i],
                        valid = batch.records.len(),
                        dropped = batch.dropped,
                        "batch parsed"
                    );
                    counts[i] = batch.records.len();
                    collected.extend(batch.records);
                }
                Err(err) if i == 0 => {
                    warn!(error = %err, "first batch failed, aborting generation");
                    return GenerationOutcome {
                        success: false,
                        records: Vec::new(),
                        error: Some(err.to_string()),
                        breakdown: None,
                    };
                }
                Err(err) => {
                    warn!(
                        batch = BATCH_KEYS[i],
                        error = %err,
                        "batch failed, keeping earlier batches"
                    );
                    break;
                }
            }
        }

        GenerationOutcome {
            success: true,
            records: number_cases(collected),
            error: None,
            breakdown: Some(three_batch_breakdown(&counts)),
        }
    }

    async fn generate_single_batch(
        &self,
        requirement_text: &str,
        target_count: usize,
    ) -> GenerationOutcome {
        info!(requested = target_count, "running single-batch generation");
        match self.run_batch(prompt::happy_path_prompt(requirement_text, target_count)).await {
            Ok(batch) => {
                info!(valid = batch.records.len(), dropped = batch.dropped, "batch parsed");
                let count = batch.records.len();
                GenerationOutcome {
                    success: true,
                    records: number_cases(batch.records),
                    error: None,
                    breakdown: Some(single_batch_breakdown(count)),
                }
            }
            Err(err) => {
                warn!(error = %err, "single-batch generation failed");
                GenerationOutcome {
                    success: false,
                    records: Vec::new(),
                    error: Some(err.to_string()),
                    breakdown: None,
                }
            }
        }
    }

    async fn run_batch(&self, prompt: LlmPrompt) -> Result<ParsedBatch> {
        let request = ChatRequest::new(prompt, GEN_TEMPERATURE, GEN_MAX_TOKENS);
        let completion = self.model.complete(request).await?;
        parse::parse_batch(&completion.text)
    }
}

/// Assign sequential prefixed ids; model records come back id-less.
fn number_cases(records: Vec<ParsedCase>) -> Vec<TestCase> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, rec)| {
            let mut case = TestCase::new(format!("TC{:03}", i + 1));
            case.description = rec.description;
            case.steps = rec.steps;
            case.expected_result = rec.expected_result;
            case.priority = rec.priority;
            case
        })
        .collect()
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Percentages are computed over successfully parsed records only; a
/// failed batch reads 0 / 0.0.
fn three_batch_breakdown(counts: &[usize; 3]) -> BatchBreakdown {
    let total: usize = counts.iter().sum();
    let mut out = BTreeMap::new();
    for i in 0..3 {
        let percentage = if total > 0 {
            round1(counts[i] as f64 / total as f64 * 100.0)
        } else {
            0.0
        };
        out.insert(
            BATCH_KEYS[i].to_string(),
            BatchStat {
                display_name: BATCH_NAMES[i].to_string(),
                count: counts[i],
                percentage,
            },
        );
    }
    out
}

fn single_batch_breakdown(count: usize) -> BatchBreakdown {
    let mut out = BTreeMap::new();
    out.insert(
        "all".to_string(),
        BatchStat {
            display_name: "All Test Cases (Single Batch)".to_string(),
            count,
            percentage: if count > 0 { 100.0 } else { 0.0 },
        },
    );
    for key in BATCH_KEYS {
        out.insert(
            key.to_string(),
            BatchStat { display_name: "N/A".to_string(), count: 0, percentage: 0.0 },
        );
    }
    out
}
