// src/pipeline.rs
//
// Sequential suite driver. Each test case flows reader → codegen → executor
// → reporter on its own; a failing case becomes a FAIL record and the suite
// moves on to the next one.

use serde::Serialize;
use tracing::{info, warn};

use crate::codegen::CodeGenerator;
use crate::config::AppConfig;
use crate::error::Result;
use crate::executor::ExecutionEngine;
use crate::llm::ModelService;
use crate::lookup;
use crate::sheets::reader;
use crate::sheets::reporter::SheetReporter;
use crate::sheets::SheetStore;
use crate::types::{ExecutionResult, TestCase, TestStatus};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run only the case with this id.
    pub case_id: Option<String>,
    /// Cap how many cases run.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub worksheet: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub reported: usize,
    pub duration_seconds: f64,
}

/// Run every matching test case in a worksheet and write results back.
/// Fails only when the worksheet itself cannot be read; per-case failures
/// are recorded in the summary.
pub async fn run_suite(
    cfg: &AppConfig,
    store: &dyn SheetStore,
    model: &dyn ModelService,
    worksheet: &str,
    opts: &RunOptions,
) -> Result<RunSummary> {
    let started = std::time::Instant::now();

    let mut cases = reader::read_test_cases(store, worksheet, &cfg.test_prefix).await?;
    if let Some(id) = &opts.case_id {
        cases.retain(|c| c.id.eq_ignore_ascii_case(id));
    }
    if let Some(limit) = opts.limit {
        cases.truncate(limit);
    }
    if cases.is_empty() {
        warn!(worksheet, "no matching test cases to run");
    }

    let generator = CodeGenerator::new(model, cfg, lookup::locators(), lookup::urls());
    let reporter = SheetReporter::new(store, worksheet);
    let mut engine = ExecutionEngine::new(cfg);

    let mut summary = RunSummary {
        worksheet: worksheet.to_string(),
        total: cases.len(),
        passed: 0,
        failed: 0,
        reported: 0,
        duration_seconds: 0.0,
    };

    for case in &mut cases {
        info!(test_id = %case.id, "processing test case");

        let result = match generator.generate_and_save(case).await {
            Ok(path) => engine.run_single_test(case, &path).await,
            Err(err) => {
                warn!(test_id = %case.id, error = %err, "code generation failed");
                let mut result = ExecutionResult::pending(&case.id);
                result.status = TestStatus::Fail;
                result.error_message = Some(err.to_string());
                result
            }
        };

        match result.status {
            TestStatus::Pass => summary.passed += 1,
            _ => summary.failed += 1,
        }
        record_outcome(case, &result);
        if reporter.report(case, &result).await {
            summary.reported += 1;
        }
    }

    if let Err(err) = engine.close().await {
        warn!(error = %err, "browser shutdown failed");
    }

    summary.duration_seconds = started.elapsed().as_secs_f64();
    info!(
        worksheet,
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        reported = summary.reported,
        "suite finished"
    );
    Ok(summary)
}

fn record_outcome(case: &mut TestCase, result: &ExecutionResult) {
    case.status = result.status;
    case.error_message = result.error_message.clone();
    case.screenshot_ref = result.screenshot_path.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::stub::StubModel;
    use crate::sheets::mem::MemSheet;

    fn suite_sheet() -> MemSheet {
        MemSheet::new(vec![(
            "Portal",
            vec![
                vec!["BRD Portal"],
                vec![],
                vec!["Test ID", "Description", "Steps", "Expected Result", "Priority"],
                vec!["TC001", "Contract list loads", "Open list", "List shown", "High"],
            ],
        )])
    }

    fn suite_cfg(dir: &std::path::Path) -> AppConfig {
        let mut cfg = AppConfig::from_env();
        cfg.generated_dir = dir.join("generated");
        cfg.screenshot_dir = dir.join("shots");
        cfg
    }

    #[tokio::test]
    async fn unloadable_script_is_reported_as_fail() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = suite_cfg(dir.path());
        let sheet = suite_sheet();
        // Not JSON, so the artifact fails at load before any browser work.
        let model = StubModel::single("sorry, here is some prose instead");

        let summary = run_suite(&cfg, &sheet, &model, "Portal", &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.passed, 0);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.reported, 1);

        assert_eq!(sheet.cell("Portal", 3, 7).as_deref(), Some("Error Message"));
        assert_eq!(sheet.cell("Portal", 4, 6).as_deref(), Some("FAIL"));
        assert!(sheet.cell("Portal", 4, 7).unwrap().contains("invalid action script"));
    }

    #[tokio::test]
    async fn generation_failure_is_reported_without_execution() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = suite_cfg(dir.path());
        let sheet = suite_sheet();
        let model = StubModel::new(vec![Err("model down".to_string())]);

        let summary = run_suite(&cfg, &sheet, &model, "Portal", &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.reported, 1);
        assert!(sheet.cell("Portal", 4, 7).unwrap().contains("model down"));
        // No artifact was written for the failed generation.
        assert!(!cfg.generated_dir.join("test_tc001.json").exists());
    }

    #[tokio::test]
    async fn case_filter_narrows_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = suite_cfg(dir.path());
        let sheet = MemSheet::new(vec![(
            "Portal",
            vec![
                vec!["BRD Portal"],
                vec![],
                vec!["Test ID", "Description", "Steps", "Expected Result", "Priority"],
                vec!["TC001", "a", "s", "e", "High"],
                vec!["TC002", "b", "s", "e", "Low"],
            ],
        )]);
        let model = StubModel::single("still not json");

        let opts = RunOptions { case_id: Some("tc002".to_string()), limit: None };
        let summary = run_suite(&cfg, &sheet, &model, "Portal", &opts).await.unwrap();

        assert_eq!(summary.total, 1);
        // Only TC002's row received a status.
        assert_eq!(sheet.cell("Portal", 4, 6), None);
        assert_eq!(sheet.cell("Portal", 5, 6).as_deref(), Some("FAIL"));
    }
}
