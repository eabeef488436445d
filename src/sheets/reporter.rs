// src/sheets/reporter.rs
//
// Writes execution outcomes back to the worksheet. Column 6 holds the
// status, 7 the error text, 8 the screenshot descriptor; the two trailing
// headers are appended on first use. Cell writes are independent remote
// calls, so a mid-report failure leaves earlier writes in place.

use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::sheets::SheetStore;
use crate::types::{ExecutionResult, TestCase, TestStatus};

const HEADER_ROW: u32 = 3;
const STATUS_COL: u32 = 6;
const ERROR_COL: u32 = 7;
const SCREENSHOT_COL: u32 = 8;
const MAX_ERROR_CHARS: usize = 1000;

pub struct SheetReporter<'a> {
    store: &'a dyn SheetStore,
    worksheet: String,
}

impl<'a> SheetReporter<'a> {
    pub fn new(store: &'a dyn SheetStore, worksheet: impl Into<String>) -> Self {
        Self { store, worksheet: worksheet.into() }
    }

    /// Append the "Error Message" and "Screenshot" headers when the header
    /// row is short or blank at those positions. Safe to run before every
    /// report.
    pub async fn ensure_result_columns(&self) -> Result<()> {
        let header = self.store.row_values(&self.worksheet, HEADER_ROW).await?;
        for (col, label) in [(ERROR_COL, "Error Message"), (SCREENSHOT_COL, "Screenshot")] {
            let current = header
                .get(col as usize - 1)
                .map(|c| c.trim())
                .unwrap_or("");
            if current.is_empty() {
                self.store
                    .update_cell(&self.worksheet, HEADER_ROW, col, label)
                    .await?;
            }
        }
        Ok(())
    }

    /// Write one outcome to the case's row of origin. Returns false when any
    /// write fails or the case carries no `source_row`.
    pub async fn report(&self, case: &TestCase, result: &ExecutionResult) -> bool {
        let Some(row) = case.source_row else {
            warn!(test_id = %case.id, "cannot report a case without a source row");
            return false;
        };

        if let Err(err) = self.ensure_result_columns().await {
            warn!(worksheet = %self.worksheet, error = %err, "column ensure failed");
            return false;
        }

        let error_text = match (result.status, result.error_message.as_deref()) {
            (TestStatus::Pass, _) => String::new(),
            (_, Some(msg)) if !msg.is_empty() => truncate_error(msg),
            _ => String::new(),
        };
        let screenshot_text = result
            .screenshot_path
            .as_deref()
            .map(screenshot_descriptor)
            .unwrap_or_default();

        let writes = [
            (STATUS_COL, result.status.as_str().to_string()),
            (ERROR_COL, error_text),
            (SCREENSHOT_COL, screenshot_text),
        ];
        for (col, value) in writes {
            if let Err(err) = self.store.update_cell(&self.worksheet, row, col, &value).await {
                warn!(
                    test_id = %case.id,
                    row,
                    col,
                    error = %err,
                    "result write failed"
                );
                return false;
            }
        }

        info!(test_id = %case.id, row, status = result.status.as_str(), "result reported");
        true
    }

    /// Report a whole run; returns how many rows were written successfully.
    pub async fn report_batch(
        &self,
        cases: &[TestCase],
        results: &[ExecutionResult],
    ) -> usize {
        let mut written = 0;
        for result in results {
            let Some(case) = cases.iter().find(|c| c.id == result.test_id) else {
                warn!(test_id = %result.test_id, "result without a matching case");
                continue;
            };
            if self.report(case, result).await {
                written += 1;
            }
        }
        written
    }

    /// Blank the three result columns for every case that knows its row.
    /// Returns the number of rows cleared.
    pub async fn clear_results(&self, cases: &[TestCase]) -> Result<usize> {
        let mut cleared = 0;
        for case in cases {
            let Some(row) = case.source_row else { continue };
            for col in [STATUS_COL, ERROR_COL, SCREENSHOT_COL] {
                self.store.update_cell(&self.worksheet, row, col, "").await?;
            }
            cleared += 1;
        }
        info!(worksheet = %self.worksheet, cleared, "results cleared");
        Ok(cleared)
    }
}

fn truncate_error(msg: &str) -> String {
    if msg.chars().count() <= MAX_ERROR_CHARS {
        return msg.to_string();
    }
    let mut out: String = msg.chars().take(MAX_ERROR_CHARS).collect();
    out.push_str("... (truncated)");
    out
}

/// "relative/path.png (12 KB)", or just the file name when the size lookup
/// fails. A descriptor must always render; reporting can't fail over a
/// missing screenshot file.
fn screenshot_descriptor(path: &str) -> String {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let kb = (meta.len() as f64 / 1024.0).round() as u64;
            format!("{} ({} KB)", relative_to_cwd(path), kb)
        }
        Err(_) => Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string()),
    }
}

fn relative_to_cwd(path: &str) -> String {
    let p = Path::new(path);
    std::env::current_dir()
        .ok()
        .and_then(|cwd| p.strip_prefix(&cwd).ok())
        .map(|rel| rel.display().to_string())
        .unwrap_or_else(|| path.to_string())
}
