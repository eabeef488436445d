// src/sheets/reader.rs
//
// Row protocol: row 1 is the document title, row 2 is blank, row 3 carries
// the headers, rows 4+ are test cases. Only rows whose first cell starts
// with the configured id prefix are read.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::sheets::SheetStore;
use crate::types::{TestCase, WorksheetInfo};

const EXPECTED_HEADERS: [&str; 5] =
    ["Test ID", "Description", "Steps", "Expected Result", "Priority"];

/// Default empty tab created by Sheets for Vietnamese-locale documents.
const DEFAULT_EMPTY_TAB: &str = "Trang tính1";

/// Read every test case from a worksheet.
pub async fn read_test_cases(
    store: &dyn SheetStore,
    worksheet: &str,
    prefix: &str,
) -> Result<Vec<TestCase>> {
    let rows = store.worksheet_rows(worksheet).await?;
    if rows.len() < 4 {
        return Err(Error::source_connection(format!(
            "worksheet '{worksheet}' has {} rows, expected at least 4 (title, blank, headers, data)",
            rows.len()
        )));
    }

    validate_headers(worksheet, &rows[2]);

    let mut cases = Vec::new();
    for (idx, row) in rows.iter().enumerate().skip(3) {
        let row_number = (idx + 1) as u32;
        let cell = |i: usize| row.get(i).map(|c| c.trim()).unwrap_or("");

        let id = cell(0);
        if id.is_empty() {
            continue;
        }
        if !id.starts_with(prefix) {
            debug!(row = row_number, id, "skipping row without test-id prefix");
            continue;
        }

        let mut case = TestCase::new(id);
        case.description = cell(1).to_string();
        case.steps = cell(2).to_string();
        case.expected_result = cell(3).to_string();
        if !cell(4).is_empty() {
            case.priority = cell(4).to_string();
        }
        case.source_row = Some(row_number);
        cases.push(case);
    }

    info!(worksheet, count = cases.len(), "loaded test cases");
    Ok(cases)
}

/// Header mismatches are logged, never fatal; the row protocol is positional.
fn validate_headers(worksheet: &str, header_row: &[String]) {
    for (i, expected) in EXPECTED_HEADERS.iter().enumerate() {
        let actual = header_row.get(i).map(|c| c.trim()).unwrap_or("");
        if !actual.to_lowercase().contains(&expected.to_lowercase()) {
            warn!(
                worksheet,
                column = i + 1,
                expected,
                actual,
                "unexpected header"
            );
        }
    }
}

/// Worksheets that carry at least one test case, with their counts. The
/// default empty tab and sheets without data rows are filtered out.
pub async fn list_worksheets(
    store: &dyn SheetStore,
    prefix: &str,
) -> Result<Vec<WorksheetInfo>> {
    let titles = store.list_worksheets().await?;
    let mut out = Vec::new();

    for title in titles {
        if title == DEFAULT_EMPTY_TAB {
            continue;
        }

        let (row_count, test_count) = match store.col_values(&title, 1).await {
            Ok(col) => {
                let count = col
                    .iter()
                    .skip(3)
                    .filter(|c| c.trim().starts_with(prefix))
                    .count();
                (col.len(), count)
            }
            Err(err) => {
                warn!(worksheet = %title, error = %err, "column read failed, estimating count");
                let row_count = store
                    .worksheet_rows(&title)
                    .await
                    .map(|r| r.len())
                    .unwrap_or(0);
                (row_count, row_count.saturating_sub(3))
            }
        };

        if row_count <= 3 || test_count == 0 {
            continue;
        }
        out.push(WorksheetInfo { name: title, test_count, row_count, url: None });
    }

    Ok(out)
}
