// src/sheets/mod.rs

pub mod google;
pub mod reader;
pub mod reporter;

pub use google::GoogleSheetsStore;
pub use reader::{list_worksheets, read_test_cases};
pub use reporter::SheetReporter;

use async_trait::async_trait;

use crate::error::Result;

/// Worksheet-level access to a spreadsheet backend. Rows and columns are
/// 1-indexed to match the remote API's A1 addressing.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Worksheet titles in sheet order.
    async fn list_worksheets(&self) -> Result<Vec<String>>;

    /// Every populated row of a worksheet. Fails if the worksheet does not
    /// exist.
    async fn worksheet_rows(&self, worksheet: &str) -> Result<Vec<Vec<String>>>;

    /// Values of one row (empty vec when the row is blank).
    async fn row_values(&self, worksheet: &str, row: u32) -> Result<Vec<String>>;

    /// Values of one column, top to bottom, up to the last populated cell.
    async fn col_values(&self, worksheet: &str, col: u32) -> Result<Vec<String>>;

    /// Overwrite a single cell.
    async fn update_cell(&self, worksheet: &str, row: u32, col: u32, value: &str) -> Result<()>;
}

/// Column number to A1 letter(s): 1 -> A, 27 -> AA.
pub(crate) fn col_letter(mut col: u32) -> String {
    let mut out = String::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        out.insert(0, (b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    out
}

#[cfg(test)]
pub(crate) mod mem {
    use std::sync::Mutex;

    use super::*;
    use crate::error::Error;

    /// In-memory store for tests. Worksheets keep insertion order.
    pub struct MemSheet {
        sheets: Mutex<Vec<(String, Vec<Vec<String>>)>>,
    }

    impl MemSheet {
        pub fn new(sheets: Vec<(&str, Vec<Vec<&str>>)>) -> Self {
            let sheets = sheets
                .into_iter()
                .map(|(name, rows)| {
                    let rows = rows
                        .into_iter()
                        .map(|r| r.into_iter().map(str::to_string).collect())
                        .collect();
                    (name.to_string(), rows)
                })
                .collect();
            Self { sheets: Mutex::new(sheets) }
        }

        pub fn cell(&self, worksheet: &str, row: u32, col: u32) -> Option<String> {
            let sheets = self.sheets.lock().unwrap();
            let (_, rows) = sheets.iter().find(|(n, _)| n == worksheet)?;
            rows.get(row as usize - 1)
                .and_then(|r| r.get(col as usize - 1))
                .cloned()
        }

        fn with_rows<T>(
            &self,
            worksheet: &str,
            f: impl FnOnce(&Vec<Vec<String>>) -> T,
        ) -> Result<T> {
            let sheets = self.sheets.lock().unwrap();
            sheets
                .iter()
                .find(|(n, _)| n == worksheet)
                .map(|(_, rows)| f(rows))
                .ok_or_else(|| Error::source_connection(format!("worksheet '{worksheet}' not found")))
        }
    }

    #[async_trait]
    impl SheetStore for MemSheet {
        async fn list_worksheets(&self) -> Result<Vec<String>> {
            let sheets = self.sheets.lock().unwrap();
            Ok(sheets.iter().map(|(n, _)| n.clone()).collect())
        }

        async fn worksheet_rows(&self, worksheet: &str) -> Result<Vec<Vec<String>>> {
            self.with_rows(worksheet, |rows| rows.clone())
        }

        async fn row_values(&self, worksheet: &str, row: u32) -> Result<Vec<String>> {
            self.with_rows(worksheet, |rows| {
                rows.get(row as usize - 1).cloned().unwrap_or_default()
            })
        }

        async fn col_values(&self, worksheet: &str, col: u32) -> Result<Vec<String>> {
            self.with_rows(worksheet, |rows| {
                let idx = col as usize - 1;
                let mut out: Vec<String> = rows
                    .iter()
                    .map(|r| r.get(idx).cloned().unwrap_or_default())
                    .collect();
                while out.last().is_some_and(|c| c.is_empty()) {
                    out.pop();
                }
                out
            })
        }

        async fn update_cell(
            &self,
            worksheet: &str,
            row: u32,
            col: u32,
            value: &str,
        ) -> Result<()> {
            let mut sheets = self.sheets.lock().unwrap();
            let rows = sheets
                .iter_mut()
                .find(|(n, _)| n == worksheet)
                .map(|(_, rows)| rows)
                .ok_or_else(|| {
                    Error::source_connection(format!("worksheet '{worksheet}' not found"))
                })?;

            let (r, c) = (row as usize - 1, col as usize - 1);
            while rows.len() <= r {
                rows.push(Vec::new());
            }
            while rows[r].len() <= c {
                rows[r].push(String::new());
            }
            rows[r][c] = value.to_string();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn col_letters() {
        assert_eq!(col_letter(1), "A");
        assert_eq!(col_letter(6), "F");
        assert_eq!(col_letter(8), "H");
        assert_eq!(col_letter(26), "Z");
        assert_eq!(col_letter(27), "AA");
        assert_eq!(col_letter(52), "AZ");
    }

    #[tokio::test]
    async fn mem_sheet_grows_on_update() {
        let sheet = mem::MemSheet::new(vec![("S", vec![vec!["a"]])]);
        sheet.update_cell("S", 3, 4, "x").await.unwrap();
        assert_eq!(sheet.cell("S", 3, 4).as_deref(), Some("x"));
        assert_eq!(sheet.cell("S", 1, 1).as_deref(), Some("a"));

        let col = sheet.col_values("S", 4).await.unwrap();
        assert_eq!(col, vec!["", "", "x"]);
    }

    #[tokio::test]
    async fn mem_sheet_unknown_worksheet_fails() {
        let sheet = mem::MemSheet::new(vec![]);
        assert!(sheet.worksheet_rows("nope").await.is_err());
    }
}
