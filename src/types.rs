// src/types.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/* ---------- test cases ---------- */

/// One UI test case, produced by the sheet reader or the batch generation
/// engine. `source_row` is the 1-indexed worksheet row it came from; records
/// synthesized from raw requirement text have none and cannot be written
/// back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub description: String,
    pub steps: String,
    pub expected_result: String,
    pub priority: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_row: Option<u32>,
    pub status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_ref: Option<String>,
}

impl TestCase {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            steps: String::new(),
            expected_result: String::new(),
            priority: "Medium".to_string(),
            source_row: None,
            status: TestStatus::Pending,
            error_message: None,
            screenshot_ref: None,
        }
    }

    /// Entry-point name every generated artifact for this case must expose.
    pub fn entry_name(&self) -> String {
        format!("test_{}", self.id.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "PENDING")]
    Pending,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Pending => "PENDING",
        }
    }
}

/* ---------- execution results ---------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub test_id: String,
    pub status: TestStatus,
    pub error_message: Option<String>,
    pub screenshot_path: Option<String>,
    pub execution_time_seconds: f64,
}

impl ExecutionResult {
    pub fn pending(test_id: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            status: TestStatus::Pending,
            error_message: None,
            screenshot_path: None,
            execution_time_seconds: 0.0,
        }
    }
}

/* ---------- module tags ---------- */

/// Functional area of the application under test. Derived from test-case
/// text on demand, never stored on the case itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleTag {
    Contract,
    Lead,
    Product,
    Deeplink,
    Report,
    Settings,
    Profile,
}

impl ModuleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleTag::Contract => "contract",
            ModuleTag::Lead => "lead",
            ModuleTag::Product => "product",
            ModuleTag::Deeplink => "deeplink",
            ModuleTag::Report => "report",
            ModuleTag::Settings => "settings",
            ModuleTag::Profile => "profile",
        }
    }
}

/* ---------- batch generation ---------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStat {
    pub display_name: String,
    pub count: usize,
    pub percentage: f64,
}

/// Audit record of a generation run, keyed by batch name. BTreeMap keeps
/// report output in a stable order.
pub type BatchBreakdown = BTreeMap<String, BatchStat>;

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub success: bool,
    pub records: Vec<TestCase>,
    pub error: Option<String>,
    pub breakdown: Option<BatchBreakdown>,
}

/* ---------- worksheets ---------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorksheetInfo {
    pub name: String,
    pub test_count: usize,
    pub row_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_name_lowercases_id() {
        let case = TestCase::new("TC007");
        assert_eq!(case.entry_name(), "test_tc007");
    }

    #[test]
    fn status_serializes_uppercase() {
        let s = serde_json::to_string(&TestStatus::Pass).unwrap();
        assert_eq!(s, "\"PASS\"");
        let s = serde_json::to_string(&TestStatus::Pending).unwrap();
        assert_eq!(s, "\"PENDING\"");
    }

    #[test]
    fn new_case_defaults() {
        let case = TestCase::new("TC001");
        assert_eq!(case.priority, "Medium");
        assert_eq!(case.status, TestStatus::Pending);
        assert!(case.source_row.is_none());
    }
}
