//! CasePilot library
//!
//! BRD-driven UI test automation: synthesize test cases with a language
//! model, drive them through Chrome, report results to Google Sheets.

pub mod classify;
pub mod codegen;
pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod lookup;
pub mod pipeline;
pub mod server;
pub mod sheets;
pub mod testgen;
pub mod types;
