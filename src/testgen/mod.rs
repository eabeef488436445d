// src/testgen/mod.rs

pub mod engine;
pub mod estimate;
pub mod parse;

pub use engine::{TestCaseGenerator, BATCH_SIZE, MULTI_BATCH_THRESHOLD};
pub use estimate::{estimate_required_test_cases, heuristic_estimate};
