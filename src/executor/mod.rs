// src/executor/mod.rs

pub mod browser;
pub mod login;
pub mod run;
pub mod script;

pub use browser::BrowserSession;
pub use run::{ExecutionEngine, EXECUTION_TIMEOUT};
