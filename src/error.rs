// src/error.rs

use thiserror::Error;

/// Failure classes of the pipeline. Each maps to one recovery policy:
/// config load degrades to empty tables, source and model failures are
/// fatal to their calling operation, automation failures stay inside the
/// single-test boundary, report failures surface as a boolean.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config load failed: {0}")]
    ConfigLoad(String),

    #[error("source connection failed: {0}")]
    SourceConnection(String),

    #[error("model service failed: {0}")]
    ModelService(String),

    #[error("automation failed: {0}")]
    Automation(String),

    #[error("report write failed: {0}")]
    ReportWrite(String),
}

impl Error {
    pub fn source_connection(msg: impl Into<String>) -> Self {
        Error::SourceConnection(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Error::ModelService(msg.into())
    }

    pub fn automation(msg: impl Into<String>) -> Self {
        Error::Automation(msg.into())
    }

    pub fn report(msg: impl Into<String>) -> Self {
        Error::ReportWrite(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
