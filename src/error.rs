use thiserror::Error;

use crate::models::StudentId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("student not found: {0}")]
    StudentNotFound(StudentId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid SAGEREPORT_* setting: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("SAGEREPORT_LATENCY_MAX_MS ({max}ms) must not be below SAGEREPORT_LATENCY_MIN_MS ({min}ms)")]
    LatencyWindow { min: u64, max: u64 },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read student CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: student name must not be empty")]
    MissingName { row: usize },
}
