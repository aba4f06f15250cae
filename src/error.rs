use thiserror::Error;

/// Request-shape failures raised before any aggregation runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComparisonError {
    #[error("unknown quarter code: {0:?} (expected Q1-Q4)")]
    UnknownQuarter(String),

    #[error("unknown month selector: {0:?}")]
    UnknownMonth(String),

    #[error("comparison request must name at least one client")]
    EmptyClients,
}

pub type Result<T> = std::result::Result<T, ComparisonError>;
