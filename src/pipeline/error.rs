//! Error types for the CLTV pipeline.
//!
//! Errors fall into three groups: schema errors (the input table does not have
//! the expected shape), data errors (values that make a stage undefined) and
//! numerical errors (model fitting that fails to produce usable parameters).
//! All of them are fatal for a run.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, CltvError>;

/// Errors that can occur while estimating customer lifetime value.
#[derive(Error, Debug)]
pub enum CltvError {
    /// A required input column is absent.
    #[error("missing required column '{column}'")]
    MissingColumn { column: String },

    /// An input column exists but cannot be read with the expected type.
    #[error("column '{column}' is malformed: {message}")]
    InvalidColumn { column: String, message: String },

    /// A single value is unusable (negative, null, non-finite, unparseable).
    #[error("invalid value in '{column}' for customer '{customer_id}': {message}")]
    InvalidValue {
        column: String,
        customer_id: String,
        message: String,
    },

    /// A customer's last purchase precedes the first one.
    #[error("customer '{customer_id}' has last purchase {last} before first purchase {first}")]
    NonChronological {
        customer_id: String,
        first: String,
        last: String,
    },

    /// Not enough rows for the operation.
    #[error("insufficient data for {stage}: need at least {needed}, got {got}")]
    InsufficientData {
        stage: &'static str,
        needed: usize,
        got: usize,
    },

    /// Quantile segmentation cannot form the requested number of groups.
    #[error("cannot form {buckets} segments: only {distinct} distinct CLTV value(s)")]
    DegenerateSegments { buckets: usize, distinct: usize },

    /// Optimizer stopped without meeting its convergence criterion.
    #[error("{stage}: optimizer did not converge after {iterations} iterations")]
    NotConverged {
        stage: &'static str,
        iterations: usize,
    },

    /// Fitting produced parameters that cannot be used.
    #[error("{stage}: {message}")]
    Numerical { stage: &'static str, message: String },

    /// Configuration value outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure reported by the dataframe layer.
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

impl CltvError {
    pub(crate) fn invalid_value(
        column: &str,
        customer_id: &str,
        message: impl Into<String>,
    ) -> Self {
        CltvError::InvalidValue {
            column: column.to_string(),
            customer_id: customer_id.to_string(),
            message: message.into(),
        }
    }

    /// True for errors caused by the shape of the input table.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            CltvError::MissingColumn { .. } | CltvError::InvalidColumn { .. }
        )
    }

    /// True for errors raised by model fitting.
    pub fn is_numerical_error(&self) -> bool {
        matches!(
            self,
            CltvError::NotConverged { .. } | CltvError::Numerical { .. }
        )
    }
}
