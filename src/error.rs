//! Error types for the vecnode library.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side is
//! the [`VecnodeError`] enum. The variants mirror the status codes a node
//! reports to its clients, so a caller can map an error straight to a wire
//! status with [`VecnodeError::code`].
//!
//! # Examples
//!
//! ```
//! use vecnode::error::{Result, VecnodeError};
//!
//! fn check_offset(offset: i64) -> Result<()> {
//!     if offset < 0 {
//!         return Err(VecnodeError::parameter_invalid(format!(
//!             "offset {offset} is invalid, should be gte than 0"
//!         )));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_offset(-1).is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for vecnode operations.
#[derive(Error, Debug)]
pub enum VecnodeError {
    /// Malformed filter, out-of-range pagination, metric mismatch and the like.
    #[error("Parameter invalid: {0}")]
    ParameterInvalid(String),

    /// A required request parameter is absent.
    #[error("Parameter missing: {0}")]
    ParameterMissing(String),

    /// A referenced field does not exist in the schema.
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// The collection is unknown to the schema store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// The schema lacks something the operation requires (e.g. a primary key).
    #[error("Collection illegal schema: {0}")]
    CollectionIllegalSchema(String),

    /// No index is built on the field being searched.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// The index carries no metric type.
    #[error("Metric not found: {0}")]
    MetricNotFound(String),

    /// Internal invariant violation or malformed engine output.
    #[error("Service internal: {0}")]
    ServiceInternal(String),

    /// Opaque failure reported by the execution engine.
    #[error("Segcore error: {0}")]
    SegcoreErr(String),

    /// I/O errors (config and snapshot files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary plan encoding errors
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with VecnodeError.
pub type Result<T> = std::result::Result<T, VecnodeError>;

impl VecnodeError {
    /// Create a new parameter-invalid error.
    pub fn parameter_invalid<S: Into<String>>(msg: S) -> Self {
        VecnodeError::ParameterInvalid(msg.into())
    }

    /// Create a new parameter-missing error.
    pub fn parameter_missing<S: Into<String>>(msg: S) -> Self {
        VecnodeError::ParameterMissing(msg.into())
    }

    /// Create a new field-not-found error.
    pub fn field_not_found<S: Into<String>>(msg: S) -> Self {
        VecnodeError::FieldNotFound(msg.into())
    }

    /// Create a new collection-not-found error.
    pub fn collection_not_found<S: Into<String>>(msg: S) -> Self {
        VecnodeError::CollectionNotFound(msg.into())
    }

    /// Create a new illegal-schema error.
    pub fn illegal_schema<S: Into<String>>(msg: S) -> Self {
        VecnodeError::CollectionIllegalSchema(msg.into())
    }

    /// Create a new index-not-found error.
    pub fn index_not_found<S: Into<String>>(msg: S) -> Self {
        VecnodeError::IndexNotFound(msg.into())
    }

    /// Create a new metric-not-found error.
    pub fn metric_not_found<S: Into<String>>(msg: S) -> Self {
        VecnodeError::MetricNotFound(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        VecnodeError::ServiceInternal(msg.into())
    }

    /// Create a new engine error.
    pub fn segcore<S: Into<String>>(msg: S) -> Self {
        VecnodeError::SegcoreErr(msg.into())
    }

    /// Numeric status code reported to clients.
    pub fn code(&self) -> i32 {
        match self {
            VecnodeError::ServiceInternal(_)
            | VecnodeError::Io(_)
            | VecnodeError::Json(_)
            | VecnodeError::Bincode(_)
            | VecnodeError::Anyhow(_) => 5,
            VecnodeError::CollectionNotFound(_) => 100,
            VecnodeError::CollectionIllegalSchema(_) => 105,
            VecnodeError::IndexNotFound(_) => 700,
            VecnodeError::ParameterInvalid(_) => 1100,
            VecnodeError::ParameterMissing(_) => 1101,
            VecnodeError::MetricNotFound(_) => 1200,
            VecnodeError::FieldNotFound(_) => 1700,
            VecnodeError::SegcoreErr(_) => 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = VecnodeError::parameter_invalid("topk is 0");
        assert_eq!(error.to_string(), "Parameter invalid: topk is 0");

        let error = VecnodeError::field_not_found("age");
        assert_eq!(error.to_string(), "Field not found: age");

        let error = VecnodeError::illegal_schema("no primary key");
        assert_eq!(error.to_string(), "Collection illegal schema: no primary key");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(VecnodeError::parameter_invalid("x").code(), 1100);
        assert_eq!(VecnodeError::index_not_found("x").code(), 700);
        assert_eq!(VecnodeError::segcore("x").code(), 2000);
        assert_eq!(VecnodeError::internal("x").code(), 5);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = VecnodeError::from(io_error);

        match error {
            VecnodeError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }
}
