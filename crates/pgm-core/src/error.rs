//! Error taxonomy shared by every power grid dataset crate.
//!
//! All errors are fatal to the call that raised them; nothing in this layer
//! retries. Dataset shape violations are raised before any data reaches a
//! calculation engine, numerical failures are surfaced from the engine as-is.
//!
//! # Example
//!
//! ```
//! use pgm_core::{PgmError, PgmResult};
//!
//! fn lookup(id: i32) -> PgmResult<usize> {
//!     Err(PgmError::IdNotFound { id })
//! }
//!
//! let err = lookup(5).unwrap_err();
//! assert!(err.to_string().contains("The id cannot be found"));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for dataset, model and engine operations.
#[derive(Error, Debug)]
pub enum PgmError {
    /// Malformed call parameters
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Missing case for enum {enum_name}: {value}")]
    MissingCaseForEnum { enum_name: String, value: String },

    #[error("Conflicting voltage for line {line_id}: u1 = {u1}, u2 = {u2}")]
    ConflictVoltage { line_id: i32, u1: f64, u2: f64 },

    #[error("Branch {branch_id} has the same from- and to-node {node_id}")]
    InvalidBranch { branch_id: i32, node_id: i32 },

    #[error("Branch3 {branch3_id} is connected to the same node at least twice: {nodes:?}")]
    InvalidBranch3 { branch3_id: i32, nodes: [i32; 3] },

    #[error("Invalid clock for transformer {id}: {clock}")]
    InvalidTransformerClock { id: i32, clock: i32 },

    #[error("Sparse matrix error: {0}")]
    SparseMatrix(String),

    #[error("Not enough measurements available for state estimation: {0}")]
    NotObservable(String),

    #[error("Iteration failed to converge after {iterations} iterations! Max deviation: {max_deviation}, error tolerance: {tolerance}")]
    IterationDiverge {
        iterations: usize,
        max_deviation: f64,
        tolerance: f64,
    },

    #[error("Maximum number of iterations reached: {0}")]
    MaxIterationReached(String),

    #[error("The id cannot be found: {id}")]
    IdNotFound { id: i32 },

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Conflicting id detected: {id}")]
    ConflictId { id: i32 },

    #[error("Invalid measured object {object}: {reason}")]
    InvalidMeasuredObject { object: String, reason: String },

    #[error("Invalid regulated object {object}: {reason}")]
    InvalidRegulatedObject { object: String, reason: String },

    #[error("Wrong type for object with id {id}: expected {expected}, found {actual}")]
    IdWrongType {
        id: i32,
        expected: String,
        actual: String,
    },

    #[error("The calculation method is invalid for this calculation!")]
    InvalidCalculationMethod,

    #[error("Automatic tap changing calculation failed: {0}")]
    AutomaticTapCalculation(String),

    #[error("Automatic tap changer has invalid input: {0}")]
    AutomaticTapInput(String),

    #[error("Invalid short circuit phase or type: {0}")]
    InvalidShortCircuitPhaseOrType(String),

    /// Native mirror conversion failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Dataset shape violation
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Aggregated per-scenario failures of a batch calculation
    #[error("{0}")]
    Batch(BatchError),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Unreachable code hit: {0}")]
    UnreachableHit(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Results using PgmError.
pub type PgmResult<T> = Result<T, PgmError>;

impl PgmError {
    /// Shorthand for [`PgmError::Dataset`].
    pub fn dataset(message: impl Into<String>) -> Self {
        PgmError::Dataset(message.into())
    }

    /// Shorthand for [`PgmError::InvalidArguments`].
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        PgmError::InvalidArguments(message.into())
    }

    /// Shorthand for [`PgmError::Serialization`].
    pub fn serialization(message: impl Into<String>) -> Self {
        PgmError::Serialization(message.into())
    }

    /// Conflicting ids are a specialization of invalid ids.
    pub fn is_invalid_id(&self) -> bool {
        matches!(self, PgmError::InvalidId(_) | PgmError::ConflictId { .. })
    }

    /// Short category label used in logs and CLI output.
    pub fn category(&self) -> &'static str {
        match self {
            PgmError::InvalidArguments(_)
            | PgmError::MissingCaseForEnum { .. }
            | PgmError::InvalidCalculationMethod
            | PgmError::InvalidShortCircuitPhaseOrType(_) => "arguments",
            PgmError::IdNotFound { .. }
            | PgmError::InvalidId(_)
            | PgmError::ConflictId { .. }
            | PgmError::IdWrongType { .. }
            | PgmError::InvalidMeasuredObject { .. }
            | PgmError::InvalidRegulatedObject { .. } => "id",
            PgmError::ConflictVoltage { .. }
            | PgmError::InvalidBranch { .. }
            | PgmError::InvalidBranch3 { .. }
            | PgmError::InvalidTransformerClock { .. } => "topology",
            PgmError::SparseMatrix(_)
            | PgmError::NotObservable(_)
            | PgmError::IterationDiverge { .. }
            | PgmError::MaxIterationReached(_)
            | PgmError::AutomaticTapCalculation(_)
            | PgmError::AutomaticTapInput(_) => "solver",
            PgmError::Serialization(_) => "serialization",
            PgmError::Dataset(_) => "dataset",
            PgmError::Batch(_) => "batch",
            PgmError::NotImplemented(_) | PgmError::UnreachableHit(_) => "defect",
            PgmError::Io(_) => "io",
            PgmError::Config(_) => "config",
        }
    }
}

/// Outcome of a batch calculation that continued past failing scenarios.
///
/// `error_messages[k]` belongs to `failed_scenarios[k]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    pub failed_scenarios: Vec<usize>,
    pub succeeded_scenarios: Vec<usize>,
    pub error_messages: Vec<String>,
}

impl BatchError {
    pub fn is_empty(&self) -> bool {
        self.failed_scenarios.is_empty()
    }
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "There are errors in the batch calculation: {} of {} scenarios failed.",
            self.failed_scenarios.len(),
            self.failed_scenarios.len() + self.succeeded_scenarios.len()
        )?;
        for (scenario, message) in self.failed_scenarios.iter().zip(&self.error_messages) {
            write!(f, "\n  scenario {scenario}: {message}")?;
        }
        Ok(())
    }
}

impl From<BatchError> for PgmError {
    fn from(err: BatchError) -> Self {
        PgmError::Batch(err)
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for PgmError {
    fn from(err: anyhow::Error) -> Self {
        PgmError::Config(err.to_string())
    }
}

// JSON errors only come from the native mirror and the registry document
impl From<serde_json::Error> for PgmError {
    fn from(err: serde_json::Error) -> Self {
        PgmError::Serialization(err.to_string())
    }
}
