//! Error types for tube cutting runs.

use crate::types::MaterialKey;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Input that cannot be trusted. Any of these aborts the whole run.
///
/// Rows are 1-based positions in the input sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("row {row}: required length must be positive, got {length}")]
    NonPositiveLength { row: usize, length: i64 },

    #[error("row {row}: standard tube length must be positive, got {length}")]
    NonPositiveStockLength { row: usize, length: i64 },

    #[error("row {row}: demand must be positive, got {demand}")]
    NonPositiveDemand { row: usize, demand: i64 },

    #[error("row {row}: demand {demand} is too large")]
    DemandTooLarge { row: usize, demand: i64 },

    #[error("row {row}: required length {required} mm exceeds standard tube length {stock} mm")]
    LengthExceedsStock { row: usize, required: i64, stock: i64 },

    #[error("row {row}: {key} needs more than {limit} pieces")]
    TooManyPieces {
        row: usize,
        key: MaterialKey,
        limit: u64,
    },

    #[error("row {row}: total cut length for {key} is too large")]
    GroupLengthOverflow { row: usize, key: MaterialKey },

    #[error(
        "row {row}: standard tube length {found} mm differs from {expected} mm already given for {key}"
    )]
    InconsistentStockLength {
        row: usize,
        key: MaterialKey,
        expected: i64,
        found: i64,
    },
}

/// Why a material group produced no plan.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("constraint system is infeasible")]
    Infeasible,

    #[error("time limit reached before any feasible plan was found")]
    Timeout,

    #[error("search returned an invalid assignment: {0}")]
    InvalidAssignment(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no feasible solution found for {key}")]
    GroupInfeasible { key: MaterialKey },

    #[error("no solution found within the time limit for {key}")]
    GroupTimeout { key: MaterialKey },

    #[error("no feasible solutions found for any group ({failed} failed)")]
    EmptyResult { failed: usize },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// The error a caller sees for a skipped group.
    pub fn for_group(key: MaterialKey, reason: &FailureReason) -> Self {
        match reason {
            FailureReason::Timeout => Self::GroupTimeout { key },
            FailureReason::Infeasible | FailureReason::InvalidAssignment(_) => {
                Self::GroupInfeasible { key }
            }
        }
    }
}
