//! Error types for the BDD core and SAT backend glue.
//!
//! Mirrors the teacher's preference for typed, derive-based errors (it hand-rolled
//! `DataFormatError` for its parser); here everything goes through `thiserror` instead.

use thiserror::Error;

/// Errors raised by builder operations themselves (as opposed to the backend, see
/// [BackendError](crate::backend::BackendError)).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuilderError {
    #[error("pseudo-boolean bounds are invalid: lower bound {lower} is greater than upper bound {upper}")]
    InvalidBounds { lower: i64, upper: i64 },

    #[error("a clause literal was 0, which is not a valid signed literal")]
    ZeroLiteral,

    #[error("BDD handle does not belong to this builder (node id {0:?} unknown)")]
    ForeignHandle(u32),
}

/// Distinct failure mode for a full solve: the formula was proven unsatisfiable, either because
/// the BDD root reduced to `false` before reaching the SAT backend, or because the backend
/// itself reported UNSAT.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolveError {
    #[error("formula is unsatisfiable")]
    Unsatisfiable,

    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error("SAT backend failed: {0}")]
    Backend(String),
}
