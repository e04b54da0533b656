//! This module defines the custom error types for the library.
//!
//! Every fatal condition that can arise while setting up or running a restarted
//! Krylov eigensolver is collected in a single enum, [`EigenErrorKind`], wrapped by
//! the public [`EigenError`] type.
//!
//! Conditions that are *not* fatal (iteration limit reached, unrecoverable breakdown,
//! caller-requested stop) are not errors: they are reported through
//! [`crate::solvers::ConvergedReason`] together with whatever eigenpairs converged.
//!
//! Using the [`thiserror`] crate allows us to create idiomatic error types with minimal
//! boilerplate. Note that [`faer::linalg::evd::EvdError`] does not implement the standard
//! [`std::error::Error`] trait, so we wrap it manually to provide a compatible error type.
use thiserror::Error;

/// Represents all possible errors that can occur during an eigensolve.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct EigenError(#[from] EigenErrorKind);

impl EigenError {
    /// Returns the kind of failure, for callers that need to branch on it.
    pub fn kind(&self) -> &EigenErrorKind {
        &self.0
    }
}

/// The distinct kinds of errors.
#[derive(Error, Debug, PartialEq)]
pub enum EigenErrorKind {
    /// An attempt was made to append a column to a basis that is already full.
    #[error("Basis capacity exceeded: cannot store more than {capacity} vectors.")]
    CapacityExceeded { capacity: usize },

    /// The dimensions of the operator and a vector are incompatible.
    #[error(
        "Dimension mismatch: operator has {operator_cols} columns but vector has {vector_rows} rows."
    )]
    DimensionMismatch {
        operator_cols: usize,
        vector_rows: usize,
    },

    /// An invalid input parameter was provided.
    #[error("Invalid input parameter: {0}")]
    InputError(String),

    /// The requested configuration cannot be handled by this solver.
    #[error("Unsupported configuration: {0}")]
    Unsupported(String),

    /// Wraps an error originating from [`faer`]'s eigendecomposition module.
    #[error("A numerical error occurred during the projected eigendecomposition: {0:?}")]
    EvdError(faer::linalg::evd::EvdError),

    /// The projected eigendecomposition produced NaN or infinite values.
    #[error("The projected eigenproblem of order {order} produced non-finite values.")]
    NonFiniteProjection { order: usize },

    /// The caller-supplied operator failed while being applied.
    #[error("Operator application failed: {0}")]
    OperatorError(String),
}

// Manually implement PartialEq for the public error type.
// We compare the inner `EigenErrorKind`.
impl PartialEq for EigenError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl EigenError {
    pub(crate) fn input(message: impl Into<String>) -> Self {
        EigenErrorKind::InputError(message.into()).into()
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        EigenErrorKind::Unsupported(message.into()).into()
    }
}

// Unit tests to ensure error messages are formatted correctly.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_error_message() {
        let error = EigenError(EigenErrorKind::CapacityExceeded { capacity: 6 });
        assert_eq!(
            error.to_string(),
            "Basis capacity exceeded: cannot store more than 6 vectors."
        );
    }

    #[test]
    fn test_dimension_mismatch_error_message() {
        let error = EigenError(EigenErrorKind::DimensionMismatch {
            operator_cols: 100,
            vector_rows: 99,
        });
        let expected_message =
            "Dimension mismatch: operator has 100 columns but vector has 99 rows.";
        assert_eq!(error.to_string(), expected_message);
    }

    #[test]
    fn test_input_error_message() {
        let error = EigenError::input("The value of ncv must be at least nev.");
        let expected_message = "Invalid input parameter: The value of ncv must be at least nev.";
        assert_eq!(error.to_string(), expected_message);
        assert!(matches!(error.kind(), EigenErrorKind::InputError(_)));
    }

    #[test]
    fn test_evd_error_message() {
        let evd_error = faer::linalg::evd::EvdError::NoConvergence;
        let error = EigenError(EigenErrorKind::EvdError(evd_error));
        let expected_message =
            "A numerical error occurred during the projected eigendecomposition: NoConvergence";
        assert_eq!(error.to_string(), expected_message);
    }
}
