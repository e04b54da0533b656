//! Restarted Krylov-subspace eigensolvers for large symmetric operators.
//!
//! This crate computes a few eigenpairs of a real symmetric operator `A` that is only
//! available through its action on vectors. A Lanczos-type recurrence grows an
//! orthonormal basis `V` of a Krylov subspace together with the small projected matrix
//! `H = V^T A V`; the eigenpairs of `H` (Ritz pairs) approximate those of `A`. When the
//! basis is full it is compressed around the wanted Ritz vectors and the recurrence
//! continues, locking eigenpairs as they converge.
//!
//! Built on the [`faer`] linear algebra framework, the operator can be a dense or sparse
//! [`faer`] matrix, or any closure implementing [`matrix::LinearOperator`].
//!
//! ## Reorthogonalization
//!
//! In finite precision the basis produced by the three-term recurrence slowly loses
//! orthogonality. The strategy used to control this loss is selected once per solve:
//!
//! - **Local**: only the two previous vectors. Cheapest; duplicate Ritz values are
//!   filtered out afterwards.
//! - **Full**: every vector, two Gram-Schmidt passes.
//! - **Selective**: against nearly converged Ritz vectors only.
//! - **Partial / Periodic**: an estimate of the lost orthogonality decides when, and
//!   against which vectors, to reorthogonalize.
//! - **Delayed**: the second Gram-Schmidt pass and the normalization of each vector are
//!   postponed to the next step.
//!
//! ## Restart
//!
//! The default thick restart (Krylov-Schur) keeps the converged Ritz vectors and a share
//! of the best unconverged ones; the explicit restart continues from a single Ritz vector.
//!
//! ## Example Usage
//!
//! ```rust
//! use faer::Mat;
//! use krylov_eigs::{EigenSolver, SolverConfig, algorithms::convergence::SelectionCriterion};
//!
//! // diag(1, 2, ..., 50)
//! let a = Mat::from_fn(50, 50, |i, j| if i == j { (i + 1) as f64 } else { 0.0 });
//!
//! let config = SolverConfig::new(3)
//!     .with_ncv(12)
//!     .with_tol(1e-10)
//!     .with_which(SelectionCriterion::LargestReal);
//! let solution = EigenSolver::new(config).solve(&a).unwrap();
//!
//! assert!(solution.is_converged());
//! assert!((solution.eigenvalues[0] - 50.0).abs() < 1e-8);
//! assert!(solution.residual_norm(0) < 1e-6);
//! ```

// Declare the modules that form the crate's API structure.
pub mod algorithms;
pub mod config;
pub mod error;
pub mod matrix;
pub mod solvers;
pub mod utils;

// Re-export the main API for convenient access.
pub use config::SolverConfig;
pub use error::{EigenError, EigenErrorKind};
pub use matrix::LinearOperator;
pub use solvers::{ConvergedReason, EigenSolution, EigenSolver};
