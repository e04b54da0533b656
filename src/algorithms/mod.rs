//! Building blocks of the restarted Krylov eigensolver.
//!
//! ** NOTE: We recommend using the high-level [`crate::solvers::EigenSolver`] instead. These
//! modules are intended for use cases where fine-grained control over the recurrence,
//! the reorthogonalization strategy or the restart is required.
//!
//! The modules are listed leaf first:
//!
//! - [`orthog`]: classical Gram-Schmidt kernels with optional refinement.
//! - [`basis`]: the Basis Store (basis, coefficient matrix, residual).
//! - [`reorthog`]: one reorthogonalization policy per strategy.
//! - [`layers`]: decorator chain wrapped around every operator application.
//! - [`recurrence`]: the Recurrence Engine extending a decomposition step by step.
//! - [`projected`]: the projected (small, dense) eigenproblem.
//! - [`convergence`]: residual bounds, classification and ordering of Ritz pairs.
//! - [`start`]: initial and restart vectors.
//! - [`monitor`]: per-iteration observers and the cooperative stopping predicate.
//! - [`restart`]: the Restart/Deflation Controller driving the outer loop.

pub mod basis;
pub mod convergence;
pub mod layers;
pub mod monitor;
pub mod orthog;
pub mod projected;
pub mod recurrence;
pub mod reorthog;
pub mod restart;
pub mod start;
