//! Reorthogonalization policies.
//!
//! A policy decides how the image `A v_j` of the newest basis vector is made orthogonal
//! to the basis. One implementation exists per strategy, each owning its private scratch
//! state, allocated once per solve by [`build_policy`]:
//!
//! - [`LocalPolicy`]: only the previous two vectors (three-term recurrence).
//! - [`FullPolicy`]: every vector, two Gram-Schmidt passes.
//! - [`SelectivePolicy`]: additionally against nearly converged Ritz vectors.
//! - [`PartialPolicy`]: omega recurrence estimating the loss of orthogonality; restricted
//!   (partial) or complete (periodic) reorthogonalization when it crosses a threshold.
//! - [`DelayedPolicy`]: the correction of each vector is postponed to the next step and
//!   merged with its projections.
//!
//! Before a policy runs, the engine has already removed the deflation space from `A v_j`.

mod delayed;
mod full;
mod local;
mod partial;
mod selective;

pub use delayed::DelayedPolicy;
pub use full::FullPolicy;
pub use local::LocalPolicy;
pub use partial::PartialPolicy;
pub use selective::SelectivePolicy;

use super::{
    basis::{CoefficientLayout, CoefficientMatrix, KrylovBasis},
    orthog::{ColumnSet, Refinement},
};
use crate::error::EigenError;
use faer::Mat;
use std::fmt;

/// The available reorthogonalization strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReorthogStrategy {
    #[default]
    Local,
    Full,
    Selective,
    Periodic,
    Partial,
    Delayed,
}

impl ReorthogStrategy {
    pub const ALL: [ReorthogStrategy; 6] = [
        Self::Local,
        Self::Full,
        Self::Selective,
        Self::Periodic,
        Self::Partial,
        Self::Delayed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Full => "full",
            Self::Selective => "selective",
            Self::Periodic => "periodic",
            Self::Partial => "partial",
            Self::Delayed => "delayed",
        }
    }
}

impl fmt::Display for ReorthogStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReorthogStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown reorthogonalization strategy '{s}'"))
    }
}

/// Everything a policy may read or modify during one step.
pub struct StepContext<'a> {
    /// The basis; column `j` is the vector whose image is in `f`.
    pub basis: &'a mut KrylovBasis,
    pub coeffs: &'a mut CoefficientMatrix,
    /// Index of the column whose image is being orthogonalized.
    pub j: usize,
    /// First column generated in the current run (after the last restart).
    pub run_start: usize,
    /// On entry `A v_j`; on exit the unnormalized residual.
    pub f: &'a mut Mat<f64>,
    /// Projection coefficients, indexed by absolute column, zeroed on entry.
    pub projections: &'a mut [f64],
    /// Running estimate of the operator norm; policies may raise it.
    pub anorm: &'a mut f64,
    pub refinement: Refinement,
}

/// What a step produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Norm of the residual, the next subdiagonal entry.
    pub norm: f64,
    /// Norm of `A v_j` before any projection.
    pub prior_norm: f64,
    /// Set when the policy detected breakdown by its own criterion.
    pub breakdown: bool,
}

/// State a policy may touch once the run has produced its last column.
pub struct FinishContext<'a> {
    pub basis: &'a KrylovBasis,
    pub coeffs: &'a mut CoefficientMatrix,
    /// Last column whose image was computed.
    pub last: usize,
    pub residual: &'a mut Mat<f64>,
    pub beta: &'a mut f64,
    pub refinement: Refinement,
}

/// What an adaptive policy (Selective, Partial, Periodic) did beyond the local
/// three-term recurrence since it was built. The other policies report zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyStats {
    /// Steps that orthogonalized against more than the local columns.
    pub extra_steps: usize,
    /// Largest number of Ritz vectors orthogonalized against at once.
    pub ritz_vectors: usize,
    /// Set once the policy has switched to full reorthogonalization.
    pub promoted: bool,
}

/// One reorthogonalization strategy.
pub trait ReorthogonalizationPolicy {
    fn strategy(&self) -> ReorthogStrategy;

    /// Storage pattern the policy's coefficients need.
    fn layout(&self) -> CoefficientLayout {
        CoefficientLayout::Tridiagonal
    }

    /// Called before the first step after a (re)start; `run_start` is the first column
    /// whose image will be computed.
    fn begin_run(&mut self, run_start: usize) {
        let _ = run_start;
    }

    fn step(&mut self, ctx: StepContext<'_>) -> Result<StepOutcome, EigenError>;

    /// Called after the last step of a run that did not break down.
    fn finish_run(&mut self, ctx: FinishContext<'_>) {
        let _ = ctx;
    }

    fn stats(&self) -> PolicyStats {
        PolicyStats::default()
    }
}

/// Builds the policy for `strategy`, with scratch sized for vectors of dimension `dim`
/// and a basis of `capacity` columns.
pub fn build_policy(
    strategy: ReorthogStrategy,
    dim: usize,
    capacity: usize,
) -> Box<dyn ReorthogonalizationPolicy> {
    match strategy {
        ReorthogStrategy::Local => Box::new(LocalPolicy),
        ReorthogStrategy::Full => Box::new(FullPolicy),
        ReorthogStrategy::Selective => Box::new(SelectivePolicy::new(dim)),
        ReorthogStrategy::Periodic => Box::new(PartialPolicy::periodic(dim, capacity)),
        ReorthogStrategy::Partial => Box::new(PartialPolicy::partial(dim, capacity)),
        ReorthogStrategy::Delayed => Box::new(DelayedPolicy::new(capacity)),
    }
}

/// Columns of the three-term recurrence: the locked ones, plus the whole kept block at the
/// first step of a run (the arrow left by a thick restart couples `v_j` to all of it),
/// plus `v_{j-1}` and `v_j` afterwards.
pub(crate) fn local_columns(locked: usize, run_start: usize, j: usize) -> ColumnSet {
    let mut set = ColumnSet::range(0..locked);
    if j == run_start {
        set.push(locked..j + 1);
    } else {
        set.push(j - 1..j + 1);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_round_trips_through_strings() {
        for strategy in ReorthogStrategy::ALL {
            let parsed: ReorthogStrategy = strategy.to_string().parse().unwrap();
            assert_eq!(parsed, strategy);
        }
        assert_eq!("FULL".parse::<ReorthogStrategy>(), Ok(ReorthogStrategy::Full));
        assert!("gram".parse::<ReorthogStrategy>().is_err());
    }

    #[test]
    fn test_local_columns() {
        // First step after a thick restart that kept columns 2..5 on top of 2 locked ones.
        assert_eq!(local_columns(2, 5, 5).ranges(), &[0..6]);
        // Later steps only see the locked block and the two previous vectors.
        assert_eq!(local_columns(2, 5, 8).ranges(), &[0..2, 7..9]);
        assert_eq!(local_columns(0, 0, 1).ranges(), &[0..2]);
    }

    #[test]
    fn test_factory_layouts() {
        for strategy in ReorthogStrategy::ALL {
            let policy = build_policy(strategy, 10, 5);
            assert_eq!(policy.strategy(), strategy);
            let expected = if strategy == ReorthogStrategy::Delayed {
                CoefficientLayout::Hessenberg
            } else {
                CoefficientLayout::Tridiagonal
            };
            assert_eq!(policy.layout(), expected);
        }
    }
}
