use super::{ReorthogStrategy, ReorthogonalizationPolicy, StepContext, StepOutcome};
use crate::{
    algorithms::orthog::{ColumnSet, Refinement, orthogonalize},
    error::EigenError,
};

/// Orthogonalize against every basis vector with two classical Gram-Schmidt passes.
///
/// The configured refinement is ignored: the second pass is what makes the basis
/// orthonormal to working precision.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullPolicy;

impl ReorthogonalizationPolicy for FullPolicy {
    fn strategy(&self) -> ReorthogStrategy {
        ReorthogStrategy::Full
    }

    fn step(&mut self, ctx: StepContext<'_>) -> Result<StepOutcome, EigenError> {
        let gs = orthogonalize(
            ctx.basis.vectors(),
            &ColumnSet::range(0..ctx.j + 1),
            ctx.f,
            ctx.projections,
            Refinement::Always,
        );
        Ok(StepOutcome {
            norm: gs.norm,
            prior_norm: gs.prior_norm,
            breakdown: false,
        })
    }
}
