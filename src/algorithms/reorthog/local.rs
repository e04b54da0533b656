use super::{ReorthogStrategy, ReorthogonalizationPolicy, StepContext, StepOutcome, local_columns};
use crate::{algorithms::orthog::orthogonalize, error::EigenError};

/// Three-term recurrence: orthogonalize against the locked vectors and the two previous
/// basis vectors only.
///
/// Orthogonality is lost as Ritz values converge, which shows up as repeated copies of
/// converged eigenvalues; the convergence module purges those.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPolicy;

impl ReorthogonalizationPolicy for LocalPolicy {
    fn strategy(&self) -> ReorthogStrategy {
        ReorthogStrategy::Local
    }

    fn step(&mut self, ctx: StepContext<'_>) -> Result<StepOutcome, EigenError> {
        let set = local_columns(ctx.basis.locked(), ctx.run_start, ctx.j);
        let gs = orthogonalize(
            ctx.basis.vectors(),
            &set,
            ctx.f,
            ctx.projections,
            ctx.refinement,
        );
        Ok(StepOutcome {
            norm: gs.norm,
            prior_norm: gs.prior_norm,
            breakdown: false,
        })
    }
}
