use super::{
    PolicyStats, ReorthogStrategy, ReorthogonalizationPolicy, StepContext, StepOutcome,
    local_columns,
};
use crate::{
    algorithms::{
        orthog::{ColumnSet, orthogonalize},
        projected::{ProjectedSolver, SymmetricEigenSolver},
    },
    error::EigenError,
};
use faer::Mat;

/// Selective orthogonalization (Parlett and Scott).
///
/// Every step performs the local three-term recurrence, then diagonalizes the projected
/// matrix of the current run. Ritz vectors whose residual `beta * |y_last|` is below
/// `sqrt(eps) * ||A||` are the directions along which orthogonality is being lost; the
/// new vector is orthogonalized against those Ritz vectors only.
#[derive(Debug, Clone)]
pub struct SelectivePolicy {
    solver: SymmetricEigenSolver,
    /// Nearly converged Ritz vectors, recomputed when their number grows.
    ritz: Mat<f64>,
    stats: PolicyStats,
}

impl SelectivePolicy {
    pub fn new(dim: usize) -> Self {
        Self {
            solver: SymmetricEigenSolver,
            ritz: Mat::zeros(dim, 0),
            stats: PolicyStats::default(),
        }
    }

    /// Number of Ritz vectors currently orthogonalized against.
    pub fn active_ritz_vectors(&self) -> usize {
        self.ritz.ncols()
    }
}

impl ReorthogonalizationPolicy for SelectivePolicy {
    fn strategy(&self) -> ReorthogStrategy {
        ReorthogStrategy::Selective
    }

    fn begin_run(&mut self, _run_start: usize) {
        // The basis has been rotated since the Ritz vectors were formed.
        let dim = self.ritz.nrows();
        self.ritz = Mat::zeros(dim, 0);
    }

    fn step(&mut self, ctx: StepContext<'_>) -> Result<StepOutcome, EigenError> {
        let j = ctx.j;
        let locked = ctx.basis.locked();
        let gs = orthogonalize(
            ctx.basis.vectors(),
            &local_columns(locked, ctx.run_start, j),
            ctx.f,
            ctx.projections,
            ctx.refinement,
        );
        let mut norm = gs.norm;

        // Projected matrix of the active window, with the new diagonal entry in place.
        let mut t = ctx.coeffs.block(locked..j + 1);
        let last = j - locked;
        t[(last, last)] = ctx.projections[j];
        let eig = self.solver.solve(t.as_ref())?;

        for value in &eig.values {
            *ctx.anorm = ctx.anorm.max(value.abs());
        }

        let threshold = f64::EPSILON.sqrt() * *ctx.anorm;
        let nearly_converged: Vec<usize> = (0..eig.len())
            .filter(|&i| norm * eig.vectors[(last, i)].abs() < threshold)
            .collect();

        if nearly_converged.len() > self.ritz.ncols() {
            let y = Mat::from_fn(last + 1, nearly_converged.len(), |r, c| {
                eig.vectors[(r, nearly_converged[c])]
            });
            self.ritz = ctx.basis.combination(locked..j + 1, y.as_ref());
            log::debug!(
                "Selective orthogonalization against {} Ritz vectors at step {j}.",
                self.ritz.ncols()
            );
        }

        if self.ritz.ncols() > 0 {
            self.stats.extra_steps += 1;
            self.stats.ritz_vectors = self.stats.ritz_vectors.max(self.ritz.ncols());
            let mut discarded = vec![0.0; self.ritz.ncols()];
            let outcome = orthogonalize(
                self.ritz.as_ref(),
                &ColumnSet::range(0..self.ritz.ncols()),
                ctx.f,
                &mut discarded,
                ctx.refinement,
            );
            norm = outcome.norm;
        }

        Ok(StepOutcome {
            norm,
            prior_norm: gs.prior_norm,
            breakdown: false,
        })
    }

    fn stats(&self) -> PolicyStats {
        self.stats
    }
}
