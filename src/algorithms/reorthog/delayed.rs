use super::{
    FinishContext, ReorthogStrategy, ReorthogonalizationPolicy, StepContext, StepOutcome,
};
use crate::{
    algorithms::{
        basis::CoefficientLayout,
        orthog::{ColumnSet, DGKS_ETA, Refinement, breakdown_tolerance, cgs_pass},
    },
    error::EigenError,
};
use faer::{Accum, Mat, Par, linalg::matmul::matmul};

/// Arnoldi with delayed reorthogonalization and delayed normalization.
///
/// Each step performs a single classical Gram-Schmidt pass and stores the result as a
/// *tentative* vector, normalized by a norm estimated from the projection coefficients
/// (Pythagoras) rather than computed. At the next step the tentative vector gets its
/// second Gram-Schmidt pass and its true norm, and the previous column of the Hessenberg
/// matrix is revised accordingly. Since the image of the next vector was computed from
/// the tentative one, it is corrected with `A V c = V H c` before its own projection.
///
/// With [`Refinement::Never`] only the normalization is delayed.
#[derive(Debug, Clone)]
pub struct DelayedPolicy {
    correction: Vec<f64>,
    hc: Mat<f64>,
}

impl DelayedPolicy {
    pub fn new(capacity: usize) -> Self {
        Self {
            correction: vec![0.0; capacity + 1],
            hc: Mat::zeros(capacity + 1, 1),
        }
    }
}

impl ReorthogonalizationPolicy for DelayedPolicy {
    fn strategy(&self) -> ReorthogStrategy {
        ReorthogStrategy::Delayed
    }

    fn layout(&self) -> CoefficientLayout {
        CoefficientLayout::Hessenberg
    }

    fn step(&mut self, ctx: StepContext<'_>) -> Result<StepOutcome, EigenError> {
        let j = ctx.j;
        let locked = ctx.basis.locked();
        let c = &mut self.correction[..j];
        c.fill(0.0);

        // Finish the tentative column j: second pass and true normalization.
        let mut rho = 1.0;
        if j > ctx.run_start {
            let mut z = ctx.basis.column_mat(j).to_owned();
            if ctx.refinement != Refinement::Never {
                cgs_pass(ctx.basis.vectors(), &ColumnSet::range(0..j), &mut z, c);
            }
            rho = z.norm_l2();
            if rho <= breakdown_tolerance(1.0) {
                return Ok(StepOutcome {
                    norm: 0.0,
                    prior_norm: ctx.f.norm_l2(),
                    breakdown: true,
                });
            }
            let scale = 1.0 / rho;
            for i in 0..z.nrows() {
                z[(i, 0)] *= scale;
            }
            ctx.basis.replace_column(j, z.as_ref());

            let beta_prev = ctx.coeffs.get(j, j - 1);
            let delta: Vec<f64> = c.iter().map(|ci| beta_prev * ci).collect();
            ctx.coeffs
                .revise_column(j - 1, locked..j, &delta, beta_prev * rho);
        }

        // f holds A times the tentative vector: A v_j = (f - V H c) / rho.
        if j > ctx.run_start {
            self.hc.as_mut().fill(0.0);
            for k in 0..j {
                if c[k] == 0.0 {
                    continue;
                }
                for i in 0..=j {
                    self.hc[(i, 0)] += ctx.coeffs.get(i, k) * c[k];
                }
            }
            matmul(
                ctx.f.as_mut(),
                Accum::Add,
                ctx.basis.vectors().get(.., 0..j + 1),
                self.hc.as_ref().get(0..j + 1, ..),
                -1.0,
                Par::Seq,
            );
            let scale = 1.0 / rho;
            for i in 0..ctx.f.nrows() {
                ctx.f[(i, 0)] *= scale;
            }
        }

        // Single pass now; the second one is delayed to the next step.
        let prior_norm = ctx.f.norm_l2();
        cgs_pass(
            ctx.basis.vectors(),
            &ColumnSet::range(0..j + 1),
            ctx.f,
            ctx.projections,
        );
        let projected: f64 = ctx.projections[..=j].iter().map(|g| g * g).sum();
        let estimate = prior_norm * prior_norm - projected;
        let norm = if estimate > DGKS_ETA * DGKS_ETA * prior_norm * prior_norm {
            estimate.sqrt()
        } else {
            // Too much cancellation for the estimate to be trusted.
            ctx.f.norm_l2()
        };

        Ok(StepOutcome {
            norm,
            prior_norm,
            breakdown: false,
        })
    }

    fn finish_run(&mut self, ctx: FinishContext<'_>) {
        let last = ctx.last;
        if ctx.refinement != Refinement::Never {
            let c = &mut self.correction[..last + 1];
            c.fill(0.0);
            cgs_pass(
                ctx.basis.vectors(),
                &ColumnSet::range(0..last + 1),
                ctx.residual,
                c,
            );
            let window = ctx.basis.locked()..last + 1;
            let beta = ctx.residual.norm_l2();
            ctx.coeffs.revise_column(last, window, c, beta);
            *ctx.beta = beta;
        } else {
            let beta = ctx.residual.norm_l2();
            ctx.coeffs.set_coupling(last + 1, last, beta);
            *ctx.beta = beta;
        }
    }
}
