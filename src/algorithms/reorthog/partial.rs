use super::{
    PolicyStats, ReorthogStrategy, ReorthogonalizationPolicy, StepContext, StepOutcome,
    local_columns,
};
use crate::{
    algorithms::orthog::{ColumnSet, Refinement, orthogonalize},
    error::EigenError,
};

/// Partial and periodic reorthogonalization (Simon; Grcar).
///
/// The policy runs the local three-term recurrence and tracks, through the omega
/// recurrence, an estimate `omega[i]` of the inner product between the newest vector and
/// vector `i` of the run. Nothing extra is done while every estimate stays below
/// `delta = sqrt(eps / ncv)`. Once one crosses it:
///
/// - *periodic*: the vector is orthogonalized against the whole run, and again at the
///   following step;
/// - *partial*: only against the intervals around the offending indices where the
///   estimates exceed `eta = eps^(3/4) / sqrt(ncv)`, and against the whole run at the
///   following step.
///
/// When the residual norm gets so small relative to `||A||` that the estimates become
/// meaningless, the policy switches to full reorthogonalization for the rest of the solve.
#[derive(Debug, Clone)]
pub struct PartialPolicy {
    periodic: bool,
    dim: usize,
    eps1: f64,
    delta: f64,
    eta: f64,
    omega: Vec<f64>,
    omega_old: Vec<f64>,
    omega_new: Vec<f64>,
    /// Diagonal and subdiagonal of the current run, relative to its first column.
    alphas: Vec<f64>,
    betas: Vec<f64>,
    run_start: usize,
    force: bool,
    promoted: bool,
    extra_steps: usize,
}

impl PartialPolicy {
    pub fn partial(dim: usize, capacity: usize) -> Self {
        Self::new(dim, capacity, false)
    }

    pub fn periodic(dim: usize, capacity: usize) -> Self {
        Self::new(dim, capacity, true)
    }

    fn new(dim: usize, capacity: usize, periodic: bool) -> Self {
        let eps = f64::EPSILON;
        let ncv = capacity.max(1) as f64;
        Self {
            periodic,
            dim,
            eps1: (dim as f64).sqrt() * eps / 2.0,
            delta: eps.sqrt() / ncv.sqrt(),
            eta: eps.powf(0.75) / ncv.sqrt(),
            omega: vec![0.0; capacity + 1],
            omega_old: vec![0.0; capacity + 1],
            omega_new: vec![0.0; capacity + 1],
            alphas: Vec::with_capacity(capacity),
            betas: Vec::with_capacity(capacity),
            run_start: 0,
            force: false,
            promoted: false,
            extra_steps: 0,
        }
    }

    /// Whether the policy has switched to full reorthogonalization.
    pub fn promoted(&self) -> bool {
        self.promoted
    }

    /// Advances the omega recurrence to relative step `p`, given the residual norm `beta`
    /// of that step (before any reorthogonalization).
    fn update_omega(&mut self, p: usize, beta: f64, anorm: f64) {
        let t = self.eps1 * anorm;
        let binv = 1.0 / beta;
        let (alphas, betas) = (&self.alphas, &self.betas);

        for i in 0..p.saturating_sub(1) {
            let mut x = betas[i] * self.omega[i + 1] + (alphas[i] - alphas[p]) * self.omega[i]
                - betas[p - 1] * self.omega_old[i];
            if i > 0 {
                x += betas[i - 1] * self.omega[i - 1];
            }
            self.omega_new[i] = if x > 0.0 { binv * (x + t) } else { binv * (x - t) };
        }
        self.omega_new[p - 1] = binv * t;

        self.omega_old[..p].copy_from_slice(&self.omega[..p]);
        self.omega[..p].copy_from_slice(&self.omega_new[..p]);
        self.omega[p] = self.eps1;
    }
}

/// Marks the indices whose estimate reaches `delta` (or the largest one, if none does) and
/// grows each mark into the surrounding interval where the estimates are at least `eta`.
pub(crate) fn reorthogonalization_intervals(mu: &[f64], delta: f64, eta: f64) -> Vec<bool> {
    let mut which: Vec<bool> = mu.iter().map(|m| m.abs() >= delta).collect();
    if !which.iter().any(|&w| w) {
        let largest = mu
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i);
        if let Some(i) = largest {
            which[i] = true;
        }
    }

    let seeds: Vec<usize> = (0..mu.len()).filter(|&i| which[i]).collect();
    for i in seeds {
        for k in (0..i).rev() {
            if which[k] || mu[k].abs() < eta {
                break;
            }
            which[k] = true;
        }
        for k in i + 1..mu.len() {
            if which[k] || mu[k].abs() < eta {
                break;
            }
            which[k] = true;
        }
    }
    which
}

impl ReorthogonalizationPolicy for PartialPolicy {
    fn strategy(&self) -> ReorthogStrategy {
        if self.periodic {
            ReorthogStrategy::Periodic
        } else {
            ReorthogStrategy::Partial
        }
    }

    fn begin_run(&mut self, run_start: usize) {
        self.run_start = run_start;
        self.omega.fill(0.0);
        self.omega_old.fill(0.0);
        self.alphas.clear();
        self.betas.clear();
        self.force = false;
    }

    fn step(&mut self, ctx: StepContext<'_>) -> Result<StepOutcome, EigenError> {
        let j = ctx.j;
        let locked = ctx.basis.locked();
        let v = ctx.basis.vectors();

        if self.promoted {
            self.extra_steps += 1;
            let gs = orthogonalize(
                v,
                &ColumnSet::range(0..j + 1),
                ctx.f,
                ctx.projections,
                Refinement::Always,
            );
            return Ok(StepOutcome {
                norm: gs.norm,
                prior_norm: gs.prior_norm,
                breakdown: gs.norm < self.dim as f64 * *ctx.anorm * f64::EPSILON,
            });
        }

        let p = j - self.run_start;
        let gs = orthogonalize(
            v,
            &local_columns(locked, self.run_start, j),
            ctx.f,
            ctx.projections,
            ctx.refinement,
        );
        let alpha = ctx.projections[j];
        let mut norm = gs.norm;
        self.alphas.push(alpha);

        let previous_beta = if p > 0 { self.betas[p - 1] } else { 0.0 };
        *ctx.anorm = ctx.anorm.max(alpha.abs() + norm + previous_beta);

        let mut reorth = false;
        if p > 0 {
            self.update_omega(p, norm, *ctx.anorm);
            reorth = self.omega[..p].iter().any(|w| w.abs() > self.delta);
        }

        if reorth || self.force {
            self.extra_steps += 1;
            let mask = if self.periodic || self.force {
                vec![true; p]
            } else {
                reorthogonalization_intervals(&self.omega[..p], self.delta, self.eta)
            };
            self.force = !self.force;
            for (w, _) in self.omega[..p].iter_mut().zip(&mask).filter(|(_, m)| **m) {
                *w = self.eps1;
            }

            // The block kept by a thick restart is not covered by the recurrence.
            let mut set = ColumnSet::range(locked..self.run_start);
            for r in ColumnSet::from_mask(self.run_start, &mask).ranges() {
                set.push(r.clone());
            }
            set.push(j..j + 1);
            log::trace!("Reorthogonalizing step {j} against {} vectors.", set.len());
            norm = orthogonalize(v, &set, ctx.f, ctx.projections, ctx.refinement).norm;
        }
        self.betas.push(norm);

        let breakdown = norm < self.dim as f64 * *ctx.anorm * f64::EPSILON;
        if !breakdown && norm * self.delta < *ctx.anorm * self.eps1 {
            self.promoted = true;
            log::info!("Switching to full reorthogonalization at step {j}.");
        }

        Ok(StepOutcome {
            norm,
            prior_norm: gs.prior_norm,
            breakdown,
        })
    }

    fn stats(&self) -> PolicyStats {
        PolicyStats {
            extra_steps: self.extra_steps,
            ritz_vectors: 0,
            promoted: self.promoted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervals_grow_around_large_estimates() {
        let mu = [1e-20, 1e-12, 1e-9, 1e-6, 1e-10, 1e-20];
        let which = reorthogonalization_intervals(&mu, 1e-7, 1e-11);
        assert_eq!(which, vec![false, false, true, true, true, false]);
    }

    #[test]
    fn test_intervals_fall_back_to_largest_estimate() {
        let mu = [1e-20, 1e-16, 1e-18];
        let which = reorthogonalization_intervals(&mu, 1e-7, 1e-11);
        assert_eq!(which, vec![false, true, false]);
    }

    #[test]
    fn test_omega_recurrence_starts_at_roundoff_level() {
        let mut policy = PartialPolicy::partial(100, 10);
        policy.begin_run(0);
        policy.alphas.extend([1.0, 2.0]);
        policy.betas.push(0.5);
        policy.update_omega(1, 0.5, 2.0);
        // omega[0] is the pure roundoff term eps1 * anorm / beta.
        assert!((policy.omega[0] - policy.eps1 * 2.0 / 0.5).abs() < 1e-30);
        assert_eq!(policy.omega[1], policy.eps1);
        assert!(policy.omega[0] < policy.delta);
    }
}
