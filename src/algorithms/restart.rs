//! The Restart/Deflation Controller.
//!
//! Drives the outer loop of the solver. Each iteration extends the decomposition to
//! `min(locked + mpd, ncv)` columns, diagonalizes the projected matrix, assesses the
//! Ritz pairs and then either terminates or compresses the basis:
//!
//! - a *thick* restart (Krylov-Schur) rotates the active window onto the newly
//!   converged Ritz vectors followed by the best `keep` unconverged ones, locks the
//!   converged ones and continues the recurrence from the old residual;
//! - an *explicit* restart locks the converged Ritz vectors and starts a new run from
//!   the best-ranked unconverged Ritz vector.
//!
//! A breakdown during the extension means the active window spans an invariant
//! subspace. Its converged pairs are checked against their true residual, locked, and
//! the recurrence restarts from a random vector. Two breakdowns in a row without
//! progress end the solve.

use super::{
    basis::KrylovDecomposition,
    convergence::{Assessment, ConvergenceTest, PairStatus, SelectionCriterion, assess},
    monitor::{IterationReport, Monitor, MonitorAction, notify},
    projected::{ProjectedEigen, ProjectedSolver, SymmetricEigenSolver},
    recurrence::RecurrenceEngine,
    reorthog::ReorthogStrategy,
    start::{StartVectorSupplier, prepare},
};
use crate::{error::EigenError, matrix::LinearOperator};
use faer::{Mat, MatRef};
use std::fmt;

/// A converged pair must have a true residual within this factor of the tolerance.
const SPURIOUS_FACTOR: f64 = 100.0;

/// A converged Ritz vector whose component along the locked vectors exceeds this share
/// of its norm is a copy of an eigenvector that was already found.
const REPEATED_OVERLAP: f64 = 0.5;

/// Why the outer loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvergedReason {
    #[default]
    Iterating,
    /// At least `nev` eigenpairs converged.
    Converged,
    /// The iteration limit was reached first.
    DivergedIts,
    /// The recurrence broke down twice in a row without making progress.
    DivergedBreakdown,
    /// A monitor asked the solve to stop.
    Stopped,
}

impl fmt::Display for ConvergedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Iterating => "iterating",
            Self::Converged => "converged",
            Self::DivergedIts => "diverged (iteration limit)",
            Self::DivergedBreakdown => "diverged (breakdown)",
            Self::Stopped => "stopped by monitor",
        })
    }
}

/// How the basis is compressed when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartKind {
    #[default]
    Thick,
    Explicit,
}

impl std::str::FromStr for RestartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thick" | "krylov-schur" | "implicit" => Ok(Self::Thick),
            "explicit" => Ok(Self::Explicit),
            other => Err(format!("unknown restart kind '{other}'")),
        }
    }
}

/// Resolved parameters of the outer loop.
#[derive(Debug, Clone)]
pub struct RestartParams {
    /// Number of wanted eigenpairs.
    pub nev: usize,
    /// Capacity of the basis.
    pub ncv: usize,
    /// Largest active window.
    pub mpd: usize,
    pub max_it: usize,
    pub tol: f64,
    pub criterion: SelectionCriterion,
    /// Share of the unconverged Ritz vectors kept by a thick restart.
    pub keep_fraction: f64,
    pub kind: RestartKind,
}

/// Final state of a solve, with the locked eigenpairs in ranked order.
#[derive(Debug, Clone)]
pub struct RestartOutcome {
    pub values: Vec<f64>,
    /// Column `i` is the eigenvector of `values[i]`.
    pub vectors: Mat<f64>,
    /// Residual bounds at the time each pair was locked.
    pub errors: Vec<f64>,
    /// True residual norms `||A x - theta x||`.
    pub residuals: Vec<f64>,
    pub reason: ConvergedReason,
    pub iterations: usize,
    pub applications: usize,
}

/// Owns the decomposition and runs the outer iteration.
pub struct RestartController<'a, O: LinearOperator + ?Sized> {
    engine: RecurrenceEngine<'a, O>,
    dec: KrylovDecomposition,
    solver: Box<dyn ProjectedSolver>,
    supplier: StartVectorSupplier,
    params: RestartParams,
    anorm: f64,
    locked_values: Vec<f64>,
    locked_errors: Vec<f64>,
    iteration: usize,
    breakdown_pending: bool,
}

impl<'a, O: LinearOperator + ?Sized> RestartController<'a, O> {
    pub fn new(
        engine: RecurrenceEngine<'a, O>,
        params: RestartParams,
        supplier: StartVectorSupplier,
    ) -> Self {
        let dec = KrylovDecomposition::new(engine.dim(), params.ncv, engine.policy().layout());
        Self {
            engine,
            dec,
            solver: Box::new(SymmetricEigenSolver),
            supplier,
            params,
            anorm: 0.0,
            locked_values: Vec::new(),
            locked_errors: Vec::new(),
            iteration: 0,
            breakdown_pending: false,
        }
    }

    /// Keeps the basis orthogonal to the span of `space` during the whole solve.
    pub fn with_deflation_space(mut self, space: MatRef<'_, f64>) -> Result<Self, EigenError> {
        self.dec.basis = self.dec.basis.with_deflation_space(space)?;
        Ok(self)
    }

    /// Replaces the dense solver of the projected problem.
    pub fn with_projected_solver(mut self, solver: Box<dyn ProjectedSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn engine(&self) -> &RecurrenceEngine<'a, O> {
        &self.engine
    }

    pub fn decomposition(&self) -> &KrylovDecomposition {
        &self.dec
    }

    /// Current estimate of the operator norm.
    pub fn anorm(&self) -> f64 {
        self.anorm
    }

    /// Runs the outer loop until a terminal state is reached.
    ///
    /// Fatal conditions (operator failure, projected solve failure, capacity misuse)
    /// are returned as errors; every other ending is a [`ConvergedReason`].
    pub fn solve(&mut self, monitors: &mut [&mut dyn Monitor]) -> Result<RestartOutcome, EigenError> {
        if self.dec.basis.is_empty() {
            let v = self.supplier.next(&self.dec.basis, 0..0).ok_or_else(|| {
                EigenError::input("could not find a start vector outside the deflation space")
            })?;
            self.dec.basis.extend(v.as_ref())?;
        }

        let reason = loop {
            if let Some(reason) = self.iterate(monitors)? {
                break reason;
            }
        };
        log::info!(
            "Solve finished after {} iterations: {reason} ({} of {} eigenpairs).",
            self.iteration,
            self.locked_values.len(),
            self.params.nev
        );
        self.outcome(reason)
    }

    /// One outer iteration. Returns the terminal reason, if reached.
    fn iterate(
        &mut self,
        monitors: &mut [&mut dyn Monitor],
    ) -> Result<Option<ConvergedReason>, EigenError> {
        self.iteration += 1;
        let locked = self.dec.basis.locked();
        let target = (locked + self.params.mpd).min(self.params.ncv);
        let extension = self.engine.extend(&mut self.dec, target, &mut self.anorm)?;

        let eig = self.solver.solve(self.dec.projected().as_ref())?;
        for value in &eig.values {
            self.anorm = self.anorm.max(value.abs());
        }

        let local = self.engine.policy().strategy() == ReorthogStrategy::Local;
        let mut assessment = assess(
            &eig,
            &self.params.criterion,
            &ConvergenceTest {
                beta: self.dec.beta,
                anorm: self.anorm,
                tol: self.params.tol,
                purge_repeated: local,
                // Copies of locked values are recognized by their vectors instead, so a
                // genuinely multiple eigenvalue can still be found after locking.
                accepted: &[],
            },
        );
        // A broken-down window may hold a Ritz value of zero whose bound is zero only
        // because the operator returned nothing, so its pairs are checked too.
        if local || extension.breakdown {
            self.verify_converged(&eig, &mut assessment)?;
        }

        let newly = assessment.converged_count();
        let report = IterationReport {
            iteration: self.iteration,
            locked,
            newly_converged: newly,
            estimates: assessment.estimates.clone(),
            beta: self.dec.beta,
            applications: self.engine.applications(),
        };
        let action = notify(monitors, &report);
        log::debug!(
            "Iteration {}: window {locked}..{}, {newly} newly converged, beta {:.3e}.",
            self.iteration,
            self.dec.basis.len(),
            self.dec.beta
        );

        let reason = if locked + newly >= self.params.nev {
            Some(ConvergedReason::Converged)
        } else if action == MonitorAction::Stop {
            Some(ConvergedReason::Stopped)
        } else if self.iteration >= self.params.max_it {
            Some(ConvergedReason::DivergedIts)
        } else {
            None
        };
        let converged = converged_columns(&assessment);

        if let Some(reason) = reason {
            self.compress(&eig, &assessment, &converged, 0);
            return Ok(Some(reason));
        }

        if extension.breakdown {
            return Ok(self.recover_from_breakdown(&eig, &assessment, &converged));
        }
        self.breakdown_pending = false;

        match self.params.kind {
            RestartKind::Thick => self.thick_restart(&eig, &assessment, &converged),
            RestartKind::Explicit => self.explicit_restart(&eig, &assessment, &converged),
        }
    }

    /// Re-checks converged pairs on the full vectors. A pair is repeated if its Ritz
    /// vector mostly lies in the locked space, and spurious if its true residual is far
    /// above its bound. Either way it is discarded.
    fn verify_converged(
        &mut self,
        eig: &ProjectedEigen,
        assessment: &mut Assessment,
    ) -> Result<(), EigenError> {
        let window = self.dec.basis.active_window();
        let mut changed = false;
        for estimate in assessment.estimates[..assessment.settled].iter_mut() {
            if estimate.status != PairStatus::Converged {
                continue;
            }
            let y = eig.vectors.as_ref().get(.., estimate.index..estimate.index + 1);
            let x = self.dec.basis.combination(window.clone(), y);
            if self.locked_overlap(x.as_ref()) > REPEATED_OVERLAP {
                log::debug!("Discarding repeated Ritz value {:.10e}.", estimate.value);
                estimate.status = PairStatus::Repeated;
                changed = true;
                continue;
            }
            let residual = self.true_residual(x.as_ref(), estimate.value)?;
            let scale = if estimate.value == 0.0 { 1.0 } else { estimate.value.abs() };
            let limit = SPURIOUS_FACTOR * self.params.tol.max(f64::EPSILON * self.anorm / scale);
            if residual / scale > limit {
                log::debug!(
                    "Rejecting spurious Ritz value {:.10e} (true residual {residual:.3e}).",
                    estimate.value
                );
                estimate.status = PairStatus::Spurious;
                changed = true;
            }
        }
        if changed {
            assessment.refresh();
        }
        Ok(())
    }

    /// `||V_l^T x|| / ||x||` over the locked columns.
    fn locked_overlap(&self, x: MatRef<'_, f64>) -> f64 {
        let locked = self.dec.basis.locked();
        let norm = x.norm_l2();
        if locked == 0 || norm == 0.0 {
            return 0.0;
        }
        let v = self.dec.basis.vectors().get(.., 0..locked);
        let c = v.transpose() * x;
        c.norm_l2() / norm
    }

    /// `||A x - theta x|| / ||x||`.
    fn true_residual(&mut self, x: MatRef<'_, f64>, theta: f64) -> Result<f64, EigenError> {
        let ax = self.engine.apply(x)?;
        let norm = x.norm_l2();
        let mut r = ax;
        for i in 0..r.nrows() {
            r[(i, 0)] -= theta * x[(i, 0)];
        }
        Ok(if norm > 0.0 { r.norm_l2() / norm } else { r.norm_l2() })
    }

    /// Rotates the active window onto the Ritz vectors `converged` followed by the first
    /// `keep` entries of `remaining`, records and locks the converged ones. Returns the
    /// size of the compressed basis.
    fn compress(
        &mut self,
        eig: &ProjectedEigen,
        assessment: &Assessment,
        converged: &[usize],
        keep: usize,
    ) -> usize {
        let l = self.dec.basis.locked();
        let m = self.dec.basis.len() - l;
        let remaining = remaining_columns(assessment);
        let selected: Vec<usize> = converged
            .iter()
            .chain(remaining.iter().take(keep))
            .copied()
            .collect();

        let y = Mat::from_fn(m, selected.len(), |r, c| eig.vectors[(r, selected[c])]);
        self.dec.basis.rotate(l, y.as_ref());
        let size = l + selected.len();
        self.dec.truncate(size);
        self.dec.coeffs.clear_window(l..size);
        for (i, &c) in selected.iter().enumerate() {
            self.dec.coeffs.set(l + i, l + i, eig.values[c]);
        }

        for &c in converged {
            self.locked_values.push(eig.values[c]);
            let error = assessment
                .estimates
                .iter()
                .find(|e| e.index == c)
                .map_or(0.0, |e| e.error);
            self.locked_errors.push(error);
        }
        self.dec.basis.lock(converged.len());
        size
    }

    /// Krylov-Schur restart: keeps the converged and the best unconverged Ritz vectors as
    /// an arrowhead decomposition and continues from the residual.
    fn thick_restart(
        &mut self,
        eig: &ProjectedEigen,
        assessment: &Assessment,
        converged: &[usize],
    ) -> Result<Option<ConvergedReason>, EigenError> {
        let l = self.dec.basis.locked();
        let m = self.dec.basis.len() - l;
        let nconv = converged.len();
        let remaining = remaining_columns(assessment);

        let wanted = (self.params.keep_fraction * (m - nconv) as f64).round() as usize;
        let keep = wanted
            .max(1)
            .min(remaining.len())
            .min(self.params.ncv.saturating_sub(1 + l + nconv))
            .min(self.params.mpd.saturating_sub(1));
        if keep == 0 {
            log::debug!("No room for a thick restart, restarting explicitly.");
            return self.explicit_restart(eig, assessment, converged);
        }

        let beta = self.dec.beta;
        let selected: Vec<usize> = converged
            .iter()
            .chain(remaining.iter().take(keep))
            .copied()
            .collect();
        let size = self.compress(eig, assessment, converged, keep);

        // Couplings of the locked columns are below tolerance and dropped.
        for (i, &c) in selected.iter().enumerate().skip(nconv) {
            self.dec
                .coeffs
                .set_coupling(size, l + i, beta * eig.vectors[(m - 1, c)]);
        }
        let residual = self.dec.residual.clone();
        self.dec.basis.extend_scaled(residual.as_ref(), beta)?;
        self.dec.set_applied(size);
        log::trace!("Thick restart: locked {nconv}, kept {keep}.");
        Ok(None)
    }

    /// Locks the converged pairs and starts a new run from the best unconverged Ritz
    /// vector.
    fn explicit_restart(
        &mut self,
        eig: &ProjectedEigen,
        assessment: &Assessment,
        converged: &[usize],
    ) -> Result<Option<ConvergedReason>, EigenError> {
        let window = self.dec.basis.active_window();
        let direction = assessment.restart.map(|p| {
            let c = assessment.estimates[p].index;
            self.dec
                .basis
                .combination(window.clone(), eig.vectors.as_ref().get(.., c..c + 1))
        });

        let size = self.compress(eig, assessment, converged, 0);
        let next = direction
            .and_then(|x| prepare(&self.dec.basis, 0..size, x))
            .or_else(|| self.supplier.next(&self.dec.basis, 0..size));
        match next {
            Some(v) => {
                self.dec.basis.extend(v.as_ref())?;
                self.dec.set_applied(size);
                Ok(None)
            }
            None => {
                log::info!("The search space is exhausted, no restart vector is left.");
                Ok(Some(ConvergedReason::DivergedBreakdown))
            }
        }
    }

    /// The active window is invariant: lock what converged and restart from a random
    /// vector, unless the previous iteration already did so without any progress.
    fn recover_from_breakdown(
        &mut self,
        eig: &ProjectedEigen,
        assessment: &Assessment,
        converged: &[usize],
    ) -> Option<ConvergedReason> {
        let size = self.compress(eig, assessment, converged, 0);
        if converged.is_empty() && self.breakdown_pending {
            log::info!("Repeated breakdown without progress, giving up.");
            return Some(ConvergedReason::DivergedBreakdown);
        }

        match self.supplier.next(&self.dec.basis, 0..size) {
            Some(v) => {
                log::info!("Restarting from a random vector after breakdown.");
                // The basis was just truncated to `size < ncv`, so there is room.
                if self.dec.basis.extend(v.as_ref()).is_err() {
                    return Some(ConvergedReason::DivergedBreakdown);
                }
                self.dec.set_applied(size);
                self.breakdown_pending = converged.is_empty();
                None
            }
            None => {
                log::info!("No random vector is independent of the locked basis.");
                Some(ConvergedReason::DivergedBreakdown)
            }
        }
    }

    /// Collects the locked pairs in ranked order and computes their true residuals.
    fn outcome(&mut self, reason: ConvergedReason) -> Result<RestartOutcome, EigenError> {
        let order = self.params.criterion.sort_indices(&self.locked_values);
        let n = self.dec.basis.dim();
        let basis = self.dec.basis.vectors();
        let vectors = Mat::from_fn(n, order.len(), |i, c| basis[(i, order[c])]);

        let mut residuals = Vec::with_capacity(order.len());
        for (c, &k) in order.iter().enumerate() {
            let x = vectors.as_ref().get(.., c..c + 1);
            residuals.push(self.true_residual(x, self.locked_values[k])?);
        }

        Ok(RestartOutcome {
            values: order.iter().map(|&k| self.locked_values[k]).collect(),
            vectors,
            errors: order.iter().map(|&k| self.locked_errors[k]).collect(),
            residuals,
            reason,
            iterations: self.iteration,
            applications: self.engine.applications(),
        })
    }
}

/// Projected eigenvector columns of the genuinely converged pairs of the settled prefix.
fn converged_columns(assessment: &Assessment) -> Vec<usize> {
    assessment.converged().map(|e| e.index).collect()
}

/// Projected eigenvector columns worth keeping after the settled prefix, in ranked order.
fn remaining_columns(assessment: &Assessment) -> Vec<usize> {
    assessment.estimates[assessment.settled..]
        .iter()
        .filter(|e| !matches!(e.status, PairStatus::Repeated | PairStatus::Spurious))
        .map(|e| e.index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{
        monitor::ConvergenceHistory, orthog::Refinement, reorthog::build_policy,
    };

    fn diagonal(values: &[f64]) -> Mat<f64> {
        let n = values.len();
        Mat::from_fn(n, n, |i, j| if i == j { values[i] } else { 0.0 })
    }

    fn params(nev: usize, ncv: usize, kind: RestartKind) -> RestartParams {
        RestartParams {
            nev,
            ncv,
            mpd: ncv,
            max_it: 200,
            tol: 1e-10,
            criterion: SelectionCriterion::LargestReal,
            keep_fraction: 0.5,
            kind,
        }
    }

    fn run(
        a: &Mat<f64>,
        strategy: ReorthogStrategy,
        params: RestartParams,
    ) -> (RestartOutcome, usize) {
        let n = a.nrows();
        let policy = build_policy(strategy, n, params.ncv);
        let engine = RecurrenceEngine::new(a, policy, Refinement::IfNeeded).unwrap();
        let mut controller = RestartController::new(engine, params, StartVectorSupplier::new(11));
        let mut history = ConvergenceHistory::new();
        let mut monitors: [&mut dyn Monitor; 1] = [&mut history];
        let outcome = controller.solve(&mut monitors).unwrap();
        (outcome, history.reports().len())
    }

    #[test]
    fn test_thick_restart_finds_largest_eigenvalues() {
        let values: Vec<f64> = (1..=40).map(|i| i as f64).collect();
        let a = diagonal(&values);
        let (outcome, iterations) = run(&a, ReorthogStrategy::Full, params(3, 10, RestartKind::Thick));
        assert_eq!(outcome.reason, ConvergedReason::Converged);
        assert_eq!(outcome.iterations, iterations);
        for (value, expected) in outcome.values.iter().zip([40.0, 39.0, 38.0]) {
            assert!((value - expected).abs() < 1e-8, "got {value}");
        }
        for r in &outcome.residuals {
            assert!(*r < 1e-7);
        }
    }

    #[test]
    fn test_explicit_restart_finds_smallest_eigenvalues() {
        let values: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        let a = diagonal(&values);
        let mut p = params(2, 12, RestartKind::Explicit);
        p.criterion = SelectionCriterion::SmallestReal;
        p.max_it = 2000;
        p.tol = 1e-8;
        let (outcome, _) = run(&a, ReorthogStrategy::Full, p);
        assert_eq!(outcome.reason, ConvergedReason::Converged);
        assert!((outcome.values[0] - 1.0).abs() < 1e-6);
        assert!((outcome.values[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_iteration_limit_is_not_an_error() {
        let values: Vec<f64> = (1..=100).map(|i| 1.0 + 1e-3 * i as f64).collect();
        let a = diagonal(&values);
        let mut p = params(5, 8, RestartKind::Thick);
        p.max_it = 2;
        p.tol = 1e-14;
        let (outcome, _) = run(&a, ReorthogStrategy::Full, p);
        assert_eq!(outcome.reason, ConvergedReason::DivergedIts);
        assert_eq!(outcome.iterations, 2);
        assert!(outcome.values.len() < 5);
    }

    #[test]
    fn test_zero_operator_converges_through_breakdown_restarts() {
        let a = Mat::<f64>::zeros(6, 6);
        let (outcome, _) = run(&a, ReorthogStrategy::Local, params(2, 4, RestartKind::Thick));
        assert!(matches!(
            outcome.reason,
            ConvergedReason::Converged | ConvergedReason::DivergedBreakdown
        ));
        assert!(outcome.values.iter().all(|v| v.is_finite()));
        assert!(outcome.residuals.iter().all(|r| r.is_finite()));
    }

    #[test]
    fn test_monitor_can_stop_the_solve() {
        let values: Vec<f64> = (1..=50).map(|i| i as f64).collect();
        let a = diagonal(&values);
        let p = params(4, 8, RestartKind::Thick);
        let policy = build_policy(ReorthogStrategy::Full, 50, p.ncv);
        let engine = RecurrenceEngine::new(&a, policy, Refinement::IfNeeded).unwrap();
        let mut controller = RestartController::new(engine, p, StartVectorSupplier::new(5));
        let mut stop_now = |_: &IterationReport| MonitorAction::Stop;
        let mut monitors: [&mut dyn Monitor; 1] = [&mut stop_now];
        let outcome = controller.solve(&mut monitors).unwrap();
        assert_eq!(outcome.iterations, 1);
        assert!(matches!(
            outcome.reason,
            ConvergedReason::Stopped | ConvergedReason::Converged
        ));
    }

    #[test]
    fn test_thick_restart_preserves_krylov_relation() {
        let values: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let a = diagonal(&values);
        for strategy in ReorthogStrategy::ALL {
            let mut p = params(3, 12, RestartKind::Thick);
            // Nothing converges in the first iteration, so no column is locked.
            p.tol = 1e-14;
            let policy = build_policy(strategy, 100, p.ncv);
            let engine = RecurrenceEngine::new(&a, policy, Refinement::IfNeeded).unwrap();
            let mut controller = RestartController::new(engine, p, StartVectorSupplier::new(3));
            let v = controller.supplier.next(&controller.dec.basis, 0..0).unwrap();
            controller.dec.basis.extend(v.as_ref()).unwrap();

            let mut monitors: [&mut dyn Monitor; 0] = [];
            assert_eq!(controller.iterate(&mut monitors).unwrap(), None);
            assert_eq!(controller.dec.basis.locked(), 0);
            let kept = controller.dec.applied();
            assert!(kept > 0 && kept < 12, "{strategy}: kept {kept}");

            let mut anorm = controller.anorm;
            let outcome = controller
                .engine
                .extend(&mut controller.dec, 12, &mut anorm)
                .unwrap();
            assert_eq!(outcome.size, 12);

            // A V = V H + f e_m^T over the arrowhead left by the restart.
            let dec = &controller.dec;
            let v = dec.basis.vectors();
            let h = dec.projected();
            let mut defect = &a * v - v * &h;
            for i in 0..100 {
                defect[(i, 11)] -= dec.residual[(i, 0)];
            }
            assert!(
                defect.norm_l2() < 1e-10 * 100.0,
                "{strategy}: relation defect {:.3e}",
                defect.norm_l2()
            );
        }
    }
}
