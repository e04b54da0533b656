//! This module provides a high-level, user-friendly API for computing a few eigenpairs
//! of a large symmetric operator with a restarted Krylov method.
//!
//! [`EigenSolver`] validates a [`SolverConfig`], wires the recurrence engine, the chosen
//! reorthogonalization policy, the operator layers and the restart controller together,
//! and returns an [`EigenSolution`]. Reaching the iteration limit or a monitor stop is
//! not an error: the solution carries whatever converged and a [`ConvergedReason`].

pub use crate::algorithms::restart::ConvergedReason;

use crate::{
    algorithms::{
        layers::{ApplyCounter, ApplyTimer, LayerStack},
        monitor::{LogMonitor, Monitor},
        recurrence::RecurrenceEngine,
        reorthog::build_policy,
        restart::RestartController,
        start::StartVectorSupplier,
    },
    config::SolverConfig,
    error::EigenError,
    matrix::LinearOperator,
};
use faer::{Mat, MatRef};

/// Converged eigenpairs, ranked by the selection criterion, and how the solve ended.
#[derive(Debug, Clone)]
pub struct EigenSolution {
    pub eigenvalues: Vec<f64>,
    /// Column `i` is the unit eigenvector of `eigenvalues[i]`.
    pub eigenvectors: Mat<f64>,
    /// Relative residual bounds from the projected problem.
    pub error_estimates: Vec<f64>,
    /// True residual norms `||A x - lambda x||`, computed after the solve.
    pub residual_norms: Vec<f64>,
    pub reason: ConvergedReason,
    pub iterations: usize,
    /// Operator applications, including the ones spent on residual checks.
    pub applications: usize,
}

impl EigenSolution {
    /// Number of converged eigenpairs. It may exceed the requested count.
    pub fn nconv(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_converged(&self) -> bool {
        self.reason == ConvergedReason::Converged
    }

    pub fn eigenvector(&self, i: usize) -> MatRef<'_, f64> {
        self.eigenvectors.as_ref().get(.., i..i + 1)
    }

    /// True residual norm of pair `i`.
    pub fn residual_norm(&self, i: usize) -> f64 {
        self.residual_norms[i]
    }
}

/// A configured eigensolver, reusable across operators of any dimension the
/// configuration fits.
#[derive(Debug, Clone, Default)]
pub struct EigenSolver {
    config: SolverConfig,
}

impl EigenSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Computes the wanted eigenpairs of `operator`, logging every iteration at `debug`.
    ///
    /// # Arguments
    /// * `operator`: A square, symmetric operator implementing [`LinearOperator`].
    ///
    /// # Returns
    /// The converged eigenpairs, or an `EigenError` if the configuration is invalid or
    /// the operator or the projected solve failed.
    pub fn solve<O: LinearOperator + ?Sized>(&self, operator: &O) -> Result<EigenSolution, EigenError> {
        self.solve_monitored(operator, &mut [&mut LogMonitor])
    }

    /// Like [`EigenSolver::solve`], reporting every outer iteration to `monitors`. Any
    /// monitor can stop the solve.
    pub fn solve_monitored<O: LinearOperator + ?Sized>(
        &self,
        operator: &O,
        monitors: &mut [&mut dyn Monitor],
    ) -> Result<EigenSolution, EigenError> {
        let n = operator.nrows();
        let resolved = self.config.resolve(n)?;

        let mut layers = LayerStack::new();
        layers.push(ApplyTimer::default()).push(ApplyCounter::default());

        let policy = build_policy(resolved.reorthog, n, resolved.restart.ncv);
        let engine = RecurrenceEngine::new(operator, policy, resolved.refinement)?.with_layers(layers);

        let mut supplier = StartVectorSupplier::new(resolved.seed);
        if let Some(v) = &resolved.initial_vector {
            supplier = supplier.with_initial(v.as_ref(), n)?;
        }

        let mut controller = RestartController::new(engine, resolved.restart, supplier);
        if let Some(space) = &resolved.deflation_space {
            controller = controller.with_deflation_space(space.as_ref())?;
        }

        let outcome = controller.solve(monitors)?;
        for (name, summary) in controller.engine().layers().summaries() {
            log::debug!("[{name}] {summary}");
        }
        let stats = controller.engine().policy().stats();
        log::debug!(
            "[{}] {} extended steps, up to {} Ritz vectors, promoted: {}",
            resolved.reorthog,
            stats.extra_steps,
            stats.ritz_vectors,
            stats.promoted
        );

        Ok(EigenSolution {
            eigenvalues: outcome.values,
            eigenvectors: outcome.vectors,
            error_estimates: outcome.errors,
            residual_norms: outcome.residuals,
            reason: outcome.reason,
            iterations: outcome.iterations,
            applications: outcome.applications,
        })
    }
}
