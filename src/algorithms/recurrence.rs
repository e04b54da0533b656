//! The Recurrence Engine.
//!
//! [`RecurrenceEngine::extend`] grows a [`KrylovDecomposition`] one column at a time:
//! the operator is applied to the newest vector (through the [`LayerStack`]), the
//! deflation space is projected out, the reorthogonalization policy orthogonalizes the
//! result and the coefficients are recorded. The residual is normalized into the next
//! basis vector unless the target size has been reached or breakdown was detected.
//!
//! Breakdown is signaled, never divided through: when the residual norm falls below
//! `16 eps max(||A||, ||A v_j||)` the run stops, the decomposition keeps the columns
//! produced so far, and the residual is left unnormalized.

use super::{
    basis::KrylovDecomposition,
    layers::LayerStack,
    orthog::{Refinement, breakdown_tolerance, project_out},
    reorthog::{FinishContext, ReorthogonalizationPolicy, StepContext},
};
use crate::{
    error::{EigenError, EigenErrorKind},
    matrix::{ApplyContext, LinearOperator},
};
use faer::{
    Mat, MatRef, Par,
    dyn_stack::{MemBuffer, MemStack},
};

/// Result of one call to [`RecurrenceEngine::extend`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtendOutcome {
    /// Number of columns whose image has been computed.
    pub size: usize,
    /// Whether the run stopped early on breakdown.
    pub breakdown: bool,
    /// Norm of the final residual.
    pub beta: f64,
}

/// Applies the operator and the reorthogonalization policy to extend a decomposition.
pub struct RecurrenceEngine<'a, O: LinearOperator + ?Sized> {
    operator: &'a O,
    policy: Box<dyn ReorthogonalizationPolicy>,
    layers: LayerStack,
    refinement: Refinement,
    mem: MemBuffer,
    work: Mat<f64>,
    projections: Vec<f64>,
    applications: usize,
}

impl<'a, O: LinearOperator + ?Sized> RecurrenceEngine<'a, O> {
    /// Creates an engine for a square operator.
    pub fn new(
        operator: &'a O,
        policy: Box<dyn ReorthogonalizationPolicy>,
        refinement: Refinement,
    ) -> Result<Self, EigenError> {
        if operator.nrows() != operator.ncols() {
            return Err(EigenErrorKind::DimensionMismatch {
                operator_cols: operator.ncols(),
                vector_rows: operator.nrows(),
            }
            .into());
        }
        let n = operator.nrows();
        Ok(Self {
            operator,
            policy,
            layers: LayerStack::new(),
            refinement,
            mem: MemBuffer::new(operator.apply_scratch(Par::Seq)),
            work: Mat::zeros(n, 1),
            projections: Vec::new(),
            applications: 0,
        })
    }

    /// Wraps every operator application in `layers`.
    pub fn with_layers(mut self, layers: LayerStack) -> Self {
        self.layers = layers;
        self
    }

    pub fn dim(&self) -> usize {
        self.operator.nrows()
    }

    pub fn policy(&self) -> &dyn ReorthogonalizationPolicy {
        self.policy.as_ref()
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    /// Number of operator applications performed so far.
    pub fn applications(&self) -> usize {
        self.applications
    }

    /// Returns `A x`.
    pub fn apply(&mut self, x: MatRef<'_, f64>) -> Result<Mat<f64>, EigenError> {
        if x.nrows() != self.dim() {
            return Err(EigenErrorKind::DimensionMismatch {
                operator_cols: self.dim(),
                vector_rows: x.nrows(),
            }
            .into());
        }
        let mut y = Mat::zeros(self.dim(), 1);
        self.apply_into(x, &mut y)?;
        Ok(y)
    }

    fn apply_into(&mut self, x: MatRef<'_, f64>, y: &mut Mat<f64>) -> Result<(), EigenError> {
        let operator = self.operator;
        let mem = &mut self.mem;
        let applications = &mut self.applications;

        self.layers.apply(x, y.as_mut(), &mut |x, y| {
            let mut ctx = ApplyContext {
                par: Par::Seq,
                stack: MemStack::new(&mut *mem),
                application: *applications,
            };
            operator
                .apply(y, x, &mut ctx)
                .map_err(|e| EigenError::from(EigenErrorKind::OperatorError(format!("{e:#}"))))?;
            *applications += 1;
            Ok(())
        })?;

        if !(0..y.nrows()).all(|i| y[(i, 0)].is_finite()) {
            return Err(EigenErrorKind::OperatorError(
                "the operator produced non-finite values".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Extends `dec` until `target` columns have had their image computed, or breakdown.
    ///
    /// The decomposition must hold at least one column. If every stored column has
    /// already been applied, the stored residual is normalized into the next vector and
    /// the recurrence continues from it.
    pub fn extend(
        &mut self,
        dec: &mut KrylovDecomposition,
        target: usize,
        anorm: &mut f64,
    ) -> Result<ExtendOutcome, EigenError> {
        if dec.basis.is_empty() {
            return Err(EigenError::input("the decomposition has no starting vector"));
        }
        let target = target.min(dec.basis.capacity());
        if dec.applied() >= target {
            return Ok(ExtendOutcome {
                size: dec.applied(),
                breakdown: false,
                beta: dec.beta,
            });
        }

        if dec.applied() == dec.basis.len() {
            // Continue a finished run from its residual.
            let tolerance = breakdown_tolerance(*anorm);
            if dec.beta <= tolerance {
                return Ok(ExtendOutcome {
                    size: dec.applied(),
                    breakdown: true,
                    beta: dec.beta,
                });
            }
            let residual = dec.residual.clone();
            dec.basis.extend_scaled(residual.as_ref(), dec.beta)?;
        }

        let run_start = dec.applied();
        self.policy.begin_run(run_start);
        if self.projections.len() < dec.basis.capacity() + 1 {
            self.projections.resize(dec.basis.capacity() + 1, 0.0);
        }

        let mut f = std::mem::replace(&mut self.work, Mat::zeros(0, 0));
        let outcome = self.run(dec, run_start, target, anorm, &mut f);
        self.work = f;
        outcome
    }

    fn run(
        &mut self,
        dec: &mut KrylovDecomposition,
        run_start: usize,
        target: usize,
        anorm: &mut f64,
        f: &mut Mat<f64>,
    ) -> Result<ExtendOutcome, EigenError> {
        for j in run_start..target {
            let v = dec.basis.column_mat(j).to_owned();
            self.apply_into(v.as_ref(), f)?;
            project_out(dec.basis.deflation(), f);

            let projections = &mut self.projections[..j + 1];
            projections.fill(0.0);
            let step = self.policy.step(StepContext {
                basis: &mut dec.basis,
                coeffs: &mut dec.coeffs,
                j,
                run_start,
                f: &mut *f,
                projections,
                anorm: &mut *anorm,
                refinement: self.refinement,
            })?;

            let window = dec.basis.locked()..j + 1;
            dec.coeffs
                .record_step(j, window, &self.projections, step.norm);
            dec.set_applied(j + 1);

            let tolerance = breakdown_tolerance(anorm.max(step.prior_norm));
            if step.breakdown || step.norm <= tolerance {
                log::info!(
                    "Krylov breakdown at step {j} (residual norm {:.3e}).",
                    step.norm
                );
                dec.residual.copy_from(f.as_ref());
                dec.beta = step.norm;
                return Ok(ExtendOutcome {
                    size: j + 1,
                    breakdown: true,
                    beta: step.norm,
                });
            }

            if j + 1 < target {
                dec.basis.extend_scaled(f.as_ref(), step.norm)?;
            } else {
                dec.residual.copy_from(f.as_ref());
                dec.beta = step.norm;
            }
        }

        self.policy.finish_run(FinishContext {
            basis: &dec.basis,
            coeffs: &mut dec.coeffs,
            last: target - 1,
            residual: &mut dec.residual,
            beta: &mut dec.beta,
            refinement: self.refinement,
        });

        Ok(ExtendOutcome {
            size: target,
            breakdown: false,
            beta: dec.beta,
        })
    }
}
