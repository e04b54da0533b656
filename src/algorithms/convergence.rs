//! Convergence & Ordering.
//!
//! Turns the eigenpairs of the projected matrix into residual bounds, classifies them,
//! sorts them by the caller's selection criterion and picks the restart direction. The
//! central function, [`assess`], is pure: running it twice on the same inputs gives the
//! same result.

use super::projected::ProjectedEigen;
use crate::error::EigenError;
use std::{cmp::Ordering, fmt, sync::Arc};

/// A caller-supplied ranking: `Less` means the first value is wanted before the second.
pub type Comparator = Arc<dyn Fn(f64, f64) -> Ordering + Send + Sync>;

/// Which eigenvalues are wanted.
#[derive(Clone, Default)]
pub enum SelectionCriterion {
    #[default]
    LargestMagnitude,
    SmallestMagnitude,
    LargestReal,
    SmallestReal,
    /// Closest to the target, in absolute distance.
    TargetMagnitude(f64),
    /// Closest to the target along the real axis.
    TargetReal(f64),
    LargestImaginary,
    SmallestImaginary,
    Custom(Comparator),
}

impl fmt::Debug for SelectionCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LargestMagnitude => f.write_str("LargestMagnitude"),
            Self::SmallestMagnitude => f.write_str("SmallestMagnitude"),
            Self::LargestReal => f.write_str("LargestReal"),
            Self::SmallestReal => f.write_str("SmallestReal"),
            Self::TargetMagnitude(t) => write!(f, "TargetMagnitude({t})"),
            Self::TargetReal(t) => write!(f, "TargetReal({t})"),
            Self::LargestImaginary => f.write_str("LargestImaginary"),
            Self::SmallestImaginary => f.write_str("SmallestImaginary"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl std::str::FromStr for SelectionCriterion {
    type Err = String;

    /// Parses the criterion names; target criteria start with a target of zero, see
    /// [`SelectionCriterion::with_target`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "largest_magnitude" | "lm" => Ok(Self::LargestMagnitude),
            "smallest_magnitude" | "sm" => Ok(Self::SmallestMagnitude),
            "largest_real" | "lr" => Ok(Self::LargestReal),
            "smallest_real" | "sr" => Ok(Self::SmallestReal),
            "target_magnitude" | "tm" => Ok(Self::TargetMagnitude(0.0)),
            "target_real" | "tr" => Ok(Self::TargetReal(0.0)),
            "largest_imaginary" | "li" => Ok(Self::LargestImaginary),
            "smallest_imaginary" | "si" => Ok(Self::SmallestImaginary),
            other => Err(format!("unknown selection criterion '{other}'")),
        }
    }
}

impl SelectionCriterion {
    /// Replaces the target of a target criterion; other criteria are returned unchanged.
    pub fn with_target(self, target: f64) -> Self {
        match self {
            Self::TargetMagnitude(_) => Self::TargetMagnitude(target),
            Self::TargetReal(_) => Self::TargetReal(target),
            other => other,
        }
    }

    /// Rejects criteria that make no sense for a real symmetric spectrum.
    pub fn validate_hermitian(&self) -> Result<(), EigenError> {
        match self {
            Self::LargestImaginary | Self::SmallestImaginary => Err(EigenError::unsupported(
                format!("selection criterion {self:?} is incompatible with a Hermitian problem"),
            )),
            Self::TargetMagnitude(t) | Self::TargetReal(t) if !t.is_finite() => {
                Err(EigenError::input("the target must be finite"))
            }
            _ => Ok(()),
        }
    }

    /// Ranks `a` against `b`.
    pub fn compare(&self, a: f64, b: f64) -> Ordering {
        match self {
            Self::LargestMagnitude => b.abs().total_cmp(&a.abs()),
            Self::SmallestMagnitude => a.abs().total_cmp(&b.abs()),
            Self::LargestReal => b.total_cmp(&a),
            Self::SmallestReal => a.total_cmp(&b),
            Self::TargetMagnitude(t) | Self::TargetReal(t) => (a - t).abs().total_cmp(&(b - t).abs()),
            // Real values have no imaginary part to rank by.
            Self::LargestImaginary | Self::SmallestImaginary => Ordering::Equal,
            Self::Custom(cmp) => cmp(a, b),
        }
    }

    /// Indices of `values` in ranked order. The sort is stable: ties keep their order.
    pub fn sort_indices(&self, values: &[f64]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&i, &j| self.compare(values[i], values[j]));
        order
    }
}

/// Classification of one Ritz pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairStatus {
    Converged,
    NotConverged,
    /// Converged, but a copy of an already accepted value (lost orthogonality).
    Repeated,
    /// Converged by its bound, but the true residual says otherwise.
    Spurious,
}

/// One Ritz pair as seen by the convergence test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EigenpairEstimate {
    pub value: f64,
    /// Relative residual bound.
    pub error: f64,
    pub status: PairStatus,
    /// Column of the projected eigenvector matrix.
    pub index: usize,
}

/// Inputs of the convergence test that do not come from the projected solve.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceTest<'a> {
    /// Norm of the residual of the decomposition.
    pub beta: f64,
    /// Estimate of the operator norm.
    pub anorm: f64,
    pub tol: f64,
    /// Mark converged copies of accepted values as [`PairStatus::Repeated`].
    pub purge_repeated: bool,
    /// Values already locked in previous iterations.
    pub accepted: &'a [f64],
}

/// Result of [`assess`].
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// Every Ritz pair, in ranked order.
    pub estimates: Vec<EigenpairEstimate>,
    /// Length of the leading run of pairs that are no longer iterated on (converged,
    /// repeated or spurious).
    pub settled: usize,
    /// Position in `estimates` of the best-ranked pair that has not converged.
    pub restart: Option<usize>,
}

impl Assessment {
    /// Pairs in the settled prefix that are genuinely converged.
    pub fn converged(&self) -> impl Iterator<Item = &EigenpairEstimate> {
        self.estimates[..self.settled]
            .iter()
            .filter(|e| e.status == PairStatus::Converged)
    }

    pub fn converged_count(&self) -> usize {
        self.converged().count()
    }

    /// Recomputes `settled` and `restart` after statuses were changed by the caller.
    pub fn refresh(&mut self) {
        self.settled = self
            .estimates
            .iter()
            .take_while(|e| e.status != PairStatus::NotConverged)
            .count();
        self.restart = self
            .estimates
            .iter()
            .position(|e| e.status == PairStatus::NotConverged);
    }
}

/// Residual bound of a Ritz pair: `(beta |y_last| + eps ||A||) / |theta|`, absolute when
/// `theta` is zero.
pub fn residual_bound(value: f64, last_component: f64, beta: f64, anorm: f64) -> f64 {
    let residual = (beta * last_component).abs() + f64::EPSILON * anorm;
    if value == 0.0 {
        residual
    } else {
        residual / value.abs()
    }
}

/// Estimates, classifies and ranks the Ritz pairs of `eig`.
pub fn assess(
    eig: &ProjectedEigen,
    criterion: &SelectionCriterion,
    test: &ConvergenceTest<'_>,
) -> Assessment {
    let m = eig.len();
    let mut accepted: Vec<f64> = test.accepted.to_vec();
    let mut estimates = Vec::with_capacity(m);

    for index in criterion.sort_indices(&eig.values) {
        let value = eig.values[index];
        let last = if m > 0 { eig.vectors[(m - 1, index)] } else { 0.0 };
        let error = residual_bound(value, last, test.beta, test.anorm);

        let mut status = if error < test.tol {
            PairStatus::Converged
        } else {
            PairStatus::NotConverged
        };
        if status == PairStatus::Converged && test.purge_repeated {
            let scale = if value == 0.0 { 1.0 } else { value.abs() };
            if accepted.iter().any(|a| (a - value).abs() / scale < test.tol) {
                status = PairStatus::Repeated;
            } else {
                accepted.push(value);
            }
        }

        estimates.push(EigenpairEstimate {
            value,
            error,
            status,
            index,
        });
    }

    let mut assessment = Assessment {
        estimates,
        settled: 0,
        restart: None,
    };
    assessment.refresh();
    assessment
}
