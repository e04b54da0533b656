//! Solver options and their validation.
//!
//! A [`SolverConfig`] collects what the caller asked for; [`SolverConfig::resolve`] checks
//! it against the operator dimension and fills in every default, so that an invalid
//! request fails before the first operator application.

use crate::{
    algorithms::{
        convergence::SelectionCriterion,
        orthog::Refinement,
        reorthog::ReorthogStrategy,
        restart::{RestartKind, RestartParams},
    },
    error::{EigenError, EigenErrorKind},
};
use faer::Mat;

/// Default convergence tolerance.
pub const DEFAULT_TOL: f64 = 1e-8;
/// Default share of unconverged Ritz vectors kept by a thick restart.
pub const DEFAULT_KEEP_FRACTION: f64 = 0.5;
/// Minimum default iteration limit.
const MIN_MAX_IT: usize = 100;
/// Above this many requested eigenpairs the active window is capped by default.
const LARGE_NEV: usize = 500;

/// Symmetry of the problem. Only Hermitian problems are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProblemKind {
    #[default]
    Hermitian,
    NonHermitian,
}

/// Options of an eigensolve. Unset options get their defaults in [`SolverConfig::resolve`].
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub nev: usize,
    pub ncv: Option<usize>,
    pub mpd: Option<usize>,
    pub max_it: Option<usize>,
    pub tol: f64,
    pub reorthog: ReorthogStrategy,
    pub refinement: Refinement,
    pub which: SelectionCriterion,
    pub keep_fraction: f64,
    pub restart: RestartKind,
    pub problem: ProblemKind,
    pub seed: u64,
    pub initial_vector: Option<Mat<f64>>,
    pub deflation_space: Option<Mat<f64>>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            nev: 1,
            ncv: None,
            mpd: None,
            max_it: None,
            tol: DEFAULT_TOL,
            reorthog: ReorthogStrategy::default(),
            refinement: Refinement::default(),
            which: SelectionCriterion::default(),
            keep_fraction: DEFAULT_KEEP_FRACTION,
            restart: RestartKind::default(),
            problem: ProblemKind::default(),
            seed: 0,
            initial_vector: None,
            deflation_space: None,
        }
    }
}

/// Options after validation, with every default filled in.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub restart: RestartParams,
    pub reorthog: ReorthogStrategy,
    pub refinement: Refinement,
    pub seed: u64,
    pub initial_vector: Option<Mat<f64>>,
    pub deflation_space: Option<Mat<f64>>,
}

impl SolverConfig {
    pub fn new(nev: usize) -> Self {
        Self {
            nev,
            ..Self::default()
        }
    }

    pub fn with_ncv(mut self, ncv: usize) -> Self {
        self.ncv = Some(ncv);
        self
    }

    pub fn with_mpd(mut self, mpd: usize) -> Self {
        self.mpd = Some(mpd);
        self
    }

    pub fn with_max_it(mut self, max_it: usize) -> Self {
        self.max_it = Some(max_it);
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_reorthog(mut self, strategy: ReorthogStrategy) -> Self {
        self.reorthog = strategy;
        self
    }

    pub fn with_refinement(mut self, refinement: Refinement) -> Self {
        self.refinement = refinement;
        self
    }

    pub fn with_which(mut self, which: SelectionCriterion) -> Self {
        self.which = which;
        self
    }

    pub fn with_keep_fraction(mut self, fraction: f64) -> Self {
        self.keep_fraction = fraction;
        self
    }

    pub fn with_restart(mut self, kind: RestartKind) -> Self {
        self.restart = kind;
        self
    }

    pub fn with_problem(mut self, problem: ProblemKind) -> Self {
        self.problem = problem;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_initial_vector(mut self, v: Mat<f64>) -> Self {
        self.initial_vector = Some(v);
        self
    }

    pub fn with_deflation_space(mut self, space: Mat<f64>) -> Self {
        self.deflation_space = Some(space);
        self
    }

    /// Validates the options for an operator of dimension `n` and fills in defaults.
    ///
    /// # Errors
    /// * `Unsupported` for a non-Hermitian problem or a criterion on imaginary parts.
    /// * `InputError` for out-of-range counts, tolerance or keep fraction.
    /// * `DimensionMismatch` for an initial vector or deflation space of the wrong size.
    pub fn resolve(&self, n: usize) -> Result<ResolvedConfig, EigenError> {
        if self.problem != ProblemKind::Hermitian {
            return Err(EigenError::unsupported(
                "only Hermitian (real symmetric) problems are supported",
            ));
        }
        self.which.validate_hermitian()?;

        let ndefl = match &self.deflation_space {
            Some(space) => {
                if space.nrows() != n {
                    return Err(EigenErrorKind::DimensionMismatch {
                        operator_cols: n,
                        vector_rows: space.nrows(),
                    }
                    .into());
                }
                space.ncols()
            }
            None => 0,
        };
        if let Some(v) = &self.initial_vector {
            if v.nrows() != n || v.ncols() != 1 {
                return Err(EigenErrorKind::DimensionMismatch {
                    operator_cols: n,
                    vector_rows: v.nrows(),
                }
                .into());
            }
        }

        let nev = self.nev;
        if nev == 0 {
            return Err(EigenError::input("nev must be positive"));
        }
        if nev + ndefl > n {
            return Err(EigenError::input(format!(
                "cannot compute {nev} eigenpairs of an operator of dimension {n} with {ndefl} deflation vectors"
            )));
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(EigenError::input("the tolerance must be positive and finite"));
        }
        if !(self.keep_fraction > 0.0 && self.keep_fraction < 1.0) {
            return Err(EigenError::input("keep_fraction must lie in (0, 1)"));
        }

        let room = n - ndefl;
        let (ncv, mpd) = match (self.ncv, self.mpd) {
            (Some(ncv), mpd) => {
                if ncv < nev {
                    return Err(EigenError::input("ncv must be at least nev"));
                }
                let ncv = ncv.min(room);
                (ncv, mpd.unwrap_or(ncv))
            }
            (None, Some(mpd)) => ((nev + mpd).min(room), mpd),
            (None, None) if nev < LARGE_NEV => {
                let ncv = (2 * nev).max(nev + 15).min(room);
                (ncv, ncv)
            }
            (None, None) => ((nev + LARGE_NEV).min(room), LARGE_NEV),
        };
        if mpd == 0 {
            return Err(EigenError::input("mpd must be positive"));
        }
        if ncv > nev + mpd {
            return Err(EigenError::input(format!(
                "ncv ({ncv}) must not exceed nev + mpd ({})",
                nev + mpd
            )));
        }
        let mpd = mpd.min(ncv);
        let max_it = self.max_it.unwrap_or(MIN_MAX_IT.max(2 * n / ncv));
        if max_it == 0 {
            return Err(EigenError::input("max_it must be positive"));
        }

        log::info!(
            "Resolved setup: nev {nev}, ncv {ncv}, mpd {mpd}, max_it {max_it}, tol {:.1e}, {} reorthogonalization, {:?} restart.",
            self.tol,
            self.reorthog,
            self.restart
        );

        Ok(ResolvedConfig {
            restart: RestartParams {
                nev,
                ncv,
                mpd,
                max_it,
                tol: self.tol,
                criterion: self.which.clone(),
                keep_fraction: self.keep_fraction,
                kind: self.restart,
            },
            reorthog: self.reorthog,
            refinement: self.refinement,
            seed: self.seed,
            initial_vector: self.initial_vector.clone(),
            deflation_space: self.deflation_space.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_subspace_sizes() {
        let resolved = SolverConfig::new(3).resolve(1000).unwrap();
        assert_eq!(resolved.restart.ncv, 18);
        assert_eq!(resolved.restart.mpd, 18);
        assert_eq!(resolved.restart.max_it, 111);

        let resolved = SolverConfig::new(3).resolve(10).unwrap();
        assert_eq!(resolved.restart.ncv, 10);
        assert_eq!(resolved.restart.max_it, 100);

        let resolved = SolverConfig::new(4).with_mpd(6).resolve(100).unwrap();
        assert_eq!(resolved.restart.ncv, 10);
        assert_eq!(resolved.restart.mpd, 6);
    }

    #[test]
    fn test_more_eigenvalues_than_dimension_is_rejected() {
        let err = SolverConfig::new(11).resolve(10).unwrap_err();
        assert!(matches!(err.kind(), EigenErrorKind::InputError(_)));
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let input = |config: SolverConfig| {
            matches!(config.resolve(50).unwrap_err().kind(), EigenErrorKind::InputError(_))
        };
        assert!(input(SolverConfig::new(0)));
        assert!(input(SolverConfig::new(5).with_ncv(4)));
        assert!(input(SolverConfig::new(5).with_tol(0.0)));
        assert!(input(SolverConfig::new(5).with_tol(f64::NAN)));
        assert!(input(SolverConfig::new(5).with_keep_fraction(1.0)));
        assert!(input(SolverConfig::new(2).with_ncv(20).with_mpd(5)));
    }

    #[test]
    fn test_unsupported_configurations_fail_fast() {
        let err = SolverConfig::new(2)
            .with_problem(ProblemKind::NonHermitian)
            .resolve(10)
            .unwrap_err();
        assert!(matches!(err.kind(), EigenErrorKind::Unsupported(_)));

        let err = SolverConfig::new(2)
            .with_which(SelectionCriterion::LargestImaginary)
            .resolve(10)
            .unwrap_err();
        assert!(matches!(err.kind(), EigenErrorKind::Unsupported(_)));
    }

    #[test]
    fn test_deflation_space_reduces_room() {
        let space = Mat::<f64>::zeros(10, 3);
        let err = SolverConfig::new(8)
            .with_deflation_space(space.clone())
            .resolve(10)
            .unwrap_err();
        assert!(matches!(err.kind(), EigenErrorKind::InputError(_)));

        let resolved = SolverConfig::new(2).with_deflation_space(space).resolve(10).unwrap();
        assert_eq!(resolved.restart.ncv, 7);
    }
}
