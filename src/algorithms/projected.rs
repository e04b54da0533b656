//! The projected eigenproblem.
//!
//! Every outer iteration diagonalizes the small matrix `H = V^T A V` restricted to the
//! active window. The engine treats this solve as exact to machine precision, so any
//! failure here means the coefficient matrix has been corrupted and is reported as fatal.

use crate::error::{EigenError, EigenErrorKind};
use faer::{Mat, MatRef, Side};

/// Eigenvalues (ascending, as produced by the solver) and eigenvectors of a projected matrix.
#[derive(Debug, Clone)]
pub struct ProjectedEigen {
    pub values: Vec<f64>,
    /// Column `i` is the eigenvector of `values[i]`.
    pub vectors: Mat<f64>,
}

impl ProjectedEigen {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Solves the dense projected eigenproblem.
pub trait ProjectedSolver {
    fn solve(&mut self, h: MatRef<'_, f64>) -> Result<ProjectedEigen, EigenError>;
}

/// Symmetric eigensolver backed by [`faer`]'s self-adjoint decomposition.
///
/// Only the lower triangle of the input is read.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymmetricEigenSolver;

impl ProjectedSolver for SymmetricEigenSolver {
    fn solve(&mut self, h: MatRef<'_, f64>) -> Result<ProjectedEigen, EigenError> {
        let order = h.nrows();
        if order == 0 {
            return Ok(ProjectedEigen {
                values: Vec::new(),
                vectors: Mat::zeros(0, 0),
            });
        }

        let evd = h
            .self_adjoint_eigen(Side::Lower)
            .map_err(|e| EigenError::from(EigenErrorKind::EvdError(e)))?;

        let values: Vec<f64> = (0..order).map(|i| evd.S()[i]).collect();
        let vectors = evd.U().to_owned();

        let finite = values.iter().all(|v| v.is_finite())
            && (0..order).all(|j| (0..order).all(|i| vectors[(i, j)].is_finite()));
        if !finite {
            return Err(EigenErrorKind::NonFiniteProjection { order }.into());
        }

        Ok(ProjectedEigen { values, vectors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;

    #[test]
    fn test_symmetric_solver_returns_ascending_pairs() {
        let h: Mat<f64> = mat![[2.0, 1.0], [1.0, 2.0]];
        let eig = SymmetricEigenSolver.solve(h.as_ref()).unwrap();
        assert_eq!(eig.len(), 2);
        assert!((eig.values[0] - 1.0).abs() < 1e-14);
        assert!((eig.values[1] - 3.0).abs() < 1e-14);

        // Check H y = theta y for every pair.
        for i in 0..2 {
            let y = eig.vectors.as_ref().get(.., i..i + 1);
            let r = &h * y - y * faer::Scale(eig.values[i]);
            assert!(r.norm_l2() < 1e-14);
        }
    }

    #[test]
    fn test_empty_projection() {
        let h = Mat::<f64>::zeros(0, 0);
        assert!(SymmetricEigenSolver.solve(h.as_ref()).unwrap().is_empty());
    }
}
