//! Initial and restart vectors.
//!
//! The supplier hands out the caller's initial vector once, then random vectors drawn
//! from a seeded generator, so two solves with the same seed follow the same path.
//! Every vector is made orthogonal to the deflation space and to the requested basis
//! columns before it is normalized.

use super::{
    basis::KrylovBasis,
    orthog::{ColumnSet, Refinement, breakdown_tolerance, orthogonalize, project_out},
};
use crate::error::{EigenError, EigenErrorKind};
use faer::{Mat, MatRef};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::ops::Range;

/// Number of random draws tried before giving up on a restart vector.
const MAX_DRAWS: usize = 3;

/// Source of unit starting vectors.
#[derive(Debug, Clone)]
pub struct StartVectorSupplier {
    rng: StdRng,
    initial: Option<Mat<f64>>,
}

impl StartVectorSupplier {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            initial: None,
        }
    }

    /// Uses `v` as the first vector. It must be a nonzero column of dimension `n`.
    pub fn with_initial(mut self, v: MatRef<'_, f64>, n: usize) -> Result<Self, EigenError> {
        if v.nrows() != n || v.ncols() != 1 {
            return Err(EigenErrorKind::DimensionMismatch {
                operator_cols: n,
                vector_rows: v.nrows(),
            }
            .into());
        }
        if v.norm_l2() == 0.0 || !v.norm_l2().is_finite() {
            return Err(EigenError::input("the initial vector must be nonzero and finite"));
        }
        self.initial = Some(v.to_owned());
        Ok(self)
    }

    /// A random vector with entries uniform in `[-1, 1)`.
    pub fn random(&mut self, n: usize) -> Mat<f64> {
        Mat::from_fn(n, 1, |_, _| self.rng.random_range(-1.0..1.0))
    }

    /// The caller's vector if it has not been used yet, otherwise a random one.
    fn draw(&mut self, n: usize) -> Mat<f64> {
        match self.initial.take() {
            Some(v) => v,
            None => self.random(n),
        }
    }

    /// Returns a unit vector orthogonal to the deflation space of `basis` and to its
    /// columns in `against`, or `None` if every draw collapsed.
    pub fn next(&mut self, basis: &KrylovBasis, against: Range<usize>) -> Option<Mat<f64>> {
        let n = basis.dim();
        for attempt in 0..MAX_DRAWS {
            let v = self.draw(n);
            if let Some(v) = prepare(basis, against.clone(), v) {
                return Some(v);
            }
            log::debug!("Start vector draw {attempt} lies in the excluded subspace.");
        }
        None
    }
}

/// Orthogonalizes `v` against the deflation space and `V[:, against]`, then normalizes.
pub(crate) fn prepare(basis: &KrylovBasis, against: Range<usize>, mut v: Mat<f64>) -> Option<Mat<f64>> {
    let prior = v.norm_l2();
    project_out(basis.deflation(), &mut v);
    let mut scratch = vec![0.0; against.end];
    let norm = orthogonalize(
        basis.vectors(),
        &ColumnSet::range(against),
        &mut v,
        &mut scratch,
        Refinement::Always,
    )
    .norm;
    if !norm.is_finite() || norm == 0.0 || norm <= breakdown_tolerance(prior) {
        return None;
    }
    let scale = 1.0 / norm;
    for i in 0..v.nrows() {
        v[(i, 0)] *= scale;
    }
    Some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;

    #[test]
    fn test_initial_vector_is_used_once() {
        let v: Mat<f64> = mat![[3.0], [4.0]];
        let basis = KrylovBasis::new(2, 2);
        let mut supplier = StartVectorSupplier::new(7).with_initial(v.as_ref(), 2).unwrap();
        let first = supplier.next(&basis, 0..0).unwrap();
        assert!((first[(0, 0)] - 0.6).abs() < 1e-15);
        assert!((first[(1, 0)] - 0.8).abs() < 1e-15);
        let second = supplier.next(&basis, 0..0).unwrap();
        assert!((second.norm_l2() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_same_seed_gives_same_vectors() {
        let basis = KrylovBasis::new(16, 2);
        let a = StartVectorSupplier::new(42).next(&basis, 0..0).unwrap();
        let b = StartVectorSupplier::new(42).next(&basis, 0..0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_vector_is_orthogonal_to_excluded_columns() {
        let mut basis = KrylovBasis::new(3, 3);
        basis.extend(mat![[1.0], [0.0], [0.0]].as_ref()).unwrap();
        let space: Mat<f64> = mat![[0.0], [1.0], [0.0]];
        let basis = basis.with_deflation_space(space.as_ref()).unwrap();

        let mut supplier = StartVectorSupplier::new(1);
        let v = supplier.next(&basis, 0..1).unwrap();
        assert!(v[(0, 0)].abs() < 1e-15);
        assert!(v[(1, 0)].abs() < 1e-15);
        assert!((v[(2, 0)].abs() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_exhausted_space_gives_none() {
        let mut basis = KrylovBasis::new(1, 2);
        basis.extend(mat![[1.0]].as_ref()).unwrap();
        let mut supplier = StartVectorSupplier::new(3);
        assert!(supplier.next(&basis, 0..1).is_none());
    }

    #[test]
    fn test_zero_initial_vector_is_rejected() {
        let zero = Mat::<f64>::zeros(4, 1);
        let err = StartVectorSupplier::new(0).with_initial(zero.as_ref(), 4).unwrap_err();
        assert!(matches!(err.kind(), EigenErrorKind::InputError(_)));
        let short = Mat::<f64>::zeros(3, 1);
        let err = StartVectorSupplier::new(0).with_initial(short.as_ref(), 4).unwrap_err();
        assert!(matches!(err.kind(), EigenErrorKind::DimensionMismatch { .. }));
    }
}
