//! This module defines the core abstraction for linear operators.
//!
//! A Krylov eigensolver never looks at the individual entries of the matrix whose
//! spectrum it approximates. Its only access to the problem is the matrix-vector
//! product, so the algorithms are written against the [`LinearOperator`] trait and
//! work unchanged for dense matrices, sparse matrices, or spectral transformations
//! (shift-and-invert, polynomial filters) whose action is computed on the fly.
//!
//! Operators receive an explicit [`ApplyContext`] on every call. It carries the
//! parallelism setting, a scratch stack sized from [`LinearOperator::apply_scratch`],
//! and the index of the current application, so any per-call state an operator needs
//! travels through the call itself instead of being stashed in shared globals.
//! Application is fallible: an operator that performs an inner linear solve can
//! report its failure through [`anyhow::Error`], which the engine treats as fatal.

use anyhow::ensure;
use faer::{
    Accum, Mat, MatMut, MatRef, Par,
    dyn_stack::{MemStack, StackReq},
    linalg::matmul::matmul,
    matrix_free::LinOp,
    sparse::{SparseColMat, SparseColMatRef},
};

/// Per-call context handed to [`LinearOperator::apply`].
pub struct ApplyContext<'a> {
    /// Parallelism the operator may use for this product.
    pub par: Par,
    /// Scratch memory, at least as large as the operator's [`LinearOperator::apply_scratch`].
    pub stack: &'a mut MemStack,
    /// Zero-based count of applications performed so far in this solve.
    pub application: usize,
}

/// Represents a square linear operator that can be applied to a vector.
///
/// # Example
///
/// ```
/// use faer::{Mat, mat};
/// use faer::dyn_stack::{MemBuffer, MemStack};
/// use krylov_eigs::matrix::{ApplyContext, LinearOperator};
///
/// let a: Mat<f64> = mat![[2.0, -1.0], [-1.0, 2.0]];
/// let x: Mat<f64> = mat![[1.0], [1.0]];
/// let mut y = Mat::<f64>::zeros(2, 1);
///
/// let mut mem = MemBuffer::new(a.apply_scratch(faer::Par::Seq));
/// let mut ctx = ApplyContext {
///     par: faer::Par::Seq,
///     stack: MemStack::new(&mut mem),
///     application: 0,
/// };
/// a.apply(y.as_mut(), x.as_ref(), &mut ctx).unwrap();
/// assert_eq!(y, mat![[1.0], [1.0]]);
/// ```
pub trait LinearOperator {
    /// Returns the number of rows of the operator.
    fn nrows(&self) -> usize;

    /// Returns the number of columns of the operator.
    fn ncols(&self) -> usize;

    /// Scratch memory required by a single-column application.
    fn apply_scratch(&self, par: Par) -> StackReq {
        let _ = par;
        StackReq::empty()
    }

    /// Writes `A * rhs` into `out`.
    ///
    /// `rhs` and `out` are single-column matrices of matching dimension.
    fn apply(
        &self,
        out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        ctx: &mut ApplyContext<'_>,
    ) -> anyhow::Result<()>;
}

impl<O: LinearOperator + ?Sized> LinearOperator for &O {
    #[inline]
    fn nrows(&self) -> usize {
        (**self).nrows()
    }

    #[inline]
    fn ncols(&self) -> usize {
        (**self).ncols()
    }

    #[inline]
    fn apply_scratch(&self, par: Par) -> StackReq {
        (**self).apply_scratch(par)
    }

    #[inline]
    fn apply(
        &self,
        out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        ctx: &mut ApplyContext<'_>,
    ) -> anyhow::Result<()> {
        (**self).apply(out, rhs, ctx)
    }
}

/// Dense matrix view. This is the concrete implementation most tests run against.
impl LinearOperator for MatRef<'_, f64> {
    #[inline]
    fn nrows(&self) -> usize {
        MatRef::nrows(self)
    }

    #[inline]
    fn ncols(&self) -> usize {
        MatRef::ncols(self)
    }

    fn apply(
        &self,
        out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        ctx: &mut ApplyContext<'_>,
    ) -> anyhow::Result<()> {
        ensure!(
            MatRef::ncols(self) == rhs.nrows(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            MatRef::ncols(self),
            rhs.nrows(),
        );
        matmul(out, Accum::Replace, *self, rhs, 1.0, ctx.par);
        Ok(())
    }
}

/// Owned dense matrix, delegating to the [`MatRef`] implementation.
impl LinearOperator for Mat<f64> {
    #[inline]
    fn nrows(&self) -> usize {
        self.as_ref().nrows()
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.as_ref().ncols()
    }

    #[inline]
    fn apply(
        &self,
        out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        ctx: &mut ApplyContext<'_>,
    ) -> anyhow::Result<()> {
        LinearOperator::apply(&self.as_ref(), out, rhs, ctx)
    }
}

/// Sparse CSC view, delegating to [`faer`]'s matrix-free [`LinOp`] kernel.
impl LinearOperator for SparseColMatRef<'_, usize, f64> {
    #[inline]
    fn nrows(&self) -> usize {
        LinOp::<f64>::nrows(self)
    }

    #[inline]
    fn ncols(&self) -> usize {
        LinOp::<f64>::ncols(self)
    }

    fn apply_scratch(&self, par: Par) -> StackReq {
        <Self as LinOp<f64>>::apply_scratch(self, 1, par)
    }

    fn apply(
        &self,
        out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        ctx: &mut ApplyContext<'_>,
    ) -> anyhow::Result<()> {
        ensure!(
            LinOp::<f64>::ncols(self) == rhs.nrows(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            LinOp::<f64>::ncols(self),
            rhs.nrows(),
        );
        <Self as LinOp<f64>>::apply(self, out, rhs, ctx.par, ctx.stack);
        Ok(())
    }
}

/// Owned sparse CSC matrix, delegating to the [`SparseColMatRef`] implementation.
impl LinearOperator for SparseColMat<usize, f64> {
    #[inline]
    fn nrows(&self) -> usize {
        LinOp::<f64>::nrows(&self.as_ref())
    }

    #[inline]
    fn ncols(&self) -> usize {
        LinOp::<f64>::ncols(&self.as_ref())
    }

    #[inline]
    fn apply_scratch(&self, par: Par) -> StackReq {
        LinearOperator::apply_scratch(&self.as_ref(), par)
    }

    #[inline]
    fn apply(
        &self,
        out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        ctx: &mut ApplyContext<'_>,
    ) -> anyhow::Result<()> {
        LinearOperator::apply(&self.as_ref(), out, rhs, ctx)
    }
}

/// An operator defined by a closure, for matrix-free problems and spectral transformations.
pub struct FnOperator<F> {
    dim: usize,
    action: F,
}

impl<F> FnOperator<F>
where
    F: Fn(MatMut<'_, f64>, MatRef<'_, f64>, &mut ApplyContext<'_>) -> anyhow::Result<()>,
{
    /// Wraps `action` as a `dim x dim` operator.
    pub fn new(dim: usize, action: F) -> Self {
        Self { dim, action }
    }
}

impl<F> LinearOperator for FnOperator<F>
where
    F: Fn(MatMut<'_, f64>, MatRef<'_, f64>, &mut ApplyContext<'_>) -> anyhow::Result<()>,
{
    #[inline]
    fn nrows(&self) -> usize {
        self.dim
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.dim
    }

    #[inline]
    fn apply(
        &self,
        out: MatMut<'_, f64>,
        rhs: MatRef<'_, f64>,
        ctx: &mut ApplyContext<'_>,
    ) -> anyhow::Result<()> {
        (self.action)(out, rhs, ctx)
    }
}

// Unit tests to verify the correctness of the LinearOperator trait and its implementations.
#[cfg(test)]
mod tests {
    use super::*;
    use faer::{
        dyn_stack::MemBuffer,
        mat,
        sparse::{SparseColMat, Triplet},
    };

    fn apply_once(op: &dyn LinearOperator, x: MatRef<'_, f64>) -> anyhow::Result<Mat<f64>> {
        let mut mem = MemBuffer::new(op.apply_scratch(Par::Seq));
        let mut ctx = ApplyContext {
            par: Par::Seq,
            stack: MemStack::new(&mut mem),
            application: 0,
        };
        let mut y = Mat::zeros(op.nrows(), 1);
        op.apply(y.as_mut(), x, &mut ctx)?;
        Ok(y)
    }

    #[test]
    fn test_linear_operator_for_mat() {
        let matrix: Mat<f64> = mat![[2.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 2.0],];
        let vector: Mat<f64> = mat![[1.0], [2.0], [3.0]];
        let expected_result = &matrix * &vector;

        let result = apply_once(&matrix, vector.as_ref()).unwrap();
        assert_eq!(result, expected_result);
        assert_eq!(LinearOperator::nrows(&matrix), 3);
        assert_eq!(LinearOperator::ncols(&matrix), 3);
    }

    #[test]
    fn test_linear_operator_for_sparse_matches_dense() {
        let triplets: Vec<Triplet<usize, usize, f64>> = [
            (0, 0, 4.0),
            (1, 0, 1.0),
            (0, 1, 1.0),
            (1, 1, 3.0),
            (2, 2, 2.0),
        ]
        .into_iter()
        .map(|(row, col, val)| Triplet { row, col, val })
        .collect();
        let sparse = SparseColMat::<usize, f64>::try_new_from_triplets(3, 3, &triplets).unwrap();
        let dense: Mat<f64> = mat![[4.0, 1.0, 0.0], [1.0, 3.0, 0.0], [0.0, 0.0, 2.0]];
        let x: Mat<f64> = mat![[1.0], [-1.0], [0.5]];

        let ys = apply_once(&sparse, x.as_ref()).unwrap();
        let yd = apply_once(&dense, x.as_ref()).unwrap();
        assert!((&ys - &yd).norm_l2() < 1e-14);
        assert_eq!(LinearOperator::nrows(&sparse), 3);
        assert_eq!(LinearOperator::ncols(&sparse.as_ref()), 3);
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let matrix: Mat<f64> = mat![[1.0, 0.0], [0.0, 1.0]];
        let vector: Mat<f64> = mat![[1.0], [2.0], [3.0]];

        let err = apply_once(&matrix, vector.as_ref()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: operator columns (2) do not match vector rows (3)."
        );
    }

    #[test]
    fn test_fn_operator_sees_application_index() {
        let op = FnOperator::new(2, |mut out, rhs, ctx| {
            let scale = (ctx.application + 1) as f64;
            for i in 0..rhs.nrows() {
                out[(i, 0)] = scale * rhs[(i, 0)];
            }
            Ok(())
        });
        let x: Mat<f64> = mat![[1.0], [2.0]];
        let y = apply_once(&op, x.as_ref()).unwrap();
        assert_eq!(y, mat![[1.0], [2.0]]);
    }
}
