//! Basis Store: the Krylov basis, the projected coefficient matrix and the residual.
//!
//! The basis owns a fixed block of `capacity` columns allocated once per solve.
//! Columns `[0, locked)` hold converged vectors that are never modified again,
//! columns `[locked, len)` form the active working window. A user-supplied deflation
//! space, if any, is kept as a separate orthonormal block the whole basis is kept
//! orthogonal to.
//!
//! The coefficient matrix is stored densely with one extra row so that the residual
//! norm of the last column (the `beta` of `A V = V H + f e_m^T`) has a slot, and so
//! that the coupling row created by a thick restart fits below the kept block.

use super::orthog::orthonormal_columns;
use crate::error::{EigenError, EigenErrorKind};
use faer::{Accum, ColRef, Mat, MatRef, Par, linalg::matmul::matmul};
use std::ops::Range;

/// An orthonormal Krylov basis with a locked prefix.
#[derive(Debug, Clone)]
pub struct KrylovBasis {
    vectors: Mat<f64>,
    deflation: Mat<f64>,
    len: usize,
    locked: usize,
}

impl KrylovBasis {
    /// Allocates room for `capacity` vectors of dimension `n`.
    pub fn new(n: usize, capacity: usize) -> Self {
        Self {
            vectors: Mat::zeros(n, capacity),
            deflation: Mat::zeros(n, 0),
            len: 0,
            locked: 0,
        }
    }

    /// Installs a deflation space. Its columns are orthonormalized; dependent ones dropped.
    pub fn with_deflation_space(mut self, space: MatRef<'_, f64>) -> Result<Self, EigenError> {
        if space.nrows() != self.dim() {
            return Err(EigenErrorKind::DimensionMismatch {
                operator_cols: self.dim(),
                vector_rows: space.nrows(),
            }
            .into());
        }
        self.deflation = orthonormal_columns(space);
        Ok(self)
    }

    /// Dimension of the vectors.
    #[inline]
    pub fn dim(&self) -> usize {
        self.vectors.nrows()
    }

    /// Maximum number of vectors the basis can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.vectors.ncols()
    }

    /// Number of vectors currently stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of locked (converged) vectors.
    #[inline]
    pub fn locked(&self) -> usize {
        self.locked
    }

    /// The active window `[l, k)`.
    #[inline]
    pub fn active_window(&self) -> Range<usize> {
        self.locked..self.len
    }

    /// The deflation space, as an orthonormal block of columns.
    #[inline]
    pub fn deflation(&self) -> MatRef<'_, f64> {
        self.deflation.as_ref()
    }

    /// All stored columns.
    #[inline]
    pub fn vectors(&self) -> MatRef<'_, f64> {
        self.vectors.as_ref().get(.., 0..self.len)
    }

    /// The backing storage, including unused capacity.
    #[inline]
    pub(crate) fn storage(&self) -> MatRef<'_, f64> {
        self.vectors.as_ref()
    }

    #[inline]
    pub fn column(&self, j: usize) -> ColRef<'_, f64> {
        debug_assert!(j < self.len);
        self.vectors.col(j)
    }

    /// Single-column view of column `j`.
    #[inline]
    pub fn column_mat(&self, j: usize) -> MatRef<'_, f64> {
        debug_assert!(j < self.len);
        self.vectors.as_ref().get(.., j..j + 1)
    }

    /// Appends `v` as the next column.
    pub fn extend(&mut self, v: MatRef<'_, f64>) -> Result<usize, EigenError> {
        if self.len >= self.capacity() {
            return Err(EigenErrorKind::CapacityExceeded {
                capacity: self.capacity(),
            }
            .into());
        }
        if v.nrows() != self.dim() {
            return Err(EigenErrorKind::DimensionMismatch {
                operator_cols: self.dim(),
                vector_rows: v.nrows(),
            }
            .into());
        }
        let j = self.len;
        self.vectors.col_mut(j).copy_from(v.col(0));
        self.len += 1;
        Ok(j)
    }

    /// Appends `v / scale` as the next column.
    pub(crate) fn extend_scaled(&mut self, v: MatRef<'_, f64>, scale: f64) -> Result<usize, EigenError> {
        let j = self.extend(v)?;
        let inv = 1.0 / scale;
        for i in 0..self.dim() {
            self.vectors[(i, j)] *= inv;
        }
        Ok(j)
    }

    /// Overwrites column `j`, which must already be stored and not locked.
    pub(crate) fn replace_column(&mut self, j: usize, v: MatRef<'_, f64>) {
        debug_assert!(j >= self.locked && j < self.len);
        self.vectors.col_mut(j).copy_from(v.col(0));
    }

    /// Moves the first `n` active columns into the locked region.
    pub fn lock(&mut self, n: usize) {
        self.locked = (self.locked + n).min(self.len);
    }

    /// Discards every column at or beyond `new_len`. Locked columns are never discarded.
    pub fn truncate(&mut self, new_len: usize) {
        let new_len = new_len.max(self.locked);
        if new_len < self.len {
            for j in new_len..self.len {
                self.vectors.col_mut(j).fill(0.0);
            }
            self.len = new_len;
        }
    }

    /// Clears the basis for reuse with the same capacity; the deflation space is kept.
    pub fn reset(&mut self) {
        self.vectors.as_mut().fill(0.0);
        self.len = 0;
        self.locked = 0;
    }

    /// Returns `V[:, range] * coeffs` as a new vector.
    pub fn combination(&self, range: Range<usize>, coeffs: MatRef<'_, f64>) -> Mat<f64> {
        debug_assert_eq!(range.len(), coeffs.nrows());
        let mut out = Mat::<f64>::zeros(self.dim(), coeffs.ncols());
        matmul(
            out.as_mut(),
            Accum::Replace,
            self.vectors.as_ref().get(.., range),
            coeffs,
            1.0,
            Par::Seq,
        );
        out
    }

    /// Rotates the active window in place: the columns `[start, start + q.ncols())` are
    /// replaced by `V[:, start..start + q.nrows()] * q`.
    ///
    /// The new columns are linear combinations of the old ones; the rotation is computed
    /// once into a temporary block and written back.
    pub fn rotate(&mut self, start: usize, q: MatRef<'_, f64>) {
        debug_assert!(start >= self.locked);
        debug_assert!(start + q.nrows() <= self.len);
        let rotated = self.combination(start..start + q.nrows(), q);
        for c in 0..q.ncols() {
            self.vectors.col_mut(start + c).copy_from(rotated.col(c));
        }
    }

    /// Frobenius norm of `V^T V - I` over the stored columns.
    pub fn orthogonality_loss(&self) -> f64 {
        let v = self.vectors();
        let gram = v.transpose() * v;
        let identity = Mat::<f64>::identity(self.len, self.len);
        (&identity - &gram).norm_l2()
    }
}

/// Storage pattern of the coefficient matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoefficientLayout {
    /// Symmetric tridiagonal (plus the arrow created by thick restart), both triangles kept.
    Tridiagonal,
    /// Upper Hessenberg; every projection coefficient of a column is recorded.
    Hessenberg,
}

/// Dense projected matrix `H` with one extra row for the residual norm.
#[derive(Debug, Clone)]
pub struct CoefficientMatrix {
    data: Mat<f64>,
    layout: CoefficientLayout,
}

impl CoefficientMatrix {
    /// Allocates a `(capacity + 1) x capacity` zero matrix.
    pub fn new(capacity: usize, layout: CoefficientLayout) -> Self {
        Self {
            data: Mat::zeros(capacity + 1, capacity),
            layout,
        }
    }

    #[inline]
    pub fn layout(&self) -> CoefficientLayout {
        self.layout
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[(i, j)] = value;
    }

    /// Sets `H[i, j]` and, for the symmetric layout, its mirror `H[j, i]`.
    ///
    /// The mirror is skipped when it would fall outside the square part.
    pub fn set_coupling(&mut self, i: usize, j: usize, value: f64) {
        self.data[(i, j)] = value;
        if self.layout == CoefficientLayout::Tridiagonal && i < self.capacity() {
            self.data[(j, i)] = value;
        }
    }

    /// Records the coefficients produced by step `j`.
    ///
    /// `projections` is indexed by absolute column; entries outside `window` are ignored.
    /// `norm` lands on the subdiagonal `H[j + 1, j]`.
    pub fn record_step(&mut self, j: usize, window: Range<usize>, projections: &[f64], norm: f64) {
        match self.layout {
            CoefficientLayout::Tridiagonal => {
                self.data[(j, j)] = projections[j];
            }
            CoefficientLayout::Hessenberg => {
                for i in window.start..=j {
                    self.data[(i, j)] = projections[i];
                }
            }
        }
        self.set_coupling(j + 1, j, norm);
    }

    /// Adds `delta[i]` to `H[i, j]` for `i` in `window` and overwrites the subdiagonal.
    pub(crate) fn revise_column(&mut self, j: usize, window: Range<usize>, delta: &[f64], subdiag: f64) {
        if self.layout == CoefficientLayout::Hessenberg {
            for i in window {
                if i <= j {
                    self.data[(i, j)] += delta[i];
                }
            }
        } else {
            self.data[(j, j)] += delta[j];
        }
        self.set_coupling(j + 1, j, subdiag);
    }

    /// Copies `H[range, range]` into a new square matrix.
    ///
    /// For the symmetric layout the upper triangle is filled from the lower one, so the
    /// result is exactly symmetric.
    pub fn block(&self, range: Range<usize>) -> Mat<f64> {
        let n = range.len();
        let offset = range.start;
        let mut out = Mat::<f64>::zeros(n, n);
        for j in 0..n {
            for i in 0..n {
                out[(i, j)] = self.data[(offset + i, offset + j)];
            }
        }
        if self.layout == CoefficientLayout::Tridiagonal {
            for j in 0..n {
                for i in 0..j {
                    out[(i, j)] = out[(j, i)];
                }
            }
        }
        out
    }

    /// Zeroes every entry in rows or columns at or beyond `new_size`, removing the ragged
    /// tail left by a restart, and the extra residual row.
    pub fn truncate(&mut self, new_size: usize) {
        let rows = self.data.nrows();
        let cols = self.data.ncols();
        for j in 0..cols {
            for i in 0..rows {
                if i >= new_size || j >= new_size {
                    self.data[(i, j)] = 0.0;
                }
            }
        }
    }

    /// Zeroes every entry coupling `[start, end)` to anything else, then the block itself.
    pub fn clear_window(&mut self, window: Range<usize>) {
        let rows = self.data.nrows();
        let cols = self.data.ncols();
        for j in 0..cols {
            for i in 0..rows {
                if window.contains(&i) || window.contains(&j) {
                    self.data[(i, j)] = 0.0;
                }
            }
        }
    }

    /// Clears everything.
    pub fn reset(&mut self) {
        self.data.as_mut().fill(0.0);
    }
}

/// A Krylov decomposition `A V_m = V_m H_m + f e_m^T` with its residual vector.
#[derive(Debug, Clone)]
pub struct KrylovDecomposition {
    pub basis: KrylovBasis,
    pub coeffs: CoefficientMatrix,
    /// Residual vector `f` left by the last step of the recurrence (unnormalized).
    pub residual: Mat<f64>,
    /// Norm of `residual`.
    pub beta: f64,
    /// Number of leading columns whose image has been folded into `coeffs`.
    applied: usize,
}

impl KrylovDecomposition {
    pub fn new(n: usize, capacity: usize, layout: CoefficientLayout) -> Self {
        Self {
            basis: KrylovBasis::new(n, capacity),
            coeffs: CoefficientMatrix::new(capacity, layout),
            residual: Mat::zeros(n, 1),
            beta: 0.0,
            applied: 0,
        }
    }

    /// Number of columns whose image `A v_j` has been computed and recorded. When it is
    /// one less than the basis length, the last column is the next one to apply.
    #[inline]
    pub fn applied(&self) -> usize {
        self.applied
    }

    pub(crate) fn set_applied(&mut self, applied: usize) {
        debug_assert!(applied <= self.basis.len());
        self.applied = applied;
    }

    /// Discards columns beyond `new_size` in both the basis and the coefficient matrix.
    pub fn truncate(&mut self, new_size: usize) {
        self.basis.truncate(new_size);
        self.coeffs.truncate(self.basis.len());
        self.applied = self.applied.min(self.basis.len());
    }

    /// The projected matrix over the active window.
    pub fn projected(&self) -> Mat<f64> {
        self.coeffs.block(self.basis.active_window())
    }

    /// Clears basis, coefficients and residual for a fresh solve.
    pub fn reset(&mut self) {
        self.basis.reset();
        self.coeffs.reset();
        self.residual.as_mut().fill(0.0);
        self.beta = 0.0;
        self.applied = 0;
    }
}
