//! Gram-Schmidt kernels shared by every reorthogonalization policy.
//!
//! All projections are classical Gram-Schmidt: the coefficients of one pass are
//! computed against the same input vector and subtracted together, so a pass costs a
//! single block inner product. Robustness comes from refinement (a second pass) and
//! is controlled by [`Refinement`].

use faer::{Accum, Mat, MatRef, Par, linalg::matmul::matmul};
use std::ops::Range;

/// Ratio of norms below which a second Gram-Schmidt pass is performed (DGKS criterion).
pub const DGKS_ETA: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Multiple of machine epsilon (scaled by the operator norm) under which a candidate
/// vector is considered to have collapsed.
const BREAKDOWN_FACTOR: f64 = 16.0;

/// Refinement applied after the first classical Gram-Schmidt pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Refinement {
    /// Single pass; cheapest, no orthogonality guarantee.
    Never,
    /// Second pass only if the norm dropped by more than [`DGKS_ETA`].
    #[default]
    IfNeeded,
    /// Always two passes.
    Always,
}

impl std::str::FromStr for Refinement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "ifneeded" | "if_needed" | "if-needed" => Ok(Self::IfNeeded),
            "always" => Ok(Self::Always),
            other => Err(format!("unknown refinement type '{other}'")),
        }
    }
}

/// A set of basis columns, stored as sorted, disjoint, contiguous ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    ranges: Vec<Range<usize>>,
}

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// All columns in `range`.
    pub fn range(range: Range<usize>) -> Self {
        let mut set = Self::new();
        set.push(range);
        set
    }

    /// Adds `range`, merging with the last range when they touch.
    ///
    /// Ranges must be pushed in increasing order.
    pub fn push(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        if let Some(last) = self.ranges.last_mut() {
            debug_assert!(range.start >= last.start);
            if range.start <= last.end {
                last.end = last.end.max(range.end);
                return;
            }
        }
        self.ranges.push(range);
    }

    /// Builds a set from a boolean mask whose entry `i` refers to column `offset + i`.
    pub fn from_mask(offset: usize, mask: &[bool]) -> Self {
        let mut set = Self::new();
        for (i, _) in mask.iter().enumerate().filter(|(_, flag)| **flag) {
            set.push(offset + i..offset + i + 1);
        }
        set
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.iter().map(|r| r.len()).sum()
    }

    pub fn contains(&self, col: usize) -> bool {
        self.ranges.iter().any(|r| r.contains(&col))
    }
}

/// Result of orthogonalizing one vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GsOutcome {
    /// Norm of the vector after orthogonalization.
    pub norm: f64,
    /// Norm of the vector before orthogonalization.
    pub prior_norm: f64,
}

/// Dot product of two single-column matrices.
#[inline]
pub(crate) fn dot(a: MatRef<'_, f64>, b: MatRef<'_, f64>) -> f64 {
    a.col(0).transpose() * b.col(0)
}

/// Threshold under which a vector norm signals breakdown, relative to `scale`
/// (an estimate of the operator norm or of the vector norm before projection).
#[inline]
pub(crate) fn breakdown_tolerance(scale: f64) -> f64 {
    BREAKDOWN_FACTOR * f64::EPSILON * scale.abs()
}

/// One classical Gram-Schmidt pass of `f` against the columns of `v` selected by `set`.
///
/// The coefficients are accumulated into `coeffs`, indexed by absolute column.
pub(crate) fn cgs_pass(v: MatRef<'_, f64>, set: &ColumnSet, f: &mut Mat<f64>, coeffs: &mut [f64]) {
    if set.is_empty() {
        return;
    }
    // Compute every block of coefficients from the same input vector first.
    let blocks: Vec<Mat<f64>> = set
        .ranges()
        .iter()
        .map(|r| {
            let mut c = Mat::<f64>::zeros(r.len(), 1);
            matmul(
                c.as_mut(),
                Accum::Replace,
                v.get(.., r.clone()).transpose(),
                f.as_ref(),
                1.0,
                Par::Seq,
            );
            c
        })
        .collect();

    for (r, c) in set.ranges().iter().zip(blocks.iter()) {
        matmul(
            f.as_mut(),
            Accum::Add,
            v.get(.., r.clone()),
            c.as_ref(),
            -1.0,
            Par::Seq,
        );
        for (i, col) in r.clone().enumerate() {
            coeffs[col] += c[(i, 0)];
        }
    }
}

/// Orthogonalizes `f` against the selected columns of `v`, with optional refinement.
pub(crate) fn orthogonalize(
    v: MatRef<'_, f64>,
    set: &ColumnSet,
    f: &mut Mat<f64>,
    coeffs: &mut [f64],
    refinement: Refinement,
) -> GsOutcome {
    let prior_norm = f.norm_l2();
    cgs_pass(v, set, f, coeffs);
    let mut norm = f.norm_l2();

    let refine = match refinement {
        Refinement::Never => false,
        Refinement::Always => true,
        Refinement::IfNeeded => norm < DGKS_ETA * prior_norm,
    };
    if refine && !set.is_empty() {
        cgs_pass(v, set, f, coeffs);
        norm = f.norm_l2();
    }

    GsOutcome { norm, prior_norm }
}

/// Projects `f` out of the span of every column of `space` (two passes), discarding
/// the coefficients. Used for the deflation space, whose coefficients are never recorded.
pub(crate) fn project_out(space: MatRef<'_, f64>, f: &mut Mat<f64>) {
    if space.ncols() == 0 {
        return;
    }
    let set = ColumnSet::range(0..space.ncols());
    let mut scratch = vec![0.0; space.ncols()];
    cgs_pass(space, &set, f, &mut scratch);
    cgs_pass(space, &set, f, &mut scratch);
}

/// Returns an orthonormal basis for the span of the columns of `m`.
///
/// Columns that are numerically dependent on the previous ones are dropped.
pub(crate) fn orthonormal_columns(m: MatRef<'_, f64>) -> Mat<f64> {
    let mut q = Mat::<f64>::zeros(m.nrows(), m.ncols());
    let mut rank = 0;

    for j in 0..m.ncols() {
        let mut f = m.get(.., j..j + 1).to_owned();
        let mut coeffs = vec![0.0; rank];
        let outcome = orthogonalize(
            q.as_ref().get(.., 0..rank),
            &ColumnSet::range(0..rank),
            &mut f,
            &mut coeffs,
            Refinement::Always,
        );
        if outcome.norm == 0.0 || outcome.norm <= breakdown_tolerance(outcome.prior_norm) {
            log::warn!("Dropping dependent column {j} from the deflation space.");
            continue;
        }
        let scale = 1.0 / outcome.norm;
        for i in 0..m.nrows() {
            q[(i, rank)] = f[(i, 0)] * scale;
        }
        rank += 1;
    }

    q.as_ref().get(.., 0..rank).to_owned()
}
