//! This module provides generators for symmetric test operators with a known spectrum.
//!
//! Every problem is assembled as a sparse CSC matrix from triplets. The generators are
//! used by the integration tests and the experiment binaries.

use faer::sparse::{SparseColMat, Triplet};
use thiserror::Error;

/// Represents all possible errors that can occur while generating a test problem.
#[derive(Error, Debug)]
pub enum ProblemError {
    /// Occurs when a problem name is not recognized.
    #[error("Unknown problem '{0}'. Expected one of: diagonal, laplacian, clement, shifted-clement.")]
    UnknownProblem(String),
    /// Occurs when the requested dimension is zero.
    #[error("The problem dimension must be positive.")]
    EmptyProblem,
    /// Occurs if the sparse matrix construction fails internally.
    #[error("Internal error: Failed to construct the sparse matrix from triplets.")]
    SparseMatrixConstructionError,
}

/// The available test problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    /// `diag(1, 2, ..., n)`.
    Diagonal,
    /// The 1-D discrete Laplacian `tridiag(-1, 2, -1)`.
    Laplacian,
    /// The Clement matrix: zero diagonal, off-diagonal `sqrt(i (n - i))`. Its eigenvalues
    /// are `-(n - 1), -(n - 3), ..., n - 3, n - 1`.
    Clement,
    /// `(n + 1) / 2 I + Clement / 2`, whose eigenvalues are exactly `1, 2, ..., n`.
    ShiftedClement,
}

impl std::str::FromStr for Problem {
    type Err = ProblemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "diagonal" => Ok(Self::Diagonal),
            "laplacian" => Ok(Self::Laplacian),
            "clement" => Ok(Self::Clement),
            "shifted-clement" | "shifted_clement" => Ok(Self::ShiftedClement),
            other => Err(ProblemError::UnknownProblem(other.to_string())),
        }
    }
}

impl Problem {
    /// Assembles the `n x n` matrix of the problem.
    pub fn build(&self, n: usize) -> Result<SparseColMat<usize, f64>, ProblemError> {
        match self {
            Self::Diagonal => {
                let values: Vec<f64> = (1..=n).map(|i| i as f64).collect();
                diagonal(&values)
            }
            Self::Laplacian => tridiagonal(n, |_| 2.0, |_| -1.0),
            Self::Clement => tridiagonal(n, |_| 0.0, |i| clement_coupling(n, i)),
            Self::ShiftedClement => {
                let shift = (n as f64 + 1.0) / 2.0;
                tridiagonal(n, |_| shift, |i| clement_coupling(n, i) / 2.0)
            }
        }
    }

    /// The exact eigenvalues of the `n x n` problem, in ascending order.
    pub fn eigenvalues(&self, n: usize) -> Vec<f64> {
        match self {
            Self::Diagonal | Self::ShiftedClement => (1..=n).map(|i| i as f64).collect(),
            Self::Laplacian => {
                let h = std::f64::consts::PI / (n as f64 + 1.0);
                (1..=n)
                    .map(|k| 2.0 - 2.0 * (k as f64 * h).cos())
                    .collect()
            }
            Self::Clement => (0..n).map(|k| 2.0 * k as f64 - (n as f64 - 1.0)).collect(),
        }
    }
}

/// Coupling between rows `i` and `i + 1` of the Clement matrix.
fn clement_coupling(n: usize, i: usize) -> f64 {
    (((i + 1) * (n - i - 1)) as f64).sqrt()
}

/// Builds a sparse diagonal matrix.
pub fn diagonal(values: &[f64]) -> Result<SparseColMat<usize, f64>, ProblemError> {
    let n = values.len();
    if n == 0 {
        return Err(ProblemError::EmptyProblem);
    }
    let triplets: Vec<Triplet<usize, usize, f64>> = values
        .iter()
        .enumerate()
        .map(|(i, &val)| Triplet { row: i, col: i, val })
        .collect();
    SparseColMat::try_new_from_triplets(n, n, &triplets)
        .map_err(|_| ProblemError::SparseMatrixConstructionError)
}

/// Builds a symmetric tridiagonal matrix with diagonal `diag(i)` and off-diagonal
/// `off(i)` between rows `i` and `i + 1`.
pub fn tridiagonal(
    n: usize,
    diag: impl Fn(usize) -> f64,
    off: impl Fn(usize) -> f64,
) -> Result<SparseColMat<usize, f64>, ProblemError> {
    if n == 0 {
        return Err(ProblemError::EmptyProblem);
    }
    let mut triplets: Vec<Triplet<usize, usize, f64>> = Vec::with_capacity(3 * n);
    for i in 0..n {
        triplets.push(Triplet {
            row: i,
            col: i,
            val: diag(i),
        });
        if i + 1 < n {
            let val = off(i);
            triplets.push(Triplet { row: i, col: i + 1, val });
            triplets.push(Triplet { row: i + 1, col: i, val });
        }
    }
    SparseColMat::try_new_from_triplets(n, n, &triplets)
        .map_err(|_| ProblemError::SparseMatrixConstructionError)
}
