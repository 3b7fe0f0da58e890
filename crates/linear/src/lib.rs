//! Direct solvers for square dense linear systems `Ax = b`.
//!
//! Two factorizations are provided: [`Dense`], Gaussian elimination with
//! partial (row) pivoting, and [`Crout`], a pivot-free Crout LU intended for
//! factor-once / solve-many use. One-shot callers that just want `x` should
//! reach for [`solve_direct`].

mod crout;
mod dense;
mod traits;

pub use crout::{factor_lu, Crout};
pub use dense::{solve_direct, Dense};
pub use traits::LSolver;

use thiserror::Error;

/// Pivot magnitude below which a factorization is declared singular, unless
/// the caller configures a different threshold.
pub const DEFAULT_PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Error)]
pub enum Error {
    /// A pivot with magnitude below the singularity threshold was encountered
    /// at elimination column `col`. The factorization cannot proceed; this is
    /// surfaced instead of dividing through by a (near-)zero pivot.
    #[error("A singular matrix was encountered during factorization (col {col})")]
    SingularMatrix { col: usize },

    /// The matrix is not square, or a vector length does not match the matrix
    /// dimension. Checked eagerly before any arithmetic.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}
