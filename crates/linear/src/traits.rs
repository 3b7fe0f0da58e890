use nalgebra::{Dim, Matrix, Scalar, Storage, StorageMut, U1};
use num_traits::Zero;

use crate::Error;

/// A direct solver: factor a square system matrix once, then solve `Ax = b`
/// against the factorization, possibly for several right-hand sides.
pub trait LSolver<T, D>
where
    T: Scalar + Zero,
    D: Dim,
{
    /// Factors the matrix in place, leaving it in whatever compact form the
    /// solver's `solve` routine expects. `mat_a` is a scratch copy owned by
    /// the caller; the solver never reaches back to the original matrix.
    ///
    /// Returns [`Error::SingularMatrix`] when a pivot falls below the
    /// solver's singularity threshold, or [`Error::DimensionMismatch`] if
    /// `mat_a` is not square or does not match the solver's dimension.
    fn setup<S>(&mut self, mat_a: &mut Matrix<T, D, D, S>) -> Result<(), Error>
    where
        S: StorageMut<T, D, D>;

    /// Solves `Ax = b` using the factorization left in `mat_a` by a prior
    /// call to [`LSolver::setup`]. The solution is written into `x`; `b` is
    /// never mutated.
    ///
    /// May be called any number of times per `setup`, once per right-hand
    /// side.
    fn solve<SA, SB, SC>(
        &self,
        mat_a: &Matrix<T, D, D, SA>,
        x: &mut Matrix<T, D, U1, SB>,
        b: &Matrix<T, D, U1, SC>,
    ) -> Result<(), Error>
    where
        SA: Storage<T, D, D>,
        SB: StorageMut<T, D>,
        SC: Storage<T, D>;
}
