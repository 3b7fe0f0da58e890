//! Gaussian elimination with partial pivoting for dense square matrices.

use nalgebra::{
    allocator::Allocator, Const, DefaultAllocator, Dim, DimName, Dyn, Matrix, OVector, RealField,
    Scalar, Storage, StorageMut, U1,
};

use crate::{Error, LSolver, DEFAULT_PIVOT_EPSILON};

/// Direct solver backed by an in-place LU factorization with partial (row)
/// pivoting.
///
/// [`LSolver::setup`] factors a scratch copy of the system matrix; repeated
/// [`LSolver::solve`] calls then back-substitute against it, one right-hand
/// side at a time. A pivot whose magnitude falls below the configured epsilon
/// aborts the factorization with [`Error::SingularMatrix`].
#[derive(Clone, Debug)]
pub struct Dense<T, D: Dim>
where
    DefaultAllocator: Allocator<usize, D>,
{
    pivots: OVector<usize, D>,
    pivot_eps: T,
}

impl<T, D> Dense<T, D>
where
    T: Scalar + RealField + Copy,
    D: Dim,
    DefaultAllocator: Allocator<usize, D>,
{
    /// Creates a new solver, statically sized.
    pub fn new() -> Self
    where
        D: DimName,
    {
        Self::with_dim(D::name())
    }

    /// Replaces the default singularity threshold ([`DEFAULT_PIVOT_EPSILON`]).
    pub fn with_pivot_epsilon(mut self, eps: T) -> Self {
        self.pivot_eps = eps;
        self
    }

    /// The pivot magnitude below which `setup` reports a singular matrix.
    pub fn pivot_epsilon(&self) -> T {
        self.pivot_eps
    }

    fn with_dim(d: D) -> Self {
        Dense {
            pivots: OVector::zeros_generic(d, Const::<1>),
            pivot_eps: nalgebra::convert(DEFAULT_PIVOT_EPSILON),
        }
    }
}

impl<T> Dense<T, Dyn>
where
    T: Scalar + RealField + Copy,
{
    /// Creates a new solver, dynamically sized.
    pub fn new_dynamic(dim: usize) -> Self {
        Self::with_dim(Dyn(dim))
    }
}

impl<T, D> Default for Dense<T, D>
where
    T: Scalar + RealField + Copy,
    D: DimName,
    DefaultAllocator: Allocator<usize, D>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, D> LSolver<T, D> for Dense<T, D>
where
    T: Scalar + RealField + Copy,
    D: Dim,
    DefaultAllocator: Allocator<usize, D>,
{
    fn setup<S>(&mut self, mat_a: &mut Matrix<T, D, D, S>) -> Result<(), Error>
    where
        S: StorageMut<T, D, D>,
    {
        if mat_a.nrows() != mat_a.ncols() {
            return Err(Error::DimensionMismatch {
                expected: mat_a.nrows(),
                found: mat_a.ncols(),
            });
        }
        if mat_a.nrows() != self.pivots.nrows() {
            return Err(Error::DimensionMismatch {
                expected: self.pivots.nrows(),
                found: mat_a.nrows(),
            });
        }

        lu_factor(mat_a, &mut self.pivots, self.pivot_eps)
    }

    fn solve<SA, SB, SC>(
        &self,
        mat_a: &Matrix<T, D, D, SA>,
        x: &mut Matrix<T, D, U1, SB>,
        b: &Matrix<T, D, U1, SC>,
    ) -> Result<(), Error>
    where
        SA: Storage<T, D, D>,
        SB: StorageMut<T, D>,
        SC: Storage<T, D>,
    {
        let n = self.pivots.nrows();
        for len in [mat_a.nrows(), x.nrows(), b.nrows()] {
            if len != n {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    found: len,
                });
            }
        }

        x.copy_from(b);
        lu_solve(mat_a, &self.pivots, x);
        Ok(())
    }
}

/// Solves `Ax = b` in one shot by Gaussian elimination with partial pivoting.
///
/// The caller's matrix and right-hand side are read-only borrows; the
/// elimination runs on private copies, so the same inputs can be solved again
/// later (and yield bit-identical results). Dimensions are checked before any
/// arithmetic.
///
/// A pivot with magnitude below `pivot_epsilon` yields
/// [`Error::SingularMatrix`]. There is no protection against overflow on
/// badly scaled matrices; pre-scaling is the caller's responsibility.
pub fn solve_direct<T, D, SA, SB>(
    a: &Matrix<T, D, D, SA>,
    b: &Matrix<T, D, U1, SB>,
    pivot_epsilon: T,
) -> Result<OVector<T, D>, Error>
where
    T: Scalar + RealField + Copy,
    D: Dim,
    SA: Storage<T, D, D>,
    SB: Storage<T, D, U1>,
    DefaultAllocator: Allocator<T, D, D> + Allocator<T, D> + Allocator<usize, D>,
{
    if a.nrows() != a.ncols() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            found: a.ncols(),
        });
    }
    if b.nrows() != a.nrows() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            found: b.nrows(),
        });
    }

    let (d, _) = a.shape_generic();
    let mut scratch = a.clone_owned();
    let mut pivots = OVector::<usize, D>::zeros_generic(d, Const::<1>);
    lu_factor(&mut scratch, &mut pivots, pivot_epsilon)?;

    let mut x = b.clone_owned();
    lu_solve(&scratch, &pivots, &mut x);
    Ok(x)
}

/// Performs the LU factorization of the n by n dense matrix A in place, using
/// Gaussian elimination with partial (row) pivoting.
///
/// On success the matrix and the pivot vector hold:
///
/// 1. `pivots[k]` is the row number of the pivot chosen at elimination step
///    k, k = 0, 1, ..., n-1.
///
/// 2. With PA = LU, where P is the permutation encoded by `pivots`, L unit
///    lower triangular and U upper triangular: the upper triangle of A
///    (including the diagonal) contains U, and the strict lower triangle
///    contains the multipliers of L.
///
/// Partial pivoting is not optional here: a zero on the natural diagonal is
/// routine for solvable systems, and elimination without the row exchange
/// would divide by it.
fn lu_factor<T, D, SA, SB>(
    mat_a: &mut Matrix<T, D, D, SA>,
    pivots: &mut Matrix<usize, D, U1, SB>,
    eps: T,
) -> Result<(), Error>
where
    T: Scalar + RealField + Copy,
    D: Dim,
    SA: StorageMut<T, D, D>,
    SB: StorageMut<usize, D>,
{
    let n = mat_a.nrows();

    // k-th elimination step
    for k in 0..n {
        // find l = pivot row number: largest magnitude in column k, at or
        // below the diagonal
        let mut l = k;
        for i in (k + 1)..n {
            if mat_a[(i, k)].abs() > mat_a[(l, k)].abs() {
                l = i;
            }
        }
        pivots[k] = l;

        // even the best candidate pivot is (near-)zero: singular
        if mat_a[(l, k)].abs() < eps {
            return Err(Error::SingularMatrix { col: k });
        }

        // swap rows k and l if necessary
        if l != k {
            for j in 0..n {
                mat_a.swap((k, j), (l, j));
            }
        }

        // Scale the elements below the diagonal in column k by 1/a(k,k).
        // After the swap a(k,k) holds the pivot element, so this stores the
        // multipliers a(i,k)/a(k,k) in a(i,k), i=k+1, ..., n-1.
        let mult = mat_a[(k, k)].recip();
        for i in (k + 1)..n {
            mat_a[(i, k)] *= mult;
        }

        // row_i -= [a(i,k)/a(k,k)] row_k, i=k+1, ..., n-1, done one column
        // at a time
        for j in (k + 1)..n {
            let a_kj = mat_a[(k, j)];
            if a_kj != T::zero() {
                for i in (k + 1)..n {
                    let a_ik = mat_a[(i, k)];
                    mat_a[(i, j)] -= a_kj * a_ik;
                }
            }
        }
    }

    Ok(())
}

/// Solves `Ax = b` using the compact factorization and pivot vector produced
/// by [`lu_factor`]. The solution overwrites `b`. Cannot fail if the
/// corresponding `lu_factor` call did not.
fn lu_solve<T, D, SA, SB, SC>(
    mat_a: &Matrix<T, D, D, SA>,
    pivots: &Matrix<usize, D, U1, SB>,
    b: &mut Matrix<T, D, U1, SC>,
) where
    T: Scalar + RealField + Copy,
    D: Dim,
    SA: Storage<T, D, D>,
    SB: Storage<usize, D>,
    SC: StorageMut<T, D>,
{
    let n = mat_a.nrows();
    if n == 0 {
        return;
    }

    // Permute b to match the row exchanges made during elimination
    for k in 0..n {
        let pk = pivots[k];
        if pk != k {
            b.swap((k, 0), (pk, 0));
        }
    }

    // Solve Ly = b (L unit lower triangular), y overwrites b
    for k in 0..(n - 1) {
        let bk = b[k];
        for i in (k + 1)..n {
            b[i] -= mat_a[(i, k)] * bk;
        }
    }

    // Solve Ux = y, x overwrites b
    for k in (1..n).rev() {
        b[k] /= mat_a[(k, k)];
        let bk = b[k];
        for i in 0..k {
            b[i] -= mat_a[(i, k)] * bk;
        }
    }
    b[0] /= mat_a[(0, 0)];
}
