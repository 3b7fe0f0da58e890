//! Crout LU decomposition, `A = L·U` with unit-diagonal U.
//!
//! No pivoting is performed. That is the defining limitation of the plain
//! Crout scheme: a (near-)zero value in a leading diagonal position stops the
//! factorization with [`Error::SingularMatrix`] even when the matrix itself
//! is nonsingular. Callers that cannot guarantee a safe diagonal should use
//! [`crate::Dense`] instead; Crout earns its keep when one matrix is factored
//! once and solved against many right-hand sides.

use nalgebra::{
    allocator::Allocator, DefaultAllocator, Dim, Matrix, OMatrix, OVector, RealField, Scalar,
    Storage, U1,
};

use crate::{Error, DEFAULT_PIVOT_EPSILON};

/// A reusable Crout factorization of a square matrix.
///
/// The factors are stored compactly in a single matrix: L (including its
/// diagonal) in the lower triangle, the strict upper triangle of U above it.
/// U's unit diagonal is implied.
#[derive(Clone, Debug)]
pub struct Crout<T, D: Dim>
where
    DefaultAllocator: Allocator<T, D, D>,
{
    lu: OMatrix<T, D, D>,
}

impl<T, D> Crout<T, D>
where
    T: Scalar + RealField + Copy,
    D: Dim,
    DefaultAllocator: Allocator<T, D, D>,
{
    /// Factors `a` as L·U. The input matrix is only read; the factorization
    /// lives in the returned value.
    pub fn factorize<S>(a: &Matrix<T, D, D, S>) -> Result<Self, Error>
    where
        S: Storage<T, D, D>,
    {
        Self::factorize_with_epsilon(a, nalgebra::convert(DEFAULT_PIVOT_EPSILON))
    }

    /// [`Crout::factorize`] with a caller-chosen singularity threshold for
    /// the diagonal entries of L.
    pub fn factorize_with_epsilon<S>(a: &Matrix<T, D, D, S>, eps: T) -> Result<Self, Error>
    where
        S: Storage<T, D, D>,
    {
        if a.nrows() != a.ncols() {
            return Err(Error::DimensionMismatch {
                expected: a.nrows(),
                found: a.ncols(),
            });
        }

        let n = a.nrows();
        let mut lu = a.clone_owned();

        for j in 0..n {
            // column j of L: l(i,j) = a(i,j) - sum_k l(i,k) u(k,j), k < j
            for i in j..n {
                let mut sum = lu[(i, j)];
                for k in 0..j {
                    let l_ik = lu[(i, k)];
                    let u_kj = lu[(k, j)];
                    sum -= l_ik * u_kj;
                }
                lu[(i, j)] = sum;
            }

            // no pivoting to fall back on, so a small l(j,j) is fatal here
            if lu[(j, j)].abs() < eps {
                return Err(Error::SingularMatrix { col: j });
            }

            // row j of U: u(j,k) = (a(j,k) - sum_m l(j,m) u(m,k)) / l(j,j)
            let diag = lu[(j, j)];
            for k in (j + 1)..n {
                let mut sum = lu[(j, k)];
                for m in 0..j {
                    let l_jm = lu[(j, m)];
                    let u_mk = lu[(m, k)];
                    sum -= l_jm * u_mk;
                }
                lu[(j, k)] = sum / diag;
            }
        }

        Ok(Crout { lu })
    }

    /// Solves `Ax = b` against the stored factors: forward substitution
    /// through L, then back substitution through the unit-diagonal U. May be
    /// called once per right-hand side.
    pub fn solve<S>(&self, b: &Matrix<T, D, U1, S>) -> Result<OVector<T, D>, Error>
    where
        S: Storage<T, D, U1>,
        DefaultAllocator: Allocator<T, D>,
    {
        let n = self.lu.nrows();
        if b.nrows() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                found: b.nrows(),
            });
        }

        let mut x = b.clone_owned();

        // Ly = b, L has a non-unit diagonal
        for i in 0..n {
            let mut sum = x[i];
            for k in 0..i {
                let l_ik = self.lu[(i, k)];
                sum -= l_ik * x[k];
            }
            x[i] = sum / self.lu[(i, i)];
        }

        // Ux = y, unit diagonal: no division
        for i in (0..n).rev() {
            let mut sum = x[i];
            for k in (i + 1)..n {
                let u_ik = self.lu[(i, k)];
                sum -= u_ik * x[k];
            }
            x[i] = sum;
        }

        Ok(x)
    }

    /// The lower-triangular factor L, expanded (non-unit diagonal).
    pub fn l(&self) -> OMatrix<T, D, D> {
        let n = self.lu.nrows();
        let mut l = self.lu.clone_owned();
        for i in 0..n {
            for j in (i + 1)..n {
                l[(i, j)] = T::zero();
            }
        }
        l
    }

    /// The upper-triangular factor U, expanded (unit diagonal).
    pub fn u(&self) -> OMatrix<T, D, D> {
        let n = self.lu.nrows();
        let mut u = self.lu.clone_owned();
        for i in 0..n {
            u[(i, i)] = T::one();
            for j in 0..i {
                u[(i, j)] = T::zero();
            }
        }
        u
    }

    /// Problem dimension.
    pub fn nrows(&self) -> usize {
        self.lu.nrows()
    }
}

/// Factors `a` as `(L, U)` by Crout's method (U carries the unit diagonal).
///
/// Convenience wrapper over [`Crout::factorize`] for callers that want the
/// expanded triangular factors rather than a solver object.
pub fn factor_lu<T, D, S>(a: &Matrix<T, D, D, S>) -> Result<(OMatrix<T, D, D>, OMatrix<T, D, D>), Error>
where
    T: Scalar + RealField + Copy,
    D: Dim,
    S: Storage<T, D, D>,
    DefaultAllocator: Allocator<T, D, D>,
{
    let crout = Crout::factorize(a)?;
    Ok((crout.l(), crout.u()))
}
