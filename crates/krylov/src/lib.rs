//! Krylov-subspace iterative solvers for square linear systems `Ax = b`.
//!
//! Serial, un-preconditioned implementations of [`Cg`] (symmetric
//! positive-definite matrices), [`BiCgStab`] and [`Cgs`] (general
//! nonsymmetric matrices). The matrix and right-hand side are read-only
//! borrows; each solver owns its working vectors.
//!
//! Termination is always explicit: a solve ends in one of the
//! [`SolveStatus`] states and returns the final iterate either way. A
//! vanishing inner product is reported as [`SolveStatus::Breakdown`] rather
//! than being allowed to degrade into NaN arithmetic.

mod bicgstab;
mod cg;
mod cgs;
mod traits;

pub use bicgstab::{solve_bicgstab, BiCgStab};
pub use cg::{solve_cg, Cg};
pub use cgs::{solve_cgs, Cgs};
pub use traits::KrylovSolver;

use nalgebra::{allocator::Allocator, DefaultAllocator, Dim, OVector, Scalar};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The matrix is not square, or a vector length does not match the
    /// solver's dimension. Checked eagerly before any computation.
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Terminal state of an iterative solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The residual stopping criterion was met.
    Converged,
    /// The iteration budget ran out. Not an error: the returned iterate is
    /// the best available approximation, and the caller judges whether its
    /// residual norm is acceptable.
    MaxIterationsReached,
    /// An inner product that must be nonzero came out exactly zero, so the
    /// method cannot proceed. Typical recovery is a restart from a different
    /// initial guess, a different method, or a direct solve.
    Breakdown,
}

/// Outcome of one solve: the final iterate plus convergence bookkeeping.
#[derive(Debug, Clone)]
pub struct SolveResult<T, D: Dim>
where
    T: Scalar,
    DefaultAllocator: Allocator<T, D>,
{
    /// Final iterate, whatever the terminal status.
    pub x: OVector<T, D>,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Unnormalized 2-norm of the final residual.
    pub residual_norm: T,
    pub status: SolveStatus,
}

impl<T, D: Dim> SolveResult<T, D>
where
    T: Scalar,
    DefaultAllocator: Allocator<T, D>,
{
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

pub(crate) fn check_dim(expected: usize, found: usize) -> Result<(), Error> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::DimensionMismatch { expected, found })
    }
}
