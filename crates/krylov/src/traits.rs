use nalgebra::{allocator::Allocator, DefaultAllocator, Dim, Matrix, Scalar, Storage, U1};

use crate::{Error, SolveResult};

/// A Krylov-subspace iterative solver for `Ax = b`.
///
/// Implementations own their working vectors, allocated once at
/// construction, so a solve performs no per-iteration allocation. The
/// iteration budget is fixed at construction and is the sole cancellation
/// lever: every solve runs synchronously to a terminal status.
///
/// A single instance must not be driven from several threads at once. The
/// free functions ([`crate::solve_cg`], [`crate::solve_bicgstab`],
/// [`crate::solve_cgs`]) build a fresh instance per call and are therefore
/// safe to call concurrently.
pub trait KrylovSolver<T, D>
where
    T: Scalar,
    D: Dim,
    DefaultAllocator: Allocator<T, D>,
{
    /// Runs one complete solve of `Ax = b`.
    ///
    /// `x0` is the initial guess; `None` starts from the zero vector. The
    /// matrix and right-hand side are never mutated. All terminal conditions
    /// (convergence, budget exhaustion, breakdown) are reported through the
    /// returned [`SolveResult`]; only dimension inconsistencies, checked
    /// before any arithmetic, are an `Err`.
    fn solve<SA, SB, SC>(
        &mut self,
        a: &Matrix<T, D, D, SA>,
        b: &Matrix<T, D, U1, SB>,
        x0: Option<&Matrix<T, D, U1, SC>>,
        tol: T,
    ) -> Result<SolveResult<T, D>, Error>
    where
        SA: Storage<T, D, D>,
        SB: Storage<T, D, U1>,
        SC: Storage<T, D, U1>;

    /// The per-solve iteration budget.
    fn max_iters(&self) -> usize;

    /// Iteration count of the solve in progress (or the last completed one).
    fn cur_iter(&self) -> usize;

    /// Total iterations across all solves on this instance.
    fn num_iters(&self) -> usize {
        0
    }

    /// Number of solves on this instance that ended in breakdown.
    fn num_breakdowns(&self) -> usize {
        0
    }
}
