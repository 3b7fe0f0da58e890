//! Conjugate Gradient for symmetric positive-definite systems.

use log::{debug, trace};
use nalgebra::{
    allocator::Allocator, Const, DefaultAllocator, Dim, DimName, Dyn, Matrix, OVector, RealField,
    Scalar, Storage, U1,
};

use crate::{check_dim, Error, KrylovSolver, SolveResult, SolveStatus};

/// Conjugate Gradient solver.
///
/// Precondition: `A` is symmetric positive-definite. This is not verified at
/// runtime; on an indefinite or nonsymmetric matrix convergence is simply
/// not guaranteed. For a genuinely SPD matrix the step-length denominator
/// `p·Ap` is provably nonzero while `p` is nonzero, so a zero denominator
/// signals a violated precondition and is reported as
/// [`SolveStatus::Breakdown`] instead of dividing into NaN.
///
/// Stopping test: absolute residual norm, `‖r‖ < tol`.
#[derive(Clone, Debug)]
pub struct Cg<T, D: Dim>
where
    T: Scalar,
    DefaultAllocator: Allocator<T, D>,
{
    /// residual
    r: OVector<T, D>,
    /// search direction
    p: OVector<T, D>,
    /// A·p
    ap: OVector<T, D>,
    /// per-solve iteration budget
    max_iters: usize,
    /// iteration count of the current solve
    curiter: usize,
    /// total iterations across all solves
    niters: usize,
    /// solves ended in breakdown
    nbreakdowns: usize,
}

impl<T, D> Cg<T, D>
where
    T: Scalar + RealField + Copy,
    D: Dim,
    DefaultAllocator: Allocator<T, D>,
{
    /// Creates a new solver, statically sized.
    pub fn new(max_iters: usize) -> Self
    where
        D: DimName,
    {
        Self::with_dim(D::name(), max_iters)
    }

    pub(crate) fn with_dim(d: D, max_iters: usize) -> Self {
        Cg {
            r: OVector::zeros_generic(d, Const::<1>),
            p: OVector::zeros_generic(d, Const::<1>),
            ap: OVector::zeros_generic(d, Const::<1>),
            max_iters,
            curiter: 0,
            niters: 0,
            nbreakdowns: 0,
        }
    }
}

impl<T> Cg<T, Dyn>
where
    T: Scalar + RealField + Copy,
{
    /// Creates a new solver, dynamically sized.
    pub fn new_dynamic(size: usize, max_iters: usize) -> Self {
        Self::with_dim(Dyn(size), max_iters)
    }
}

impl<T, D> KrylovSolver<T, D> for Cg<T, D>
where
    T: Scalar + RealField + Copy,
    D: Dim,
    DefaultAllocator: Allocator<T, D>,
{
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
        SC: Storage<T, D, U1>,
    {
        let n = self.r.nrows();
        check_dim(a.nrows(), a.ncols())?;
        check_dim(n, a.nrows())?;
        check_dim(n, b.nrows())?;
        if let Some(x0) = x0 {
            check_dim(n, x0.nrows())?;
        }

        let mut x = match x0 {
            Some(x0) => x0.clone_owned(),
            None => {
                let mut z = b.clone_owned();
                z.fill(T::zero());
                z
            }
        };

        // r = b - A·x
        self.r.copy_from(b);
        self.r.gemv(-T::one(), a, &x, T::one());

        let mut rho_old = self.r.dot(&self.r);
        let mut res_norm = rho_old.sqrt();
        self.curiter = 0;

        if res_norm < tol {
            debug!("cg: initial guess already converged, |r| = {:?}", res_norm);
            return Ok(SolveResult {
                x,
                iterations: 0,
                residual_norm: res_norm,
                status: SolveStatus::Converged,
            });
        }

        self.p.copy_from(&self.r);

        for iter in 1..=self.max_iters {
            self.curiter = iter;
            self.niters += 1;

            self.ap.gemv(T::one(), a, &self.p, T::zero());

            let denom = self.p.dot(&self.ap);
            if denom == T::zero() {
                self.nbreakdowns += 1;
                debug!("cg: breakdown at iteration {} (p·Ap = 0)", iter);
                return Ok(SolveResult {
                    x,
                    iterations: iter,
                    residual_norm: res_norm,
                    status: SolveStatus::Breakdown,
                });
            }
            let alpha = rho_old / denom;

            x.axpy(alpha, &self.p, T::one());
            self.r.axpy(-alpha, &self.ap, T::one());

            let rho_new = self.r.dot(&self.r);
            res_norm = rho_new.sqrt();
            trace!("cg: iter {} |r| = {:?}", iter, res_norm);

            if res_norm < tol {
                debug!("cg: converged in {} iterations, |r| = {:?}", iter, res_norm);
                return Ok(SolveResult {
                    x,
                    iterations: iter,
                    residual_norm: res_norm,
                    status: SolveStatus::Converged,
                });
            }

            let beta = rho_new / rho_old;
            // p = r + β·p
            self.p.axpy(T::one(), &self.r, beta);
            rho_old = rho_new;
        }

        debug!(
            "cg: iteration budget ({}) exhausted, |r| = {:?}",
            self.max_iters, res_norm
        );
        Ok(SolveResult {
            x,
            iterations: self.max_iters,
            residual_norm: res_norm,
            status: SolveStatus::MaxIterationsReached,
        })
    }

    fn max_iters(&self) -> usize {
        self.max_iters
    }

    fn cur_iter(&self) -> usize {
        self.curiter
    }

    fn num_iters(&self) -> usize {
        self.niters
    }

    fn num_breakdowns(&self) -> usize {
        self.nbreakdowns
    }
}

/// One-shot Conjugate Gradient solve with fresh working vectors.
///
/// `x0 = None` starts from the zero vector. Safe to call from multiple
/// threads concurrently; each call owns its own state.
pub fn solve_cg<T, D, SA, SB, SC>(
    a: &Matrix<T, D, D, SA>,
    b: &Matrix<T, D, U1, SB>,
    x0: Option<&Matrix<T, D, U1, SC>>,
    tol: T,
    max_iters: usize,
) -> Result<SolveResult<T, D>, Error>
where
    T: Scalar + RealField + Copy,
    D: Dim,
    SA: Storage<T, D, D>,
    SB: Storage<T, D, U1>,
    SC: Storage<T, D, U1>,
    DefaultAllocator: Allocator<T, D>,
{
    let (d, _) = a.shape_generic();
    Cg::with_dim(d, max_iters).solve(a, b, x0, tol)
}
