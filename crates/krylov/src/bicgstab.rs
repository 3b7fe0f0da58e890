//! Stabilized bi-conjugate gradient (BiCGSTAB) for general square systems.

use log::{debug, trace};
use nalgebra::{
    allocator::Allocator, Const, DefaultAllocator, Dim, DimName, Dyn, Matrix, OVector, RealField,
    Scalar, Storage, U1,
};

use crate::{check_dim, Error, KrylovSolver, SolveResult, SolveStatus};

/// BiCGSTAB solver for general (nonsymmetric) matrices.
///
/// Keeps a shadow residual `r̃`, fixed to the initial residual, and the usual
/// `p`, `v`, `s`, `t` working vectors. The stopping test is scale-invariant:
/// `‖r‖ / ‖b‖ < tol`, with `‖b‖` replaced by 1 when `b` is the zero vector.
/// Convergence is also checked at the half step (`‖s‖ / ‖b‖ < tol`), in
/// which case only the `α·p` update is applied.
///
/// Three inner products must stay nonzero for the recurrence to be defined
/// (`r̃·r`, `r̃·v`, `t·t`); a zero in any of them ends the solve with
/// [`SolveStatus::Breakdown`].
#[derive(Clone, Debug)]
pub struct BiCgStab<T, D: Dim>
where
    T: Scalar,
    DefaultAllocator: Allocator<T, D>,
{
    /// residual
    r: OVector<T, D>,
    /// shadow residual, fixed at r₀
    rt: OVector<T, D>,
    /// search direction
    p: OVector<T, D>,
    /// A·p
    v: OVector<T, D>,
    /// half-step residual
    s: OVector<T, D>,
    /// A·s
    t: OVector<T, D>,
    max_iters: usize,
    curiter: usize,
    niters: usize,
    nbreakdowns: usize,
}

impl<T, D> BiCgStab<T, D>
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
        BiCgStab {
            r: OVector::zeros_generic(d, Const::<1>),
            rt: OVector::zeros_generic(d, Const::<1>),
            p: OVector::zeros_generic(d, Const::<1>),
            v: OVector::zeros_generic(d, Const::<1>),
            s: OVector::zeros_generic(d, Const::<1>),
            t: OVector::zeros_generic(d, Const::<1>),
            max_iters,
            curiter: 0,
            niters: 0,
            nbreakdowns: 0,
        }
    }

    fn breakdown(&mut self, x: OVector<T, D>, res_norm: T, what: &str) -> SolveResult<T, D> {
        self.nbreakdowns += 1;
        debug!("bicgstab: breakdown at iteration {} ({} = 0)", self.curiter, what);
        SolveResult {
            x,
            iterations: self.curiter,
            residual_norm: res_norm,
            status: SolveStatus::Breakdown,
        }
    }
}

impl<T> BiCgStab<T, Dyn>
where
    T: Scalar + RealField + Copy,
{
    /// Creates a new solver, dynamically sized.
    pub fn new_dynamic(size: usize, max_iters: usize) -> Self {
        Self::with_dim(Dyn(size), max_iters)
    }
}

impl<T, D> KrylovSolver<T, D> for BiCgStab<T, D>
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

        // scale-invariant stopping: ‖r‖/‖b‖, falling back to the absolute
        // norm when b = 0
        let mut b_norm = b.norm();
        if b_norm == T::zero() {
            b_norm = T::one();
        }

        // r = b - A·x, shadow residual fixed at r₀
        self.r.copy_from(b);
        self.r.gemv(-T::one(), a, &x, T::one());
        self.rt.copy_from(&self.r);

        let mut res_norm = self.r.norm();
        self.curiter = 0;

        if res_norm / b_norm < tol {
            debug!("bicgstab: initial guess already converged, |r| = {:?}", res_norm);
            return Ok(SolveResult {
                x,
                iterations: 0,
                residual_norm: res_norm,
                status: SolveStatus::Converged,
            });
        }

        let mut rho_old = T::one();
        let mut alpha = T::one();
        let mut omega = T::one();
        self.p.fill(T::zero());
        self.v.fill(T::zero());

        for iter in 1..=self.max_iters {
            self.curiter = iter;
            self.niters += 1;

            let rho_new = self.rt.dot(&self.r);
            if rho_new == T::zero() {
                return Ok(self.breakdown(x, res_norm, "r̃·r"));
            }

            let beta = (rho_new / rho_old) * (alpha / omega);
            // p = r + β·(p - ω·v)
            self.p.axpy(-omega, &self.v, T::one());
            self.p.axpy(T::one(), &self.r, beta);

            self.v.gemv(T::one(), a, &self.p, T::zero());

            let rtv = self.rt.dot(&self.v);
            if rtv == T::zero() {
                return Ok(self.breakdown(x, res_norm, "r̃·v"));
            }
            alpha = rho_new / rtv;

            // s = r - α·v
            self.s.copy_from(&self.r);
            self.s.axpy(-alpha, &self.v, T::one());

            let s_norm = self.s.norm();
            if s_norm / b_norm < tol {
                // half-step convergence: only the α·p update applies
                x.axpy(alpha, &self.p, T::one());
                debug!(
                    "bicgstab: converged at half step, iteration {}, |s| = {:?}",
                    iter, s_norm
                );
                return Ok(SolveResult {
                    x,
                    iterations: iter,
                    residual_norm: s_norm,
                    status: SolveStatus::Converged,
                });
            }

            self.t.gemv(T::one(), a, &self.s, T::zero());

            let tt = self.t.dot(&self.t);
            if tt == T::zero() {
                return Ok(self.breakdown(x, res_norm, "t·t"));
            }
            omega = self.t.dot(&self.s) / tt;

            // x += α·p + ω·s ; r = s - ω·t
            x.axpy(alpha, &self.p, T::one());
            x.axpy(omega, &self.s, T::one());
            self.r.copy_from(&self.s);
            self.r.axpy(-omega, &self.t, T::one());

            res_norm = self.r.norm();
            trace!("bicgstab: iter {} |r| = {:?}", iter, res_norm);

            if res_norm / b_norm < tol {
                debug!(
                    "bicgstab: converged in {} iterations, |r| = {:?}",
                    iter, res_norm
                );
                return Ok(SolveResult {
                    x,
                    iterations: iter,
                    residual_norm: res_norm,
                    status: SolveStatus::Converged,
                });
            }

            rho_old = rho_new;
        }

        debug!(
            "bicgstab: iteration budget ({}) exhausted, |r| = {:?}",
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

/// One-shot BiCGSTAB solve from the zero initial guess, with fresh working
/// vectors. Safe to call from multiple threads concurrently.
pub fn solve_bicgstab<T, D, SA, SB>(
    a: &Matrix<T, D, D, SA>,
    b: &Matrix<T, D, U1, SB>,
    tol: T,
    max_iters: usize,
) -> Result<SolveResult<T, D>, Error>
where
    T: Scalar + RealField + Copy,
    D: Dim,
    SA: Storage<T, D, D>,
    SB: Storage<T, D, U1>,
    DefaultAllocator: Allocator<T, D>,
{
    let (d, _) = a.shape_generic();
    BiCgStab::with_dim(d, max_iters).solve(a, b, None::<&OVector<T, D>>, tol)
}

#[cfg(test)]
mod tests {
    use nalgebra::{matrix, vector, DMatrix, DVector, Vector2, Vector4};

    use super::*;

    #[test]
    fn converges_on_nonsymmetric_system() {
        let a = matrix![
            4.0, 1.0, 0.0, 0.0;
            -1.0, 3.0, 1.0, 0.0;
            0.0, -1.0, 3.0, 1.0;
            0.0, 0.0, -1.0, 2.0;
        ];
        let b = vector![1.0, 2.0, 3.0, 4.0];

        let result = solve_bicgstab(&a, &b, 1e-12, 50).unwrap();

        assert_eq!(result.status, SolveStatus::Converged);
        let residual = &b - &a * &result.x;
        assert!(
            residual.norm() < 1e-10 * b.norm(),
            "residual {:e}",
            residual.norm()
        );
    }

    #[test]
    fn breakdown_is_reported_not_nan() {
        // r̃·v vanishes on the first iteration for this antidiagonal system.
        let a = matrix![
            0.0, 1.0;
            1.0, 0.0;
        ];
        let b: Vector2<f64> = vector![1.0, 0.0];

        let result = solve_bicgstab(&a, &b, 1e-10, 10).unwrap();

        assert_eq!(result.status, SolveStatus::Breakdown);
        assert!(result.x.iter().all(|v| v.is_finite()));
        assert!(result.residual_norm.is_finite());
    }

    #[test]
    fn zero_rhs_converges_immediately() {
        let a = matrix![
            2.0, 1.0;
            0.0, 2.0;
        ];
        let b = Vector2::zeros();

        let result = solve_bicgstab(&a, &b, 1e-10, 10).unwrap();

        assert_eq!(result.status, SolveStatus::Converged);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.x, Vector2::zeros());
    }

    #[test]
    fn stopping_test_is_scale_invariant() {
        // Scaling b by a power of two must not change the iteration count:
        // the criterion is ‖r‖/‖b‖, not ‖r‖.
        let a = matrix![
            4.0, 1.0, 0.0, 0.0;
            -1.0, 3.0, 1.0, 0.0;
            0.0, -1.0, 3.0, 1.0;
            0.0, 0.0, -1.0, 2.0;
        ];
        let b = vector![1.0, 2.0, 3.0, 4.0];
        let b_scaled: Vector4<f64> = b * 1024.0;

        let plain = solve_bicgstab(&a, &b, 1e-10, 50).unwrap();
        let scaled = solve_bicgstab(&a, &b_scaled, 1e-10, 50).unwrap();

        assert_eq!(plain.status, SolveStatus::Converged);
        assert_eq!(plain.iterations, scaled.iterations);
    }

    #[test]
    fn budget_exhaustion_returns_best_iterate() {
        let a = matrix![
            4.0, 1.0;
            -1.0, 3.0;
        ];
        let b: Vector2<f64> = vector![1.0, 2.0];

        let result = solve_bicgstab(&a, &b, 1e-30, 1).unwrap();

        assert_eq!(result.status, SolveStatus::MaxIterationsReached);
        assert_eq!(result.iterations, 1);
        assert!(result.x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let a = DMatrix::<f64>::identity(3, 3);
        let b = DVector::<f64>::zeros(4);
        assert!(matches!(
            solve_bicgstab(&a, &b, 1e-10, 10),
            Err(Error::DimensionMismatch {
                expected: 3,
                found: 4
            })
        ));
    }
}
