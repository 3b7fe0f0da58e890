//! Cross-checks the iterative solvers against a direct LU solve.

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};

use krylov::{solve_bicgstab, solve_cg, solve_cgs, SolveStatus};

/// Tridiagonal SPD test matrix, the 1-D Laplacian plus a diagonal shift.
fn laplacian_spd(n: usize) -> DMatrix<f64> {
    let mut a = DMatrix::zeros(n, n);
    for i in 0..n {
        a[(i, i)] = 4.0;
        if i > 0 {
            a[(i, i - 1)] = -1.0;
        }
        if i + 1 < n {
            a[(i, i + 1)] = -1.0;
        }
    }
    a
}

/// Nonsymmetric but diagonally dominant variant of the same stencil.
fn convection_diffusion(n: usize) -> DMatrix<f64> {
    let mut a = DMatrix::zeros(n, n);
    for i in 0..n {
        a[(i, i)] = 4.0;
        if i > 0 {
            a[(i, i - 1)] = -1.5;
        }
        if i + 1 < n {
            a[(i, i + 1)] = -0.5;
        }
    }
    a
}

fn rhs(n: usize) -> DVector<f64> {
    DVector::from_fn(n, |i, _| 1.0 + (i as f64) * 0.25)
}

#[test]
fn cg_agrees_with_direct_solve() {
    let n = 20;
    let a = laplacian_spd(n);
    let b = rhs(n);

    let direct = linear::solve_direct(&a, &b, linear::DEFAULT_PIVOT_EPSILON).unwrap();
    let iterative = solve_cg(&a, &b, None::<&DVector<f64>>, 1e-12, 200).unwrap();

    assert_eq!(iterative.status, SolveStatus::Converged);
    assert_relative_eq!(iterative.x, direct, epsilon = 1e-8);
}

#[test]
fn bicgstab_agrees_with_direct_solve() {
    let n = 20;
    let a = convection_diffusion(n);
    let b = rhs(n);

    let direct = linear::solve_direct(&a, &b, linear::DEFAULT_PIVOT_EPSILON).unwrap();
    let iterative = solve_bicgstab(&a, &b, 1e-12, 200).unwrap();

    assert_eq!(iterative.status, SolveStatus::Converged);
    assert_relative_eq!(iterative.x, direct, epsilon = 1e-8);
}

#[test]
fn cgs_agrees_with_direct_solve() {
    let n = 20;
    let a = convection_diffusion(n);
    let b = rhs(n);

    let direct = linear::solve_direct(&a, &b, linear::DEFAULT_PIVOT_EPSILON).unwrap();
    let iterative = solve_cgs(&a, &b, &DVector::zeros(n), 1e-12, 200).unwrap();

    assert_eq!(iterative.status, SolveStatus::Converged);
    assert_relative_eq!(iterative.x, direct, epsilon = 1e-8);
}

#[test]
fn all_solvers_agree_with_each_other() {
    let n = 12;
    let a = laplacian_spd(n);
    let b = rhs(n);

    let cg = solve_cg(&a, &b, None::<&DVector<f64>>, 1e-12, 200).unwrap();
    let bicg = solve_bicgstab(&a, &b, 1e-12, 200).unwrap();
    let cgs = solve_cgs(&a, &b, &DVector::zeros(n), 1e-12, 200).unwrap();

    assert_relative_eq!(cg.x, bicg.x, epsilon = 1e-8);
    assert_relative_eq!(cg.x, cgs.x, epsilon = 1e-8);
}
