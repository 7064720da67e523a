// maths.rs
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use ndarray_linalg::{Cholesky, EigValsh, Eigh, Inverse, UPLO};

use crate::error::{Error, Result};

/// Require a symmetric positive definite metric: every eigenvalue is finite and the smallest
/// exceeds `tol * max(1, |largest|)`.
/// # Arguments
///     `lambdas`: Array1, eigenvalues of the metric in ascending order.
///     `tol`: f64, relative tolerance.
pub fn check_metric(lambdas: &Array1<f64>, tol: f64) -> Result<()> {
    if lambdas.iter().any(|x| !x.is_finite()) {
        return Err(Error::SingularMetric { min_eigenvalue: f64::NAN });
    }
    let min = lambdas.iter().copied().fold(f64::INFINITY, f64::min);
    let max = lambdas.iter().copied().fold(0.0, |m: f64, x| m.max(x.abs()));
    if lambdas.is_empty() || !(min > tol * max.max(1.0)) {
        return Err(Error::SingularMetric { min_eigenvalue: if lambdas.is_empty() { 0.0 } else { min } });
    }
    Ok(())
}

/// Symmetric part (A + A^T) / 2 of a square matrix.
pub fn symmetrize(a: &ArrayView2<f64>) -> Array2<f64> {
    (a + &a.t()) * 0.5
}

/// Fix the sign of each eigenvector column so that its largest magnitude component is positive.
/// # Arguments
///     `c`: Array2, eigenvectors stored as columns, modified in place.
pub fn align_eigenvectors(c: &mut Array2<f64>) {
    for mut col in c.axis_iter_mut(Axis(1)) {
        let mut imax = 0;
        for (i, x) in col.iter().enumerate() {
            if x.abs() > col[imax].abs() {
                imax = i;
            }
        }
        if col.len() > 0 && col[imax] < 0.0 {
            col.mapv_inplace(|x| -x);
        }
    }
}

/// Loewdin symmetric orthogonalizer, computes X = S^{-1/2}.
/// # Arguments
/// `s`: Array2, symmetric positive definite matrix, uses only the lower triangle. Often AO
/// basis overlap matrix is s here.
/// `tol`: Float, relative tolerance below which an eigenvalue of `s` counts as zero.
pub fn loewdin_x_real(s: &ArrayView2<f64>, tol: f64) -> Result<Array2<f64>> {
    // S = U \Lambda U^T
    let (lambdas, evecs) = s.eigh(UPLO::Lower)?;
    check_metric(&lambdas, tol)?;
    // \Lambda^{-1/2}
    let invsqrt = lambdas.mapv(|x| 1.0 / x.sqrt());
    let d = Array2::from_diag(&invsqrt);
    // X = U \Lambda^{-1/2} U^T
    Ok(evecs.dot(&d).dot(&evecs.t()))
}

/// Solve the real generalized eigenproblem F C = S C e using the Loewdin orthogonalizer.
/// Eigenvalues ascend and eigenvector signs are fixed by `align_eigenvectors`.
/// # Arguments
///     `f`: Array2, symmetric matrix. Often Fock matrix is f here.
///     `s`: Array2, symmetric positive definite metric. Often AO basis overlap matrix is s here.
///     `tol`: Float, relative tolerance for a singular metric.
pub fn general_evp_real(f: &ArrayView2<f64>, s: &ArrayView2<f64>, tol: f64) -> Result<(Array1<f64>, Array2<f64>)> {
    // X = S^{-1/2}
    let x = loewdin_x_real(s, tol)?;
    // \tilde{F} = X^T F X.
    let ft = x.t().dot(&symmetrize(f)).dot(&x);
    // \tilde{F} U = \epsilon U.
    let (epsilon, u) = symmetrize(&ft.view()).eigh(UPLO::Lower)?;
    // C = X U.
    let mut c = x.dot(&u);
    align_eigenvectors(&mut c);
    Ok((epsilon, c))
}

/// Solve A v = \lambda B v by Cholesky reduction B = L L^T, \tilde{A} = L^{-1} A L^{-T}.
/// Eigenvalues ascend and eigenvector signs are fixed by `align_eigenvectors`.
/// # Arguments
///     `a`: Array2, symmetric matrix, only its symmetric part is used.
///     `b`: Array2, symmetric positive definite metric.
///     `tol`: Float, relative tolerance for a singular metric.
pub fn general_evp_cholesky(a: &ArrayView2<f64>, b: &ArrayView2<f64>, tol: f64) -> Result<(Array1<f64>, Array2<f64>)> {
    let lambdas = b.eigvalsh(UPLO::Lower)?;
    check_metric(&lambdas, tol)?;
    let min_eigenvalue = lambdas.iter().copied().fold(f64::INFINITY, f64::min);

    // B = L L^T.
    let l = b.cholesky(UPLO::Lower).map_err(|_| Error::SingularMetric { min_eigenvalue })?;
    let linv = l.inv()?;
    let linv_t = linv.t().as_standard_layout().into_owned();
    // \tilde{A} = L^{-1} A L^{-T}.
    let at = linv.dot(&symmetrize(a)).dot(&linv_t);
    let (w, y) = symmetrize(&at.view()).eigh(UPLO::Lower)?;
    // v = L^{-T} y.
    let mut v = linv_t.dot(&y);
    align_eigenvectors(&mut v);
    Ok((w, v))
}

/// Orbital gradient / DIIS error FDS - SDF.
/// # Arguments
///     `f`: Array2, Fock matrix.
///     `d`: Array2, density matrix.
///     `s`: Array2, AO overlap matrix.
pub fn commutator(f: &Array2<f64>, d: &Array2<f64>, s: &Array2<f64>) -> Array2<f64> {
    let fds = f.dot(d).dot(s);
    let sdf = s.dot(d).dot(f);
    fds - sdf
}

/// Calculate Einstein summation of matrices `g` and `h` as \sum_{a,b} g_{b,a} h_{ab}.
/// Assumes `g` and `h` are of identical shape.
/// # Arguments
///     `g`: Array2, matrix 1.
///     `h`: Array2, matrix 2.
pub fn einsum_ba_ab_real(g: &Array2<f64>, h: &Array2<f64>) -> f64 {
    Zip::from(&g.t()).and(h).fold(0.0, |acc, &g_ba, &h_ab| acc + g_ba * h_ab)
}

pub fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    Zip::from(a).and(b).fold(0.0, |m: f64, x, y| m.max((x - y).abs()))
}

pub fn frobenius_norm(a: &Array2<f64>) -> f64 {
    a.iter().map(|x| x * x).sum::<f64>().sqrt()
}
