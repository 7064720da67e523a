// eigen_solver.rs
use ndarray::ArrayView2;

use crate::contract::PropertyType;
use crate::error::{Error, Result};
use crate::maths::{general_evp_cholesky, general_evp_real};
use crate::module::{Inputs, Module, ModuleSpec, Submodules};
use crate::property_types::GeneralizedEigenSolve;
use crate::tensor::TensorHandle;
use crate::value::Value;

const METRIC_TOLERANCE: f64 = 1e-10;

/// Check A and B are square and of equal size.
fn operands<'a>(a: &'a TensorHandle, b: &'a TensorHandle) -> Result<(ArrayView2<'a, f64>, ArrayView2<'a, f64>)> {
    let a = a.as_square_matrix()?;
    let b = b.as_square_matrix()?;
    if a.dim() != b.dim() {
        return Err(Error::shape(format!("a {}x{} metric", a.nrows(), a.ncols()), b.shape()));
    }
    Ok((a, b))
}

/// A v = lambda B v by Cholesky reduction of B.
pub struct CholeskyEigenSolver;

impl Module for CholeskyEigenSolver {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Generalized symmetric-definite eigensolve by Cholesky reduction")
            .satisfies::<GeneralizedEigenSolve>()
            .input("metric tolerance", METRIC_TOLERANCE, "Relative eigenvalue below which B is singular")
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (a, b) = inputs.unwrap::<GeneralizedEigenSolve>()?;
        let tol: f64 = inputs.get("metric tolerance")?;
        let (a, b) = operands(&a, &b)?;
        let (values, vectors) = general_evp_cholesky(&a, &b, tol)?;
        Ok(GeneralizedEigenSolve::wrap_results((values.into(), vectors.into())))
    }
}

/// A v = lambda B v through the symmetric orthogonalizer B^{-1/2}.
pub struct LoewdinEigenSolver;

impl Module for LoewdinEigenSolver {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Generalized symmetric-definite eigensolve by Loewdin orthogonalization")
            .satisfies::<GeneralizedEigenSolve>()
            .input("metric tolerance", METRIC_TOLERANCE, "Relative eigenvalue below which B is singular")
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (a, b) = inputs.unwrap::<GeneralizedEigenSolve>()?;
        let tol: f64 = inputs.get("metric tolerance")?;
        let (a, b) = operands(&a, &b)?;
        let (values, vectors) = general_evp_real(&a, &b, tol)?;
        Ok(GeneralizedEigenSolve::wrap_results((values.into(), vectors.into())))
    }
}
