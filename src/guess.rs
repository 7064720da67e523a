// guess.rs
use tracing::debug;

use crate::contract::PropertyType;
use crate::error::Result;
use crate::module::{Inputs, Module, ModuleSpec, Submodules};
use crate::property_types::{DensityMatrix, GeneralizedEigenSolve, InitialGuess};
use crate::value::Value;

/// Initial density from the orbitals of the bare core Hamiltonian, H C = S C e.
pub struct CoreGuess;

impl Module for CoreGuess {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Core Hamiltonian guess density")
            .satisfies::<InitialGuess>()
            .submodule::<GeneralizedEigenSolve>("Diagonalizer")
            .submodule::<DensityMatrix>("Density matrix")
    }

    fn run(&self, inputs: &Inputs<'_>, submods: &Submodules) -> Result<Vec<Value>> {
        let (ao,) = inputs.unwrap::<InitialGuess>()?;
        let nocc = ao.n_occupied()?;
        let (eps, c) =
            submods.run_as::<GeneralizedEigenSolve>("Diagonalizer", (ao.h.clone().into(), ao.s.clone().into()))?;
        debug!("Core orbital energies: {}", eps.view());
        let (d,) = submods.run_as::<DensityMatrix>("Density matrix", (c, nocc))?;
        Ok(InitialGuess::wrap_results((d,)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2, Array4};

    use crate::eigen_solver::CholeskyEigenSolver;
    use crate::error::Error;
    use crate::matrix_builder::DensityBuilder;
    use crate::registry::ModuleRegistry;
    use crate::AoData;

    fn registry() -> ModuleRegistry {
        let mut reg = ModuleRegistry::new();
        reg.register("Core guess", CoreGuess);
        reg.register("Generalized eigensolve", CholeskyEigenSolver);
        reg.register("Density matrix builder", DensityBuilder);
        reg.bind_submodule("Core guess", "Diagonalizer", "Generalized eigensolve").unwrap();
        reg.bind_submodule("Core guess", "Density matrix", "Density matrix builder").unwrap();
        reg
    }

    fn ao(nelec: [usize; 2]) -> Arc<AoData> {
        let h = array![[-2.0, 0.0], [0.0, -0.5]];
        Arc::new(AoData { s: Array2::eye(2), h, eri: Array4::zeros((2, 2, 2, 2)), enuc: 0.0, nao: 2, nelec })
    }

    #[test]
    fn occupies_lowest_core_orbital() {
        let (d,) = registry().run::<InitialGuess>("Core guess", (ao([1, 1]),)).unwrap();
        let d = d.to_matrix().unwrap();
        let expected = array![[1.0, 0.0], [0.0, 0.0]];
        for (x, y) in d.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn open_shell_is_rejected() {
        let err = registry().run::<InitialGuess>("Core guess", (ao([2, 1]),)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
