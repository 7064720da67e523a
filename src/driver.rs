// driver.rs
use std::sync::Arc;

use tracing::info;

use crate::contract::PropertyType;
use crate::error::Result;
use crate::module::{Inputs, Module, ModuleSpec, Submodules};
use crate::property_types::{AoHamiltonian, InitialGuess, Optimize, TotalEnergy};
use crate::value::Value;

/// Total SCF energy: AO integrals from `Hamiltonian`, a starting density from `Guess`, and the
/// self consistent solution from `Optimizer`.
pub struct ScfDriver;

impl Module for ScfDriver {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Driver for a restricted Hartree-Fock calculation")
            .satisfies::<TotalEnergy>()
            .submodule::<AoHamiltonian>("Hamiltonian")
            .submodule::<InitialGuess>("Guess")
            .submodule::<Optimize>("Optimizer")
    }

    fn run(&self, inputs: &Inputs<'_>, submods: &Submodules) -> Result<Vec<Value>> {
        let (basis, mol) = inputs.unwrap::<TotalEnergy>()?;
        info!(natoms = mol.atoms.len(), nao = basis.nao(), basis = %basis.name, "starting SCF");
        let (ao,) = submods.run_as::<AoHamiltonian>("Hamiltonian", (basis, mol))?;
        let (d0,) = submods.run_as::<InitialGuess>("Guess", (Arc::clone(&ao),))?;
        let (energy, _density) = submods.run_as::<Optimize>("Optimizer", (ao, d0))?;
        info!(energy, "SCF total energy");
        Ok(TotalEnergy::wrap_results((energy,)))
    }
}
