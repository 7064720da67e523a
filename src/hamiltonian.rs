// hamiltonian.rs
use std::sync::Arc;

use tracing::debug;

use crate::contract::PropertyType;
use crate::error::{Error, Result};
use crate::integrals::{eri_tensor, kinetic_matrix, nuclear_matrix, overlap_matrix};
use crate::module::{Inputs, Module, ModuleSpec, Submodules};
use crate::property_types::{
    AoHamiltonian, ChargeCharge, CoreHamiltonian, ElectronRepulsion, KineticMatrix, NuclearAttractionMatrix,
    OverlapMatrix,
};
use crate::tensor::TensorHandle;
use crate::utils::format_array2;
use crate::value::Value;
use crate::AoData;

pub struct Overlap;

impl Module for Overlap {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("AO overlap matrix").satisfies::<OverlapMatrix>()
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (basis,) = inputs.unwrap::<OverlapMatrix>()?;
        Ok(OverlapMatrix::wrap_results((overlap_matrix(&basis).into(),)))
    }
}

pub struct Kinetic;

impl Module for Kinetic {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("AO kinetic energy matrix").satisfies::<KineticMatrix>()
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (basis,) = inputs.unwrap::<KineticMatrix>()?;
        Ok(KineticMatrix::wrap_results((kinetic_matrix(&basis).into(),)))
    }
}

pub struct NuclearAttraction;

impl Module for NuclearAttraction {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("AO electron-nucleus attraction matrix").satisfies::<NuclearAttractionMatrix>()
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (basis, mol) = inputs.unwrap::<NuclearAttractionMatrix>()?;
        Ok(NuclearAttractionMatrix::wrap_results((nuclear_matrix(&basis, &mol).into(),)))
    }
}

/// H = T + V from the `Kinetic` and `Nuclear attraction` slots.
pub struct CoreHamiltonianBuilder;

impl Module for CoreHamiltonianBuilder {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("One electron core Hamiltonian T + V")
            .satisfies::<CoreHamiltonian>()
            .submodule::<KineticMatrix>("Kinetic")
            .submodule::<NuclearAttractionMatrix>("Nuclear attraction")
    }

    fn run(&self, inputs: &Inputs<'_>, submods: &Submodules) -> Result<Vec<Value>> {
        let (basis, mol) = inputs.unwrap::<CoreHamiltonian>()?;
        let (t,) = submods.run_as::<KineticMatrix>("Kinetic", (Arc::clone(&basis),))?;
        let (v,) = submods.run_as::<NuclearAttractionMatrix>("Nuclear attraction", (basis, mol))?;
        let (t, v) = (t.as_square_matrix()?, v.as_square_matrix()?);
        if t.dim() != v.dim() {
            return Err(Error::shape(format!("a {}x{} matrix", t.nrows(), t.ncols()), &[v.nrows(), v.ncols()]));
        }
        Ok(CoreHamiltonian::wrap_results(((&t + &v).into(),)))
    }
}

pub struct Eri4;

impl Module for Eri4 {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Four centre electron repulsion integrals (pq|rs)").satisfies::<ElectronRepulsion>()
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (basis,) = inputs.unwrap::<ElectronRepulsion>()?;
        let eri = eri_tensor(&basis);
        debug!(nao = basis.nao(), "computed electron repulsion integrals");
        Ok(ElectronRepulsion::wrap_results((eri.into(),)))
    }
}

/// Point charge repulsion of the nuclei.
pub struct CoulombsLaw;

impl Module for CoulombsLaw {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Nuclear repulsion energy by Coulomb's law").satisfies::<ChargeCharge>()
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (mol,) = inputs.unwrap::<ChargeCharge>()?;
        Ok(ChargeCharge::wrap_results((mol.nuclear_repulsion(),)))
    }
}

/// Gathers S, H, (pq|rs), E_nuc and the electron counts into `AoData`.
pub struct AoIntegralDriver;

fn check_square(t: &TensorHandle, nao: usize) -> Result<()> {
    if t.shape() != [nao, nao] {
        return Err(Error::shape(format!("a {nao}x{nao} matrix"), t.shape()));
    }
    Ok(())
}

impl Module for AoIntegralDriver {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Collects AO integrals for an SCF calculation")
            .satisfies::<AoHamiltonian>()
            .submodule::<OverlapMatrix>("Overlap")
            .submodule::<CoreHamiltonian>("Core Hamiltonian")
            .submodule::<ElectronRepulsion>("Electron repulsion")
            .submodule::<ChargeCharge>("Charge-charge")
    }

    fn run(&self, inputs: &Inputs<'_>, submods: &Submodules) -> Result<Vec<Value>> {
        let (basis, mol) = inputs.unwrap::<AoHamiltonian>()?;
        let nao = basis.nao();

        let (s,) = submods.run_as::<OverlapMatrix>("Overlap", (Arc::clone(&basis),))?;
        let (h,) = submods.run_as::<CoreHamiltonian>("Core Hamiltonian", (Arc::clone(&basis), Arc::clone(&mol)))?;
        let (eri,) = submods.run_as::<ElectronRepulsion>("Electron repulsion", (basis,))?;
        let (enuc,) = submods.run_as::<ChargeCharge>("Charge-charge", (Arc::clone(&mol),))?;

        check_square(&s, nao)?;
        check_square(&h, nao)?;
        if eri.shape() != [nao, nao, nao, nao] {
            return Err(Error::shape(format!("a {nao}x{nao}x{nao}x{nao} tensor"), eri.shape()));
        }

        let ao = AoData {
            s: s.to_matrix()?,
            h: h.to_matrix()?,
            eri: eri.as_array4()?.to_owned(),
            enuc,
            nao,
            nelec: mol.nelec()?,
        };
        debug!("Overlap matrix:\n{}", format_array2(&ao.s));
        debug!("Core Hamiltonian:\n{}", format_array2(&ao.h));
        debug!(nao, enuc, nalpha = ao.nelec[0], nbeta = ao.nelec[1], "AO integrals ready");
        Ok(AoHamiltonian::wrap_results((Arc::new(ao),)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::sto3g;
    use crate::molecule::Molecule;
    use crate::registry::ModuleRegistry;
    use approx::assert_abs_diff_eq;

    fn registry() -> ModuleRegistry {
        let mut reg = ModuleRegistry::new();
        reg.register("Overlap", Overlap);
        reg.register("Kinetic", Kinetic);
        reg.register("Nuclear attraction", NuclearAttraction);
        reg.register("Core Hamiltonian", CoreHamiltonianBuilder);
        reg.register("ERI4", Eri4);
        reg.register("Coulomb's law", CoulombsLaw);
        reg.register("AO integral driver", AoIntegralDriver);
        reg.bind_submodule("Core Hamiltonian", "Kinetic", "Kinetic").unwrap();
        reg.bind_submodule("Core Hamiltonian", "Nuclear attraction", "Nuclear attraction").unwrap();
        reg.bind_submodule("AO integral driver", "Overlap", "Overlap").unwrap();
        reg.bind_submodule("AO integral driver", "Core Hamiltonian", "Core Hamiltonian").unwrap();
        reg.bind_submodule("AO integral driver", "Electron repulsion", "ERI4").unwrap();
        reg.bind_submodule("AO integral driver", "Charge-charge", "Coulomb's law").unwrap();
        reg
    }

    #[test]
    fn water_ao_data() {
        let mol = Arc::new(Molecule::water());
        let basis = Arc::new(sto3g(&mol).unwrap());
        let reg = registry();
        let (ao,) = reg.run::<AoHamiltonian>("AO integral driver", (basis, Arc::clone(&mol))).unwrap();
        assert_eq!(ao.nao, 7);
        assert_eq!(ao.nelec, [5, 5]);
        assert_abs_diff_eq!(ao.enuc, 8.00236706181045, epsilon = 1e-10);
        for i in 0..7 {
            for j in 0..7 {
                assert_abs_diff_eq!(ao.h[(i, j)], ao.h[(j, i)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn core_hamiltonian_rejects_mismatched_parts() {
        struct Small;
        impl Module for Small {
            fn spec(&self) -> ModuleSpec {
                ModuleSpec::new("wrong size").satisfies::<KineticMatrix>()
            }
            fn run(&self, _inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
                Ok(KineticMatrix::wrap_results((ndarray::Array2::<f64>::zeros((1, 1)).into(),)))
            }
        }

        let mut reg = registry();
        reg.register("Small", Small);
        reg.bind_submodule("Core Hamiltonian", "Kinetic", "Small").unwrap();
        let mol = Arc::new(Molecule::h2());
        let basis = Arc::new(sto3g(&mol).unwrap());
        let e = reg.run::<CoreHamiltonian>("Core Hamiltonian", (basis, mol)).unwrap_err();
        assert!(matches!(e, Error::Shape { .. }));
    }
}
