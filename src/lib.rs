pub mod basis;
pub mod contract;
pub mod diis;
pub mod driver;
pub mod eigen_solver;
pub mod error;
pub mod guess;
pub mod hamiltonian;
pub mod input;
pub mod integrals;
pub mod maths;
pub mod matrix_builder;
pub mod module;
pub mod molecule;
pub mod property_types;
pub mod registry;
pub mod scf;
pub mod tensor;
pub mod utils;
pub mod value;

use ndarray::{Array2, Array4};

pub use contract::{Contract, Field, PropertyType};
pub use error::{Error, Result};
pub use module::{BoundModule, Inputs, Module, ModuleSpec, Submodules};
pub use registry::{ModuleRef, ModuleRegistry};
pub use tensor::TensorHandle;
pub use value::{ModuleValue, Value, ValueType};

// Struct for storing AO integrals
#[derive(Debug, Clone)]
pub struct AoData {
    pub s: Array2<f64>, // AO overlap matrix
    pub h: Array2<f64>, // One electron Hamiltonian matrix
    pub eri: Array4<f64>, // Electron Repulsion Integrals (ERIs)
    pub enuc: f64, // Nuclear repulsion energy
    pub nao: usize, // Number of AOs
    pub nelec: [usize; 2], // Number of spin alpha and spin beta electrons
}

impl AoData {
    /// Number of doubly occupied orbitals. Only closed shells are supported.
    pub fn n_occupied(&self) -> Result<usize> {
        let [na, nb] = self.nelec;
        if na != nb {
            return Err(Error::InvalidInput(format!(
                "restricted SCF needs a closed shell, got {na} alpha and {nb} beta electrons"
            )));
        }
        if na > self.nao {
            return Err(Error::InvalidInput(format!("{na} occupied orbitals do not fit in {} AOs", self.nao)));
        }
        Ok(na)
    }
}

/// Register every module shipped with the crate and wire the default call graph.
/// # Arguments
///     `registry`: ModuleRegistry, modules of the same names are replaced.
pub fn load_modules(registry: &mut ModuleRegistry) -> Result<()> {
    registry.register("Molecule database", molecule::MoleculeDatabase);
    registry.register("STO-3G", basis::Sto3g);
    registry.register("Overlap", hamiltonian::Overlap);
    registry.register("Kinetic", hamiltonian::Kinetic);
    registry.register("Nuclear attraction", hamiltonian::NuclearAttraction);
    registry.register("Core Hamiltonian", hamiltonian::CoreHamiltonianBuilder);
    registry.register("ERI4", hamiltonian::Eri4);
    registry.register("Coulomb's law", hamiltonian::CoulombsLaw);
    registry.register("AO integral driver", hamiltonian::AoIntegralDriver);
    registry.register("Generalized eigensolve", eigen_solver::CholeskyEigenSolver);
    registry.register("Loewdin generalized eigensolve", eigen_solver::LoewdinEigenSolver);
    registry.register("Four center J", matrix_builder::FourCenterJ);
    registry.register("Four center K", matrix_builder::FourCenterK);
    registry.register("Restricted Fock", matrix_builder::RestrictedFock);
    registry.register("Density matrix builder", matrix_builder::DensityBuilder);
    registry.register("Electronic energy", matrix_builder::RestrictedEnergy);
    registry.register("Core guess", guess::CoreGuess);
    registry.register("SCF loop", scf::ScfLoop);
    registry.register("SCF Driver", driver::ScfDriver);
    set_defaults(registry)
}

/// Default submodule bindings.
pub fn set_defaults(registry: &mut ModuleRegistry) -> Result<()> {
    const BINDINGS: [(&str, &str, &str); 17] = [
        ("Core Hamiltonian", "Kinetic", "Kinetic"),
        ("Core Hamiltonian", "Nuclear attraction", "Nuclear attraction"),
        ("AO integral driver", "Overlap", "Overlap"),
        ("AO integral driver", "Core Hamiltonian", "Core Hamiltonian"),
        ("AO integral driver", "Electron repulsion", "ERI4"),
        ("AO integral driver", "Charge-charge", "Coulomb's law"),
        ("Core guess", "Diagonalizer", "Generalized eigensolve"),
        ("Core guess", "Density matrix", "Density matrix builder"),
        ("Restricted Fock", "J builder", "Four center J"),
        ("Restricted Fock", "K builder", "Four center K"),
        ("SCF loop", "Fock builder", "Restricted Fock"),
        ("SCF loop", "Diagonalizer", "Generalized eigensolve"),
        ("SCF loop", "Density matrix", "Density matrix builder"),
        ("SCF loop", "Electronic energy", "Electronic energy"),
        ("SCF Driver", "Hamiltonian", "AO integral driver"),
        ("SCF Driver", "Guess", "Core guess"),
        ("SCF Driver", "Optimizer", "SCF loop"),
    ];
    for (module, slot, target) in BINDINGS {
        registry.bind_submodule(module, slot, target)?;
    }
    Ok(())
}
