// property_types.rs
use std::sync::Arc;

use crate::basis::BasisSet;
use crate::molecule::Molecule;
use crate::property_type;
use crate::tensor::TensorHandle;
use crate::AoData;

property_type! {
    /// Build a molecule from a textual specifier.
    pub struct MoleculeFromString = "MoleculeFromString" {
        inputs { specifier: String }
        outputs { molecule: Arc<Molecule> }
    }
}

property_type! {
    /// Attach atomic basis functions to every atom of a molecule.
    pub struct MolecularBasisSet = "MolecularBasisSet" {
        inputs { molecule: Arc<Molecule> }
        outputs { basis: Arc<BasisSet> }
    }
}

property_type! {
    /// AO overlap matrix S.
    pub struct OverlapMatrix = "OverlapMatrix" {
        inputs { basis: Arc<BasisSet> }
        outputs { s: TensorHandle }
    }
}

property_type! {
    /// AO kinetic energy matrix T.
    pub struct KineticMatrix = "KineticMatrix" {
        inputs { basis: Arc<BasisSet> }
        outputs { t: TensorHandle }
    }
}

property_type! {
    /// AO electron-nucleus attraction matrix V.
    pub struct NuclearAttractionMatrix = "NuclearAttractionMatrix" {
        inputs { basis: Arc<BasisSet>, molecule: Arc<Molecule> }
        outputs { v: TensorHandle }
    }
}

property_type! {
    /// One electron core Hamiltonian H = T + V.
    pub struct CoreHamiltonian = "CoreHamiltonian" {
        inputs { basis: Arc<BasisSet>, molecule: Arc<Molecule> }
        outputs { h: TensorHandle }
    }
}

property_type! {
    /// Four index electron repulsion integrals (pq|rs) in chemists' notation.
    pub struct ElectronRepulsion = "ElectronRepulsion" {
        inputs { basis: Arc<BasisSet> }
        outputs { eri: TensorHandle }
    }
}

property_type! {
    /// Point charge interaction energy of the nuclei.
    pub struct ChargeCharge = "ChargeCharge" {
        inputs { molecule: Arc<Molecule> }
        outputs { energy: f64 }
    }
}

property_type! {
    /// Everything the SCF needs from the AO basis.
    pub struct AoHamiltonian = "AoHamiltonian" {
        inputs { basis: Arc<BasisSet>, molecule: Arc<Molecule> }
        outputs { ao: Arc<AoData> }
    }
}

property_type! {
    /// Generalized symmetric-definite eigenproblem A v = lambda B v.
    pub struct GeneralizedEigenSolve = "GeneralizedEigenSolve" {
        inputs { a: TensorHandle, b: TensorHandle }
        outputs { values: TensorHandle, vectors: TensorHandle }
    }
}

property_type! {
    /// Density from the lowest `n_occupied` orbital coefficient columns.
    pub struct DensityMatrix = "DensityMatrix" {
        inputs { coefficients: TensorHandle, n_occupied: usize }
        outputs { density: TensorHandle }
    }
}

property_type! {
    /// Coulomb matrix J_{pq} = \sum_{rs} (pq|rs) D_{rs}.
    pub struct CoulombMatrix = "CoulombMatrix" {
        inputs { ao: Arc<AoData>, density: TensorHandle }
        outputs { j: TensorHandle }
    }
}

property_type! {
    /// Exchange matrix K_{pq} = \sum_{rs} (pr|qs) D_{rs}.
    pub struct ExchangeMatrix = "ExchangeMatrix" {
        inputs { ao: Arc<AoData>, density: TensorHandle }
        outputs { k: TensorHandle }
    }
}

property_type! {
    pub struct FockMatrix = "FockMatrix" {
        inputs { ao: Arc<AoData>, density: TensorHandle }
        outputs { fock: TensorHandle }
    }
}

property_type! {
    /// Electronic (no nuclear repulsion) energy of a density.
    pub struct ElectronicEnergy = "ElectronicEnergy" {
        inputs { ao: Arc<AoData>, density: TensorHandle, fock: TensorHandle }
        outputs { energy: f64 }
    }
}

property_type! {
    pub struct InitialGuess = "InitialGuess" {
        inputs { ao: Arc<AoData> }
        outputs { density: TensorHandle }
    }
}

property_type! {
    /// Iterate a density to self consistency. Returns total energy and the converged density.
    pub struct Optimize = "Optimize" {
        inputs { ao: Arc<AoData>, density: TensorHandle }
        outputs { energy: f64, density: TensorHandle }
    }
}

property_type! {
    pub struct TotalEnergy = "TotalEnergy" {
        inputs { basis: Arc<BasisSet>, molecule: Arc<Molecule> }
        outputs { energy: f64 }
    }
}
