// reference.rs
use std::fs;
use std::path::Path;
use std::sync::Arc;

use approx::assert_abs_diff_eq;
use serde::Deserialize;

use scf_rs::property_types::{ChargeCharge, MolecularBasisSet, MoleculeFromString, TotalEnergy};
use scf_rs::{load_modules, ModuleRegistry};

#[derive(Deserialize)]
struct ReferenceFile {
    version: u32,
    systems: Vec<ReferenceSystem>,
}

#[derive(Deserialize)]
struct ReferenceSystem {
    name: String,
    specifier: String,
    basis: String,
    diis: bool,
    energy_total: f64,
    energy_nuclear: f64,
    tolerance: f64,
}

fn load_references() -> ReferenceFile {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/reference.json");
    let text = fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    serde_json::from_str(&text).unwrap()
}

#[test]
fn reference_energies() {
    let refs = load_references();
    assert_eq!(refs.version, 1);
    assert!(!refs.systems.is_empty());

    for sys in &refs.systems {
        let mut reg = ModuleRegistry::new();
        load_modules(&mut reg).unwrap();
        reg.set_input("SCF loop", "DIIS", sys.diis).unwrap();

        let (mol,) = reg.run::<MoleculeFromString>("Molecule database", (sys.specifier.clone(),)).unwrap();
        let (enuc,) = reg.run::<ChargeCharge>("Coulomb's law", (Arc::clone(&mol),)).unwrap();
        assert_abs_diff_eq!(enuc, sys.energy_nuclear, epsilon = 1e-8);

        let (basis,) = reg.run::<MolecularBasisSet>(&sys.basis, (Arc::clone(&mol),)).unwrap();
        let (energy,) = reg
            .run::<TotalEnergy>("SCF Driver", (basis, mol))
            .unwrap_or_else(|e| panic!("{} failed: {e}", sys.name));
        println!("{}: E = {:.10} (reference {:.10})", sys.name, energy, sys.energy_total);
        assert_abs_diff_eq!(energy, sys.energy_total, epsilon = sys.tolerance);
    }
}
