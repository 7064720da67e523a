// molecule.rs
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contract::PropertyType;
use crate::error::{Error, Result};
use crate::module::{Inputs, Module, ModuleSpec, Submodules};
use crate::property_types::MoleculeFromString;
use crate::value::Value;

const SYMBOLS: [&str; 10] = ["H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne"];

/// Nucleus with charge `z` at `position` (bohr).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub z: u32,
    pub position: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub charge: i32,
    pub multiplicity: u32,
}

/// Atomic number of an element symbol, case insensitive.
pub fn atomic_number(symbol: &str) -> Option<u32> {
    SYMBOLS.iter().position(|s| s.eq_ignore_ascii_case(symbol)).map(|i| i as u32 + 1)
}

/// Element symbol of atomic number `z`, `X` when unknown.
pub fn symbol(z: u32) -> &'static str {
    SYMBOLS.get((z as usize).wrapping_sub(1)).copied().unwrap_or("X")
}

impl Molecule {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms, charge: 0, multiplicity: 1 }
    }

    /// Water at the experimental geometry.
    pub fn water() -> Self {
        Self::new(vec![
            Atom { z: 8, position: [0.0, -0.143225816552, 0.0] },
            Atom { z: 1, position: [1.638036840407, 1.136548822547, 0.0] },
            Atom { z: 1, position: [-1.638036840407, 1.136548822547, 0.0] },
        ])
    }

    pub fn h2() -> Self {
        Self::new(vec![Atom { z: 1, position: [0.0, 0.0, 0.0] }, Atom { z: 1, position: [0.0, 0.0, 1.3984] }])
    }

    /// Parse a molecule name (`water`, `h2o`, `h2`, `he`, `hf`) or a list of `Sym x y z` lines in
    /// bohr. Lines are separated by newlines or `;` and may include `charge=` and `multiplicity=`.
    /// # Arguments
    ///     `specifier`: &str, molecule name or geometry block.
    pub fn from_specifier(specifier: &str) -> Result<Self> {
        match specifier.trim().to_ascii_lowercase().as_str() {
            "water" | "h2o" => return Ok(Self::water()),
            "h2" => return Ok(Self::h2()),
            "he" => return Ok(Self::new(vec![Atom { z: 2, position: [0.0; 3] }])),
            "hf" => {
                return Ok(Self::new(vec![
                    Atom { z: 1, position: [0.0, 0.0, 0.0] },
                    Atom { z: 9, position: [0.0, 0.0, 1.7328795] },
                ]))
            }
            _ => {}
        }

        let mut mol = Self::new(Vec::new());
        for line in specifier.split(|c| c == '\n' || c == ';').map(str::trim).filter(|l| !l.is_empty()) {
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim();
                match key.trim().to_ascii_lowercase().as_str() {
                    "charge" => {
                        mol.charge = value.parse().map_err(|_| Error::InvalidInput(format!("bad charge '{value}'")))?
                    }
                    "multiplicity" => {
                        mol.multiplicity = value
                            .parse()
                            .map_err(|_| Error::InvalidInput(format!("bad multiplicity '{value}'")))?
                    }
                    other => return Err(Error::InvalidInput(format!("unknown molecule keyword '{other}'"))),
                }
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 4 {
                return Err(Error::InvalidInput(format!("expected 'Sym x y z', got '{line}'")));
            }
            let z = atomic_number(fields[0])
                .ok_or_else(|| Error::InvalidInput(format!("unknown element '{}'", fields[0])))?;
            let mut position = [0.0; 3];
            for (x, f) in position.iter_mut().zip(&fields[1..]) {
                *x = f.parse().map_err(|_| Error::InvalidInput(format!("bad coordinate '{f}'")))?;
            }
            mol.atoms.push(Atom { z, position });
        }
        if mol.atoms.is_empty() {
            return Err(Error::InvalidInput(format!(
                "'{}' is neither a known molecule nor a geometry",
                specifier.trim()
            )));
        }
        if mol.multiplicity == 0 {
            return Err(Error::InvalidInput("multiplicity must be at least 1".to_string()));
        }
        Ok(mol)
    }

    /// Element counts in order of first appearance, e.g. `OH2` for water.
    pub fn formula(&self) -> String {
        let mut counts: Vec<(u32, usize)> = Vec::new();
        for a in &self.atoms {
            match counts.iter_mut().find(|(z, _)| *z == a.z) {
                Some((_, n)) => *n += 1,
                None => counts.push((a.z, 1)),
            }
        }
        counts
            .into_iter()
            .map(|(z, n)| if n == 1 { symbol(z).to_string() } else { format!("{}{n}", symbol(z)) })
            .collect()
    }

    /// Classical repulsion energy of the nuclei, \sum_{A<B} Z_A Z_B / R_{AB}.
    pub fn nuclear_repulsion(&self) -> f64 {
        let mut e = 0.0;
        for (i, a) in self.atoms.iter().enumerate() {
            for b in &self.atoms[..i] {
                let r2: f64 = a.position.iter().zip(&b.position).map(|(x, y)| (x - y).powi(2)).sum();
                e += (a.z * b.z) as f64 / r2.sqrt();
            }
        }
        e
    }

    pub fn n_electrons(&self) -> Result<usize> {
        let nuclear: i64 = self.atoms.iter().map(|a| a.z as i64).sum();
        usize::try_from(nuclear - self.charge as i64)
            .map_err(|_| Error::InvalidInput(format!("charge {} leaves a negative electron count", self.charge)))
    }

    /// Number of spin alpha and spin beta electrons.
    pub fn nelec(&self) -> Result<[usize; 2]> {
        let n = self.n_electrons()?;
        let unpaired = self.multiplicity.saturating_sub(1) as usize;
        if unpaired > n || (n - unpaired) % 2 != 0 {
            return Err(Error::InvalidInput(format!("{n} electrons cannot have multiplicity {}", self.multiplicity)));
        }
        Ok([(n + unpaired) / 2, (n - unpaired) / 2])
    }
}

/// Molecules by name or inline geometry.
pub struct MoleculeDatabase;

impl Module for MoleculeDatabase {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Builds a molecule from a name or 'Sym x y z' lines in bohr").satisfies::<MoleculeFromString>()
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (specifier,) = inputs.unwrap::<MoleculeFromString>()?;
        let mol = Molecule::from_specifier(&specifier)?;
        debug!(formula = %mol.formula(), charge = mol.charge, "built molecule");
        Ok(MoleculeFromString::wrap_results((Arc::new(mol),)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn named_molecules() {
        let w = Molecule::from_specifier("Water").unwrap();
        assert_eq!(w.atoms.len(), 3);
        assert_eq!(w.nelec().unwrap(), [5, 5]);
        assert_eq!(w.formula(), "OH2");
        assert_eq!(symbol(9), "F");
        assert_eq!(symbol(42), "X");
        assert_abs_diff_eq!(w.nuclear_repulsion(), 8.00236706181045, epsilon = 1e-10);
        assert_abs_diff_eq!(Molecule::h2().nuclear_repulsion(), 1.0 / 1.3984, epsilon = 1e-12);
    }

    #[test]
    fn geometry_lines() {
        let m = Molecule::from_specifier("He 0 0 0; H 0 0 1.46\ncharge=1").unwrap();
        assert_eq!(m.atoms[0].z, 2);
        assert_eq!(m.atoms[1].position, [0.0, 0.0, 1.46]);
        assert_eq!(m.n_electrons().unwrap(), 2);

        assert_eq!(m.formula(), "HeH");

        let radical = Molecule::from_specifier("H 0 0 0\nmultiplicity=2").unwrap();
        assert_eq!(radical.nelec().unwrap(), [1, 0]);
    }

    #[test]
    fn bad_specifiers() {
        assert!(matches!(Molecule::from_specifier("benzene"), Err(Error::InvalidInput(_))));
        assert!(matches!(Molecule::from_specifier("Xx 0 0 0"), Err(Error::InvalidInput(_))));
        assert!(matches!(Molecule::from_specifier("H 0 0"), Err(Error::InvalidInput(_))));
        let odd = Molecule::from_specifier("H 0 0 0").unwrap();
        assert!(matches!(odd.nelec(), Err(Error::InvalidInput(_))));
    }
}
