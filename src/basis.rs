// basis.rs
use std::f64::consts::PI;
use std::sync::Arc;

use tracing::debug;

use crate::contract::PropertyType;
use crate::error::{Error, Result};
use crate::module::{Inputs, Module, ModuleSpec, Submodules};
use crate::molecule::Molecule;
use crate::property_types::MolecularBasisSet;
use crate::value::Value;

/// Primitive Gaussian exp(-a r^2). The coefficient already carries the primitive normalization
/// and the contraction renormalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub exponent: f64,
    pub coefficient: f64,
}

/// Contracted Cartesian Gaussian x^l y^m z^n \sum_i c_i exp(-a_i r^2) centred on `center`.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisFunction {
    pub center: [f64; 3],
    pub lmn: [u32; 3],
    pub primitives: Vec<Primitive>,
    /// Index of the atom the function sits on.
    pub atom: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasisSet {
    pub name: String,
    pub functions: Vec<BasisFunction>,
}

impl BasisSet {
    /// Number of atomic orbitals.
    pub fn nao(&self) -> usize {
        self.functions.len()
    }

    /// AO indices belonging to each atom of a molecule with `natoms` atoms.
    pub fn atom_aos(&self, natoms: usize) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); natoms];
        for (i, f) in self.functions.iter().enumerate() {
            if let Some(v) = out.get_mut(f.atom) {
                v.push(i);
            }
        }
        out
    }
}

/// Contraction of three primitives sharing one angular momentum.
struct Shell {
    l: u32,
    exponents: [f64; 3],
    coefficients: &'static [f64; 3],
}

const STO3G_1S: [f64; 3] = [0.15432897, 0.53532814, 0.44463454];
const STO3G_2S: [f64; 3] = [-0.09996723, 0.39951283, 0.70011547];
const STO3G_2P: [f64; 3] = [0.15591627, 0.60768372, 0.39195739];

/// STO-3G shells for nuclear charge `z`, in the order 1s, 2s, 2p.
fn sto3g_shells(z: u32) -> Option<Vec<Shell>> {
    let first = |exponents| Shell { l: 0, exponents, coefficients: &STO3G_1S };
    let second = |exponents: [f64; 3]| {
        [Shell { l: 0, exponents, coefficients: &STO3G_2S }, Shell { l: 1, exponents, coefficients: &STO3G_2P }]
    };
    let (core, valence) = match z {
        1 => return Some(vec![first([3.42525091, 0.62391373, 0.16885540])]),
        2 => return Some(vec![first([6.36242139, 1.15892300, 0.31364979])]),
        6 => ([71.6168370, 13.0450960, 3.5305122], [2.9412494, 0.6834831, 0.2222899]),
        7 => ([99.1061690, 18.0523120, 4.8856602], [3.7804559, 0.8784966, 0.2857144]),
        8 => ([130.7093200, 23.8088610, 6.4436083], [5.0331513, 1.1695961, 0.3803890]),
        9 => ([166.6791300, 30.3608120, 8.2168207], [6.4648032, 1.5022812, 0.4885885]),
        _ => return None,
    };
    let [s, p] = second(valence);
    Some(vec![first(core), s, p])
}

fn double_factorial(n: i32) -> f64 {
    let mut r = 1.0;
    let mut k = n;
    while k > 1 {
        r *= k as f64;
        k -= 2;
    }
    r
}

/// Normalization constant of a primitive Cartesian Gaussian.
/// # Arguments
///     `a`: f64, exponent.
///     `lmn`: [u32; 3], Cartesian powers.
pub fn primitive_norm(a: f64, lmn: [u32; 3]) -> f64 {
    let l: u32 = lmn.iter().sum();
    let df: f64 = lmn.iter().map(|&k| double_factorial(2 * k as i32 - 1)).product();
    (2.0 / PI).powf(0.75) * 2f64.powi(l as i32) * a.powf((2 * l + 3) as f64 / 4.0) / df.sqrt()
}

/// Cartesian components of angular momentum `l`, x fastest to z.
fn cartesians(l: u32) -> Vec<[u32; 3]> {
    let mut out = Vec::new();
    for i in (0..=l).rev() {
        for j in (0..=l - i).rev() {
            out.push([i, j, l - i - j]);
        }
    }
    out
}

/// Contract a shell component and renormalize so the contracted function has unit self overlap.
fn contract(shell: &Shell, lmn: [u32; 3]) -> Vec<Primitive> {
    let l = shell.l as f64;
    // Overlap of two normalized primitives with equal centre and powers: (2 sqrt(ab) / (a + b))^{l + 3/2}.
    let mut norm = 0.0;
    for (a, ca) in shell.exponents.iter().zip(shell.coefficients) {
        for (b, cb) in shell.exponents.iter().zip(shell.coefficients) {
            norm += ca * cb * (2.0 * (a * b).sqrt() / (a + b)).powf(l + 1.5);
        }
    }
    shell
        .exponents
        .iter()
        .zip(shell.coefficients)
        .map(|(&a, &c)| Primitive { exponent: a, coefficient: c * primitive_norm(a, lmn) / norm.sqrt() })
        .collect()
}

/// Build the STO-3G basis for a molecule. Functions are ordered by atom, then 1s, 2s, 2px, 2py, 2pz.
pub fn sto3g(mol: &Molecule) -> Result<BasisSet> {
    let mut functions = Vec::new();
    for (iatom, atom) in mol.atoms.iter().enumerate() {
        let shells =
            sto3g_shells(atom.z).ok_or_else(|| Error::MissingBasis { basis: "STO-3G".to_string(), z: atom.z })?;
        for shell in &shells {
            for lmn in cartesians(shell.l) {
                let primitives = contract(shell, lmn);
                functions.push(BasisFunction { center: atom.position, lmn, primitives, atom: iatom });
            }
        }
    }
    Ok(BasisSet { name: "STO-3G".to_string(), functions })
}

pub struct Sto3g;

impl Module for Sto3g {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("STO-3G minimal basis for H, He and C to F").satisfies::<MolecularBasisSet>()
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (mol,) = inputs.unwrap::<MolecularBasisSet>()?;
        let basis = sto3g(&mol)?;
        debug!(nao = basis.nao(), "built STO-3G basis");
        Ok(MolecularBasisSet::wrap_results((Arc::new(basis),)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::Atom;
    use approx::assert_abs_diff_eq;

    #[test]
    fn water_has_seven_functions_in_shell_order() {
        let basis = sto3g(&Molecule::water()).unwrap();
        assert_eq!(basis.nao(), 7);
        let lmns: Vec<[u32; 3]> = basis.functions.iter().map(|f| f.lmn).collect();
        assert_eq!(lmns, vec![[0, 0, 0], [0, 0, 0], [1, 0, 0], [0, 1, 0], [0, 0, 1], [0, 0, 0], [0, 0, 0]]);
        assert_eq!(basis.atom_aos(3), vec![vec![0, 1, 2, 3, 4], vec![5], vec![6]]);
    }

    #[test]
    fn s_primitive_norm() {
        assert_abs_diff_eq!(primitive_norm(1.0, [0, 0, 0]), (2.0 / PI).powf(0.75), epsilon = 1e-14);
    }

    #[test]
    fn unsupported_element() {
        let mol = Molecule::new(vec![Atom { z: 10, position: [0.0; 3] }]);
        assert!(matches!(sto3g(&mol), Err(Error::MissingBasis { z: 10, .. })));
    }
}
