// matrix_builder.rs
use std::sync::Arc;

use ndarray::{s, Array2, Array4, ArrayView2, Axis};
use rayon::prelude::*;

use crate::contract::PropertyType;
use crate::error::{Error, Result};
use crate::maths::einsum_ba_ab_real;
use crate::module::{Inputs, Module, ModuleSpec, Submodules};
use crate::property_types::{CoulombMatrix, DensityMatrix, ElectronicEnergy, ExchangeMatrix, FockMatrix};
use crate::tensor::TensorHandle;
use crate::value::Value;

/// View `t` as an `nao` x `nao` matrix.
fn ao_matrix(t: &TensorHandle, nao: usize) -> Result<ArrayView2<'_, f64>> {
    let m = t.as_matrix()?;
    if m.dim() != (nao, nao) {
        return Err(Error::shape(format!("a {nao}x{nao} matrix"), t.shape()));
    }
    Ok(m)
}

/// Fill an `n` x `n` matrix row by row in parallel.
fn par_matrix<F>(n: usize, elem: F) -> Array2<f64>
where
    F: Fn(usize, usize) -> f64 + Sync,
{
    let rows: Vec<Vec<f64>> = (0..n).into_par_iter().map(|p| (0..n).map(|q| elem(p, q)).collect()).collect();

    let mut m = Array2::<f64>::zeros((n, n));
    for (mut mrow, row) in m.axis_iter_mut(Axis(0)).zip(rows) {
        for (x, v) in mrow.iter_mut().zip(row) {
            *x = v;
        }
    }
    m
}

/// Coulomb matrix J_{pq} = \sum_{rs} (pq|rs) D_{rs}.
/// # Arguments
///     `eri`: Array4, two electron integrals (pq|rs) in chemist's notation.
///     `d`: Array2, density matrix of one spin.
pub fn coulomb_matrix(eri: &Array4<f64>, d: &ArrayView2<f64>) -> Array2<f64> {
    par_matrix(d.nrows(), |p, q| (&eri.slice(s![p, q, .., ..]) * d).sum())
}

/// Exchange matrix K_{pq} = \sum_{rs} (pr|qs) D_{rs}.
/// # Arguments
///     `eri`: Array4, two electron integrals (pq|rs) in chemist's notation.
///     `d`: Array2, density matrix of one spin.
pub fn exchange_matrix(eri: &Array4<f64>, d: &ArrayView2<f64>) -> Array2<f64> {
    par_matrix(d.nrows(), |p, q| (&eri.slice(s![p, .., q, ..]) * d).sum())
}

/// Build the closed shell Fock matrix F = H + 2J - K for density D = C_occ C_occ^T.
/// # Arguments
///     `h`: Array2, one electron Hamiltonian.
///     `eri`: Array4, two electron integrals (pq|rs) in chemist's notation.
///     `d`: Array2, density matrix of one spin.
pub fn restricted_fock(h: &Array2<f64>, eri: &Array4<f64>, d: &ArrayView2<f64>) -> Array2<f64> {
    h + &(2.0 * coulomb_matrix(eri, d)) - exchange_matrix(eri, d)
}

/// Closed shell electronic energy E = \sum_{pq} D_{pq} (H_{pq} + F_{pq}).
pub fn restricted_energy(d: &Array2<f64>, h: &Array2<f64>, f: &Array2<f64>) -> f64 {
    einsum_ba_ab_real(d, &(h + f))
}

/// J from the full four index ERI tensor.
pub struct FourCenterJ;

impl Module for FourCenterJ {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Four center Coulomb matrix").satisfies::<CoulombMatrix>()
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (ao, density) = inputs.unwrap::<CoulombMatrix>()?;
        let d = ao_matrix(&density, ao.nao)?;
        Ok(CoulombMatrix::wrap_results((coulomb_matrix(&ao.eri, &d).into(),)))
    }
}

/// K from the full four index ERI tensor.
pub struct FourCenterK;

impl Module for FourCenterK {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Four center exchange matrix").satisfies::<ExchangeMatrix>()
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (ao, density) = inputs.unwrap::<ExchangeMatrix>()?;
        let d = ao_matrix(&density, ao.nao)?;
        Ok(ExchangeMatrix::wrap_results((exchange_matrix(&ao.eri, &d).into(),)))
    }
}

/// F = H + 2J - K with J and K taken from the `J builder` and `K builder` slots.
pub struct RestrictedFock;

impl Module for RestrictedFock {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Closed shell Fock matrix H + 2J - K")
            .satisfies::<FockMatrix>()
            .submodule::<CoulombMatrix>("J builder")
            .submodule::<ExchangeMatrix>("K builder")
    }

    fn run(&self, inputs: &Inputs<'_>, submods: &Submodules) -> Result<Vec<Value>> {
        let (ao, density) = inputs.unwrap::<FockMatrix>()?;
        ao_matrix(&density, ao.nao)?;
        let (j,) = submods.run_as::<CoulombMatrix>("J builder", (Arc::clone(&ao), density.clone()))?;
        let (k,) = submods.run_as::<ExchangeMatrix>("K builder", (Arc::clone(&ao), density))?;
        let j = ao_matrix(&j, ao.nao)?;
        let k = ao_matrix(&k, ao.nao)?;
        let f = &ao.h + &(2.0 * &j) - &k;
        Ok(FockMatrix::wrap_results((f.into(),)))
    }
}

/// D = C_occ C_occ^T from the first `n_occupied` columns.
pub struct DensityBuilder;

impl Module for DensityBuilder {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Density matrix from the lowest occupied orbitals").satisfies::<DensityMatrix>()
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (coefficients, nocc) = inputs.unwrap::<DensityMatrix>()?;
        let c = coefficients.as_matrix()?;
        if nocc > c.ncols() {
            return Err(Error::InvalidInput(format!("{nocc} occupied orbitals requested from {} columns", c.ncols())));
        }
        let c_occ = c.slice(s![.., ..nocc]);
        let d = c_occ.dot(&c_occ.t());
        Ok(DensityMatrix::wrap_results((d.into(),)))
    }
}

pub struct RestrictedEnergy;

impl Module for RestrictedEnergy {
    fn spec(&self) -> ModuleSpec {
        ModuleSpec::new("Closed shell electronic energy").satisfies::<ElectronicEnergy>()
    }

    fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
        let (ao, density, fock) = inputs.unwrap::<ElectronicEnergy>()?;
        let d = ao_matrix(&density, ao.nao)?.to_owned();
        let f = ao_matrix(&fock, ao.nao)?.to_owned();
        Ok(ElectronicEnergy::wrap_results((restricted_energy(&d, &ao.h, &f),)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModuleRegistry;
    use crate::AoData;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    /// One orbital, (00|00) = g.
    fn toy_ao(h: f64, g: f64) -> Arc<AoData> {
        Arc::new(AoData {
            s: Array2::eye(1),
            h: array![[h]],
            eri: Array4::from_elem((1, 1, 1, 1), g),
            enuc: 0.0,
            nao: 1,
            nelec: [1, 1],
        })
    }

    /// Hartree-like exchange: K = 0.
    struct NoExchange;

    impl Module for NoExchange {
        fn spec(&self) -> ModuleSpec {
            ModuleSpec::new("Zero exchange").satisfies::<ExchangeMatrix>()
        }

        fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
            let (ao, _) = inputs.unwrap::<ExchangeMatrix>()?;
            Ok(ExchangeMatrix::wrap_results((Array2::<f64>::zeros((ao.nao, ao.nao)).into(),)))
        }
    }

    fn fock_registry() -> ModuleRegistry {
        let mut reg = ModuleRegistry::new();
        reg.register("Restricted Fock", RestrictedFock);
        reg.register("Four center J", FourCenterJ);
        reg.register("Four center K", FourCenterK);
        reg.register("Electronic energy", RestrictedEnergy);
        reg.bind_submodule("Restricted Fock", "J builder", "Four center J").unwrap();
        reg.bind_submodule("Restricted Fock", "K builder", "Four center K").unwrap();
        reg
    }

    #[test]
    fn fock_and_energy_of_one_orbital() {
        let reg = fock_registry();
        let ao = toy_ao(-1.0, 0.5);
        let d = TensorHandle::from(array![[1.0]]);
        // F = h + 2g - g.
        let (f,) = reg.run::<FockMatrix>("Restricted Fock", (Arc::clone(&ao), d.clone())).unwrap();
        assert_abs_diff_eq!(f.to_matrix().unwrap()[(0, 0)], -0.5, epsilon = 1e-15);
        // E = 2h + g.
        let (e,) = reg.run::<ElectronicEnergy>("Electronic energy", (ao, d, f)).unwrap();
        assert_abs_diff_eq!(e, -1.5, epsilon = 1e-15);
    }

    #[test]
    fn coulomb_and_exchange_of_two_orbitals() {
        let mut eri = Array4::<f64>::zeros((2, 2, 2, 2));
        eri[(0, 0, 1, 1)] = 0.3;
        eri[(1, 1, 0, 0)] = 0.3;
        eri[(0, 1, 0, 1)] = 0.1;
        eri[(1, 0, 1, 0)] = 0.1;
        let d = array![[0.0, 0.0], [0.0, 1.0]];
        let j = coulomb_matrix(&eri, &d.view());
        let k = exchange_matrix(&eri, &d.view());
        // J_00 = (00|11), K_00 = (01|01).
        assert_abs_diff_eq!(j[(0, 0)], 0.3, epsilon = 1e-15);
        assert_abs_diff_eq!(k[(0, 0)], 0.1, epsilon = 1e-15);
        assert_abs_diff_eq!(j[(1, 1)], 0.0, epsilon = 1e-15);

        let h = array![[-1.0, 0.0], [0.0, -0.5]];
        let f = restricted_fock(&h, &eri, &d.view());
        assert_abs_diff_eq!(f[(0, 0)], -1.0 + 0.6 - 0.1, epsilon = 1e-15);
    }

    #[test]
    fn exchange_builder_can_be_swapped() {
        let mut reg = fock_registry();
        reg.register("No exchange", NoExchange);
        reg.bind_submodule("Restricted Fock", "K builder", "No exchange").unwrap();
        let d = TensorHandle::from(array![[1.0]]);
        // F = h + 2g.
        let (f,) = reg.run::<FockMatrix>("Restricted Fock", (toy_ao(-1.0, 0.5), d)).unwrap();
        assert_abs_diff_eq!(f.to_matrix().unwrap()[(0, 0)], 0.0, epsilon = 1e-15);

        let e = reg.bind_submodule("Restricted Fock", "J builder", "No exchange").unwrap_err();
        assert!(matches!(e, Error::ContractMismatch { .. }));
    }

    #[test]
    fn fock_rejects_wrong_density_shape() {
        let reg = fock_registry();
        let d = TensorHandle::from(Array2::<f64>::eye(2));
        let e = reg.run::<FockMatrix>("Restricted Fock", (toy_ao(-1.0, 0.5), d)).unwrap_err();
        assert!(matches!(e, Error::Shape { .. }));
    }

    #[test]
    fn fock_needs_both_builders() {
        let mut reg = ModuleRegistry::new();
        reg.register("Restricted Fock", RestrictedFock);
        let d = TensorHandle::from(array![[1.0]]);
        let e = reg.run::<FockMatrix>("Restricted Fock", (toy_ao(-1.0, 0.5), d)).unwrap_err();
        assert!(matches!(e, Error::UnresolvedSlot { .. }));
    }

    #[test]
    fn density_from_occupied_columns() {
        let mut reg = ModuleRegistry::new();
        reg.register("Density matrix builder", DensityBuilder);
        let c = TensorHandle::from(array![[1.0, 2.0], [3.0, 4.0]]);
        let (d,) = reg.run::<DensityMatrix>("Density matrix builder", (c.clone(), 1)).unwrap();
        assert_eq!(d.to_matrix().unwrap(), array![[1.0, 3.0], [3.0, 9.0]]);
        let e = reg.run::<DensityMatrix>("Density matrix builder", (c, 3)).unwrap_err();
        assert!(matches!(e, Error::InvalidInput(_)));
    }
}
