// scf.rs
use std::sync::Arc;

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::contract::PropertyType;
use crate::diis::Diis;
use crate::error::{Error, Result};
use crate::maths::{commutator, frobenius_norm, max_abs_diff};
use crate::module::{Inputs, Module, ModuleSpec, Submodules};
use crate::property_types::{DensityMatrix, ElectronicEnergy, FockMatrix, GeneralizedEigenSolve, Optimize};
use crate::tensor::TensorHandle;
use crate::utils::format_array2;
use crate::value::Value;
use crate::AoData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScfStatus {
    Initializing,
    Iterating,
    Converged,
    MaxIterationsExceeded,
    Failed,
}

/// Loop settings read from the module inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ScfOptions {
    pub max_iterations: usize,
    pub e_tol: f64,
    pub d_tol: f64,
    pub g_tol: f64,
    pub diis: bool,
    pub diis_space: usize,
}

impl Default for ScfOptions {
    fn default() -> Self {
        Self { max_iterations: 50, e_tol: 1e-6, d_tol: 1e-6, g_tol: 1e-6, diis: false, diis_space: 8 }
    }
}

impl ScfOptions {
    pub fn from_inputs(inputs: &Inputs<'_>) -> Result<Self> {
        let opts = Self {
            max_iterations: inputs.get("max iterations")?,
            e_tol: inputs.get("energy tolerance")?,
            d_tol: inputs.get("density tolerance")?,
            g_tol: inputs.get("gradient tolerance")?,
            diis: inputs.get("DIIS")?,
            diis_space: inputs.get("DIIS space")?,
        };
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        if self.diis && self.diis_space < 2 {
            return Err(Error::InvalidInput(format!("DIIS space must be at least 2, got {}", self.diis_space)));
        }
        for (name, tol) in [("energy", self.e_tol), ("density", self.d_tol), ("gradient", self.g_tol)] {
            if tol.is_nan() || tol <= 0.0 {
                return Err(Error::InvalidInput(format!("{name} tolerance must be positive, got {tol}")));
            }
        }
        Ok(())
    }
}

/// Convergence measures of one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceMetrics {
    pub iteration: usize,
    /// Total energy including nuclear repulsion.
    pub energy: f64,
    pub d_e: f64,
    pub d_d: f64,
    /// ||FDS - SDF||_F.
    pub gradient: f64,
}

impl ConvergenceMetrics {
    pub fn converged(&self, opts: &ScfOptions) -> bool {
        self.d_e < opts.e_tol && self.d_d < opts.d_tol && self.gradient < opts.g_tol
    }
}

/// Working state of one SCF run.
pub struct SCFState {
    pub status: ScfStatus,
    pub iteration: usize,
    pub density: TensorHandle,
    pub fock: Option<TensorHandle>,
    /// Electronic energy of `density`.
    pub energy: f64,
    pub history: Vec<ConvergenceMetrics>,
    diis: Option<Diis>,
}

/// Copy `t` out as an `nao` x `nao` matrix.
fn ao_square(t: &TensorHandle, nao: usize) -> Result<Array2<f64>> {
    let m = t.as_matrix()?;
    if m.dim() != (nao, nao) {
        return Err(Error::shape(format!("a {nao}x{nao} matrix"), t.shape()));
    }
    Ok(m.to_owned())
}

impl SCFState {
    /// # Arguments
    ///     `opts`: ScfOptions, loop settings.
    ///     `density`: TensorHandle, starting density.
    pub fn new(opts: &ScfOptions, density: TensorHandle) -> Self {
        Self {
            status: ScfStatus::Initializing,
            iteration: 0,
            density,
            fock: None,
            energy: f64::INFINITY,
            history: Vec::new(),
            diis: opts.diis.then(|| Diis::new(opts.diis_space)),
        }
    }

    /// Iterate to self consistency. On return `status` is `Converged`, `MaxIterationsExceeded`
    /// or `Failed`.
    /// # Arguments
    ///     `ao`: AoData, AO integrals and electron counts.
    ///     `opts`: ScfOptions, loop settings.
    ///     `submods`: Submodules, must provide the `Fock builder`, `Diagonalizer`,
    ///     `Density matrix` and `Electronic energy` slots.
    pub fn run(&mut self, ao: &Arc<AoData>, opts: &ScfOptions, submods: &Submodules) -> Result<()> {
        match self.iterate(ao, opts, submods) {
            Ok(()) => {
                self.status = ScfStatus::Converged;
                Ok(())
            }
            Err(e @ Error::MaxIterationsExceeded { .. }) => {
                self.status = ScfStatus::MaxIterationsExceeded;
                Err(e)
            }
            Err(e) => {
                self.status = ScfStatus::Failed;
                Err(e)
            }
        }
    }

    fn iterate(&mut self, ao: &Arc<AoData>, opts: &ScfOptions, submods: &Submodules) -> Result<()> {
        let nao = ao.nao;
        let nocc = ao.n_occupied()?;
        let s = TensorHandle::from(ao.s.clone());
        let mut d_cur = ao_square(&self.density, nao)?;

        // F(D_0) and E(D_0).
        let (f0,) = submods.run_as::<FockMatrix>("Fock builder", (Arc::clone(ao), self.density.clone()))?;
        let (e0,) = submods
            .run_as::<ElectronicEnergy>("Electronic energy", (Arc::clone(ao), self.density.clone(), f0.clone()))?;
        let mut f_cur = ao_square(&f0, nao)?;
        self.fock = Some(f0);
        self.energy = e0;
        self.status = ScfStatus::Iterating;

        info!("{:>4} {:>20} {:>12} {:>12} {:>12}", "iter", "E", "dE", "max|dD|", "‖FDS - SDF‖");
        while self.iteration < opts.max_iterations {
            self.iteration += 1;

            // Extrapolate Fock matrix to be diagonalised this iteration.
            let f_use = match self.diis.as_mut() {
                Some(diis) => {
                    diis.push(&f_cur, &d_cur, &ao.s);
                    if diis.len() < 2 {
                        TensorHandle::from(f_cur.clone())
                    } else if let Some(f) = diis.extrapolate_fock() {
                        TensorHandle::from(f)
                    } else {
                        warn!(iteration = self.iteration, "DIIS system is singular, using the current Fock matrix");
                        TensorHandle::from(f_cur.clone())
                    }
                }
                None => TensorHandle::from(f_cur.clone()),
            };

            // Solve GEVP FC = SCe.
            let (_eps, c) = submods.run_as::<GeneralizedEigenSolve>("Diagonalizer", (f_use, s.clone()))?;
            // Form new density, Fock matrix, and energy.
            let (d_new,) = submods.run_as::<DensityMatrix>("Density matrix", (c, nocc))?;
            let (f_new,) = submods.run_as::<FockMatrix>("Fock builder", (Arc::clone(ao), d_new.clone()))?;
            let (e_new,) = submods
                .run_as::<ElectronicEnergy>("Electronic energy", (Arc::clone(ao), d_new.clone(), f_new.clone()))?;

            let d_mat = ao_square(&d_new, nao)?;
            let f_mat = ao_square(&f_new, nao)?;
            let metrics = ConvergenceMetrics {
                iteration: self.iteration,
                energy: e_new + ao.enuc,
                d_e: (e_new - self.energy).abs(),
                d_d: max_abs_diff(&d_mat, &d_cur),
                gradient: frobenius_norm(&commutator(&f_mat, &d_mat, &ao.s)),
            };
            info!(
                "{:4} {:20.12} {:12.4e} {:12.4e} {:12.4e}",
                metrics.iteration, metrics.energy, metrics.d_e, metrics.d_d, metrics.gradient
            );
            self.history.push(metrics);

            self.density = d_new;
            self.fock = Some(f_new);
            self.energy = e_new;
            d_cur = d_mat;
            f_cur = f_mat;

            if metrics.converged(opts) {
                debug!("Converged density:\n{}", format_array2(&d_cur));
                return Ok(());
            }
        }

        let gradient = self.history.last().map_or(f64::INFINITY, |m| m.gradient);
        Err(Error::MaxIterationsExceeded { iterations: self.iteration, energy: self.energy + ao.enuc, gradient })
    }
}

/// Restricted SCF iterations with optional DIIS acceleration.
pub struct ScfLoop;

impl Module for ScfLoop {
    fn spec(&self) -> ModuleSpec {
        let defaults = ScfOptions::default();
        ModuleSpec::new("Restricted SCF iterations with optional DIIS")
            .satisfies::<Optimize>()
            .input("max iterations", defaults.max_iterations, "Iterations before giving up")
            .input("energy tolerance", defaults.e_tol, "Convergence threshold on |dE|")
            .input("density tolerance", defaults.d_tol, "Convergence threshold on max |dD|")
            .input("gradient tolerance", defaults.g_tol, "Convergence threshold on ||FDS - SDF||")
            .input("DIIS", defaults.diis, "Accelerate with Pulay DIIS")
            .input("DIIS space", defaults.diis_space, "Number of Fock matrices kept for DIIS")
            .submodule::<FockMatrix>("Fock builder")
            .submodule::<GeneralizedEigenSolve>("Diagonalizer")
            .submodule::<DensityMatrix>("Density matrix")
            .submodule::<ElectronicEnergy>("Electronic energy")
    }

    fn run(&self, inputs: &Inputs<'_>, submods: &Submodules) -> Result<Vec<Value>> {
        let (ao, density) = inputs.unwrap::<Optimize>()?;
        let opts = ScfOptions::from_inputs(inputs)?;
        let mut state = SCFState::new(&opts, density);
        state.run(&ao, &opts, submods)?;
        info!(iterations = state.iteration, energy = state.energy + ao.enuc, "SCF converged");
        Ok(Optimize::wrap_results((state.energy + ao.enuc, state.density)))
    }
}
