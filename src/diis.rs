// diis.rs
use std::collections::VecDeque;

use ndarray::{Array1, Array2, s};
use ndarray_linalg::Solve;

use crate::maths::{commutator, frobenius_norm};

/// Pulay DIIS storage for one SCF run. Keeps the raw Fock and error matrices of the most recent
/// `m` iterations.
pub struct Diis {
    m: usize, // Size of the DIIS subspace, number of past SCF iterations with stored history.
    f_hist: VecDeque<Array2<f64>>, // History of Fock matrices.
    e_hist: VecDeque<Array2<f64>>, // History of error matrices.
}

impl Diis {
    /// Constructor for DIIS object, initialises object with DIIS space m.
    /// # Arguments:
    ///     `m`: usize, size of the DIIS space.
    pub fn new(m: usize) -> Self {
        Self {
            m,
            f_hist: VecDeque::with_capacity(m + 1),
            e_hist: VecDeque::with_capacity(m + 1),
        }
    }

    /// Add the Fock matrix of the current density and its error FDS - SDF to the history.
    /// # Arguments:
    ///     `f`: Array2, Fock matrix.
    ///     `d`: Array2, density matrix.
    ///     `s`: Array2, AO overlap matrix.
    pub fn push(&mut self, f: &Array2<f64>, d: &Array2<f64>, s: &Array2<f64>) {
        self.push_error(f.clone(), commutator(f, d, s));
    }

    /// Add a Fock matrix with a precomputed error matrix, dropping the oldest entry once the
    /// subspace is full.
    pub fn push_error(&mut self, f: Array2<f64>, e: Array2<f64>) {
        self.f_hist.push_back(f);
        self.e_hist.push_back(e);
        while self.f_hist.len() > self.m {
            self.f_hist.pop_front();
            self.e_hist.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.f_hist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.f_hist.is_empty()
    }

    /// Frobenius norm of the most recent error matrix.
    pub fn last_error_norm(&self) -> Option<f64> {
        self.e_hist.back().map(frobenius_norm)
    }

    /// Use past Fock matrices and solutions to augmented linear system to extrapolate.
    /// Calculates the extrapolated DIIS Fock matrix F_{DIIS} = \sum_i^m c_i F_i.
    /// Returns None with fewer than two entries or when the system is singular.
    pub fn extrapolate_fock(&self) -> Option<Array2<f64>> {
        let m = self.e_hist.len();
        // With less than 2 cycles of history we cannot extrapolate to DIIS Fock.
        if m < 2 {
            return None;
        }

        // Construct augmented matrix.
        //  B_{ij} = \sum_{pq}(E_i)_{pq}(E_j)_{pq} with additional row/column of 1s.
        //  aug[(m + 1, m + 1)] = 0.
        let mut aug = Array2::<f64>::zeros((m + 1, m + 1));
        for i in 0..m {
            for j in 0..=i {
                let bij = (&self.e_hist[i] * &self.e_hist[j]).sum();
                aug[(i, j)] = bij;
                aug[(j, i)] = bij;
            }
            aug[(i, m)] = 1.0;
            aug[(m, i)] = 1.0;
        }

        // Form RHS vector [\mathbf{0} 1]^T and solve for [\mathbf{c} \lambda]^T.
        let mut rhs = Array1::<f64>::zeros(m + 1);
        rhs[m] = 1.0;
        let sol = aug.solve_into(rhs).ok()?;
        let c = sol.slice(s![0..m]).to_owned();
        if !c.iter().all(|x| x.is_finite()) {
            return None;
        }

        // F_{DIIS} = \sum_i^m c_i F_i
        let mut f_diis = Array2::<f64>::zeros(self.f_hist[0].raw_dim());
        for (ci, fi) in c.iter().zip(&self.f_hist) {
            f_diis.scaled_add(*ci, fi);
        }
        Some(f_diis)
    }
}
