// tensor.rs
use std::fmt;
use std::sync::Arc;

use ndarray::{Array, Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayView4, ArrayViewD, Dimension, Ix1, Ix2, Ix4};

use crate::error::{Error, Result};

/// Immutable dense tensor passed between modules. Cloning shares the underlying buffer.
#[derive(Clone, PartialEq)]
pub struct TensorHandle {
    data: Arc<ArrayD<f64>>,
}

impl TensorHandle {
    /// Wrap an owned array of any rank.
    /// # Arguments
    ///     `a`: Array, values to take ownership of.
    pub fn new<D: Dimension>(a: Array<f64, D>) -> Self {
        Self { data: Arc::new(a.into_dyn()) }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn view(&self) -> ArrayViewD<'_, f64> {
        self.data.view()
    }

    /// View a rank 1 tensor.
    pub fn as_vector(&self) -> Result<ArrayView1<'_, f64>> {
        self.data.view().into_dimensionality::<Ix1>().map_err(|_| Error::shape("a vector", self.shape()))
    }

    /// View a rank 2 tensor.
    pub fn as_matrix(&self) -> Result<ArrayView2<'_, f64>> {
        self.data.view().into_dimensionality::<Ix2>().map_err(|_| Error::shape("a matrix", self.shape()))
    }

    /// View a rank 2 tensor with equal row and column counts.
    pub fn as_square_matrix(&self) -> Result<ArrayView2<'_, f64>> {
        let m = self.as_matrix()?;
        if m.nrows() != m.ncols() {
            return Err(Error::shape("a square matrix", self.shape()));
        }
        Ok(m)
    }

    /// View a rank 4 tensor, e.g. electron repulsion integrals (pq|rs).
    pub fn as_array4(&self) -> Result<ArrayView4<'_, f64>> {
        self.data.view().into_dimensionality::<Ix4>().map_err(|_| Error::shape("a rank 4 tensor", self.shape()))
    }

    pub fn to_vector(&self) -> Result<Array1<f64>> {
        Ok(self.as_vector()?.to_owned())
    }

    pub fn to_matrix(&self) -> Result<Array2<f64>> {
        Ok(self.as_matrix()?.to_owned())
    }

    /// Elementwise comparison with absolute tolerance `tol`. Tensors of different shape never match.
    pub fn approx_eq(&self, other: &TensorHandle, tol: f64) -> bool {
        self.shape() == other.shape()
            && self.data.iter().zip(other.data.iter()).all(|(a, b)| (a - b).abs() <= tol)
    }

    /// True when both handles share one buffer.
    pub fn ptr_eq(&self, other: &TensorHandle) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl<D: Dimension> From<Array<f64, D>> for TensorHandle {
    fn from(a: Array<f64, D>) -> Self {
        Self::new(a)
    }
}

impl fmt::Debug for TensorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorHandle").field("shape", &self.shape()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array4};

    #[test]
    fn rank_checked_views() {
        let t = TensorHandle::from(array![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.as_square_matrix().unwrap()[(1, 0)], 3.0);
        assert!(matches!(t.as_vector(), Err(Error::Shape { .. })));
        assert!(matches!(t.as_array4(), Err(Error::Shape { .. })));

        let r = TensorHandle::from(Array2::<f64>::zeros((2, 3)));
        assert!(r.as_matrix().is_ok());
        assert!(matches!(r.as_square_matrix(), Err(Error::Shape { .. })));

        let eri = TensorHandle::from(Array4::<f64>::zeros((2, 2, 2, 2)));
        assert_eq!(eri.as_array4().unwrap().dim(), (2, 2, 2, 2));
    }

    #[test]
    fn clones_share_buffer() {
        let t = TensorHandle::from(array![1.0, 2.0, 3.0]);
        let u = t.clone();
        assert!(t.ptr_eq(&u));
        let w = TensorHandle::from(array![1.0, 2.0, 3.0 + 1e-12]);
        assert!(!t.ptr_eq(&w));
        assert!(t.approx_eq(&w, 1e-10));
        assert!(!t.approx_eq(&TensorHandle::from(array![1.0, 2.0]), 1.0));
    }
}
