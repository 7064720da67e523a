// error.rs
use thiserror::Error;

use crate::value::ValueType;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring the module registry or running a module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no module named '{0}' is registered")]
    UnknownModule(String),

    #[error("module '{module}' has no input named '{input}'")]
    UnknownInput { module: String, input: String },

    #[error("module '{module}' has no submodule slot named '{slot}'")]
    UnknownSlot { module: String, slot: String },

    #[error("module '{module}' does not satisfy property type '{contract}'")]
    ContractMismatch { module: String, contract: String },

    #[error("'{name}' expects a value of type {expected}, found {found}")]
    TypeMismatch { name: String, expected: ValueType, found: ValueType },

    #[error("property type '{contract}' takes {expected} values, got {found}")]
    ArityMismatch { contract: String, expected: usize, found: usize },

    #[error("submodule slot '{slot}' of module '{module}' is not bound")]
    UnresolvedSlot { module: String, slot: String },

    #[error("submodule bindings form a cycle: {}", .path.join(" -> "))]
    SubmoduleCycle { path: Vec<String> },

    #[error("expected {expected}, found tensor of shape {found:?}")]
    Shape { expected: String, found: Vec<usize> },

    #[error("metric matrix is singular or not positive definite (smallest eigenvalue {min_eigenvalue:e})")]
    SingularMetric { min_eigenvalue: f64 },

    #[error("SCF not converged after {iterations} iterations (E = {energy:.10}, |FDS - SDF| = {gradient:.3e})")]
    MaxIterationsExceeded { iterations: usize, energy: f64, gradient: f64 },

    #[error("module '{module}' failed: {source}")]
    Failed { module: String, source: Box<Error> },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("basis set '{basis}' has no functions for Z = {z}")]
    MissingBasis { basis: String, z: u32 },

    #[error(transparent)]
    Linalg(#[from] ndarray_linalg::error::LinalgError),

    #[error(transparent)]
    Layout(#[from] ndarray::ShapeError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<rlua::Error> for Error {
    fn from(e: rlua::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl Error {
    /// Attribute an error raised by a submodule call to the module that was bound to the slot.
    /// Errors that already name their failing module and convergence failures pass through as is.
    pub fn within(self, module: &str) -> Self {
        match self {
            Error::Failed { .. } | Error::MaxIterationsExceeded { .. } => self,
            other => Error::Failed { module: module.to_string(), source: Box::new(other) },
        }
    }

    /// Innermost error, looking through any `Failed` wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Failed { source, .. } => source.root(),
            e => e,
        }
    }

    pub(crate) fn shape(expected: impl Into<String>, found: &[usize]) -> Self {
        Error::Shape { expected: expected.into(), found: found.to_vec() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_wraps_once_and_root_recovers_kind() {
        let e = Error::SingularMetric { min_eigenvalue: 0.0 }.within("Generalized eigensolve");
        let e = e.within("Core guess");
        match &e {
            Error::Failed { module, .. } => assert_eq!(module, "Generalized eigensolve"),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(e.root(), Error::SingularMetric { .. }));
    }

    #[test]
    fn max_iterations_passes_through() {
        let e = Error::MaxIterationsExceeded { iterations: 3, energy: -1.0, gradient: 1.0 }.within("SCF loop");
        assert!(matches!(e, Error::MaxIterationsExceeded { iterations: 3, .. }));
    }
}
