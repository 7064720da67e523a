// value.rs
use std::fmt;
use std::sync::Arc;

use crate::basis::BasisSet;
use crate::molecule::Molecule;
use crate::tensor::TensorHandle;
use crate::AoData;

/// Semantic type of a value crossing a module boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Scalar,
    Count,
    Flag,
    Text,
    Tensor,
    Molecule,
    BasisSet,
    AoData,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::Scalar => "scalar",
            ValueType::Count => "count",
            ValueType::Flag => "flag",
            ValueType::Text => "text",
            ValueType::Tensor => "tensor",
            ValueType::Molecule => "molecule",
            ValueType::BasisSet => "basis set",
            ValueType::AoData => "AO data",
        };
        f.write_str(s)
    }
}

/// Type-erased module input or output.
#[derive(Debug, Clone)]
pub enum Value {
    Scalar(f64),
    Count(usize),
    Flag(bool),
    Text(String),
    Tensor(TensorHandle),
    Molecule(Arc<Molecule>),
    BasisSet(Arc<BasisSet>),
    AoData(Arc<AoData>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Scalar(_) => ValueType::Scalar,
            Value::Count(_) => ValueType::Count,
            Value::Flag(_) => ValueType::Flag,
            Value::Text(_) => ValueType::Text,
            Value::Tensor(_) => ValueType::Tensor,
            Value::Molecule(_) => ValueType::Molecule,
            Value::BasisSet(_) => ValueType::BasisSet,
            Value::AoData(_) => ValueType::AoData,
        }
    }
}

/// Rust types that can travel as a `Value`.
pub trait ModuleValue: Sized {
    const TYPE: ValueType;

    fn into_value(self) -> Value;

    /// Recover the typed value; a value of any other type is handed back unchanged.
    fn from_value(value: Value) -> Result<Self, Value>;
}

macro_rules! module_value {
    ($ty:ty, $variant:ident) => {
        impl ModuleValue for $ty {
            const TYPE: ValueType = ValueType::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Result<Self, Value> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(other),
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

module_value!(f64, Scalar);
module_value!(usize, Count);
module_value!(bool, Flag);
module_value!(String, Text);
module_value!(TensorHandle, Tensor);
module_value!(Arc<Molecule>, Molecule);
module_value!(Arc<BasisSet>, BasisSet);
module_value!(Arc<AoData>, AoData);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_value_hands_back_mismatches() {
        assert_eq!(f64::from_value(Value::Scalar(1.5)).unwrap(), 1.5);
        let back = usize::from_value(Value::Flag(true)).unwrap_err();
        assert_eq!(back.value_type(), ValueType::Flag);
        assert_eq!(Value::from("water").value_type(), ValueType::Text);
        assert_eq!(<Arc<Molecule> as ModuleValue>::TYPE, ValueType::Molecule);
    }
}
