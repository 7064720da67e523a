// contract.rs
use std::vec;

use crate::error::{Error, Result};
use crate::value::{ModuleValue, Value, ValueType};

/// One named, typed position in a property type's inputs or outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: ValueType,
}

/// Runtime descriptor of a property type: its name and ordered input and output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contract {
    pub name: &'static str,
    pub inputs: &'static [Field],
    pub outputs: &'static [Field],
}

impl Contract {
    /// Check arity and types of `values` against the input schema.
    pub fn check_inputs(&self, values: &[Value]) -> Result<()> {
        check_fields(self.name, self.inputs, values)
    }

    /// Check arity and types of `values` against the output schema.
    pub fn check_outputs(&self, values: &[Value]) -> Result<()> {
        check_fields(self.name, self.outputs, values)
    }
}

fn check_fields(contract: &str, fields: &[Field], values: &[Value]) -> Result<()> {
    if fields.len() != values.len() {
        return Err(Error::ArityMismatch {
            contract: contract.to_string(),
            expected: fields.len(),
            found: values.len(),
        });
    }
    for (field, value) in fields.iter().zip(values) {
        if field.ty != value.value_type() {
            return Err(Error::TypeMismatch {
                name: field.name.to_string(),
                expected: field.ty,
                found: value.value_type(),
            });
        }
    }
    Ok(())
}

/// A named, strongly typed function signature that modules may satisfy. Implementations are
/// normally generated with `property_type!`.
pub trait PropertyType: 'static {
    type Inputs;
    type Outputs;

    fn contract() -> Contract;

    fn wrap_inputs(inputs: Self::Inputs) -> Vec<Value>;
    fn unwrap_inputs(values: Vec<Value>) -> Result<Self::Inputs>;
    fn wrap_results(outputs: Self::Outputs) -> Vec<Value>;
    fn unwrap_results(values: Vec<Value>) -> Result<Self::Outputs>;
}

/// Pulls typed values off an erased value list in schema order.
pub struct Unpacker {
    fields: &'static [Field],
    values: vec::IntoIter<Value>,
    position: usize,
}

impl Unpacker {
    pub fn new(contract: &'static str, fields: &'static [Field], values: Vec<Value>) -> Result<Self> {
        if fields.len() != values.len() {
            return Err(Error::ArityMismatch {
                contract: contract.to_string(),
                expected: fields.len(),
                found: values.len(),
            });
        }
        Ok(Self { fields, values: values.into_iter(), position: 0 })
    }

    pub fn next<T: ModuleValue>(&mut self) -> Result<T> {
        let field = self.fields[self.position];
        self.position += 1;
        // Arity was checked in `new`, so a value is always present here.
        let value =
            self.values.next().ok_or_else(|| Error::InvalidInput(format!("missing value for '{}'", field.name)))?;
        T::from_value(value).map_err(|v| Error::TypeMismatch {
            name: field.name.to_string(),
            expected: T::TYPE,
            found: v.value_type(),
        })
    }
}

/// Declare a property type as a zero sized struct implementing `PropertyType`.
///
/// ```ignore
/// property_type! {
///     /// Generalized eigenproblem A v = lambda B v.
///     pub struct GeneralizedEigenSolve = "GeneralizedEigenSolve" {
///         inputs { a: TensorHandle, b: TensorHandle }
///         outputs { values: TensorHandle, vectors: TensorHandle }
///     }
/// }
/// ```
#[macro_export]
macro_rules! property_type {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident = $label:literal {
            inputs { $($in_name:ident : $in_ty:ty),* $(,)? }
            outputs { $($out_name:ident : $out_ty:ty),* $(,)? }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $name;

        impl $crate::contract::PropertyType for $name {
            type Inputs = ($($in_ty,)*);
            type Outputs = ($($out_ty,)*);

            fn contract() -> $crate::contract::Contract {
                const INPUTS: &[$crate::contract::Field] = &[
                    $($crate::contract::Field {
                        name: stringify!($in_name),
                        ty: <$in_ty as $crate::value::ModuleValue>::TYPE,
                    }),*
                ];
                const OUTPUTS: &[$crate::contract::Field] = &[
                    $($crate::contract::Field {
                        name: stringify!($out_name),
                        ty: <$out_ty as $crate::value::ModuleValue>::TYPE,
                    }),*
                ];
                $crate::contract::Contract { name: $label, inputs: INPUTS, outputs: OUTPUTS }
            }

            #[allow(unused_variables)]
            fn wrap_inputs(inputs: Self::Inputs) -> Vec<$crate::value::Value> {
                let ($($in_name,)*) = inputs;
                vec![$($crate::value::ModuleValue::into_value($in_name)),*]
            }

            #[allow(unused_mut)]
            fn unwrap_inputs(values: Vec<$crate::value::Value>) -> $crate::error::Result<Self::Inputs> {
                let contract = <Self as $crate::contract::PropertyType>::contract();
                let mut unpacker = $crate::contract::Unpacker::new(contract.name, contract.inputs, values)?;
                Ok(($(unpacker.next::<$in_ty>()?,)*))
            }

            #[allow(unused_variables)]
            fn wrap_results(outputs: Self::Outputs) -> Vec<$crate::value::Value> {
                let ($($out_name,)*) = outputs;
                vec![$($crate::value::ModuleValue::into_value($out_name)),*]
            }

            #[allow(unused_mut)]
            fn unwrap_results(values: Vec<$crate::value::Value>) -> $crate::error::Result<Self::Outputs> {
                let contract = <Self as $crate::contract::PropertyType>::contract();
                let mut unpacker = $crate::contract::Unpacker::new(contract.name, contract.outputs, values)?;
                Ok(($(unpacker.next::<$out_ty>()?,)*))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorHandle;
    use ndarray::array;

    crate::property_type! {
        /// Test contract with mixed field types.
        struct Scaled = "Scaled" {
            inputs { x: TensorHandle, factor: f64 }
            outputs { y: TensorHandle }
        }
    }

    #[test]
    fn schema_is_ordered_and_typed() {
        let c = Scaled::contract();
        assert_eq!(c.name, "Scaled");
        assert_eq!(
            c.inputs,
            &[Field { name: "x", ty: ValueType::Tensor }, Field { name: "factor", ty: ValueType::Scalar }]
        );
        assert_eq!(c.outputs.len(), 1);
    }

    #[test]
    fn wrap_then_unwrap_keeps_values() {
        let x = TensorHandle::from(array![1.0, 2.0]);
        let values = Scaled::wrap_inputs((x.clone(), 3.0));
        Scaled::contract().check_inputs(&values).unwrap();
        let (x2, factor) = Scaled::unwrap_inputs(values).unwrap();
        assert!(x2.ptr_eq(&x));
        assert_eq!(factor, 3.0);
    }

    #[test]
    fn unwrap_reports_arity_and_type() {
        let e = Scaled::unwrap_inputs(vec![Value::Scalar(1.0)]).unwrap_err();
        assert!(matches!(e, Error::ArityMismatch { expected: 2, found: 1, .. }));

        let e = Scaled::unwrap_inputs(vec![Value::Scalar(1.0), Value::Scalar(2.0)]).unwrap_err();
        match e {
            Error::TypeMismatch { name, expected, found } => {
                assert_eq!(name, "x");
                assert_eq!(expected, ValueType::Tensor);
                assert_eq!(found, ValueType::Scalar);
            }
            other => panic!("unexpected error {other:?}"),
        }

        let e = Scaled::unwrap_results(vec![Value::Flag(true)]).unwrap_err();
        assert!(matches!(e, Error::TypeMismatch { .. }));
    }
}
