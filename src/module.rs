// module.rs
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::contract::{Contract, PropertyType};
use crate::error::{Error, Result};
use crate::value::{ModuleValue, Value, ValueType};

/// Declared module input: its type, default and a human readable description.
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub ty: ValueType,
    pub default: Value,
    pub description: &'static str,
}

/// Everything a module advertises about itself before it is run.
#[derive(Debug, Clone, Default)]
pub struct ModuleSpec {
    pub description: &'static str,
    pub property_types: Vec<Contract>,
    pub inputs: BTreeMap<&'static str, InputSpec>,
    pub submodules: BTreeMap<&'static str, Contract>,
}

impl ModuleSpec {
    pub fn new(description: &'static str) -> Self {
        Self { description, ..Default::default() }
    }

    /// Declare that the module can be run as property type `P`.
    pub fn satisfies<P: PropertyType>(mut self) -> Self {
        self.property_types.push(P::contract());
        self
    }

    /// Declare a named input. Its type is taken from the default value.
    /// # Arguments
    ///     `name`: &str, input name used by `set_input`.
    ///     `default`: Value, used until overridden.
    ///     `description`: &str, shown by module listings.
    pub fn input(mut self, name: &'static str, default: impl Into<Value>, description: &'static str) -> Self {
        let default = default.into();
        self.inputs.insert(name, InputSpec { ty: default.value_type(), default, description });
        self
    }

    /// Declare a submodule slot constrained to property type `P`.
    pub fn submodule<P: PropertyType>(mut self, slot: &'static str) -> Self {
        self.submodules.insert(slot, P::contract());
        self
    }

    pub fn satisfies_contract(&self, contract: &Contract) -> bool {
        self.property_types.iter().any(|c| c == contract)
    }
}

/// An executable unit of the pipeline.
pub trait Module: Send + Sync {
    fn spec(&self) -> ModuleSpec;

    /// Compute the outputs of `inputs.contract()` from the positional inputs, the module's
    /// named inputs and its bound submodules.
    fn run(&self, inputs: &Inputs<'_>, submods: &Submodules) -> Result<Vec<Value>>;
}

/// Inputs handed to `Module::run`: positional property type arguments plus the module's named
/// inputs with overrides applied.
pub struct Inputs<'a> {
    module: &'a str,
    contract: Contract,
    args: Vec<Value>,
    named: &'a BTreeMap<String, Value>,
}

impl<'a> Inputs<'a> {
    /// The property type this call was made as.
    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Typed positional arguments of property type `P`.
    pub fn unwrap<P: PropertyType>(&self) -> Result<P::Inputs> {
        let contract = P::contract();
        if contract != self.contract {
            return Err(Error::ContractMismatch {
                module: self.module.to_string(),
                contract: contract.name.to_string(),
            });
        }
        P::unwrap_inputs(self.args.clone())
    }

    /// Typed value of a named input.
    pub fn get<T: ModuleValue>(&self, name: &str) -> Result<T> {
        let value = self
            .named
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownInput { module: self.module.to_string(), input: name.to_string() })?;
        T::from_value(value).map_err(|v| Error::TypeMismatch {
            name: name.to_string(),
            expected: T::TYPE,
            found: v.value_type(),
        })
    }
}

/// A module together with its merged inputs and recursively bound submodules, frozen at
/// resolution time.
#[derive(Clone)]
pub struct BoundModule {
    name: String,
    module: Arc<dyn Module>,
    spec: ModuleSpec,
    inputs: BTreeMap<String, Value>,
    submods: Submodules,
}

impl BoundModule {
    pub(crate) fn new(
        name: &str,
        module: Arc<dyn Module>,
        spec: ModuleSpec,
        inputs: BTreeMap<String, Value>,
        submods: Submodules,
    ) -> Self {
        Self { name: name.to_string(), module, spec, inputs, submods }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &ModuleSpec {
        &self.spec
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    pub fn submodules(&self) -> &Submodules {
        &self.submods
    }

    /// Run the module as property type `P`.
    /// # Arguments
    ///     `inputs`: P::Inputs, positional arguments of the property type.
    pub fn run_as<P: PropertyType>(&self, inputs: P::Inputs) -> Result<P::Outputs> {
        let contract = P::contract();
        if !self.spec.satisfies_contract(&contract) {
            return Err(Error::ContractMismatch { module: self.name.clone(), contract: contract.name.to_string() });
        }
        let span = tracing::debug_span!("module", name = %self.name, property_type = contract.name);
        let _enter = span.enter();
        debug!("running");

        let args = P::wrap_inputs(inputs);
        contract.check_inputs(&args)?;
        let inputs = Inputs { module: &self.name, contract, args, named: &self.inputs };
        let outputs = self.module.run(&inputs, &self.submods)?;
        contract.check_outputs(&outputs)?;
        P::unwrap_results(outputs)
    }
}

impl fmt::Debug for BoundModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundModule")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("submods", &self.submods)
            .finish()
    }
}

/// Resolved submodule slots of one module.
#[derive(Debug, Clone, Default)]
pub struct Submodules {
    owner: String,
    slots: BTreeMap<String, BoundModule>,
}

impl Submodules {
    pub(crate) fn new(owner: &str, slots: BTreeMap<String, BoundModule>) -> Self {
        Self { owner: owner.to_string(), slots }
    }

    pub fn get(&self, slot: &str) -> Option<&BoundModule> {
        self.slots.get(slot)
    }

    /// Name of the module bound to `slot`, if any.
    pub fn bound_name(&self, slot: &str) -> Option<&str> {
        self.slots.get(slot).map(|b| b.name())
    }

    /// Run the submodule in `slot` as property type `P`. Its errors come back wrapped in
    /// `Error::Failed` naming the submodule.
    pub fn run_as<P: PropertyType>(&self, slot: &str, inputs: P::Inputs) -> Result<P::Outputs> {
        let bound = self
            .slots
            .get(slot)
            .ok_or_else(|| Error::UnresolvedSlot { module: self.owner.clone(), slot: slot.to_string() })?;
        bound.run_as::<P>(inputs).map_err(|e| e.within(&bound.name))
    }
}
