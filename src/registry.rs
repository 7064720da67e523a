// registry.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::contract::PropertyType;
use crate::error::{Error, Result};
use crate::module::{BoundModule, Module, ModuleSpec, Submodules};
use crate::value::Value;

struct Entry {
    module: Arc<dyn Module>,
    spec: ModuleSpec,
    overrides: BTreeMap<String, Value>,
    bindings: BTreeMap<String, String>,
}

/// Named modules, their input overrides and submodule bindings.
///
/// Configuration (`register`, `bind_submodule`, `set_input`) needs `&mut self`; running only
/// needs `&self`. Every run resolves a snapshot of the call graph first, so later
/// reconfiguration never reaches a run already in progress.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Entry>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `module` under `name`, replacing any module of that name together with its
    /// overrides and bindings.
    pub fn register(&mut self, name: impl Into<String>, module: impl Module + 'static) {
        self.register_arc(name, Arc::new(module));
    }

    pub fn register_arc(&mut self, name: impl Into<String>, module: Arc<dyn Module>) {
        let name = name.into();
        let spec = module.spec();
        debug!(module = %name, "registering");
        self.modules.insert(name, Entry { module, spec, overrides: BTreeMap::new(), bindings: BTreeMap::new() });
    }

    /// Bind submodule slot `slot` of `module` to the module registered as `target`.
    /// # Arguments
    ///     `module`: &str, module owning the slot.
    ///     `slot`: &str, declared slot name.
    ///     `target`: &str, module to call through the slot. Must satisfy the slot's property type.
    pub fn bind_submodule(&mut self, module: &str, slot: &str, target: &str) -> Result<()> {
        let contract = {
            let entry = self.entry(module)?;
            let target_entry = self.entry(target)?;
            let contract = entry
                .spec
                .submodules
                .get(slot)
                .ok_or_else(|| Error::UnknownSlot { module: module.to_string(), slot: slot.to_string() })?;
            if !target_entry.spec.satisfies_contract(contract) {
                return Err(Error::ContractMismatch { module: target.to_string(), contract: contract.name.to_string() });
            }
            contract.name
        };
        debug!(module, slot, target, property_type = contract, "binding submodule");
        if let Some(entry) = self.modules.get_mut(module) {
            entry.bindings.insert(slot.to_string(), target.to_string());
        }
        Ok(())
    }

    /// Override the default of a declared input. The value's type must match the declaration.
    pub fn set_input(&mut self, module: &str, input: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let entry = self.modules.get_mut(module).ok_or_else(|| Error::UnknownModule(module.to_string()))?;
        let declared = entry
            .spec
            .inputs
            .get(input)
            .ok_or_else(|| Error::UnknownInput { module: module.to_string(), input: input.to_string() })?;
        if declared.ty != value.value_type() {
            return Err(Error::TypeMismatch {
                name: input.to_string(),
                expected: declared.ty,
                found: value.value_type(),
            });
        }
        debug!(module, input, ?value, "setting input");
        entry.overrides.insert(input.to_string(), value);
        Ok(())
    }

    /// Number of modules registered as `name`: 0 or 1.
    pub fn count(&self, name: &str) -> usize {
        usize::from(self.modules.contains_key(name))
    }

    pub fn get(&self, name: &str) -> Result<ModuleRef<'_>> {
        let (name, entry) = self.modules.get_key_value(name).ok_or_else(|| Error::UnknownModule(name.to_string()))?;
        Ok(ModuleRef { registry: self, name: name.as_str(), entry })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Build the bound call graph rooted at `name`.
    pub fn resolve(&self, name: &str) -> Result<BoundModule> {
        self.resolve_inner(name, &mut Vec::new())
    }

    fn resolve_inner(&self, name: &str, stack: &mut Vec<String>) -> Result<BoundModule> {
        if let Some(pos) = stack.iter().position(|n| n == name) {
            let mut path = stack[pos..].to_vec();
            path.push(name.to_string());
            return Err(Error::SubmoduleCycle { path });
        }
        let entry = self.entry(name)?;
        stack.push(name.to_string());

        let mut slots = BTreeMap::new();
        for (&slot, contract) in &entry.spec.submodules {
            let target = entry
                .bindings
                .get(slot)
                .ok_or_else(|| Error::UnresolvedSlot { module: name.to_string(), slot: slot.to_string() })?;
            // The target may have been replaced since it was bound.
            if !self.entry(target)?.spec.satisfies_contract(contract) {
                return Err(Error::ContractMismatch { module: target.clone(), contract: contract.name.to_string() });
            }
            slots.insert(slot.to_string(), self.resolve_inner(target, stack)?);
        }
        stack.pop();

        let inputs = entry
            .spec
            .inputs
            .iter()
            .map(|(&k, s)| (k.to_string(), entry.overrides.get(k).cloned().unwrap_or_else(|| s.default.clone())))
            .collect();
        Ok(BoundModule::new(name, Arc::clone(&entry.module), entry.spec.clone(), inputs, Submodules::new(name, slots)))
    }

    /// Run module `name` as property type `P`. All configuration errors are reported before any
    /// module code runs.
    pub fn run<P: PropertyType>(&self, name: &str, inputs: P::Inputs) -> Result<P::Outputs> {
        let entry = self.entry(name)?;
        let contract = P::contract();
        if !entry.spec.satisfies_contract(&contract) {
            return Err(Error::ContractMismatch { module: name.to_string(), contract: contract.name.to_string() });
        }
        self.resolve(name)?.run_as::<P>(inputs)
    }

    fn entry(&self, name: &str) -> Result<&Entry> {
        self.modules.get(name).ok_or_else(|| Error::UnknownModule(name.to_string()))
    }
}

/// Read-only view of one registered module.
pub struct ModuleRef<'a> {
    registry: &'a ModuleRegistry,
    name: &'a str,
    entry: &'a Entry,
}

impl<'a> ModuleRef<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.entry.spec.description
    }

    pub fn spec(&self) -> &'a ModuleSpec {
        &self.entry.spec
    }

    /// Current value of an input: the override if set, otherwise the default.
    pub fn input(&self, input: &str) -> Option<&'a Value> {
        self.entry.overrides.get(input).or_else(|| self.entry.spec.inputs.get(input).map(|s| &s.default))
    }

    /// Slot name to bound module name.
    pub fn bindings(&self) -> &'a BTreeMap<String, String> {
        &self.entry.bindings
    }

    pub fn satisfies<P: PropertyType>(&self) -> bool {
        self.entry.spec.satisfies_contract(&P::contract())
    }

    /// True when the call graph below this module resolves.
    pub fn is_ready(&self) -> bool {
        self.registry.resolve(self.name).is_ok()
    }

    pub fn run_as<P: PropertyType>(&self, inputs: P::Inputs) -> Result<P::Outputs> {
        self.registry.run::<P>(self.name, inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Inputs;
    use crate::property_type;
    use crate::value::ValueType;

    property_type! {
        struct Unary = "Unary" {
            inputs { x: f64 }
            outputs { y: f64 }
        }
    }

    property_type! {
        struct Describe = "Describe" {
            inputs { x: f64 }
            outputs { text: String }
        }
    }

    struct Add(f64);

    impl Module for Add {
        fn spec(&self) -> ModuleSpec {
            ModuleSpec::new("adds a constant").satisfies::<Unary>().input("offset", self.0, "added to x")
        }

        fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
            let (x,) = inputs.unwrap::<Unary>()?;
            let offset: f64 = inputs.get("offset")?;
            Ok(Unary::wrap_results((x + offset,)))
        }
    }

    /// Applies its `inner` slot twice.
    struct Twice;

    impl Module for Twice {
        fn spec(&self) -> ModuleSpec {
            ModuleSpec::new("applies a submodule twice").satisfies::<Unary>().submodule::<Unary>("inner")
        }

        fn run(&self, inputs: &Inputs<'_>, submods: &Submodules) -> Result<Vec<Value>> {
            let (x,) = inputs.unwrap::<Unary>()?;
            let (y,) = submods.run_as::<Unary>("inner", (x,))?;
            let (z,) = submods.run_as::<Unary>("inner", (y,))?;
            Ok(Unary::wrap_results((z,)))
        }
    }

    struct Show;

    impl Module for Show {
        fn spec(&self) -> ModuleSpec {
            ModuleSpec::new("formats a number").satisfies::<Describe>()
        }

        fn run(&self, inputs: &Inputs<'_>, _submods: &Submodules) -> Result<Vec<Value>> {
            let (x,) = inputs.unwrap::<Describe>()?;
            Ok(Describe::wrap_results((format!("{x}"),)))
        }
    }

    fn registry() -> ModuleRegistry {
        let mut reg = ModuleRegistry::new();
        reg.register("Add one", Add(1.0));
        reg.register("Add ten", Add(10.0));
        reg.register("Twice", Twice);
        reg.register("Show", Show);
        reg.bind_submodule("Twice", "inner", "Add one").unwrap();
        reg
    }

    #[test]
    fn count_reflects_registration() {
        let reg = registry();
        assert_eq!(reg.count("Twice"), 1);
        assert_eq!(reg.count("Thrice"), 0);
        assert_eq!(reg.names().count(), 4);
    }

    #[test]
    fn runs_through_bound_submodule() {
        let reg = registry();
        assert_eq!(reg.run::<Unary>("Twice", (1.0,)).unwrap(), (3.0,));
        assert_eq!(reg.get("Twice").unwrap().run_as::<Unary>((0.0,)).unwrap(), (2.0,));
    }

    #[test]
    fn run_checks_name_then_contract() {
        let reg = registry();
        assert!(matches!(reg.run::<Unary>("Missing", (1.0,)), Err(Error::UnknownModule(_))));
        assert!(matches!(reg.run::<Describe>("Twice", (1.0,)), Err(Error::ContractMismatch { .. })));
        assert_eq!(reg.run::<Describe>("Show", (2.5,)).unwrap().0, "2.5");
    }

    #[test]
    fn mismatched_binding_keeps_previous() {
        let mut reg = registry();
        let e = reg.bind_submodule("Twice", "inner", "Show").unwrap_err();
        assert!(matches!(e, Error::ContractMismatch { .. }));
        assert_eq!(reg.get("Twice").unwrap().bindings()["inner"], "Add one");

        assert!(matches!(reg.bind_submodule("Twice", "outer", "Add one"), Err(Error::UnknownSlot { .. })));
        assert!(matches!(reg.bind_submodule("Twice", "inner", "Nope"), Err(Error::UnknownModule(_))));
        assert!(matches!(reg.bind_submodule("Nope", "inner", "Add one"), Err(Error::UnknownModule(_))));
    }

    #[test]
    fn set_input_is_type_checked() {
        let mut reg = registry();
        let e = reg.set_input("Add one", "offset", true).unwrap_err();
        match e {
            Error::TypeMismatch { expected, found, .. } => {
                assert_eq!(expected, ValueType::Scalar);
                assert_eq!(found, ValueType::Flag);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(reg.set_input("Add one", "scale", 1.0), Err(Error::UnknownInput { .. })));
        assert!(matches!(reg.set_input("Add two", "offset", 1.0), Err(Error::UnknownModule(_))));

        reg.set_input("Add one", "offset", 0.5).unwrap();
        assert!(matches!(reg.get("Add one").unwrap().input("offset"), Some(Value::Scalar(v)) if *v == 0.5));
        assert_eq!(reg.run::<Unary>("Twice", (0.0,)).unwrap(), (1.0,));
    }

    #[test]
    fn unbound_slot_fails_before_running() {
        let mut reg = registry();
        reg.register("Twice", Twice);
        assert!(!reg.get("Twice").unwrap().is_ready());
        match reg.run::<Unary>("Twice", (1.0,)).unwrap_err() {
            Error::UnresolvedSlot { module, slot } => {
                assert_eq!(module, "Twice");
                assert_eq!(slot, "inner");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn replaced_target_is_rechecked() {
        let mut reg = registry();
        reg.register("Add one", Show);
        assert!(matches!(reg.resolve("Twice"), Err(Error::ContractMismatch { .. })));
    }

    #[test]
    fn cycles_are_reported() {
        let mut reg = registry();
        reg.register("Twice again", Twice);
        reg.bind_submodule("Twice", "inner", "Twice again").unwrap();
        reg.bind_submodule("Twice again", "inner", "Twice").unwrap();
        match reg.resolve("Twice").unwrap_err() {
            Error::SubmoduleCycle { path } => assert_eq!(path, ["Twice", "Twice again", "Twice"]),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn resolved_snapshot_ignores_later_rebinding() {
        let mut reg = registry();
        let bound = reg.resolve("Twice").unwrap();
        reg.bind_submodule("Twice", "inner", "Add ten").unwrap();
        assert_eq!(bound.run_as::<Unary>((0.0,)).unwrap(), (2.0,));
        assert_eq!(reg.run::<Unary>("Twice", (0.0,)).unwrap(), (20.0,));
        assert_eq!(bound.submodules().bound_name("inner"), Some("Add one"));
    }
}
