// input.rs
use std::fs;

use rlua::{Lua, Table, Value as LuaValue};
use tracing::debug;

use crate::error::{Error, Result};
use crate::registry::ModuleRegistry;
use crate::value::{Value, ValueType};

/// Scalar read from the input file, converted to a module value once the target input's
/// declared type is known.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Integer(i64),
    Number(f64),
    Flag(bool),
    Text(String),
}

impl Setting {
    /// Convert to the declared type where that is lossless, otherwise to the natural type so the
    /// registry reports the mismatch.
    pub fn to_value(&self, ty: ValueType) -> Value {
        match (self, ty) {
            (Setting::Integer(i), ValueType::Scalar) => Value::Scalar(*i as f64),
            (Setting::Integer(i), _) if *i >= 0 => Value::Count(*i as usize),
            (Setting::Integer(i), _) => Value::Scalar(*i as f64),
            (Setting::Number(x), ValueType::Count) if *x >= 0.0 && x.fract() == 0.0 => Value::Count(*x as usize),
            (Setting::Number(x), _) => Value::Scalar(*x),
            (Setting::Flag(b), _) => Value::Flag(*b),
            (Setting::Text(s), _) => Value::Text(s.clone()),
        }
    }
}

// Storage for SCF loop options. Unset fields keep the module defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScfInput {
    pub max_iterations: Option<usize>,
    pub energy_tol: Option<f64>,
    pub density_tol: Option<f64>,
    pub gradient_tol: Option<f64>,
    pub diis: Option<bool>,
    pub diis_space: Option<usize>,
}

// Storage for a module input override.
#[derive(Debug, Clone, PartialEq)]
pub struct InputOverride {
    pub module: String,
    pub input: String,
    pub value: Setting,
}

// Storage for a submodule binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub module: String,
    pub slot: String,
    pub target: String,
}

// Storage for output options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions {
    pub verbose: bool,
    pub json: Option<String>,
}

/// Storage for Input file parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub molecule: String,
    pub basis: String,
    pub scf: ScfInput,
    pub overrides: Vec<InputOverride>,
    pub bindings: Vec<Binding>,
    pub write: WriteOptions,
}

fn setting(value: LuaValue) -> Result<Setting> {
    match value {
        LuaValue::Boolean(b) => Ok(Setting::Flag(b)),
        LuaValue::Integer(i) => Ok(Setting::Integer(i)),
        LuaValue::Number(x) => Ok(Setting::Number(x)),
        LuaValue::String(s) => Ok(Setting::Text(s.to_str()?.to_string())),
        other => Err(Error::Config(format!("unsupported input value of type {}", other.type_name()))),
    }
}

fn required(t: &Table, key: &str, table: &str) -> Result<String> {
    let v: Option<String> = t.get(key)?;
    v.ok_or_else(|| Error::Config(format!("'{key}' is required in every {table} entry")))
}

/// Read input parameters from Lua source.
/// # Arguments
///     `src`: str, Lua chunk defining `molecule` and optionally `basis`, `scf`, `inputs`,
///     `submodules` and `write`.
pub fn parse_input(src: &str) -> Result<Input> {
    let lua = Lua::new();
    lua.load(src).exec()?;
    let globals = lua.globals();

    let molecule: Option<String> = globals.get("molecule")?;
    let molecule = molecule.ok_or_else(|| Error::Config("'molecule' is required".to_string()))?;
    let basis: Option<String> = globals.get("basis")?;
    let basis = basis.unwrap_or_else(|| "STO-3G".to_string());

    // SCF table.
    let scf_tbl: Option<Table> = globals.get("scf")?;
    let scf = match scf_tbl {
        Some(t) => ScfInput {
            max_iterations: t.get("max_iterations")?,
            energy_tol: t.get("energy_tol")?,
            density_tol: t.get("density_tol")?,
            gradient_tol: t.get("gradient_tol")?,
            diis: t.get("diis")?,
            diis_space: t.get("diis_space")?,
        },
        None => ScfInput::default(),
    };

    // Inputs table.
    let mut overrides = Vec::new();
    let inputs_tbl: Option<Table> = globals.get("inputs")?;
    if let Some(tbl) = inputs_tbl {
        for entry in tbl.sequence_values::<Table>() {
            let t = entry?;
            let value: LuaValue = t.get("value")?;
            overrides.push(InputOverride {
                module: required(&t, "module", "inputs")?,
                input: required(&t, "input", "inputs")?,
                value: setting(value)?,
            });
        }
    }

    // Submodules table.
    let mut bindings = Vec::new();
    let submods_tbl: Option<Table> = globals.get("submodules")?;
    if let Some(tbl) = submods_tbl {
        for entry in tbl.sequence_values::<Table>() {
            let t = entry?;
            bindings.push(Binding {
                module: required(&t, "module", "submodules")?,
                slot: required(&t, "slot", "submodules")?,
                target: required(&t, "target", "submodules")?,
            });
        }
    }

    // Write table.
    let write_tbl: Option<Table> = globals.get("write")?;
    let write = match write_tbl {
        Some(t) => {
            let verbose: Option<bool> = t.get("verbose")?;
            WriteOptions { verbose: verbose.unwrap_or(false), json: t.get("json")? }
        }
        None => WriteOptions::default(),
    };

    Ok(Input { molecule, basis, scf, overrides, bindings, write })
}

/// Read input parameters from lua file.
/// # Arguments
///     `path`: str, file path to input file.
pub fn load_input(path: &str) -> Result<Input> {
    let src = fs::read_to_string(path)?;
    parse_input(&src)
}

impl Input {
    /// Push bindings, SCF options and input overrides into `registry`, in that order.
    pub fn apply(&self, registry: &mut ModuleRegistry) -> Result<()> {
        for b in &self.bindings {
            registry.bind_submodule(&b.module, &b.slot, &b.target)?;
        }

        let scf = &self.scf;
        if let Some(n) = scf.max_iterations {
            registry.set_input("SCF loop", "max iterations", n)?;
        }
        if let Some(x) = scf.energy_tol {
            registry.set_input("SCF loop", "energy tolerance", x)?;
        }
        if let Some(x) = scf.density_tol {
            registry.set_input("SCF loop", "density tolerance", x)?;
        }
        if let Some(x) = scf.gradient_tol {
            registry.set_input("SCF loop", "gradient tolerance", x)?;
        }
        if let Some(b) = scf.diis {
            registry.set_input("SCF loop", "DIIS", b)?;
        }
        if let Some(n) = scf.diis_space {
            registry.set_input("SCF loop", "DIIS space", n)?;
        }

        for o in &self.overrides {
            let ty = registry
                .get(&o.module)?
                .spec()
                .inputs
                .get(o.input.as_str())
                .map(|s| s.ty)
                .ok_or_else(|| Error::UnknownInput { module: o.module.clone(), input: o.input.clone() })?;
            debug!(module = %o.module, input = %o.input, "applying input override");
            registry.set_input(&o.module, &o.input, o.value.to_value(ty))?;
        }
        Ok(())
    }
}
