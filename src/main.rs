// main.rs
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scf_rs::input::{load_input, Input};
use scf_rs::molecule::Molecule;
use scf_rs::property_types::{MolecularBasisSet, MoleculeFromString, TotalEnergy};
use scf_rs::{load_modules, ModuleRegistry, Result};

#[derive(Serialize)]
struct Summary<'a> {
    molecule: &'a Molecule,
    basis: &'a str,
    nao: usize,
    nuclear_repulsion: f64,
    energy: f64,
    wall_time_s: f64,
}

fn run(input: &Input) -> Result<()> {
    let t_total = Instant::now();

    let mut registry = ModuleRegistry::new();
    load_modules(&mut registry)?;
    input.apply(&mut registry)?;

    let (mol,) = registry.run::<MoleculeFromString>("Molecule database", (input.molecule.clone(),))?;
    let (basis,) = registry.run::<MolecularBasisSet>(&input.basis, (Arc::clone(&mol),))?;
    let (energy,) = registry.run::<TotalEnergy>("SCF Driver", (Arc::clone(&basis), Arc::clone(&mol)))?;
    let wall_time = t_total.elapsed();

    println!("{}", "=".repeat(60));
    println!("Molecule: {},  basis: {} ({} AOs)", mol.formula(), input.basis, basis.nao());
    println!("Total SCF energy: {:.10}", energy);
    println!("Total wall time: {:?}", wall_time);

    if let Some(path) = &input.write.json {
        let summary = Summary {
            molecule: &mol,
            basis: &input.basis,
            nao: basis.nao(),
            nuclear_repulsion: mol.nuclear_repulsion(),
            energy,
            wall_time_s: wall_time.as_secs_f64(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &summary)?;
        println!("Wrote summary to {}", path);
    }
    Ok(())
}

fn main() {
    let input_path = match std::env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("Usage: scf-rs <input.lua>");
            std::process::exit(1);
        }
    };

    let input = match load_input(&input_path) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input_path, e);
            std::process::exit(1);
        }
    };

    let filter = if input.write.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    if let Err(e) = run(&input) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
