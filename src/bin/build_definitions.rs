use anyhow::{Context, Result};
use arm_explorer::definitions::DefinitionTable;
use arm_explorer::operation::load_operations;
use clap::{Arg, Command};
use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = Command::new("build_definitions")
        .about("Fold an operation catalog into its resource definition table")
        .arg(Arg::new("operations").long("operations").required(true))
        .arg(Arg::new("out").long("out").required(true))
        .get_matches();

    let operations_path = matches
        .get_one::<String>("operations")
        .context("operations path missing")?;
    let out_path = matches
        .get_one::<String>("out")
        .context("out path missing")?;

    let operations = load_operations(Path::new(operations_path))?;
    let table = DefinitionTable::build(&operations);
    let diagnostics: Vec<String> = table.diagnostics().iter().map(|d| d.to_string()).collect();
    let out = json!({
        "definitions": table.definitions().collect::<Vec<_>>(),
        "diagnostics": diagnostics,
    });
    let json = serde_json::to_string_pretty(&out)?;
    fs::write(out_path, json).with_context(|| format!("write {}", out_path))?;
    info!(definitions = table.len(), diagnostics = diagnostics.len(), out = %out_path, "wrote definition table");
    Ok(())
}
