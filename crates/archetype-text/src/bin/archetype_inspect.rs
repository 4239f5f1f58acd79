//! `archetype-inspect`: load an asset and print its effective values and
//! overrides.
//!
//! Usage:
//!   archetype-inspect <schema.json> <asset.txt> [--settings <file.toml>] [--write]
//!
//! The schema file holds a JSON array of type definitions. `--write` prints
//! the asset back in canonical form instead of the summary.

use std::fs;
use std::process;
use std::sync::Arc;

use archetype_core::{Schema, TypeDef};
use archetype_text::{deserialize, serialize, Settings};
use tracing_subscriber::EnvFilter;

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{msg}");
    process::exit(1);
}

fn load_schema(path: &str) -> Result<Schema, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
    let defs: Vec<TypeDef> = serde_json::from_str(&text).map_err(|e| format!("{path}: {e}"))?;
    Ok(defs.into_iter().collect())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut positional = Vec::new();
    let mut settings = Settings::default();
    let mut write = false;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--settings" => {
                i += 1;
                let Some(path) = args.get(i) else { fail("--settings needs a path") };
                settings = Settings::load(path).unwrap_or_else(|e| fail(format!("{path}: {e}")));
            }
            "--write" => write = true,
            other => positional.push(other.to_string()),
        }
        i += 1;
    }
    let [schema_path, asset_path] = positional.as_slice() else {
        fail("usage: archetype-inspect <schema.json> <asset.txt> [--settings <file.toml>] [--write]");
    };

    let schema = Arc::new(load_schema(schema_path).unwrap_or_else(|e| fail(e)));
    let text = fs::read_to_string(asset_path).unwrap_or_else(|e| fail(format!("{asset_path}: {e}")));
    let mut asset = deserialize(&text, &schema).unwrap_or_else(|e| fail(format!("{asset_path}: {e}")));
    let report = asset.reconcile();

    if write {
        print!("{}", serialize(&asset, &settings));
        return;
    }

    println!("type: {}", asset.type_name());
    println!("id: {}", asset.id());
    if let Some(base) = asset.base() {
        println!("base: {} ({})", base.location, base.asset.id());
    }
    match serde_json::to_string_pretty(&asset.flatten()) {
        Ok(values) => println!("values:\n{values}"),
        Err(e) => fail(e),
    }
    println!("overrides:");
    for (path, ty) in asset.overrides() {
        println!("  {path} {ty:?}");
    }
    for m in &report.mismatches {
        eprintln!("mismatch at {}: {}", m.path, m.reason);
    }
    if !report.is_clean() {
        process::exit(2);
    }
}
