//! querysync - replay cache reconciliation from the command line.
//!
//! Applies a mutation's cache updates to a JSON snapshot of cached query
//! results, previews a settings draft merged over base settings, and checks
//! a role gate. Output JSON goes to stdout; logs go to stderr.

use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use querysync_core::authz::{self, User};
use querysync_core::{merge, Config, KeyedStructure, QueryCache, UpdateRegistry};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage:
  querysync apply <mutation> <variables.json> <cache.json>
  querysync merge <base.json> <draft.json>
  querysync authorize <required-roles> [user-roles]
  querysync config

Roles are comma-separated. RUST_LOG controls log output (default: warn).";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["apply", mutation, variables, cache] => {
            apply(mutation, Path::new(variables), Path::new(cache))
        }
        ["merge", base, draft] => merge_preview(Path::new(base), Path::new(draft)),
        ["authorize", required] => authorize(required, None),
        ["authorize", required, roles] => authorize(required, Some(*roles)),
        ["config"] => show_config(),
        ["--help"] | ["-h"] | ["help"] => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => bail!("{}", USAGE),
    }
}

fn read_structure(path: &Path) -> Result<KeyedStructure> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => bail!("{} must contain a JSON object", path.display()),
    }
}

fn print_json(structure: KeyedStructure) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&Value::Object(structure))?);
    Ok(())
}

fn apply(mutation: &str, variables: &Path, cache: &Path) -> Result<()> {
    let config = Config::load()?;
    let registry = UpdateRegistry::from_config(&config);

    let variables = read_structure(variables)?;
    let mut cache = QueryCache::new().with_snapshot(read_structure(cache)?);

    let updates = registry
        .dispatch(mutation, &variables)
        .with_context(|| format!("Failed to build cache updates for {}", mutation))?;
    if updates.is_passthrough() {
        info!(mutation, "Unknown mutation, cache passed through unchanged");
    }

    let changed = cache.apply(&updates);
    info!(mutation, changed = ?changed, "Applied cache updates");
    print_json(cache.snapshot())
}

fn merge_preview(base: &Path, draft: &Path) -> Result<()> {
    let base = read_structure(base)?;
    let draft = read_structure(draft)?;
    print_json(merge(&base, &draft))
}

fn split_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect()
}

fn authorize(required: &str, roles: Option<&str>) -> Result<()> {
    let required = split_roles(required);
    let required: Vec<&str> = required.iter().map(String::as_str).collect();
    let user = roles.map(|roles| User {
        id: "cli".to_string(),
        roles: split_roles(roles),
    });

    match authz::require(user.as_ref(), &required) {
        Ok(()) => {
            println!("authorized");
            Ok(())
        }
        Err(e) => bail!("{} ({})", e, e.status()),
    }
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
