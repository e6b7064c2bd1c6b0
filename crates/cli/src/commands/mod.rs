pub(crate) mod cache;
pub(crate) mod parse;
pub(crate) mod replay;
pub(crate) mod validate;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::process;

use serde_json::Value;

use inbound_interchange::{Proposition, Surface};

use crate::{report_error, OutputFormat};

/// Read and parse a JSON file, exiting on failure.
pub(crate) fn read_json(path: &Path, output: OutputFormat, quiet: bool) -> Value {
    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// A single-threaded runtime for the async pipeline calls.
pub(crate) fn runtime(output: OutputFormat, quiet: bool) -> tokio::runtime::Runtime {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start runtime: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

/// Proposition ids per surface URI, sorted by URI.
pub(crate) fn ids_by_surface(
    by_surface: &HashMap<Surface, Vec<Proposition>>,
) -> BTreeMap<String, Vec<String>> {
    by_surface
        .iter()
        .map(|(surface, props)| {
            (
                surface.uri().to_string(),
                props.iter().map(|p| p.unique_id.clone()).collect(),
            )
        })
        .collect()
}

/// Print `label:` followed by one indented line per surface.
pub(crate) fn print_surfaces(label: &str, ids: &BTreeMap<String, Vec<String>>) {
    println!("{}:", label);
    if ids.is_empty() {
        println!("  (none)");
    }
    for (uri, props) in ids {
        println!("  {} -> {}", uri, props.join(", "));
    }
}
