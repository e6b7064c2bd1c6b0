use std::path::Path;
use std::process;

use serde_json::json;

use inbound_pipeline::reconciler::decode_snapshot;
use inbound_pipeline::PipelineConfig;
use inbound_storage::{FileCache, PropositionCache};

use super::{ids_by_surface, print_surfaces, runtime};
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_cache_show(dir: &Path, config: &PipelineConfig, output: OutputFormat, quiet: bool) {
    let cache = FileCache::new(dir);
    let rt = runtime(output, quiet);
    let entry = match rt.block_on(cache.get(&config.cache_key)) {
        Ok(entry) => entry,
        Err(e) => {
            report_error(&format!("error reading cache: {}", e), output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    let Some(entry) = entry else {
        match output {
            OutputFormat::Text => println!("no cached propositions in '{}'", dir.display()),
            OutputFormat::Json => println!("{}", json!({ "cached": false })),
        }
        return;
    };

    let store = decode_snapshot(&entry.data);
    let ids = ids_by_surface(store.as_map());
    match output {
        OutputFormat::Text => print_surfaces("cached", &ids),
        OutputFormat::Json => {
            let report = json!({
                "cached": true,
                "surfaces": ids,
                "metadata": entry.metadata,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).unwrap_or_default()
            );
        }
    }
}

pub(crate) fn cmd_cache_clear(dir: &Path, config: &PipelineConfig, output: OutputFormat, quiet: bool) {
    let cache = FileCache::new(dir);
    let rt = runtime(output, quiet);
    if let Err(e) = rt.block_on(cache.remove(&config.cache_key)) {
        report_error(&format!("error clearing cache: {}", e), output, quiet);
        process::exit(1);
    }
    if !quiet {
        match output {
            OutputFormat::Text => println!("cleared"),
            OutputFormat::Json => println!("{}", json!({ "cleared": true })),
        }
    }
}
