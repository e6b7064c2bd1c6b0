use std::collections::HashSet;
use std::path::Path;
use std::process;

use serde_json::json;

use inbound_interchange::{from_payload, Surface};
use inbound_pipeline::parse;
use inbound_rules::ConsequenceSchema;

use super::{ids_by_surface, print_surfaces, read_json};
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_parse(payload_path: &Path, surfaces: &[String], output: OutputFormat, quiet: bool) {
    let requested: HashSet<Surface> = surfaces.iter().map(|s| Surface::new(s.as_str())).collect();
    if let Some(bad) = requested.iter().find(|s| !s.is_valid()) {
        report_error(&format!("invalid surface '{}'", bad), output, quiet);
        process::exit(1);
    }

    let payload = read_json(payload_path, output, quiet);
    let propositions = from_payload(&payload);
    let parsed = parse(&propositions, &requested);

    let persist = ids_by_surface(&parsed.propositions_to_persist);
    let code_based = ids_by_surface(&parsed.propositions_to_cache);
    let cards = ids_by_surface(&parsed.cards_to_cache);
    let inbox = ids_by_surface(&parsed.inbox_to_cache);
    let mut tracked: Vec<&String> = parsed.proposition_info.keys().collect();
    tracked.sort();

    let in_app_rules = parsed.rule_count(ConsequenceSchema::InApp);
    let card_rules = parsed.rule_count(ConsequenceSchema::ContentCard);
    let history_rules = parsed.rule_count(ConsequenceSchema::EventHistoryOperation);

    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => {
            println!(
                "{} propositions read, {} in scope",
                propositions.len(),
                propositions
                    .iter()
                    .filter(|p| requested.contains(&p.surface()))
                    .count()
            );
            println!("in-app rules: {}", in_app_rules);
            println!("content-card rules: {}", card_rules);
            println!("event-history rules: {}", history_rules);
            print_surfaces("persisted", &persist);
            print_surfaces("code-based", &code_based);
            print_surfaces("content cards", &cards);
            print_surfaces("inbox", &inbox);
        }
        OutputFormat::Json => {
            let summary = json!({
                "propositions": propositions.len(),
                "rules": {
                    "in_app": in_app_rules,
                    "content_card": card_rules,
                    "event_history": history_rules,
                },
                "persisted": persist,
                "code_based": code_based,
                "content_cards": cards,
                "inbox": inbox,
                "tracked": tracked,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).unwrap_or_default()
            );
        }
    }
}
