//! `inbound replay`: drive a scripted session through [`Messaging`].
//!
//! A session file is `{"steps": [...]}` where each step is one of
//!
//! ```json
//! {"step": "request", "id": "r1", "surfaces": ["mobileapp://app"]}
//! {"step": "fragment", "id": "r1", "payload": [PropositionJSON]}
//! {"step": "complete", "id": "r1"}
//! {"step": "clear", "surfaces": ["mobileapp://app"]}
//! ```
//!
//! Step ids are labels local to the file; each `request` is issued a real
//! request id. Labels that were never requested pass through unchanged and
//! so exercise the unknown-id path.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::process;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use inbound_interchange::Surface;
use inbound_pipeline::{Messaging, PipelineConfig, RecordingNotificationSink, StateSnapshot};
use inbound_rules::{CompiledRule, RecordingRulesEngine};
use inbound_storage::PropositionCache;

use super::{ids_by_surface, print_surfaces, read_json, runtime};
use crate::{report_error, OutputFormat};

#[derive(Debug, Deserialize)]
struct Session {
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum Step {
    Request { id: String, surfaces: Vec<String> },
    Fragment { id: String, payload: Value },
    Complete { id: String },
    Clear { surfaces: Vec<String> },
}

pub(crate) fn cmd_replay(
    session_path: &Path,
    config: &PipelineConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let doc = read_json(session_path, output, quiet);
    let session: Session = match serde_json::from_value(doc) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("invalid session '{}': {}", session_path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let cache: Option<Arc<dyn PropositionCache>> = config
        .file_cache()
        .map(|c| Arc::new(c) as Arc<dyn PropositionCache>);
    let in_app = Arc::new(RecordingRulesEngine::new("in-app"));
    let cards = Arc::new(RecordingRulesEngine::new("content-cards"));
    let sink = Arc::new(RecordingNotificationSink::new());
    let messaging = Messaging::from_config(config, cache, in_app.clone(), cards.clone(), sink.clone());

    let rt = runtime(output, quiet);
    let (log, snapshot, in_app_calls, card_calls, notifications) = rt.block_on(async {
        messaging.load_cached_propositions().await;
        let log = run_steps(&messaging, session.steps).await;
        (
            log,
            messaging.snapshot().await,
            in_app.calls().await,
            cards.calls().await,
            sink.received().await,
        )
    });

    if quiet {
        return;
    }
    let in_app_calls = rule_ids(&in_app_calls);
    let card_calls = rule_ids(&card_calls);
    let notifications: Vec<Vec<String>> = notifications
        .iter()
        .map(|n| n.propositions.iter().map(|p| p.unique_id.clone()).collect())
        .collect();
    let stores = store_ids(&snapshot);

    match output {
        OutputFormat::Text => {
            for line in &log {
                println!("{}", line["summary"].as_str().unwrap_or_default());
            }
            println!("in-app engine calls: {}", in_app_calls.len());
            for (i, call) in in_app_calls.iter().enumerate() {
                println!("  #{}: {}", i + 1, call.join(", "));
            }
            println!("content-card engine calls: {}", card_calls.len());
            for (i, call) in card_calls.iter().enumerate() {
                println!("  #{}: {}", i + 1, call.join(", "));
            }
            println!("notifications: {}", notifications.len());
            for (i, ids) in notifications.iter().enumerate() {
                println!("  #{}: {}", i + 1, ids.join(", "));
            }
            for (label, ids) in &stores {
                print_surfaces(label, ids);
            }
        }
        OutputFormat::Json => {
            let report = json!({
                "steps": log,
                "engines": {
                    "in_app": in_app_calls,
                    "content_cards": card_calls,
                },
                "notifications": notifications,
                "stores": stores,
                "pending_requests": snapshot.pending_requests,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).unwrap_or_default()
            );
        }
    }
}

async fn run_steps(messaging: &Messaging, steps: Vec<Step>) -> Vec<Value> {
    let mut request_ids: HashMap<String, String> = HashMap::new();
    let mut log = Vec::with_capacity(steps.len());
    let resolve = |ids: &HashMap<String, String>, label: &str| {
        ids.get(label).cloned().unwrap_or_else(|| label.to_string())
    };

    for step in steps {
        let entry = match step {
            Step::Request { id, surfaces } => {
                let surfaces: Vec<Surface> =
                    surfaces.iter().map(|s| Surface::new(s.as_str())).collect();
                match messaging.update_propositions_for_surfaces(&surfaces).await {
                    Some(request_id) => {
                        request_ids.insert(id.clone(), request_id);
                        json!({"step": "request", "id": id, "registered": true,
                            "summary": format!("request {}: {} surfaces", id, surfaces.len())})
                    }
                    None => json!({"step": "request", "id": id, "registered": false,
                        "summary": format!("request {}: no valid surfaces", id)}),
                }
            }
            Step::Fragment { id, payload } => {
                let request_id = resolve(&request_ids, &id);
                let event = json!({"requestEventId": request_id, "payload": payload});
                let accepted = messaging.handle_fragment_event(&event).await;
                json!({"step": "fragment", "id": id, "accepted": accepted,
                    "summary": format!("fragment {}: {}", id, if accepted { "accepted" } else { "dropped" })})
            }
            Step::Complete { id } => {
                let request_id = resolve(&request_ids, &id);
                let event = json!({"endingEventId": request_id});
                match messaging.handle_completion_event(&event).await {
                    Some(report) => json!({
                        "step": "complete",
                        "id": id,
                        "propositions": report.propositions,
                        "dispatched": report.dispatched,
                        "summary": format!("complete {}: {} propositions", id, report.propositions),
                    }),
                    None => json!({"step": "complete", "id": id, "dispatched": null,
                        "summary": format!("complete {}: unknown request", id)}),
                }
            }
            Step::Clear { surfaces } => {
                let surfaces: Vec<Surface> =
                    surfaces.iter().map(|s| Surface::new(s.as_str())).collect();
                let dispatched = messaging.clear_surfaces(&surfaces).await;
                json!({"step": "clear", "surfaces": surfaces, "dispatched": dispatched,
                    "summary": format!("clear: {} surfaces", surfaces.len())})
            }
        };
        log.push(entry);
    }
    log
}

fn rule_ids(calls: &[Vec<CompiledRule>]) -> Vec<Vec<String>> {
    calls
        .iter()
        .map(|rules| rules.iter().map(|r| r.consequence_id().to_string()).collect())
        .collect()
}

fn store_ids(snapshot: &StateSnapshot) -> BTreeMap<&'static str, BTreeMap<String, Vec<String>>> {
    BTreeMap::from([
        ("persisted", ids_by_surface(snapshot.persisted.as_map())),
        ("code_based", ids_by_surface(snapshot.code_based.as_map())),
        ("content_cards", ids_by_surface(snapshot.cards.as_map())),
        ("inbox", ids_by_surface(snapshot.inbox.as_map())),
    ])
}
