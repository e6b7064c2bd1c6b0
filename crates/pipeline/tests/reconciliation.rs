//! End-to-end batch handling through `Messaging`, using recording engines
//! and the payload fixtures at the workspace root.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};

use inbound_interchange::schema::SCHEMA_RULESET_ITEM;
use inbound_interchange::{CompletionSignal, EdgeEventType, Surface};
use inbound_pipeline::{DispatchSummary, Messaging, PipelineConfig, RecordingNotificationSink};
use inbound_rules::{ConsequenceSchema, RecordingRulesEngine, EVENT_HISTORY_RULES_PER_CARD};
use inbound_storage::{FileCache, MemoryCache, PropositionCache, PROPOSITIONS_KEY};

const APP: &str = "mobileapp://com.example.app";
const CARDS: &str = "mobileapp://com.example.app/cards";
const HOME: &str = "mobileapp://com.example.app/home";
const INBOX: &str = "mobileapp://com.example.app/inbox";

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn fixture(name: &str) -> Vec<Value> {
    let path = workspace_root().join("fixtures/payloads").join(name);
    let raw = std::fs::read_to_string(&path).unwrap();
    match serde_json::from_str(&raw).unwrap() {
        Value::Array(entries) => entries,
        other => panic!("{} is not an array: {other}", path.display()),
    }
}

struct Harness {
    messaging: Messaging,
    in_app: Arc<RecordingRulesEngine>,
    cards: Arc<RecordingRulesEngine>,
    sink: Arc<RecordingNotificationSink>,
}

fn harness(cache: Option<Arc<dyn PropositionCache>>) -> Harness {
    let config = PipelineConfig {
        app_id: "com.example.app".to_string(),
        ..PipelineConfig::default()
    };
    let in_app = Arc::new(RecordingRulesEngine::new("in-app"));
    let cards = Arc::new(RecordingRulesEngine::new("content-cards"));
    let sink = Arc::new(RecordingNotificationSink::new());
    let messaging = Messaging::from_config(
        &config,
        cache,
        in_app.clone(),
        cards.clone(),
        sink.clone(),
    );
    Harness {
        messaging,
        in_app,
        cards,
        sink,
    }
}

fn surfaces(uris: &[&str]) -> Vec<Surface> {
    uris.iter().map(|u| Surface::new(*u)).collect()
}

/// Request `uris`, deliver each fragment in order, then complete.
async fn run_batch(h: &Harness, uris: &[&str], fragments: Vec<Vec<Value>>) {
    let id = h
        .messaging
        .update_propositions_for_surfaces(&surfaces(uris))
        .await
        .unwrap();
    for payload in fragments {
        assert!(
            h.messaging
                .handle_fragment_event(&json!({"requestEventId": id, "payload": payload}))
                .await
        );
    }
    assert!(h
        .messaging
        .handle_completion_event(&json!({"endingEventId": id}))
        .await
        .is_some());
}

fn consequence_ids(rules: &[inbound_rules::CompiledRule]) -> Vec<&str> {
    rules.iter().map(|r| r.consequence_id()).collect()
}

// ── Mixed batches ───────────────────────────────────────────────────────────

#[tokio::test]
async fn mixed_batch_feeds_every_category() {
    let h = harness(None);
    let mixed = fixture("mixed.json");
    run_batch(&h, &[APP, CARDS, HOME, INBOX], vec![mixed[..2].to_vec(), mixed[2..].to_vec()]).await;

    let in_app_calls = h.in_app.calls().await;
    assert_eq!(in_app_calls.len(), 1);
    assert_eq!(in_app_calls[0].len(), 1 + EVENT_HISTORY_RULES_PER_CARD);
    assert_eq!(in_app_calls[0][0].consequence_id(), "iam-consequence-1");

    let card_calls = h.cards.calls().await;
    assert_eq!(card_calls.len(), 1);
    assert_eq!(consequence_ids(&card_calls[0]), vec!["card-consequence-1"]);

    let received = h.sink.received().await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].propositions[0].unique_id, "cbe-json-1");

    assert_eq!(h.messaging.content_cards(&Surface::new(CARDS)).await.len(), 1);
    assert_eq!(h.messaging.inbox(&Surface::new(INBOX)).await[0].unique_id, "inbox-prop-1");
    let persisted = h.messaging.persisted_propositions().await;
    assert_eq!(persisted[&Surface::new(APP)][0].unique_id, "iam-prop-1");
    let code = h.messaging.propositions_for_surfaces(&surfaces(&[HOME, APP])).await;
    assert_eq!(code.len(), 1);
    assert_eq!(code[&Surface::new(HOME)][0].unique_id, "cbe-json-1");
}

#[tokio::test]
async fn code_based_only_batch_calls_no_engine() {
    let h = harness(None);
    run_batch(&h, &[HOME], vec![fixture("code_based.json")]).await;

    assert!(h.in_app.calls().await.is_empty());
    assert!(h.cards.calls().await.is_empty());
    let received = h.sink.received().await;
    assert_eq!(received.len(), 1);
    let ids: Vec<_> = received[0].propositions.iter().map(|p| p.unique_id.as_str()).collect();
    assert_eq!(ids, vec!["cbe-html-1", "cbe-json-1"]);
}

#[tokio::test]
async fn category_stores_are_independent() {
    let h = harness(None);
    let mixed = fixture("mixed.json");
    run_batch(&h, &[APP, CARDS, HOME, INBOX], vec![mixed]).await;

    // A later request for the home surface only leaves the others alone.
    run_batch(&h, &[HOME], vec![]).await;

    assert!(h
        .messaging
        .propositions_for_surfaces(&surfaces(&[HOME]))
        .await
        .is_empty());
    assert_eq!(h.messaging.content_cards(&Surface::new(CARDS)).await.len(), 1);
    assert_eq!(h.messaging.inbox(&Surface::new(INBOX)).await.len(), 1);
    assert_eq!(h.messaging.persisted_propositions().await.len(), 1);
    assert_eq!(h.in_app.calls().await.len(), 1);
}

// ── Content cards ───────────────────────────────────────────────────────────

#[tokio::test]
async fn each_card_adds_three_event_history_rules() {
    let h = harness(None);
    run_batch(&h, &[CARDS], vec![fixture("content_cards.json")]).await;

    let in_app_rules = h.in_app.current_rules().await.unwrap();
    assert_eq!(in_app_rules.len(), 2 * EVENT_HISTORY_RULES_PER_CARD);
    assert!(in_app_rules
        .iter()
        .all(|r| r.consequence_schema == ConsequenceSchema::EventHistoryOperation));
    assert_eq!(
        consequence_ids(&in_app_rules[..3]),
        vec![
            "card-consequence-1#qualify",
            "card-consequence-1#display",
            "card-consequence-1#disqualify"
        ]
    );

    let card_rules = h.cards.current_rules().await.unwrap();
    assert_eq!(
        consequence_ids(&card_rules),
        vec!["card-consequence-1", "card-consequence-2"]
    );
    let cards = h.messaging.content_cards(&Surface::new(CARDS)).await;
    assert_eq!(cards[0].unique_id, "card-prop-1");
    assert_eq!(cards[1].unique_id, "card-prop-2");
}

// ── Replacement semantics ───────────────────────────────────────────────────

#[tokio::test]
async fn repeated_batches_replace_rules() {
    let h = harness(None);
    run_batch(&h, &[APP], vec![fixture("in_app.json")]).await;
    run_batch(&h, &[APP], vec![fixture("in_app.json")]).await;

    let calls = h.in_app.calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].len(), 3);
    assert_eq!(calls[1].len(), 3);
    assert_eq!(h.messaging.persisted_propositions().await[&Surface::new(APP)].len(), 3);
}

#[tokio::test]
async fn dropped_surface_rules_leave_engine() {
    let h = harness(None);
    run_batch(&h, &[APP], vec![fixture("in_app.json")]).await;
    run_batch(&h, &[APP, HOME], vec![fixture("code_based.json")]).await;

    let calls = h.in_app.calls().await;
    assert_eq!(calls.len(), 2);
    assert!(calls[1].is_empty());
    assert!(h.cards.calls().await.is_empty());
    assert!(h.messaging.persisted_propositions().await.is_empty());
    assert_eq!(h.sink.received().await.len(), 1);
}

#[tokio::test]
async fn dropping_cards_keeps_other_surface_rules() {
    let h = harness(None);
    run_batch(&h, &[APP, CARDS], vec![fixture("mixed.json")]).await;
    run_batch(&h, &[CARDS], vec![]).await;

    let rules = h.in_app.current_rules().await.unwrap();
    assert_eq!(consequence_ids(&rules), vec!["iam-consequence-1"]);
    assert_eq!(h.cards.current_rules().await, Some(Vec::new()));
}

#[tokio::test]
async fn concurrent_completions_leave_engine_on_last_merge() {
    let h = harness(None);
    let in_app = fixture("in_app.json");
    let mut ids = Vec::new();
    for payload in [in_app.clone(), in_app[..1].to_vec()] {
        let id = h
            .messaging
            .update_propositions_for_surfaces(&surfaces(&[APP]))
            .await
            .unwrap();
        h.messaging
            .handle_fragment_event(&json!({"requestEventId": id, "payload": payload}))
            .await;
        ids.push(id);
    }

    let (a, b) = tokio::join!(
        h.messaging.handle_completion(CompletionSignal { request_id: ids[0].clone() }),
        h.messaging.handle_completion(CompletionSignal { request_id: ids[1].clone() }),
    );
    assert!(a.is_some() && b.is_some());

    let retained = h.messaging.snapshot().await.in_app_rules;
    assert_eq!(h.in_app.current_rules().await, Some(retained.clone()));
    let persisted = h.messaging.persisted_propositions().await;
    assert_eq!(persisted[&Surface::new(APP)].len(), retained.len());
}

#[tokio::test]
async fn rule_order_ignores_arrival_order() {
    let in_app = fixture("in_app.json");
    let orders: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    for order in orders {
        let h = harness(None);
        // One proposition per fragment, in the permuted order.
        let fragments = order.iter().map(|&i| vec![in_app[i].clone()]).collect();
        run_batch(&h, &[APP], fragments).await;

        let rules = h.in_app.current_rules().await.unwrap();
        assert_eq!(
            consequence_ids(&rules),
            vec!["iam-consequence-1", "iam-consequence-2", "iam-consequence-3"],
            "order {order:?}"
        );
    }
}

#[tokio::test]
async fn empty_batch_is_silent() {
    let h = harness(None);
    let id = h
        .messaging
        .update_propositions_for_surfaces(&surfaces(&[APP]))
        .await
        .unwrap();
    let report = h
        .messaging
        .handle_completion(CompletionSignal { request_id: id })
        .await
        .unwrap();

    assert_eq!(report.propositions, 0);
    assert_eq!(report.dispatched, DispatchSummary::default());
    assert!(h.in_app.calls().await.is_empty());
    assert!(h.cards.calls().await.is_empty());
    assert!(h.sink.received().await.is_empty());
}

#[tokio::test]
async fn ruleset_without_rules_is_silent() {
    let h = harness(None);
    let payload = json!([{
        "id": "empty-ruleset",
        "scope": APP,
        "scopeDetails": {"rank": 0},
        "items": [{"id": "rs-1", "schema": SCHEMA_RULESET_ITEM, "data": {"version": 1}}]
    }]);
    run_batch(&h, &[APP], vec![payload.as_array().unwrap().clone()]).await;

    assert!(h.in_app.calls().await.is_empty());
    assert!(h.cards.calls().await.is_empty());
    assert!(h.sink.received().await.is_empty());
}

#[tokio::test]
async fn unknown_ids_are_ignored() {
    let h = harness(None);
    assert!(
        !h.messaging
            .handle_fragment_event(&json!({"requestEventId": "nope", "payload": fixture("in_app.json")}))
            .await
    );
    assert!(!h.messaging.handle_fragment_event(&json!({"payload": []})).await);
    assert!(h
        .messaging
        .handle_completion_event(&json!({"endingEventId": "nope"}))
        .await
        .is_none());
    assert!(h.messaging.handle_completion_event(&json!({})).await.is_none());
    assert!(h.in_app.calls().await.is_empty());
}

#[tokio::test]
async fn invalid_surfaces_issue_no_request() {
    let h = harness(None);
    assert!(h
        .messaging
        .update_propositions_for_surfaces(&surfaces(&["", "not a uri"]))
        .await
        .is_none());
    assert!(h.messaging.update_propositions_for_surfaces(&[]).await.is_some());
}

#[tokio::test]
async fn request_ids_are_unique() {
    let h = harness(None);
    let a = h.messaging.update_propositions_for_surfaces(&[]).await.unwrap();
    let b = h.messaging.update_propositions_for_surfaces(&[]).await.unwrap();
    assert_ne!(a, b);
    assert_eq!(h.messaging.snapshot().await.pending_requests, 2);
}

// ── Durable cache ───────────────────────────────────────────────────────────

#[tokio::test]
async fn cache_file_deleted_when_store_empties() {
    let dir = tempfile::tempdir().unwrap();
    let cache: Arc<dyn PropositionCache> = Arc::new(FileCache::new(dir.path()));
    let h = harness(Some(cache));
    let file = dir.path().join(PROPOSITIONS_KEY);

    run_batch(&h, &[APP], vec![fixture("in_app.json")]).await;
    assert!(file.exists());

    run_batch(&h, &[APP], vec![]).await;
    assert!(!file.exists());
    assert!(h.messaging.persisted_propositions().await.is_empty());
    assert_eq!(h.in_app.calls().await.len(), 2);
    assert_eq!(h.in_app.current_rules().await, Some(Vec::new()));
}

#[tokio::test]
async fn cached_propositions_restore_rules() {
    let cache: Arc<dyn PropositionCache> = Arc::new(MemoryCache::new());
    let first = harness(Some(cache.clone()));
    run_batch(&first, &[APP], vec![fixture("in_app.json")]).await;

    let second = harness(Some(cache));
    let summary = second.messaging.load_cached_propositions().await;
    assert_eq!(summary.in_app_rules, Some(3));
    assert_eq!(summary.notified, None);
    assert_eq!(
        second.in_app.current_rules().await,
        first.in_app.current_rules().await
    );
    assert_eq!(
        second.messaging.persisted_propositions().await,
        first.messaging.persisted_propositions().await
    );
    assert!(second.messaging.proposition_info("iam-consequence-2").await.is_some());
}

#[tokio::test]
async fn nothing_cached_loads_nothing() {
    let h = harness(Some(Arc::new(MemoryCache::new())));
    assert_eq!(
        h.messaging.load_cached_propositions().await,
        DispatchSummary::default()
    );
    assert!(h.in_app.calls().await.is_empty());
}

#[tokio::test]
async fn clearing_surfaces_empties_stores_and_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache: Arc<dyn PropositionCache> = Arc::new(FileCache::new(dir.path()));
    let h = harness(Some(cache));
    run_batch(&h, &[APP, CARDS, HOME, INBOX], vec![fixture("mixed.json")]).await;

    h.messaging.clear_surfaces(&surfaces(&[APP, CARDS])).await;

    assert!(!dir.path().join(PROPOSITIONS_KEY).exists());
    assert!(h.messaging.content_cards(&Surface::new(CARDS)).await.is_empty());
    assert!(h.messaging.proposition_info("iam-consequence-1").await.is_none());
    assert_eq!(h.messaging.inbox(&Surface::new(INBOX)).await.len(), 1);
    let snapshot = h.messaging.snapshot().await;
    assert!(snapshot.in_app_rules.is_empty());
    assert!(snapshot.card_rules.is_empty());
    assert_eq!(h.in_app.current_rules().await, Some(Vec::new()));
    assert_eq!(h.cards.current_rules().await, Some(Vec::new()));
}

#[tokio::test]
async fn clearing_unruled_surface_leaves_engines_alone() {
    let h = harness(None);
    run_batch(&h, &[APP, CARDS, HOME, INBOX], vec![fixture("mixed.json")]).await;

    let summary = h.messaging.clear_surfaces(&surfaces(&[HOME, INBOX])).await;
    assert_eq!(summary, DispatchSummary::default());
    assert_eq!(h.in_app.calls().await.len(), 1);
    assert_eq!(h.cards.calls().await.len(), 1);
    assert!(h.messaging.inbox(&Surface::new(INBOX)).await.is_empty());
}

// ── Tracking ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn interaction_xdm_uses_stored_info() {
    let h = harness(None);
    run_batch(&h, &[APP], vec![fixture("in_app.json")]).await;

    let xdm = h
        .messaging
        .interaction_xdm(EdgeEventType::Interact, Some("ok"), "iam-consequence-2", &[])
        .await
        .unwrap();
    let decisioning = &xdm["_experience"]["decisioning"];
    assert_eq!(xdm["eventType"], "decisioning.propositionInteract");
    assert_eq!(decisioning["propositions"][0]["id"], "iam-prop-2");
    assert_eq!(decisioning["propositionAction"]["label"], "ok");

    assert!(h
        .messaging
        .interaction_xdm(EdgeEventType::Display, None, "missing", &[])
        .await
        .is_none());
}
