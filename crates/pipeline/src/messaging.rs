//! The entry point hosts talk to.
//!
//! [`Messaging`] issues request ids, routes fragments and completions into
//! the [`ReconciliationState`], and dispatches whatever a completed batch
//! produced. Nothing on the batch path returns an error: malformed input
//! and unknown ids are dropped with a debug log.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use inbound_interchange::{
    completion_from_event, fragment_from_event, CompletionSignal, DecisionFragment, EdgeEventType,
    Proposition, PropositionInfo, PropositionInteraction, Surface,
};
use inbound_rules::RulesEngine;
use inbound_storage::PropositionCache;

use crate::config::PipelineConfig;
use crate::dispatch::{DispatchSummary, Dispatcher, NotificationSink};
use crate::parser::parse;
use crate::reconciler::DurableSurfaceStore;
use crate::state::{ReconciliationState, StateSnapshot};

/// Outcome of one completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub request_id: String,
    pub propositions: usize,
    pub dispatched: DispatchSummary,
}

pub struct Messaging {
    app_id: String,
    state: ReconciliationState,
    dispatcher: Dispatcher,
    // Held from the first store merge until the engines have the result, so
    // engines and stores always agree on the last merged batch.
    apply: Mutex<()>,
}

impl Messaging {
    pub fn new(
        app_id: impl Into<String>,
        in_app_store: DurableSurfaceStore,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            state: ReconciliationState::new(in_app_store),
            dispatcher,
            apply: Mutex::new(()),
        }
    }

    /// Build from config, with an optional durable cache for in-app content.
    pub fn from_config(
        config: &PipelineConfig,
        cache: Option<Arc<dyn PropositionCache>>,
        in_app_engine: Arc<dyn RulesEngine>,
        card_engine: Arc<dyn RulesEngine>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::new(
            config.app_id.clone(),
            DurableSurfaceStore::new(cache, config.cache_key.clone()),
            Dispatcher::new(in_app_engine, card_engine, notifications),
        )
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Restore in-app propositions from the durable cache and hand their
    /// rules to the engines. Returns what was dispatched.
    pub async fn load_cached_propositions(&self) -> DispatchSummary {
        let _apply = self.apply.lock().await;
        let plan = self.state.hydrate().await;
        self.dispatcher.dispatch(plan).await
    }

    // ── Requests ────────────────────────────────────────────────────────────

    /// Register a fetch for `surfaces` and return its request id.
    ///
    /// Invalid surfaces are skipped. An empty list means the app's default
    /// surface. Returns `None` when every given surface was invalid.
    pub async fn update_propositions_for_surfaces(&self, surfaces: &[Surface]) -> Option<String> {
        let requested: HashSet<Surface> = if surfaces.is_empty() {
            HashSet::from([Surface::for_app(&self.app_id)])
        } else {
            surfaces
                .iter()
                .filter(|s| {
                    let valid = s.is_valid();
                    if !valid {
                        debug!(surface = %s, "skipping invalid surface");
                    }
                    valid
                })
                .cloned()
                .collect()
        };
        if requested.is_empty() {
            debug!("no valid surfaces requested, not issuing a request");
            return None;
        }

        let request_id = Uuid::new_v4().to_string();
        self.register_request(&request_id, requested).await;
        Some(request_id)
    }

    /// Track a request whose id was issued elsewhere.
    pub async fn register_request(&self, request_id: &str, surfaces: HashSet<Surface>) {
        debug!(request_id, surfaces = surfaces.len(), "registering request");
        self.state.register(request_id, surfaces).await;
    }

    pub async fn handle_fragment(&self, fragment: DecisionFragment) -> bool {
        self.state
            .append_fragment(&fragment.request_id, fragment.payload)
            .await
    }

    /// Route a raw `{requestEventId, payload}` event.
    pub async fn handle_fragment_event(&self, event: &Value) -> bool {
        match fragment_from_event(event) {
            Some(fragment) => self.handle_fragment(fragment).await,
            None => {
                debug!("ignoring fragment without a request id");
                false
            }
        }
    }

    /// Close a request, reconcile its batch and dispatch the result.
    pub async fn handle_completion(&self, signal: CompletionSignal) -> Option<BatchReport> {
        let batch = self.state.complete(&signal.request_id).await?;
        let propositions = batch.propositions.len();
        let parsed = parse(&batch.propositions, &batch.requested_surfaces);

        let dispatched = {
            let _apply = self.apply.lock().await;
            let plan = self.state.reconcile(&batch.requested_surfaces, &parsed).await;
            self.dispatcher.dispatch(plan).await
        };
        info!(
            request_id = %batch.request_id,
            propositions,
            in_app_rules = ?dispatched.in_app_rules,
            card_rules = ?dispatched.card_rules,
            notified = ?dispatched.notified,
            "batch reconciled"
        );
        Some(BatchReport {
            request_id: batch.request_id,
            propositions,
            dispatched,
        })
    }

    /// Route a raw `{endingEventId}` event.
    pub async fn handle_completion_event(&self, event: &Value) -> Option<BatchReport> {
        match completion_from_event(event) {
            Some(signal) => self.handle_completion(signal).await,
            None => {
                debug!("ignoring completion without a request id");
                None
            }
        }
    }

    /// Drop cached content for `surfaces` from every store and replace the
    /// rules of any engine that lost some.
    pub async fn clear_surfaces(&self, surfaces: &[Surface]) -> DispatchSummary {
        let surfaces: HashSet<Surface> = surfaces.iter().cloned().collect();
        info!(surfaces = surfaces.len(), "clearing surfaces");
        let _apply = self.apply.lock().await;
        let plan = self.state.clear(&surfaces).await;
        self.dispatcher.dispatch(plan).await
    }

    // ── Readers ─────────────────────────────────────────────────────────────

    /// Code-based propositions for the surfaces that have any.
    pub async fn propositions_for_surfaces(
        &self,
        surfaces: &[Surface],
    ) -> HashMap<Surface, Vec<Proposition>> {
        self.state.code_based(surfaces).await
    }

    /// Content cards for `surface`, in rank order.
    pub async fn content_cards(&self, surface: &Surface) -> Vec<Proposition> {
        self.state.content_cards(surface).await
    }

    pub async fn inbox(&self, surface: &Surface) -> Vec<Proposition> {
        self.state.inbox(surface).await
    }

    /// In-app propositions as held in the durable store.
    pub async fn persisted_propositions(&self) -> HashMap<Surface, Vec<Proposition>> {
        self.state.persisted().await.as_map().clone()
    }

    pub async fn proposition_info(&self, id: &str) -> Option<PropositionInfo> {
        self.state.proposition_info(id).await
    }

    /// Decisioning XDM for an interaction with a rule-delivered item.
    ///
    /// `id` is a ruleset item id or consequence id; `None` when unknown.
    pub async fn interaction_xdm(
        &self,
        event_type: EdgeEventType,
        interaction: Option<&str>,
        id: &str,
        tokens: &[String],
    ) -> Option<Value> {
        let info = self.proposition_info(id).await?;
        Some(PropositionInteraction::for_info(event_type, interaction, id, info, tokens).xdm())
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot().await
    }
}
