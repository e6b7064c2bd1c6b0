//! Owned reconciliation state shared by every request.
//!
//! Each store sits behind its own lock. Parsing happens before any lock is
//! taken, and a write lock is held only while one store merges, so a reader
//! sees a store either before or after a batch, never halfway. Writers are
//! ordered by the caller; see [`crate::messaging::Messaging`].

use std::collections::{HashMap, HashSet};

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use inbound_interchange::{Proposition, PropositionInfo, Surface};
use inbound_rules::{CompiledRule, ConsequenceSchema};

use crate::correlator::{CompletedBatch, RequestCorrelator};
use crate::dispatch::DispatchPlan;
use crate::parser::{parse, ParsedPropositions};
use crate::reconciler::{DurableSurfaceStore, SurfaceStore};

const ALL_SCHEMAS: [ConsequenceSchema; 3] = [
    ConsequenceSchema::InApp,
    ConsequenceSchema::ContentCard,
    ConsequenceSchema::EventHistoryOperation,
];

/// Content cards and inbox containers share one lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardStores {
    pub cards: SurfaceStore<Proposition>,
    pub inbox: SurfaceStore<Proposition>,
}

// ── RuleGeneration ──────────────────────────────────────────────────────────

/// The rules currently retained for each engine, plus tracking records.
#[derive(Debug, Clone, Default)]
pub struct RuleGeneration {
    by_schema: HashMap<ConsequenceSchema, SurfaceStore<CompiledRule>>,
    info: HashMap<String, PropositionInfo>,
}

impl RuleGeneration {
    /// Merge a parsed batch and work out which engines need a replace.
    ///
    /// An engine is replaced when the batch produced rules for it or when
    /// the merge dropped a surface that held some of its rules.
    fn merge(&mut self, requested: &HashSet<Surface>, parsed: &ParsedPropositions) -> DispatchPlan {
        let empty = HashMap::new();
        let mut removed = HashMap::new();
        for schema in ALL_SCHEMAS {
            let batch = parsed.rules_for(schema).unwrap_or(&empty);
            let outcome = self
                .by_schema
                .entry(schema)
                .or_default()
                .merge(requested, batch);
            removed.insert(schema, outcome.removed);
        }

        self.info
            .retain(|_, info| !requested.contains(&Surface::new(info.scope.as_str())));
        self.info.extend(
            parsed
                .proposition_info
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let touched = |schema: ConsequenceSchema| parsed.rule_count(schema) + removed[&schema] > 0;
        self.plan(
            touched(ConsequenceSchema::InApp) || touched(ConsequenceSchema::EventHistoryOperation),
            touched(ConsequenceSchema::ContentCard),
        )
    }

    /// Drop the given surfaces and plan a replace for every engine that
    /// lost rules.
    fn remove_surfaces(&mut self, surfaces: &HashSet<Surface>) -> DispatchPlan {
        let mut removed = HashMap::new();
        for schema in ALL_SCHEMAS {
            let count = self
                .by_schema
                .get_mut(&schema)
                .map(|store| store.remove_surfaces(surfaces))
                .unwrap_or(0);
            removed.insert(schema, count);
        }
        self.info
            .retain(|_, info| !surfaces.contains(&Surface::new(info.scope.as_str())));

        self.plan(
            removed[&ConsequenceSchema::InApp] + removed[&ConsequenceSchema::EventHistoryOperation]
                > 0,
            removed[&ConsequenceSchema::ContentCard] > 0,
        )
    }

    fn plan(&self, in_app: bool, cards: bool) -> DispatchPlan {
        DispatchPlan {
            in_app_rules: in_app.then(|| self.in_app_rules()),
            card_rules: cards.then(|| self.card_rules()),
            code_based: Vec::new(),
        }
    }

    fn rules(&self, schema: ConsequenceSchema) -> Vec<CompiledRule> {
        self.by_schema
            .get(&schema)
            .map(SurfaceStore::flatten)
            .unwrap_or_default()
    }

    /// In-app rules followed by event-history rules.
    pub fn in_app_rules(&self) -> Vec<CompiledRule> {
        let mut rules = self.rules(ConsequenceSchema::InApp);
        rules.extend(self.rules(ConsequenceSchema::EventHistoryOperation));
        rules
    }

    pub fn card_rules(&self) -> Vec<CompiledRule> {
        self.rules(ConsequenceSchema::ContentCard)
    }

    pub fn info(&self, id: &str) -> Option<&PropositionInfo> {
        self.info.get(id)
    }
}

// ── ReconciliationState ─────────────────────────────────────────────────────

/// A point-in-time copy of every store.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub persisted: SurfaceStore<Proposition>,
    pub code_based: SurfaceStore<Proposition>,
    pub cards: SurfaceStore<Proposition>,
    pub inbox: SurfaceStore<Proposition>,
    pub in_app_rules: Vec<CompiledRule>,
    pub card_rules: Vec<CompiledRule>,
    pub pending_requests: usize,
}

pub struct ReconciliationState {
    correlator: Mutex<RequestCorrelator>,
    in_app: DurableSurfaceStore,
    code_based: RwLock<SurfaceStore<Proposition>>,
    cards: RwLock<CardStores>,
    rules: RwLock<RuleGeneration>,
}

impl ReconciliationState {
    pub fn new(in_app: DurableSurfaceStore) -> Self {
        Self {
            correlator: Mutex::new(RequestCorrelator::new()),
            in_app,
            code_based: RwLock::new(SurfaceStore::new()),
            cards: RwLock::new(CardStores::default()),
            rules: RwLock::new(RuleGeneration::default()),
        }
    }

    // ── Correlation ─────────────────────────────────────────────────────────

    pub async fn register(&self, request_id: &str, surfaces: HashSet<Surface>) -> bool {
        self.correlator.lock().await.register(request_id, surfaces)
    }

    pub async fn append_fragment(&self, request_id: &str, payload: Vec<Proposition>) -> bool {
        self.correlator
            .lock()
            .await
            .append_fragment(request_id, payload)
    }

    pub async fn complete(&self, request_id: &str) -> Option<CompletedBatch> {
        self.correlator.lock().await.complete(request_id)
    }

    // ── Reconciliation ──────────────────────────────────────────────────────

    /// Merge a parsed batch into every store and plan what to dispatch.
    pub async fn reconcile(
        &self,
        requested: &HashSet<Surface>,
        parsed: &ParsedPropositions,
    ) -> DispatchPlan {
        self.in_app
            .merge(requested, &parsed.propositions_to_persist)
            .await;
        self.code_based
            .write()
            .await
            .merge(requested, &parsed.propositions_to_cache);
        {
            let mut cards = self.cards.write().await;
            cards.cards.merge(requested, &parsed.cards_to_cache);
            cards.inbox.merge(requested, &parsed.inbox_to_cache);
        }
        let mut plan = self.rules.write().await.merge(requested, parsed);
        plan.code_based = parsed.code_based_propositions();
        plan
    }

    /// Load the durable in-app snapshot and rebuild its rules.
    ///
    /// The returned plan carries no code-based content.
    pub async fn hydrate(&self) -> DispatchPlan {
        if self.in_app.hydrate().await == 0 {
            return DispatchPlan::default();
        }
        let persisted = self.in_app.snapshot().await;
        let surfaces: HashSet<Surface> = persisted.surfaces().into_iter().collect();
        let parsed = parse(&persisted.flatten(), &surfaces);
        debug!(surfaces = surfaces.len(), "rebuilding rules from cached propositions");
        self.rules.write().await.merge(&surfaces, &parsed)
    }

    /// Forget the given surfaces everywhere, including the durable cache.
    ///
    /// The plan replaces every engine that lost rules.
    pub async fn clear(&self, surfaces: &HashSet<Surface>) -> DispatchPlan {
        self.in_app.remove_surfaces(surfaces).await;
        self.code_based.write().await.remove_surfaces(surfaces);
        {
            let mut cards = self.cards.write().await;
            cards.cards.remove_surfaces(surfaces);
            cards.inbox.remove_surfaces(surfaces);
        }
        self.rules.write().await.remove_surfaces(surfaces)
    }

    // ── Readers ─────────────────────────────────────────────────────────────

    pub async fn code_based(&self, surfaces: &[Surface]) -> HashMap<Surface, Vec<Proposition>> {
        let store = self.code_based.read().await;
        surfaces
            .iter()
            .filter(|s| store.contains(s))
            .map(|s| (s.clone(), store.get(s).to_vec()))
            .collect()
    }

    pub async fn content_cards(&self, surface: &Surface) -> Vec<Proposition> {
        self.cards.read().await.cards.get(surface).to_vec()
    }

    pub async fn inbox(&self, surface: &Surface) -> Vec<Proposition> {
        self.cards.read().await.inbox.get(surface).to_vec()
    }

    pub async fn persisted(&self) -> SurfaceStore<Proposition> {
        self.in_app.snapshot().await
    }

    pub async fn proposition_info(&self, id: &str) -> Option<PropositionInfo> {
        self.rules.read().await.info(id).cloned()
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        let persisted = self.in_app.snapshot().await;
        let code_based = self.code_based.read().await.clone();
        let cards = self.cards.read().await.clone();
        let (in_app_rules, card_rules) = {
            let rules = self.rules.read().await;
            (rules.in_app_rules(), rules.card_rules())
        };
        StateSnapshot {
            persisted,
            code_based,
            cards: cards.cards,
            inbox: cards.inbox,
            in_app_rules,
            card_rules,
            pending_requests: self.correlator.lock().await.pending_count(),
        }
    }
}
