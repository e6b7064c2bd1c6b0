//! Hands reconciled results to the rule engines and to listeners.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use inbound_interchange::Proposition;
use inbound_rules::{CompiledRule, RulesEngine};

/// Code-based propositions delivered by one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropositionsNotification {
    pub propositions: Vec<Proposition>,
}

impl PropositionsNotification {
    /// Event data shape: `{"propositions": [PropositionJSON]}`.
    pub fn to_event_data(&self) -> Value {
        json!({ "propositions": self.propositions })
    }
}

/// Receives notifications about newly delivered code-based content.
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn notify(&self, notification: PropositionsNotification);
}

/// Sink that keeps every notification it receives.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    received: Mutex<Vec<PropositionsNotification>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn received(&self) -> Vec<PropositionsNotification> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, notification: PropositionsNotification) {
        self.received.lock().await.push(notification);
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────────────

/// What a batch sends out. `None` means the target is left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchPlan {
    pub in_app_rules: Option<Vec<CompiledRule>>,
    pub card_rules: Option<Vec<CompiledRule>>,
    pub code_based: Vec<Proposition>,
}

impl DispatchPlan {
    pub fn is_empty(&self) -> bool {
        self.in_app_rules.is_none() && self.card_rules.is_none() && self.code_based.is_empty()
    }
}

/// Counts of what a dispatch actually sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// Rules passed to the in-app engine, if it was called.
    pub in_app_rules: Option<usize>,
    pub card_rules: Option<usize>,
    /// Propositions in the notification, if one was emitted.
    pub notified: Option<usize>,
}

pub struct Dispatcher {
    in_app: Arc<dyn RulesEngine>,
    cards: Arc<dyn RulesEngine>,
    notifications: Arc<dyn NotificationSink>,
}

impl Dispatcher {
    pub fn new(
        in_app: Arc<dyn RulesEngine>,
        cards: Arc<dyn RulesEngine>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            in_app,
            cards,
            notifications,
        }
    }

    /// At most one replace per engine and one notification per call.
    pub async fn dispatch(&self, plan: DispatchPlan) -> DispatchSummary {
        if plan.is_empty() {
            debug!("nothing to dispatch");
            return DispatchSummary::default();
        }

        let mut summary = DispatchSummary::default();
        if let Some(rules) = plan.in_app_rules {
            summary.in_app_rules = Some(rules.len());
            replace(self.in_app.as_ref(), rules).await;
        }
        if let Some(rules) = plan.card_rules {
            summary.card_rules = Some(rules.len());
            replace(self.cards.as_ref(), rules).await;
        }
        if !plan.code_based.is_empty() {
            summary.notified = Some(plan.code_based.len());
            debug!(count = plan.code_based.len(), "notifying code-based propositions");
            self.notifications
                .notify(PropositionsNotification {
                    propositions: plan.code_based,
                })
                .await;
        }
        summary
    }
}

async fn replace(engine: &dyn RulesEngine, rules: Vec<CompiledRule>) {
    info!(engine = engine.name(), rules = rules.len(), "replacing engine rules");
    engine.replace_rules(rules).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use inbound_rules::{ConsequenceSchema, RecordingRulesEngine, RuleConsequence};
    use serde_json::Map;

    fn rule(id: &str) -> CompiledRule {
        CompiledRule {
            condition: json!({}),
            consequence: RuleConsequence {
                id: id.to_string(),
                consequence_type: "schema".to_string(),
                detail: json!({}),
            },
            consequence_schema: ConsequenceSchema::InApp,
        }
    }

    fn fixture() -> (
        Dispatcher,
        Arc<RecordingRulesEngine>,
        Arc<RecordingRulesEngine>,
        Arc<RecordingNotificationSink>,
    ) {
        let in_app = Arc::new(RecordingRulesEngine::new("in-app"));
        let cards = Arc::new(RecordingRulesEngine::new("content-cards"));
        let sink = Arc::new(RecordingNotificationSink::new());
        let dispatcher = Dispatcher::new(in_app.clone(), cards.clone(), sink.clone());
        (dispatcher, in_app, cards, sink)
    }

    #[tokio::test]
    async fn empty_plan_touches_nothing() {
        let (dispatcher, in_app, cards, sink) = fixture();
        let summary = dispatcher.dispatch(DispatchPlan::default()).await;
        assert_eq!(summary, DispatchSummary::default());
        assert!(in_app.calls().await.is_empty());
        assert!(cards.calls().await.is_empty());
        assert!(sink.received().await.is_empty());
    }

    #[tokio::test]
    async fn only_planned_targets_are_called() {
        let (dispatcher, in_app, cards, sink) = fixture();
        let summary = dispatcher
            .dispatch(DispatchPlan {
                in_app_rules: Some(vec![rule("a"), rule("b")]),
                card_rules: None,
                code_based: vec![Proposition::new("p", "a://1", Map::new(), Vec::new())],
            })
            .await;

        assert_eq!(summary.in_app_rules, Some(2));
        assert_eq!(summary.card_rules, None);
        assert_eq!(summary.notified, Some(1));
        assert_eq!(in_app.calls().await.len(), 1);
        assert!(cards.calls().await.is_empty());
        let received = sink.received().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].to_event_data()["propositions"][0]["id"], "p");
    }
}
