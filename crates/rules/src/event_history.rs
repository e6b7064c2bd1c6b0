//! Synthetic event-history rules for content cards.
//!
//! Every content-card proposition is shadowed by exactly
//! [`EVENT_HISTORY_RULES_PER_CARD`] rules that record its lifecycle in
//! event history:
//!
//! 1. qualify: fires on the card's own condition
//! 2. display: fires when the card is reported as displayed
//! 3. disqualify: fires when the card is reported as dismissed
//!
//! The in-app engine runs them alongside in-app rules.

use serde_json::{json, Value};

use inbound_interchange::interaction::{HISTORY_KEY_EVENT_TYPE, HISTORY_KEY_MESSAGE_ID};
use inbound_interchange::schema::SCHEMA_EVENT_HISTORY_OPERATION;

use crate::types::{CompiledRule, ConsequenceSchema, RuleConsequence, SCHEMA_CONSEQUENCE};

pub const EVENT_HISTORY_RULES_PER_CARD: usize = 3;

pub const OPERATION_INSERT: &str = "insert";
pub const OPERATION_INSERT_IF_NOT_EXISTS: &str = "insertIfNotExists";

const MESSAGING_EVENT_TYPE: &str = "com.adobe.eventType.messaging";
const REQUEST_CONTENT_SOURCE: &str = "com.adobe.eventSource.requestContent";

/// Build the event-history rules shadowing one content card.
///
/// `activity_id` identifies the card in event history; when the
/// proposition has none, the card's consequence id is used.
pub fn event_history_rules_for_card(
    card: &CompiledRule,
    activity_id: Option<&str>,
) -> [CompiledRule; EVENT_HISTORY_RULES_PER_CARD] {
    let card_id = card.consequence_id();
    let message_id = activity_id.unwrap_or(card_id);

    [
        history_rule(
            card.condition.clone(),
            format!("{}#qualify", card_id),
            OPERATION_INSERT_IF_NOT_EXISTS,
            "qualify",
            message_id,
        ),
        history_rule(
            interaction_condition("display", message_id),
            format!("{}#display", card_id),
            OPERATION_INSERT_IF_NOT_EXISTS,
            "display",
            message_id,
        ),
        history_rule(
            interaction_condition("dismiss", message_id),
            format!("{}#disqualify", card_id),
            OPERATION_INSERT,
            "disqualify",
            message_id,
        ),
    ]
}

fn history_rule(
    condition: Value,
    id: String,
    operation: &str,
    event_type: &str,
    message_id: &str,
) -> CompiledRule {
    let detail = json!({
        "id": id,
        "schema": SCHEMA_EVENT_HISTORY_OPERATION,
        "data": {
            "operation": operation,
            "content": {
                HISTORY_KEY_EVENT_TYPE: event_type,
                HISTORY_KEY_MESSAGE_ID: message_id,
            }
        }
    });
    CompiledRule {
        condition,
        consequence: RuleConsequence {
            id,
            consequence_type: SCHEMA_CONSEQUENCE.to_string(),
            detail,
        },
        consequence_schema: ConsequenceSchema::EventHistoryOperation,
    }
}

/// Matches a messaging interaction event of `event_type` for `message_id`.
fn interaction_condition(event_type: &str, message_id: &str) -> Value {
    json!({
        "type": "group",
        "definition": {
            "logic": "and",
            "conditions": [
                matcher("~type", MESSAGING_EVENT_TYPE),
                matcher("~source", REQUEST_CONTENT_SOURCE),
                matcher(HISTORY_KEY_EVENT_TYPE, event_type),
                matcher(HISTORY_KEY_MESSAGE_ID, message_id),
            ]
        }
    })
}

fn matcher(key: &str, value: &str) -> Value {
    json!({
        "type": "matcher",
        "definition": {"key": key, "matcher": "eq", "values": [value]}
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use inbound_interchange::views::EventHistoryOperationView;

    fn card() -> CompiledRule {
        CompiledRule {
            condition: json!({"type": "matcher", "definition": {"key": "k", "matcher": "ex"}}),
            consequence: RuleConsequence {
                id: "card-1".to_string(),
                consequence_type: "schema".to_string(),
                detail: json!({}),
            },
            consequence_schema: ConsequenceSchema::ContentCard,
        }
    }

    #[test]
    fn exactly_three_rules() {
        let rules = event_history_rules_for_card(&card(), Some("act-1"));
        assert_eq!(rules.len(), EVENT_HISTORY_RULES_PER_CARD);
        assert!(rules
            .iter()
            .all(|r| r.consequence_schema == ConsequenceSchema::EventHistoryOperation));
    }

    #[test]
    fn qualify_reuses_card_condition() {
        let c = card();
        let rules = event_history_rules_for_card(&c, Some("act-1"));
        assert_eq!(rules[0].condition, c.condition);
        assert_ne!(rules[1].condition, c.condition);
    }

    #[test]
    fn operations_and_event_types() {
        let rules = event_history_rules_for_card(&card(), Some("act-1"));
        let views: Vec<_> = rules
            .iter()
            .map(|r| EventHistoryOperationView::from_data(r.consequence.detail_data().unwrap()).unwrap())
            .collect();
        assert_eq!(views[0].operation, OPERATION_INSERT_IF_NOT_EXISTS);
        assert_eq!(views[0].event_type, Some("qualify"));
        assert_eq!(views[1].operation, OPERATION_INSERT_IF_NOT_EXISTS);
        assert_eq!(views[1].event_type, Some("display"));
        assert_eq!(views[2].operation, OPERATION_INSERT);
        assert_eq!(views[2].event_type, Some("disqualify"));
        assert!(views.iter().all(|v| v.message_id == Some("act-1")));
    }

    #[test]
    fn falls_back_to_card_id() {
        let rules = event_history_rules_for_card(&card(), None);
        let view = EventHistoryOperationView::from_data(rules[2].consequence.detail_data().unwrap())
            .unwrap();
        assert_eq!(view.message_id, Some("card-1"));
    }

    #[test]
    fn ids_are_deterministic() {
        let a = event_history_rules_for_card(&card(), Some("act-1"));
        let b = event_history_rules_for_card(&card(), Some("act-1"));
        assert_eq!(a, b);
        assert_eq!(a[0].consequence_id(), "card-1#qualify");
        assert_eq!(a[1].consequence_id(), "card-1#display");
        assert_eq!(a[2].consequence_id(), "card-1#disqualify");
    }
}
