//! Ruleset compilation.
//!
//! A `ruleset-item` carries a rule-language document:
//!
//! ```json
//! {"version": 1, "rules": [{"condition": {...}, "consequences": [{"id", "type", "detail"}]}]}
//! ```
//!
//! Each (condition, consequence) pair becomes one [`CompiledRule`] tagged
//! with the category of its consequence. Anything that cannot be compiled
//! contributes nothing; compilation never fails.

use serde_json::Value;
use tracing::trace;

use inbound_interchange::views::{ContentCardView, EventHistoryOperationView, InAppView};
use inbound_interchange::{PropositionItem, SchemaType};

use crate::types::{
    CompiledRule, ConsequenceSchema, RuleConsequence, LEGACY_IN_APP_CONSEQUENCE,
    SCHEMA_CONSEQUENCE,
};

/// Compile a `ruleset-item` into engine rules.
///
/// Items with another schema, or without a `rules` array, yield nothing.
pub fn compile_ruleset(item: &PropositionItem) -> Vec<CompiledRule> {
    if item.schema != SchemaType::Ruleset {
        return Vec::new();
    }
    match item.item_data.get("rules").and_then(Value::as_array) {
        Some(rules) => compile_rules(rules),
        None => {
            trace!(item = %item.item_id, "ruleset item has no rules");
            Vec::new()
        }
    }
}

/// Compile a list of rule documents.
pub fn compile_rules(rules: &[Value]) -> Vec<CompiledRule> {
    let mut compiled = Vec::new();
    for rule in rules {
        let Some(condition) = rule.get("condition").filter(|c| c.is_object()) else {
            trace!("skipping rule without a condition");
            continue;
        };
        let Some(consequences) = rule.get("consequences").and_then(Value::as_array) else {
            trace!("skipping rule without consequences");
            continue;
        };
        for consequence in consequences {
            if let Some(c) = compile_consequence(condition, consequence) {
                compiled.push(c);
            }
        }
    }
    compiled
}

fn compile_consequence(condition: &Value, consequence: &Value) -> Option<CompiledRule> {
    let id = consequence.get("id").and_then(Value::as_str)?;
    let consequence_type = consequence
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or(SCHEMA_CONSEQUENCE);
    let detail = consequence.get("detail").filter(|d| d.is_object())?;

    let consequence = RuleConsequence {
        id: id.to_string(),
        consequence_type: consequence_type.to_string(),
        detail: detail.clone(),
    };

    let schema = if consequence_type == LEGACY_IN_APP_CONSEQUENCE {
        Some(ConsequenceSchema::InApp)
    } else {
        ConsequenceSchema::from_schema(consequence.detail_schema())
    };
    let Some(consequence_schema) = schema else {
        trace!(consequence = %id, "dropping consequence with unrecognized schema");
        return None;
    };

    if consequence_type != LEGACY_IN_APP_CONSEQUENCE
        && !payload_is_usable(&consequence, consequence_schema)
    {
        trace!(consequence = %id, "dropping consequence with malformed payload");
        return None;
    }

    Some(CompiledRule {
        condition: condition.clone(),
        consequence,
        consequence_schema,
    })
}

fn payload_is_usable(consequence: &RuleConsequence, schema: ConsequenceSchema) -> bool {
    let Some(data) = consequence.detail_data() else {
        return false;
    };
    match schema {
        ConsequenceSchema::InApp => InAppView::from_data(data).is_some(),
        ConsequenceSchema::ContentCard => ContentCardView::from_data(data).is_some(),
        ConsequenceSchema::EventHistoryOperation => {
            EventHistoryOperationView::from_data(data).is_some()
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
