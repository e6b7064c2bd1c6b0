//! Compiled rule types handed to the rule-evaluation engines.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use inbound_interchange::SchemaType;

/// Consequence type used by legacy in-app message rules.
pub const LEGACY_IN_APP_CONSEQUENCE: &str = "cjmiam";
/// Consequence type for schema-tagged consequences.
pub const SCHEMA_CONSEQUENCE: &str = "schema";

/// The content category a compiled rule's consequence produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsequenceSchema {
    InApp,
    ContentCard,
    EventHistoryOperation,
}

impl ConsequenceSchema {
    /// Map a consequence's detail schema onto a category. Other schemas
    /// have no engine to run them and are dropped by the compiler.
    pub fn from_schema(schema: SchemaType) -> Option<ConsequenceSchema> {
        match schema {
            SchemaType::InApp => Some(ConsequenceSchema::InApp),
            SchemaType::ContentCard | SchemaType::Feed => Some(ConsequenceSchema::ContentCard),
            SchemaType::EventHistoryOperation => Some(ConsequenceSchema::EventHistoryOperation),
            _ => None,
        }
    }
}

/// What a rule does when its condition holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConsequence {
    pub id: String,
    #[serde(rename = "type")]
    pub consequence_type: String,
    pub detail: Value,
}

impl RuleConsequence {
    pub fn detail_schema(&self) -> SchemaType {
        self.detail
            .get("schema")
            .and_then(Value::as_str)
            .map(SchemaType::classify)
            .unwrap_or(SchemaType::Unknown)
    }

    pub fn detail_data(&self) -> Option<&Value> {
        self.detail.get("data")
    }
}

/// A condition/consequence pair ready for an evaluation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledRule {
    /// Opaque condition tree; only the engine interprets it.
    pub condition: Value,
    pub consequence: RuleConsequence,
    pub consequence_schema: ConsequenceSchema,
}

impl CompiledRule {
    pub fn consequence_id(&self) -> &str {
        &self.consequence.id
    }

    /// The rule in the engine's document form: `{condition, consequences}`.
    pub fn to_engine_json(&self) -> Value {
        json!({
            "condition": self.condition,
            "consequences": [self.consequence],
        })
    }
}
