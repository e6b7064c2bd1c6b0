//! Typed structs representing the proposition payload JSON.
//!
//! Payload fields whose shape depends on the item schema are kept as
//! `serde_json::Value`; schema-specific views are built on demand in
//! [`crate::views`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::SchemaType;

/// URI scheme used for surfaces owned by a mobile application.
pub const MOBILE_APP_SCHEME: &str = "mobileapp://";

const PATH_SEPARATOR: char = '/';

// ── Surface ─────────────────────────────────────────────────────────

/// A logical content slot identified by an opaque URI.
///
/// Equality and hashing are by URI string only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Surface {
    uri: String,
}

impl Surface {
    /// Wrap an already-formed surface URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// The default surface for an application: `mobileapp://<app_id>`.
    pub fn for_app(app_id: &str) -> Self {
        Self {
            uri: format!("{}{}", MOBILE_APP_SCHEME, app_id),
        }
    }

    /// A surface under the application's default surface.
    ///
    /// An empty path yields an empty (invalid) surface.
    pub fn from_path(app_id: &str, path: &str) -> Self {
        if path.is_empty() {
            return Self { uri: String::new() };
        }
        let base = Self::for_app(app_id);
        Self {
            uri: format!(
                "{}{}{}",
                base.uri,
                PATH_SEPARATOR,
                path.trim_start_matches(PATH_SEPARATOR)
            ),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// A surface is valid when it carries a non-empty `scheme://rest` URI.
    pub fn is_valid(&self) -> bool {
        match self.uri.split_once("://") {
            Some((scheme, rest)) => {
                !scheme.is_empty()
                    && !rest.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                    && !rest.chars().any(char::is_whitespace)
            }
            None => false,
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl From<&str> for Surface {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

// ── Proposition ─────────────────────────────────────────────────────

/// Rank assumed when `scopeDetails.rank` is absent.
pub const DEFAULT_RANK: i64 = -1;
/// Priority assumed when `scopeDetails.activity.priority` is absent.
pub const DEFAULT_PRIORITY: i64 = 0;

/// One server-selected content decision for a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawProposition")]
pub struct Proposition {
    #[serde(rename = "id")]
    pub unique_id: String,
    /// URI of the surface this proposition targets.
    pub scope: String,
    #[serde(rename = "scopeDetails", default)]
    pub scope_details: Map<String, Value>,
    pub items: Vec<PropositionItem>,
}

#[derive(Deserialize)]
struct RawProposition {
    id: String,
    scope: String,
    #[serde(rename = "scopeDetails", default)]
    scope_details: Map<String, Value>,
    #[serde(default)]
    items: Vec<PropositionItem>,
}

impl From<RawProposition> for Proposition {
    fn from(raw: RawProposition) -> Self {
        Proposition::new(raw.id, raw.scope, raw.scope_details, raw.items)
    }
}

impl Proposition {
    /// Build a proposition and link every item back to it.
    pub fn new(
        unique_id: impl Into<String>,
        scope: impl Into<String>,
        scope_details: Map<String, Value>,
        items: Vec<PropositionItem>,
    ) -> Self {
        let unique_id = unique_id.into();
        let items = items
            .into_iter()
            .map(|mut item| {
                item.attach(&unique_id);
                item
            })
            .collect();
        Self {
            unique_id,
            scope: scope.into(),
            scope_details,
            items,
        }
    }

    pub fn surface(&self) -> Surface {
        Surface::new(self.scope.clone())
    }

    /// Server-assigned ordering key; lower sorts first.
    pub fn rank(&self) -> i64 {
        self.scope_details
            .get("rank")
            .and_then(whole_number)
            .unwrap_or(DEFAULT_RANK)
    }

    /// Activity priority. Carried for consumers, never used for ordering.
    pub fn priority(&self) -> i64 {
        self.activity()
            .and_then(|a| a.get("priority"))
            .and_then(whole_number)
            .unwrap_or(DEFAULT_PRIORITY)
    }

    /// The activity id from `scopeDetails.activity.id`, if any.
    pub fn activity_id(&self) -> Option<&str> {
        self.activity()
            .and_then(|a| a.get("id"))
            .and_then(Value::as_str)
    }

    fn activity(&self) -> Option<&Map<String, Value>> {
        self.scope_details.get("activity").and_then(Value::as_object)
    }
}

// ── PropositionItem ─────────────────────────────────────────────────

/// One payload variant within a proposition, tagged by schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropositionItem {
    #[serde(rename = "id")]
    pub item_id: String,
    pub schema: SchemaType,
    #[serde(rename = "data", default)]
    pub item_data: Value,
    /// Id of the owning proposition. Set once when the proposition is built.
    #[serde(skip)]
    proposition_id: Option<String>,
}

impl PropositionItem {
    pub fn new(item_id: impl Into<String>, schema: SchemaType, item_data: Value) -> Self {
        Self {
            item_id: item_id.into(),
            schema,
            item_data,
            proposition_id: None,
        }
    }

    /// Id of the owning proposition, if this item was built through one.
    pub fn proposition_id(&self) -> Option<&str> {
        self.proposition_id.as_deref()
    }

    fn attach(&mut self, proposition_id: &str) {
        if self.proposition_id.is_none() {
            self.proposition_id = Some(proposition_id.to_string());
        }
    }
}

// ── PropositionInfo ─────────────────────────────────────────────────

/// Lightweight tracking record attached to interaction telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropositionInfo {
    pub id: String,
    pub scope: String,
    #[serde(rename = "scopeDetails", default)]
    pub scope_details: Map<String, Value>,
}

impl PropositionInfo {
    pub fn from_proposition(proposition: &Proposition) -> Self {
        Self {
            id: proposition.unique_id.clone(),
            scope: proposition.scope.clone(),
            scope_details: proposition.scope_details.clone(),
        }
    }

    pub fn activity_id(&self) -> Option<&str> {
        self.scope_details
            .get("activity")
            .and_then(|a| a.get("id"))
            .and_then(Value::as_str)
    }
}

// ── Wire events ─────────────────────────────────────────────────────

/// A streamed personalization decision bound to an outstanding request.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionFragment {
    pub request_id: String,
    pub payload: Vec<Proposition>,
}

/// Marks the end of a request's response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSignal {
    pub request_id: String,
}

/// An integer, also accepting floats with no fractional part (`1.0`).
fn whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}
