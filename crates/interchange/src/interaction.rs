//! Interaction telemetry for displayed propositions.
//!
//! Builds the decisioning XDM sent to the edge when a user sees, taps or
//! dismisses content, and the event-history record written alongside it.

use serde_json::{json, Map, Value};

use crate::types::{Proposition, PropositionInfo, PropositionItem};

/// Proposition interaction kinds reported to the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeEventType {
    Display,
    Interact,
    Dismiss,
    Trigger,
}

impl EdgeEventType {
    /// XDM `eventType` value.
    pub fn as_edge_str(&self) -> &'static str {
        match self {
            EdgeEventType::Display => "decisioning.propositionDisplay",
            EdgeEventType::Interact => "decisioning.propositionInteract",
            EdgeEventType::Dismiss => "decisioning.propositionDismiss",
            EdgeEventType::Trigger => "decisioning.propositionTrigger",
        }
    }

    /// Key under `propositionEventType`, also used in event history.
    pub fn proposition_event_type(&self) -> &'static str {
        match self {
            EdgeEventType::Display => "display",
            EdgeEventType::Interact => "interact",
            EdgeEventType::Dismiss => "dismiss",
            EdgeEventType::Trigger => "trigger",
        }
    }

    pub fn from_edge_str(s: &str) -> Option<EdgeEventType> {
        match s {
            "decisioning.propositionDisplay" => Some(EdgeEventType::Display),
            "decisioning.propositionInteract" => Some(EdgeEventType::Interact),
            "decisioning.propositionDismiss" => Some(EdgeEventType::Dismiss),
            "decisioning.propositionTrigger" => Some(EdgeEventType::Trigger),
            _ => None,
        }
    }
}

/// One user interaction with a proposition item.
#[derive(Debug, Clone, PartialEq)]
pub struct PropositionInteraction {
    pub event_type: EdgeEventType,
    /// Action label; only reported for `Interact`.
    pub interaction: Option<String>,
    pub proposition_info: PropositionInfo,
    pub item_id: String,
    pub tokens: Vec<String>,
}

impl PropositionInteraction {
    /// Build an interaction for an item of `proposition`.
    ///
    /// Returns `None` when the item is not linked to that proposition.
    pub fn for_item(
        event_type: EdgeEventType,
        interaction: Option<&str>,
        item: &PropositionItem,
        proposition: &Proposition,
        tokens: &[String],
    ) -> Option<Self> {
        if item.proposition_id() != Some(proposition.unique_id.as_str()) {
            return None;
        }
        Some(Self::for_info(
            event_type,
            interaction,
            &item.item_id,
            PropositionInfo::from_proposition(proposition),
            tokens,
        ))
    }

    /// Build an interaction from a tracking record, for content whose
    /// proposition is no longer held in memory.
    pub fn for_info(
        event_type: EdgeEventType,
        interaction: Option<&str>,
        item_id: &str,
        proposition_info: PropositionInfo,
        tokens: &[String],
    ) -> Self {
        Self {
            event_type,
            interaction: interaction.map(str::to_string),
            proposition_info,
            item_id: item_id.to_string(),
            tokens: tokens.to_vec(),
        }
    }

    /// The decisioning XDM map for this interaction.
    pub fn xdm(&self) -> Value {
        let mut item = Map::new();
        item.insert("id".to_string(), json!(self.item_id));
        if !self.tokens.is_empty() {
            item.insert(
                "characteristics".to_string(),
                json!({"tokens": self.tokens.join(",")}),
            );
        }

        let mut event_type = Map::new();
        event_type.insert(
            self.event_type.proposition_event_type().to_string(),
            json!(1),
        );

        let mut decisioning = Map::new();
        decisioning.insert("propositionEventType".to_string(), Value::Object(event_type));
        decisioning.insert(
            "propositions".to_string(),
            json!([{
                "id": self.proposition_info.id,
                "scope": self.proposition_info.scope,
                "scopeDetails": self.proposition_info.scope_details,
                "items": [Value::Object(item)]
            }]),
        );
        if self.event_type == EdgeEventType::Interact {
            let label = self.interaction.clone().unwrap_or_default();
            decisioning.insert(
                "propositionAction".to_string(),
                json!({"id": label, "label": label}),
            );
        }

        json!({
            "eventType": self.event_type.as_edge_str(),
            "_experience": {"decisioning": Value::Object(decisioning)}
        })
    }
}

// ── Event history ───────────────────────────────────────────────────

pub const HISTORY_KEY_EVENT_TYPE: &str = "iam.eventType";
pub const HISTORY_KEY_MESSAGE_ID: &str = "iam.id";
pub const HISTORY_KEY_ACTION: &str = "iam.action";

/// An event-history write: the data plus the flattened keys to hash.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryWrite {
    pub data: Value,
    pub mask: [&'static str; 3],
}

/// Build the history record for an interaction with an activity.
///
/// An empty activity id yields `None`.
pub fn history_write(
    activity_id: &str,
    event_type: EdgeEventType,
    interaction: Option<&str>,
) -> Option<HistoryWrite> {
    if activity_id.is_empty() {
        return None;
    }
    Some(HistoryWrite {
        data: json!({
            "iam": {
                "eventType": event_type.proposition_event_type(),
                "id": activity_id,
                "action": interaction.unwrap_or(""),
            }
        }),
        mask: [
            HISTORY_KEY_EVENT_TYPE,
            HISTORY_KEY_MESSAGE_ID,
            HISTORY_KEY_ACTION,
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaType;
    use serde_json::json;

    fn proposition() -> Proposition {
        let details = json!({"activity": {"id": "act-1"}, "correlationID": "c-1"});
        Proposition::new(
            "prop-1",
            "mobileapp://app/cards",
            details.as_object().cloned().unwrap_or_default(),
            vec![PropositionItem::new("item-1", SchemaType::Ruleset, json!({}))],
        )
    }

    #[test]
    fn display_xdm() {
        let p = proposition();
        let interaction =
            PropositionInteraction::for_item(EdgeEventType::Display, None, &p.items[0], &p, &[])
                .unwrap();
        let xdm = interaction.xdm();
        assert_eq!(xdm["eventType"], "decisioning.propositionDisplay");
        let decisioning = &xdm["_experience"]["decisioning"];
        assert_eq!(decisioning["propositionEventType"]["display"], 1);
        assert_eq!(decisioning["propositions"][0]["id"], "prop-1");
        assert_eq!(decisioning["propositions"][0]["scope"], "mobileapp://app/cards");
        assert_eq!(
            decisioning["propositions"][0]["scopeDetails"]["correlationID"],
            "c-1"
        );
        assert_eq!(decisioning["propositions"][0]["items"][0]["id"], "item-1");
        assert!(decisioning.get("propositionAction").is_none());
    }

    #[test]
    fn interact_xdm_carries_action_and_tokens() {
        let p = proposition();
        let tokens = vec!["a".to_string(), "b".to_string()];
        let xdm = PropositionInteraction::for_item(
            EdgeEventType::Interact,
            Some("buy"),
            &p.items[0],
            &p,
            &tokens,
        )
        .unwrap()
        .xdm();
        let decisioning = &xdm["_experience"]["decisioning"];
        assert_eq!(decisioning["propositionAction"], json!({"id": "buy", "label": "buy"}));
        assert_eq!(
            decisioning["propositions"][0]["items"][0]["characteristics"]["tokens"],
            "a,b"
        );
    }

    #[test]
    fn unlinked_item_cannot_be_tracked() {
        let p = proposition();
        let loose = PropositionItem::new("item-1", SchemaType::Ruleset, json!({}));
        assert!(
            PropositionInteraction::for_item(EdgeEventType::Display, None, &loose, &p, &[])
                .is_none()
        );
    }

    #[test]
    fn edge_event_type_round_trip() {
        for t in [
            EdgeEventType::Display,
            EdgeEventType::Interact,
            EdgeEventType::Dismiss,
            EdgeEventType::Trigger,
        ] {
            assert_eq!(EdgeEventType::from_edge_str(t.as_edge_str()), Some(t));
        }
        assert_eq!(EdgeEventType::from_edge_str("pushTracking.applicationOpened"), None);
    }

    #[test]
    fn history_write_requires_activity() {
        assert!(history_write("", EdgeEventType::Display, None).is_none());
        let write = history_write("act-1", EdgeEventType::Interact, Some("buy")).unwrap();
        assert_eq!(
            write.data,
            json!({"iam": {"eventType": "interact", "id": "act-1", "action": "buy"}})
        );
        assert_eq!(write.mask, ["iam.eventType", "iam.id", "iam.action"]);
    }
}
