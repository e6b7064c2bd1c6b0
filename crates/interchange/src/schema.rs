//! Schema classification for proposition items.
//!
//! Every item declares its content schema as a URI. [`SchemaType::classify`]
//! maps that URI onto a closed set of processing branches; anything not
//! recognized becomes [`SchemaType::Unknown`] and is dropped downstream.

use std::fmt;

use serde::{Deserialize, Serialize};

const SCHEMA_BASE: &str = "https://ns.adobe.com/personalization/";

pub const SCHEMA_RULESET_ITEM: &str = "https://ns.adobe.com/personalization/ruleset-item";
pub const SCHEMA_HTML_CONTENT: &str = "https://ns.adobe.com/personalization/html-content-item";
pub const SCHEMA_JSON_CONTENT: &str = "https://ns.adobe.com/personalization/json-content-item";
pub const SCHEMA_DEFAULT_CONTENT: &str =
    "https://ns.adobe.com/personalization/default-content-item";
pub const SCHEMA_CONTAINER_ITEM: &str = "https://ns.adobe.com/personalization/container-item";
pub const SCHEMA_FEED_ITEM: &str = "https://ns.adobe.com/personalization/message/feed-item";
pub const SCHEMA_CONTENT_CARD: &str = "https://ns.adobe.com/personalization/message/content-card";
pub const SCHEMA_IN_APP: &str = "https://ns.adobe.com/personalization/message/in-app";
pub const SCHEMA_EVENT_HISTORY_OPERATION: &str =
    "https://ns.adobe.com/personalization/eventHistoryOperation";
pub const SCHEMA_NATIVE_ALERT: &str = "https://ns.adobe.com/personalization/message/native-alert";

/// Processing branch for a proposition item or rule consequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SchemaType {
    Ruleset,
    HtmlContent,
    JsonContent,
    DefaultContent,
    ContainerItem,
    Feed,
    ContentCard,
    InApp,
    EventHistoryOperation,
    NativeAlert,
    Unknown,
}

impl SchemaType {
    /// Map a declared schema URI onto a processing branch.
    pub fn classify(schema: &str) -> SchemaType {
        let Some(path) = schema.strip_prefix(SCHEMA_BASE) else {
            return SchemaType::Unknown;
        };
        match path {
            "ruleset-item" => SchemaType::Ruleset,
            "html-content-item" => SchemaType::HtmlContent,
            "json-content-item" => SchemaType::JsonContent,
            "default-content-item" => SchemaType::DefaultContent,
            "container-item" => SchemaType::ContainerItem,
            "message/feed-item" => SchemaType::Feed,
            "message/content-card" => SchemaType::ContentCard,
            "message/in-app" => SchemaType::InApp,
            "eventHistoryOperation" => SchemaType::EventHistoryOperation,
            "message/native-alert" => SchemaType::NativeAlert,
            _ => SchemaType::Unknown,
        }
    }

    /// The schema URI, or an empty string for `Unknown`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Ruleset => SCHEMA_RULESET_ITEM,
            SchemaType::HtmlContent => SCHEMA_HTML_CONTENT,
            SchemaType::JsonContent => SCHEMA_JSON_CONTENT,
            SchemaType::DefaultContent => SCHEMA_DEFAULT_CONTENT,
            SchemaType::ContainerItem => SCHEMA_CONTAINER_ITEM,
            SchemaType::Feed => SCHEMA_FEED_ITEM,
            SchemaType::ContentCard => SCHEMA_CONTENT_CARD,
            SchemaType::InApp => SCHEMA_IN_APP,
            SchemaType::EventHistoryOperation => SCHEMA_EVENT_HISTORY_OPERATION,
            SchemaType::NativeAlert => SCHEMA_NATIVE_ALERT,
            SchemaType::Unknown => "",
        }
    }

    /// Content consumed directly by callers, without rule evaluation.
    pub fn is_code_based(&self) -> bool {
        matches!(
            self,
            SchemaType::HtmlContent | SchemaType::JsonContent | SchemaType::DefaultContent
        )
    }
}

impl From<String> for SchemaType {
    fn from(s: String) -> Self {
        SchemaType::classify(&s)
    }
}

impl From<SchemaType> for String {
    fn from(s: SchemaType) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::Unknown => f.write_str("unknown"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_every_known_schema() {
        let cases = [
            (SCHEMA_RULESET_ITEM, SchemaType::Ruleset),
            (SCHEMA_HTML_CONTENT, SchemaType::HtmlContent),
            (SCHEMA_JSON_CONTENT, SchemaType::JsonContent),
            (SCHEMA_DEFAULT_CONTENT, SchemaType::DefaultContent),
            (SCHEMA_CONTAINER_ITEM, SchemaType::ContainerItem),
            (SCHEMA_FEED_ITEM, SchemaType::Feed),
            (SCHEMA_CONTENT_CARD, SchemaType::ContentCard),
            (SCHEMA_IN_APP, SchemaType::InApp),
            (SCHEMA_EVENT_HISTORY_OPERATION, SchemaType::EventHistoryOperation),
            (SCHEMA_NATIVE_ALERT, SchemaType::NativeAlert),
        ];
        for (uri, expected) in cases {
            assert_eq!(SchemaType::classify(uri), expected, "{}", uri);
            assert_eq!(expected.as_str(), uri);
        }
    }

    #[test]
    fn unrecognized_schemas_are_unknown() {
        assert_eq!(SchemaType::classify(""), SchemaType::Unknown);
        assert_eq!(SchemaType::classify("ruleset-item"), SchemaType::Unknown);
        assert_eq!(
            SchemaType::classify("https://ns.adobe.com/personalization/message/carousel"),
            SchemaType::Unknown
        );
        assert_eq!(
            SchemaType::classify("https://example.com/personalization/ruleset-item"),
            SchemaType::Unknown
        );
    }

    #[test]
    fn code_based_branches() {
        assert!(SchemaType::HtmlContent.is_code_based());
        assert!(SchemaType::JsonContent.is_code_based());
        assert!(SchemaType::DefaultContent.is_code_based());
        assert!(!SchemaType::Ruleset.is_code_based());
        assert!(!SchemaType::ContainerItem.is_code_based());
    }

    #[test]
    fn serde_uses_schema_uri() {
        let json = serde_json::to_value(SchemaType::InApp).unwrap();
        assert_eq!(json, serde_json::json!(SCHEMA_IN_APP));
        let back: SchemaType = serde_json::from_value(json).unwrap();
        assert_eq!(back, SchemaType::InApp);
        let unknown: SchemaType = serde_json::from_value(serde_json::json!("nope")).unwrap();
        assert_eq!(unknown, SchemaType::Unknown);
    }
}
