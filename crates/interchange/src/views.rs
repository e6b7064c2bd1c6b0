//! Schema-specific typed views over an item's opaque payload.
//!
//! Views are constructed on demand. A constructor returns `None` when the
//! item has a different schema or its payload lacks a required field.

use serde_json::{Map, Value};

use crate::schema::SchemaType;
use crate::types::PropositionItem;

/// MIME-like content type carried by message payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ApplicationJson,
    TextHtml,
    TextXml,
    TextPlain,
    Unknown,
}

impl ContentType {
    pub fn from_mime(s: &str) -> ContentType {
        match s {
            "application/json" => ContentType::ApplicationJson,
            "text/html" => ContentType::TextHtml,
            "text/xml" => ContentType::TextXml,
            "text/plain" => ContentType::TextPlain,
            _ => ContentType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::ApplicationJson => "application/json",
            ContentType::TextHtml => "text/html",
            ContentType::TextXml => "text/xml",
            ContentType::TextPlain => "text/plain",
            ContentType::Unknown => "",
        }
    }
}

/// A rule-language document embedded in a `ruleset-item`.
#[derive(Debug, Clone, PartialEq)]
pub struct RulesetView<'a> {
    pub version: i64,
    pub rules: &'a [Value],
}

impl<'a> RulesetView<'a> {
    /// Requires a `rules` array; `version` defaults to 1.
    pub fn from_item(item: &'a PropositionItem) -> Option<Self> {
        if item.schema != SchemaType::Ruleset {
            return None;
        }
        let rules = item.item_data.get("rules")?.as_array()?;
        let version = item
            .item_data
            .get("version")
            .and_then(Value::as_i64)
            .unwrap_or(1);
        Some(Self { version, rules })
    }
}

/// Code-based HTML content.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlContentView<'a> {
    pub content: &'a str,
    pub format: ContentType,
}

impl<'a> HtmlContentView<'a> {
    pub fn from_item(item: &'a PropositionItem) -> Option<Self> {
        if item.schema != SchemaType::HtmlContent {
            return None;
        }
        let content = item.item_data.get("content")?.as_str()?;
        let format = item
            .item_data
            .get("format")
            .and_then(Value::as_str)
            .map(ContentType::from_mime)
            .unwrap_or(ContentType::TextHtml);
        Some(Self { content, format })
    }
}

/// Code-based JSON content. The content is an object or array.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonContentView<'a> {
    pub content: &'a Value,
    pub format: ContentType,
}

impl<'a> JsonContentView<'a> {
    pub fn from_item(item: &'a PropositionItem) -> Option<Self> {
        if item.schema != SchemaType::JsonContent {
            return None;
        }
        let content = item.item_data.get("content")?;
        if !(content.is_object() || content.is_array()) {
            return None;
        }
        let format = item
            .item_data
            .get("format")
            .and_then(Value::as_str)
            .map(ContentType::from_mime)
            .unwrap_or(ContentType::ApplicationJson);
        Some(Self { content, format })
    }
}

/// Fields shared by in-app and content-card message payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageView<'a> {
    pub content: &'a Value,
    pub content_type: ContentType,
    pub published_date: Option<i64>,
    pub expiry_date: Option<i64>,
    pub meta: Option<&'a Map<String, Value>>,
}

impl<'a> MessageView<'a> {
    /// Parse a message payload (a rule consequence's `detail.data`).
    ///
    /// `application/json` content must be an object; other content types
    /// must carry a string.
    pub fn from_data(data: &'a Value) -> Option<Self> {
        let content_type = ContentType::from_mime(data.get("contentType")?.as_str()?);
        let content = data.get("content")?;
        let well_formed = match content_type {
            ContentType::ApplicationJson => content.is_object(),
            _ => content.is_string(),
        };
        if !well_formed {
            return None;
        }
        Some(Self {
            content,
            content_type,
            published_date: data.get("publishedDate").and_then(Value::as_i64),
            expiry_date: data.get("expiryDate").and_then(Value::as_i64),
            meta: data.get("meta").and_then(Value::as_object),
        })
    }
}

/// An in-app message payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InAppView<'a> {
    pub message: MessageView<'a>,
    pub mobile_parameters: Option<&'a Map<String, Value>>,
    pub web_parameters: Option<&'a Map<String, Value>>,
    pub remote_assets: Vec<&'a str>,
}

impl<'a> InAppView<'a> {
    pub fn from_data(data: &'a Value) -> Option<Self> {
        let message = MessageView::from_data(data)?;
        let remote_assets = data
            .get("remoteAssets")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        Some(Self {
            message,
            mobile_parameters: data.get("mobileParameters").and_then(Value::as_object),
            web_parameters: data.get("webParameters").and_then(Value::as_object),
            remote_assets,
        })
    }
}

/// A content-card payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentCardView<'a> {
    pub message: MessageView<'a>,
}

impl<'a> ContentCardView<'a> {
    pub fn from_data(data: &'a Value) -> Option<Self> {
        MessageView::from_data(data).map(|message| Self { message })
    }

    /// Card title, when the content is a JSON object carrying one.
    pub fn title(&self) -> Option<&'a str> {
        self.message
            .content
            .get("title")
            .and_then(|t| t.get("content").or(Some(t)))
            .and_then(Value::as_str)
    }
}

/// An event-history write or lookup request.
#[derive(Debug, Clone, PartialEq)]
pub struct EventHistoryOperationView<'a> {
    pub operation: &'a str,
    pub event_type: Option<&'a str>,
    pub message_id: Option<&'a str>,
}

impl<'a> EventHistoryOperationView<'a> {
    pub fn from_data(data: &'a Value) -> Option<Self> {
        let operation = data.get("operation")?.as_str()?;
        let content = data.get("content")?.as_object()?;
        Some(Self {
            operation,
            event_type: content.get("iam.eventType").and_then(Value::as_str),
            message_id: content.get("iam.id").and_then(Value::as_str),
        })
    }
}
