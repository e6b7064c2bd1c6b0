//! inbound-interchange: proposition payload types and deserialization.
//!
//! Provides the value types shared by every stage of the pipeline
//! (Surface, Proposition, PropositionItem, PropositionInfo), the schema
//! classifier, typed payload views, and the interaction telemetry
//! builders. The pipeline consumes payloads through the tolerant
//! [`from_payload`] entry point; tools that want a precise diagnosis use
//! [`proposition_from_value`].

pub mod deserialize;
pub mod interaction;
pub mod schema;
pub mod types;
pub mod views;

pub use deserialize::{
    completion_from_event, fragment_from_event, from_payload, proposition_from_value,
    InterchangeError,
};
pub use interaction::{history_write, EdgeEventType, HistoryWrite, PropositionInteraction};
pub use schema::SchemaType;
pub use types::*;
