//! inbound-rules: compiles ruleset propositions into engine rules.
//!
//! The rule-condition language is opaque here: conditions are carried as
//! JSON and only the evaluation engines behind [`RulesEngine`] interpret
//! them. This crate decides which consequences are runnable, tags each
//! compiled rule with its content category, and derives the event-history
//! rules that shadow content cards.

pub mod compile;
pub mod engine;
pub mod event_history;
pub mod types;

pub use compile::{compile_rules, compile_ruleset};
pub use engine::{RecordingRulesEngine, RulesEngine};
pub use event_history::{event_history_rules_for_card, EVENT_HISTORY_RULES_PER_CARD};
pub use types::{CompiledRule, ConsequenceSchema, RuleConsequence};
