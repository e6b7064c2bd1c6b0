//! Splits a completed batch of propositions into per-category images.
//!
//! Parsing is pure: it reads the batch and the requested surfaces and
//! produces a [`ParsedPropositions`] value that the reconciler merges into
//! the stores. Running it twice on the same input yields equal output.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use inbound_interchange::views::{ContentCardView, HtmlContentView, JsonContentView};
use inbound_interchange::{Proposition, PropositionInfo, PropositionItem, SchemaType, Surface};
use inbound_rules::{compile_ruleset, event_history_rules_for_card, CompiledRule, ConsequenceSchema};

/// Compiled rules keyed by the surface they came from.
pub type SurfaceRules = HashMap<Surface, Vec<CompiledRule>>;

/// Propositions keyed by surface, in rank order within each surface.
pub type SurfacePropositions = HashMap<Surface, Vec<Proposition>>;

/// The per-category images of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPropositions {
    /// Tracking records keyed by ruleset item id and consequence id.
    pub proposition_info: HashMap<String, PropositionInfo>,
    /// Code-based propositions (html, json, default content).
    pub propositions_to_cache: SurfacePropositions,
    /// Propositions carrying in-app rules; these are written to the durable cache.
    pub propositions_to_persist: SurfacePropositions,
    pub cards_to_cache: SurfacePropositions,
    pub inbox_to_cache: SurfacePropositions,
    pub surface_rules: HashMap<ConsequenceSchema, SurfaceRules>,
}

impl ParsedPropositions {
    pub fn rules_for(&self, schema: ConsequenceSchema) -> Option<&SurfaceRules> {
        self.surface_rules.get(&schema)
    }

    /// Total rules of `schema` across all surfaces.
    pub fn rule_count(&self, schema: ConsequenceSchema) -> usize {
        self.rules_for(schema)
            .map(|by_surface| by_surface.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn has_rules(&self) -> bool {
        self.surface_rules
            .values()
            .any(|by_surface| by_surface.values().any(|rules| !rules.is_empty()))
    }

    /// Code-based propositions flattened in surface-URI order.
    pub fn code_based_propositions(&self) -> Vec<Proposition> {
        flatten(&self.propositions_to_cache)
    }

    /// Nothing in the batch survived parsing.
    pub fn is_empty(&self) -> bool {
        !self.has_rules()
            && self.propositions_to_cache.is_empty()
            && self.propositions_to_persist.is_empty()
            && self.cards_to_cache.is_empty()
            && self.inbox_to_cache.is_empty()
    }

    fn push_rule(&mut self, schema: ConsequenceSchema, surface: &Surface, rule: CompiledRule) {
        self.surface_rules
            .entry(schema)
            .or_default()
            .entry(surface.clone())
            .or_default()
            .push(rule);
    }
}

/// Concatenate per-surface lists in surface-URI order.
pub fn flatten<T: Clone>(by_surface: &HashMap<Surface, Vec<T>>) -> Vec<T> {
    let mut surfaces: Vec<&Surface> = by_surface.keys().collect();
    surfaces.sort();
    surfaces
        .into_iter()
        .flat_map(|s| by_surface[s].iter().cloned())
        .collect()
}

// ── Parsing ─────────────────────────────────────────────────────────────────

/// Which images a single proposition lands in.
#[derive(Default)]
struct Placement {
    persist: bool,
    code_based: bool,
    card: bool,
    inbox: bool,
}

/// Parse a batch against the surfaces it was requested for.
pub fn parse(propositions: &[Proposition], requested: &HashSet<Surface>) -> ParsedPropositions {
    let mut in_scope: Vec<&Proposition> = propositions
        .iter()
        .filter(|p| {
            let wanted = requested.contains(&p.surface());
            if !wanted {
                debug!(
                    proposition = %p.unique_id,
                    scope = %p.scope,
                    "ignoring proposition for unrequested surface"
                );
            }
            wanted
        })
        .collect();
    in_scope.sort_by_key(|p| p.rank());

    let mut parsed = ParsedPropositions::default();
    for proposition in in_scope {
        let surface = proposition.surface();
        let mut placement = Placement::default();
        for item in &proposition.items {
            place_item(&mut parsed, &mut placement, proposition, &surface, item);
        }

        if placement.persist {
            push(&mut parsed.propositions_to_persist, &surface, proposition);
        }
        if placement.code_based {
            push(&mut parsed.propositions_to_cache, &surface, proposition);
        }
        if placement.card {
            push(&mut parsed.cards_to_cache, &surface, proposition);
        }
        if placement.inbox {
            push(&mut parsed.inbox_to_cache, &surface, proposition);
        }
    }

    debug!(
        in_app = parsed.rule_count(ConsequenceSchema::InApp),
        cards = parsed.rule_count(ConsequenceSchema::ContentCard),
        event_history = parsed.rule_count(ConsequenceSchema::EventHistoryOperation),
        code_based = parsed.propositions_to_cache.len(),
        "parsed batch"
    );
    parsed
}

fn place_item(
    parsed: &mut ParsedPropositions,
    placement: &mut Placement,
    proposition: &Proposition,
    surface: &Surface,
    item: &PropositionItem,
) {
    match item.schema {
        SchemaType::Ruleset => place_ruleset(parsed, placement, proposition, surface, item),
        SchemaType::HtmlContent if HtmlContentView::from_item(item).is_some() => {
            placement.code_based = true;
        }
        SchemaType::JsonContent if JsonContentView::from_item(item).is_some() => {
            placement.code_based = true;
        }
        SchemaType::DefaultContent => placement.code_based = true,
        SchemaType::ContainerItem if item.item_data.is_object() => placement.inbox = true,
        SchemaType::Feed | SchemaType::ContentCard
            if ContentCardView::from_data(&item.item_data).is_some() =>
        {
            placement.card = true;
        }
        _ => {
            trace!(
                proposition = %proposition.unique_id,
                item = %item.item_id,
                schema = %item.schema,
                "dropping item"
            );
        }
    }
}

fn place_ruleset(
    parsed: &mut ParsedPropositions,
    placement: &mut Placement,
    proposition: &Proposition,
    surface: &Surface,
    item: &PropositionItem,
) {
    let rules = compile_ruleset(item);
    if rules.is_empty() {
        trace!(item = %item.item_id, "ruleset compiled to no rules");
        return;
    }

    let info = PropositionInfo::from_proposition(proposition);
    parsed
        .proposition_info
        .insert(item.item_id.clone(), info.clone());

    for rule in rules {
        parsed
            .proposition_info
            .insert(rule.consequence_id().to_string(), info.clone());

        match rule.consequence_schema {
            ConsequenceSchema::InApp => {
                placement.persist = true;
                parsed.push_rule(ConsequenceSchema::InApp, surface, rule);
            }
            ConsequenceSchema::ContentCard => {
                // One set of history rules per card proposition.
                if !placement.card {
                    for history in event_history_rules_for_card(&rule, proposition.activity_id()) {
                        parsed.push_rule(ConsequenceSchema::EventHistoryOperation, surface, history);
                    }
                }
                placement.card = true;
                parsed.push_rule(ConsequenceSchema::ContentCard, surface, rule);
            }
            ConsequenceSchema::EventHistoryOperation => {
                parsed.push_rule(ConsequenceSchema::EventHistoryOperation, surface, rule);
            }
        }
    }
}

fn push(image: &mut SurfacePropositions, surface: &Surface, proposition: &Proposition) {
    image
        .entry(surface.clone())
        .or_default()
        .push(proposition.clone());
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
