//! Binds streamed decision fragments to the request that asked for them.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use inbound_interchange::{Proposition, Surface};

/// An outstanding request: its surfaces and everything received so far.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub request_id: String,
    pub expected_surfaces: HashSet<Surface>,
    /// Propositions from every fragment so far, in arrival order.
    pub fragments: Vec<Proposition>,
    pub fragment_count: usize,
}

/// Everything a request received, handed over once its stream ends.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedBatch {
    pub request_id: String,
    pub requested_surfaces: HashSet<Surface>,
    /// Propositions in fragment arrival order.
    pub propositions: Vec<Proposition>,
}

#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: HashMap<String, RequestRecord>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a request. Returns `true` when an earlier record with
    /// the same id was superseded; its fragments are discarded.
    pub fn register(&mut self, request_id: &str, surfaces: HashSet<Surface>) -> bool {
        let superseded = self
            .pending
            .insert(
                request_id.to_string(),
                RequestRecord {
                    request_id: request_id.to_string(),
                    expected_surfaces: surfaces,
                    fragments: Vec::new(),
                    fragment_count: 0,
                },
            )
            .is_some();
        if superseded {
            debug!(request_id, "request superseded by re-registration");
        }
        superseded
    }

    /// Append a fragment's propositions. Returns `false` for an unknown id.
    pub fn append_fragment(&mut self, request_id: &str, payload: Vec<Proposition>) -> bool {
        match self.pending.get_mut(request_id) {
            Some(record) => {
                record.fragment_count += 1;
                record.fragments.extend(payload);
                true
            }
            None => {
                debug!(request_id, "dropping fragment for unknown request");
                false
            }
        }
    }

    /// Close a request and hand over its batch.
    pub fn complete(&mut self, request_id: &str) -> Option<CompletedBatch> {
        let Some(record) = self.pending.remove(request_id) else {
            debug!(request_id, "ignoring completion for unknown request");
            return None;
        };
        debug!(
            request_id,
            fragments = record.fragment_count,
            propositions = record.fragments.len(),
            "request completed"
        );
        Some(CompletedBatch {
            request_id: record.request_id,
            requested_surfaces: record.expected_surfaces,
            propositions: record.fragments,
        })
    }

    pub fn get(&self, request_id: &str) -> Option<&RequestRecord> {
        self.pending.get(request_id)
    }

    /// Number of requests still waiting for completion.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
