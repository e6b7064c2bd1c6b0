//! Per-surface stores and the replace-per-requested-surface merge.
//!
//! A completed batch is authoritative for exactly the surfaces it was
//! requested for: each of those surfaces takes the batch's result, or is
//! removed when the batch has nothing for it. Surfaces outside the request
//! are never touched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use inbound_interchange::{from_payload, Proposition, Surface};
use inbound_storage::{CacheEntry, PropositionCache};

use crate::parser::flatten;

/// What a merge did to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub replaced: usize,
    pub removed: usize,
}

// ── SurfaceStore ────────────────────────────────────────────────────────────

/// Values of one category keyed by surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceStore<T> {
    entries: HashMap<Surface, Vec<T>>,
}

impl<T> Default for SurfaceStore<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Clone> SurfaceStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(entries: HashMap<Surface, Vec<T>>) -> Self {
        let entries = entries.into_iter().filter(|(_, v)| !v.is_empty()).collect();
        Self { entries }
    }

    /// Replace every requested surface with the batch's entry for it, or
    /// drop the surface when the batch has none.
    pub fn merge(
        &mut self,
        requested: &HashSet<Surface>,
        batch: &HashMap<Surface, Vec<T>>,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        for surface in requested {
            match batch.get(surface).filter(|v| !v.is_empty()) {
                Some(values) => {
                    self.entries.insert(surface.clone(), values.clone());
                    outcome.replaced += 1;
                }
                None => {
                    if self.entries.remove(surface).is_some() {
                        outcome.removed += 1;
                    }
                }
            }
        }
        outcome
    }

    /// Drop the given surfaces. Returns how many were present.
    pub fn remove_surfaces(&mut self, surfaces: &HashSet<Surface>) -> usize {
        surfaces
            .iter()
            .filter(|s| self.entries.remove(*s).is_some())
            .count()
    }

    pub fn get(&self, surface: &Surface) -> &[T] {
        self.entries.get(surface).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, surface: &Surface) -> bool {
        self.entries.contains_key(surface)
    }

    /// Surfaces held, in URI order.
    pub fn surfaces(&self) -> Vec<Surface> {
        let mut surfaces: Vec<Surface> = self.entries.keys().cloned().collect();
        surfaces.sort();
        surfaces
    }

    /// All values concatenated in surface-URI order.
    pub fn flatten(&self) -> Vec<T> {
        flatten(&self.entries)
    }

    pub fn as_map(&self) -> &HashMap<Surface, Vec<T>> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ── Snapshot encoding ───────────────────────────────────────────────────────

/// Encode a proposition store as `{surface_uri: [PropositionJSON]}`.
pub fn encode_snapshot(store: &SurfaceStore<Proposition>) -> Value {
    let mut map = Map::new();
    for surface in store.surfaces() {
        let props = store
            .get(&surface)
            .iter()
            .filter_map(|p| serde_json::to_value(p).ok())
            .collect();
        map.insert(surface.uri().to_string(), Value::Array(props));
    }
    Value::Object(map)
}

/// Decode a snapshot, skipping entries that do not parse.
pub fn decode_snapshot(data: &Value) -> SurfaceStore<Proposition> {
    let Some(map) = data.as_object() else {
        warn!("proposition snapshot is not an object, ignoring it");
        return SurfaceStore::new();
    };
    let entries = map
        .iter()
        .map(|(uri, props)| (Surface::new(uri.as_str()), from_payload(props)))
        .collect();
    SurfaceStore::from_map(entries)
}

// ── DurableSurfaceStore ─────────────────────────────────────────────────────

/// A proposition store mirrored to a [`PropositionCache`].
///
/// After every change the whole store is written under one key, or the key
/// is removed once the store is empty. Cache failures are logged; the
/// in-memory store stays authoritative.
pub struct DurableSurfaceStore {
    store: RwLock<SurfaceStore<Proposition>>,
    cache: Option<Arc<dyn PropositionCache>>,
    key: String,
    // Serializes cache writes so they land in merge order.
    writes: Mutex<()>,
}

impl DurableSurfaceStore {
    pub fn new(cache: Option<Arc<dyn PropositionCache>>, key: impl Into<String>) -> Self {
        Self {
            store: RwLock::new(SurfaceStore::new()),
            cache,
            key: key.into(),
            writes: Mutex::new(()),
        }
    }

    /// Replace the in-memory store with the cached snapshot, if any.
    /// Returns the number of surfaces loaded.
    pub async fn hydrate(&self) -> usize {
        let Some(cache) = &self.cache else {
            return 0;
        };
        let loaded = match cache.get(&self.key).await {
            Ok(Some(entry)) => decode_snapshot(&entry.data),
            Ok(None) => {
                debug!(key = %self.key, "no cached propositions");
                return 0;
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to read cached propositions");
                return 0;
            }
        };
        let count = loaded.len();
        *self.store.write().await = loaded;
        debug!(key = %self.key, surfaces = count, "hydrated propositions from cache");
        count
    }

    pub async fn merge(
        &self,
        requested: &HashSet<Surface>,
        batch: &HashMap<Surface, Vec<Proposition>>,
    ) -> MergeOutcome {
        let _writes = self.writes.lock().await;
        let (outcome, snapshot) = {
            let mut store = self.store.write().await;
            let outcome = store.merge(requested, batch);
            (outcome, store.clone())
        };
        self.persist(&snapshot).await;
        outcome
    }

    pub async fn remove_surfaces(&self, surfaces: &HashSet<Surface>) -> usize {
        let _writes = self.writes.lock().await;
        let (removed, snapshot) = {
            let mut store = self.store.write().await;
            let removed = store.remove_surfaces(surfaces);
            (removed, store.clone())
        };
        self.persist(&snapshot).await;
        removed
    }

    /// A copy of the current store.
    pub async fn snapshot(&self) -> SurfaceStore<Proposition> {
        self.store.read().await.clone()
    }

    async fn persist(&self, snapshot: &SurfaceStore<Proposition>) {
        let Some(cache) = &self.cache else {
            return;
        };
        let result = if snapshot.is_empty() {
            cache.remove(&self.key).await
        } else {
            cache
                .set(&self.key, CacheEntry::new(encode_snapshot(snapshot)))
                .await
        };
        match result {
            Ok(()) => debug!(
                key = %self.key,
                surfaces = snapshot.len(),
                "persisted propositions"
            ),
            Err(e) => warn!(key = %self.key, error = %e, "failed to persist propositions"),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
