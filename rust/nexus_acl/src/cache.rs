//! Process-wide cache of resolved permission masks, keyed by (start, end)
//! node pair.
//!
//! Each entry remembers which node/relationship ids and relationship types
//! the resolution looked at. Two reverse indices map a participant back to
//! the entries that recorded it, so a mutation removes exactly those entries
//! instead of scanning the whole map.
//!
//! Concurrency: entries and both indices are sharded `DashMap`s. Concurrent
//! resolutions of the same pair may both compute and both write; the last
//! `put` wins. No guard on one map is held while another map is touched.

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashSet;
use dashmap::DashMap;
use serde::Serialize;

use crate::config::DEFAULT_MAX_ENTRIES;
use crate::graph::Relationship;
use crate::mask::PermissionResolutionMask;

type Index = DashMap<String, AHashSet<String>, ahash::RandomState>;

/// One memoized path. `mask` stays `None` while a resolution walk is still
/// recording participants.
#[derive(Debug, Clone, Default)]
struct CacheEntry {
    mask: Option<PermissionResolutionMask>,
    participant_node_ids: AHashSet<String>,
    participant_rel_types: AHashSet<String>,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub tracked_ids: usize,
    pub tracked_rel_types: usize,
    pub max_entries: usize,
}

pub struct AccessPathCache {
    entries: DashMap<String, CacheEntry, ahash::RandomState>,
    /// participant id → keys of entries that recorded it
    all_uuids: Index,
    /// relationship type → keys of entries that recorded it
    all_rel_types: Index,
    /// Bumped on every invalidation.
    generation: AtomicU64,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for AccessPathCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

/// Deterministic, order-significant key for a (start, end) pair.
fn cache_key(start: &str, end: &str) -> String {
    let mut key = String::with_capacity(start.len() + end.len() + 1);
    key.push_str(start);
    key.push(':');
    key.push_str(end);
    key
}

fn register(index: &Index, participant: &str, key: &str) {
    index
        .entry(participant.to_string())
        .or_default()
        .insert(key.to_string());
}

fn unregister(index: &Index, participant: &str, key: &str) {
    if let Some(mut keys) = index.get_mut(participant) {
        keys.remove(key);
    }
    index.remove_if(participant, |_, keys| keys.is_empty());
}

impl AccessPathCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::with_hasher(ahash::RandomState::new()),
            all_uuids: DashMap::with_hasher(ahash::RandomState::new()),
            all_rel_types: DashMap::with_hasher(ahash::RandomState::new()),
            generation: AtomicU64::new(0),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Copy of the memoized mask for the pair, if any.
    pub fn get(&self, start: &str, end: &str) -> Option<PermissionResolutionMask> {
        let mask = self
            .entries
            .get(&cache_key(start, end))
            .and_then(|entry| entry.mask.as_ref().map(PermissionResolutionMask::copy));
        match mask {
            Some(mask) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(start, end, "access path cache hit");
                Some(mask)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(start, end, "access path cache miss");
                None
            }
        }
    }

    /// Store `mask` for the pair, keeping any participants already recorded.
    pub fn put(&self, start: &str, end: &str, mask: PermissionResolutionMask) {
        let key = cache_key(start, end);
        if !self.entries.contains_key(&key) {
            self.evict_if_full();
        }
        {
            let mut entry = self.entries.entry(key.clone()).or_default();
            entry.mask = Some(mask);
            entry.participant_node_ids.insert(start.to_string());
            entry.participant_node_ids.insert(end.to_string());
        }
        register(&self.all_uuids, start, &key);
        register(&self.all_uuids, end, &key);
    }

    /// Like [`put`](Self::put), but only if no invalidation happened since
    /// `generation` was read. Returns whether the mask was kept.
    ///
    /// A resolution walk reads the generation before it starts; a mutation
    /// that lands mid-walk then cannot leave its stale result behind.
    pub fn put_if_unchanged(
        &self,
        start: &str,
        end: &str,
        mask: PermissionResolutionMask,
        generation: u64,
    ) -> bool {
        let key = cache_key(start, end);
        if self.generation() != generation {
            self.discard_pending(&key);
            return false;
        }
        self.put(start, end, mask);
        if self.generation() != generation {
            // An invalidation raced the write and may have missed it.
            self.remove_entry(&key);
            return false;
        }
        true
    }

    /// Record `node` as a participant of the pair's resolution.
    pub fn update_node(&self, start: &str, end: &str, node: &str) {
        let key = cache_key(start, end);
        {
            let mut entry = self.entries.entry(key.clone()).or_default();
            entry.participant_node_ids.insert(node.to_string());
        }
        register(&self.all_uuids, node, &key);
    }

    /// Record `rel` (its id and its type) as a participant of the pair's
    /// resolution.
    pub fn update_relationship(&self, start: &str, end: &str, rel: &Relationship) {
        let key = cache_key(start, end);
        {
            let mut entry = self.entries.entry(key.clone()).or_default();
            entry.participant_node_ids.insert(rel.id.clone());
            entry
                .participant_rel_types
                .insert(rel.type_name().to_string());
        }
        register(&self.all_uuids, &rel.id, &key);
        register(&self.all_rel_types, rel.type_name(), &key);
    }

    /// Drop every entry whose resolution involved `uuid`.
    pub fn invalidate_for_id(&self, uuid: &str) -> usize {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let Some((_, keys)) = self.all_uuids.remove(uuid) else {
            return 0;
        };
        let removed = keys.iter().filter(|key| self.remove_entry(key)).count();
        if removed > 0 {
            tracing::debug!(uuid, removed, "invalidated access paths for id");
        }
        removed
    }

    /// Drop every entry whose resolution crossed a relationship of `rel_type`.
    pub fn invalidate_for_relationship_type(&self, rel_type: &str) -> usize {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let Some((_, keys)) = self.all_rel_types.remove(rel_type) else {
            return 0;
        };
        let removed = keys.iter().filter(|key| self.remove_entry(key)).count();
        if removed > 0 {
            tracing::debug!(rel_type, removed, "invalidated access paths for type");
        }
        removed
    }

    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
        self.all_uuids.clear();
        self.all_rel_types.clear();
        tracing::debug!("invalidated all access paths");
    }

    /// Hook for a property write on a node or relationship.
    pub fn on_element_changed(&self, id: &str) {
        self.invalidate_for_id(id);
    }

    /// Hook for a relationship being created or deleted.
    pub fn on_relationship_changed(&self, rel: &Relationship) {
        self.invalidate_for_id(&rel.source);
        self.invalidate_for_id(&rel.target);
        self.invalidate_for_id(&rel.id);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Participants recorded for the pair: (node and relationship ids,
    /// relationship types).
    pub fn participants(
        &self,
        start: &str,
        end: &str,
    ) -> Option<(AHashSet<String>, AHashSet<String>)> {
        self.entries.get(&cache_key(start, end)).map(|entry| {
            (
                entry.participant_node_ids.clone(),
                entry.participant_rel_types.clone(),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entries: self.entries.len(),
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            tracked_ids: self.all_uuids.len(),
            tracked_rel_types: self.all_rel_types.len(),
            max_entries: self.max_entries,
        }
    }

    fn remove_entry(&self, key: &str) -> bool {
        let Some((_, entry)) = self.entries.remove(key) else {
            return false;
        };
        self.unregister_entry(key, &entry);
        true
    }

    fn unregister_entry(&self, key: &str, entry: &CacheEntry) {
        for id in &entry.participant_node_ids {
            unregister(&self.all_uuids, id, key);
        }
        for rel_type in &entry.participant_rel_types {
            unregister(&self.all_rel_types, rel_type, key);
        }
    }

    /// Drop participants recorded by a walk whose result was not stored.
    fn discard_pending(&self, key: &str) {
        if let Some((_, entry)) = self.entries.remove_if(key, |_, entry| entry.mask.is_none()) {
            self.unregister_entry(key, &entry);
        }
    }

    /// DashMap has no ordering, so eviction drops an arbitrary ~10% slice.
    fn evict_if_full(&self) {
        if self.entries.len() < self.max_entries {
            return;
        }
        let to_remove = (self.max_entries / 10).max(1);
        let keys: Vec<String> = self
            .entries
            .iter()
            .take(to_remove)
            .map(|entry| entry.key().clone())
            .collect();
        let evicted = keys.iter().filter(|key| self.remove_entry(key)).count();
        tracing::debug!(evicted, "access path cache at capacity");
    }
}
