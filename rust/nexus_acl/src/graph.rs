//! Storage collaborator seam and an in-memory implementation.
//!
//! The access layer only needs stable ids, property reads/writes and typed
//! incoming/outgoing relationships. Nodes and relationships share one id
//! namespace, so property access is keyed by element id.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::cache::AccessPathCache;
use crate::error::{AccessError, Result};

/// Handle to a directed, typed relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub source: String,
    pub target: String,
}

impl Relationship {
    pub fn type_name(&self) -> &str {
        &self.rel_type
    }

    /// The endpoint opposite to `node`, if `node` is one of the endpoints.
    pub fn other_end(&self, node: &str) -> Option<&str> {
        if self.source == node {
            Some(&self.target)
        } else if self.target == node {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// What the access layer needs from the graph storage engine.
pub trait GraphStore: Send + Sync {
    fn node_exists(&self, id: &str) -> bool;

    /// Whether `id` names a node or a relationship. Either may be a resource.
    fn element_exists(&self, id: &str) -> bool {
        self.node_exists(id) || self.relationship(id).is_some()
    }

    fn has_property(&self, id: &str, key: &str) -> bool {
        self.get_property(id, key).is_some()
    }

    fn get_property(&self, id: &str, key: &str) -> Option<Value>;

    fn set_property(&self, id: &str, key: &str, value: Value) -> Result<()>;

    fn relationship(&self, id: &str) -> Option<Relationship>;

    /// Relationships leaving `node`, optionally restricted to one type.
    fn outgoing(&self, node: &str, rel_type: Option<&str>) -> Vec<Relationship>;

    /// Relationships entering `node`, optionally restricted to one type.
    fn incoming(&self, node: &str, rel_type: Option<&str>) -> Vec<Relationship>;

    /// Endpoints may be nodes or relationships.
    fn create_relationship(&self, source: &str, target: &str, rel_type: &str)
        -> Result<Relationship>;

    fn delete_relationship(&self, rel: &Relationship) -> Result<()>;

    /// Boolean property with `false` for anything absent or non-boolean.
    fn flag(&self, id: &str, key: &str) -> bool {
        matches!(self.get_property(id, key), Some(Value::Bool(true)))
    }
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: AHashMap<String, AHashMap<String, Value>>,
    relationships: AHashMap<String, (Relationship, AHashMap<String, Value>)>,
    outgoing: AHashMap<String, Vec<String>>,
    incoming: AHashMap<String, Vec<String>>,
}

impl GraphState {
    fn collect(&self, ids: Option<&Vec<String>>, rel_type: Option<&str>) -> Vec<Relationship> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.relationships.get(id))
            .map(|(rel, _)| rel)
            .filter(|rel| rel_type.map_or(true, |t| rel.rel_type == t))
            .cloned()
            .collect()
    }

    fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id) || self.relationships.contains_key(id)
    }

    fn unlink(&mut self, rel: &Relationship) {
        if let Some(ids) = self.outgoing.get_mut(&rel.source) {
            ids.retain(|id| id != &rel.id);
        }
        if let Some(ids) = self.incoming.get_mut(&rel.target) {
            ids.retain(|id| id != &rel.id);
        }
    }

    /// Remove every relationship attached to `id`, then every relationship
    /// attached to those, and return what was removed.
    fn detach(&mut self, id: &str) -> Vec<Relationship> {
        let mut removed = Vec::new();
        let mut pending = vec![id.to_string()];
        while let Some(element) = pending.pop() {
            let mut rel_ids = self.outgoing.remove(&element).unwrap_or_default();
            rel_ids.extend(self.incoming.remove(&element).unwrap_or_default());
            for rel_id in rel_ids {
                if let Some((rel, _)) = self.relationships.remove(&rel_id) {
                    self.unlink(&rel);
                    pending.push(rel.id.clone());
                    removed.push(rel);
                }
            }
        }
        removed
    }
}

/// In-memory property graph.
///
/// When attached to an [`AccessPathCache`], every mutation invalidates the
/// cache entries that recorded the touched elements.
#[derive(Default)]
pub struct MemoryGraph {
    state: RwLock<GraphState>,
    cache: Option<Arc<AccessPathCache>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(cache: Arc<AccessPathCache>) -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            cache: Some(cache),
        }
    }

    /// Create a node with the given properties and return its id.
    pub fn create_node<I, K>(&self, properties: I) -> String
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let id = Uuid::new_v4().simple().to_string();
        let props = properties.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.state.write().nodes.insert(id.clone(), props);
        id
    }

    /// Delete a node together with every attached relationship.
    pub fn delete_node(&self, id: &str) -> Result<()> {
        let removed = {
            let mut state = self.state.write();
            if state.nodes.remove(id).is_none() {
                return Err(AccessError::NodeNotFound(id.to_string()));
            }
            state.detach(id)
        };
        if let Some(cache) = &self.cache {
            cache.invalidate_for_id(id);
        }
        self.notify_removed(&removed);
        Ok(())
    }

    fn notify_removed(&self, removed: &[Relationship]) {
        if let Some(cache) = &self.cache {
            for rel in removed {
                cache.on_relationship_changed(rel);
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.state.read().relationships.len()
    }
}

impl GraphStore for MemoryGraph {
    fn node_exists(&self, id: &str) -> bool {
        self.state.read().nodes.contains_key(id)
    }

    fn get_property(&self, id: &str, key: &str) -> Option<Value> {
        let state = self.state.read();
        match state.nodes.get(id) {
            Some(props) => props.get(key).cloned(),
            None => state
                .relationships
                .get(id)
                .and_then(|(_, props)| props.get(key).cloned()),
        }
    }

    fn set_property(&self, id: &str, key: &str, value: Value) -> Result<()> {
        {
            let mut state = self.state.write();
            let state = &mut *state;
            if let Some(props) = state.nodes.get_mut(id) {
                props.insert(key.to_string(), value);
            } else if let Some((_, props)) = state.relationships.get_mut(id) {
                props.insert(key.to_string(), value);
            } else {
                return Err(AccessError::ElementNotFound(id.to_string()));
            }
        }
        if let Some(cache) = &self.cache {
            cache.on_element_changed(id);
        }
        Ok(())
    }

    fn relationship(&self, id: &str) -> Option<Relationship> {
        self.state
            .read()
            .relationships
            .get(id)
            .map(|(rel, _)| rel.clone())
    }

    fn outgoing(&self, node: &str, rel_type: Option<&str>) -> Vec<Relationship> {
        let state = self.state.read();
        state.collect(state.outgoing.get(node), rel_type)
    }

    fn incoming(&self, node: &str, rel_type: Option<&str>) -> Vec<Relationship> {
        let state = self.state.read();
        state.collect(state.incoming.get(node), rel_type)
    }

    fn create_relationship(
        &self,
        source: &str,
        target: &str,
        rel_type: &str,
    ) -> Result<Relationship> {
        let rel = {
            let mut state = self.state.write();
            for endpoint in [source, target] {
                if !state.contains(endpoint) {
                    return Err(AccessError::ElementNotFound(endpoint.to_string()));
                }
            }
            let rel = Relationship {
                id: Uuid::new_v4().simple().to_string(),
                rel_type: rel_type.to_string(),
                source: source.to_string(),
                target: target.to_string(),
            };
            state
                .outgoing
                .entry(rel.source.clone())
                .or_default()
                .push(rel.id.clone());
            state
                .incoming
                .entry(rel.target.clone())
                .or_default()
                .push(rel.id.clone());
            state
                .relationships
                .insert(rel.id.clone(), (rel.clone(), AHashMap::new()));
            rel
        };
        if let Some(cache) = &self.cache {
            cache.on_relationship_changed(&rel);
        }
        Ok(rel)
    }

    /// Also removes relationships that have `rel` as an endpoint.
    fn delete_relationship(&self, rel: &Relationship) -> Result<()> {
        let removed = {
            let mut state = self.state.write();
            let Some((stored, _)) = state.relationships.remove(&rel.id) else {
                return Err(AccessError::RelationshipNotFound(rel.id.clone()));
            };
            state.unlink(&stored);
            state.detach(&stored.id)
        };
        if let Some(cache) = &self.cache {
            cache.on_relationship_changed(rel);
        }
        self.notify_removed(&removed);
        Ok(())
    }
}
