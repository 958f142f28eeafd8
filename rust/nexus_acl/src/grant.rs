//! Explicit grant edges: principal → resource relationships whose
//! string-array property lists the permissions granted.
//!
//! A grant edge with no permissions has no reason to exist and is deleted
//! instead of being left empty. Storage errors are propagated unchanged.

use ahash::AHashSet;
use serde_json::Value;

use crate::error::Result;
use crate::graph::{GraphStore, Relationship};
use crate::permission::{Permission, PermissionRegistry, PermissionSet};

pub struct ExplicitGrantStore<'a> {
    graph: &'a dyn GraphStore,
    /// Relationship type of grant edges.
    rel_type: &'a str,
    /// Property holding the permission names.
    key: &'a str,
}

impl<'a> ExplicitGrantStore<'a> {
    pub fn new(graph: &'a dyn GraphStore, rel_type: &'a str, key: &'a str) -> Self {
        Self {
            graph,
            rel_type,
            key,
        }
    }

    /// The grant edge from `principal` to `resource`, if any.
    pub fn find(&self, principal: &str, resource: &str) -> Option<Relationship> {
        self.graph
            .incoming(resource, Some(self.rel_type))
            .into_iter()
            .find(|rel| rel.source == principal)
    }

    /// The grant edge from `principal` to `resource`, created if missing.
    pub fn find_or_create(&self, principal: &str, resource: &str) -> Result<Relationship> {
        match self.find(principal, resource) {
            Some(rel) => Ok(rel),
            None => self
                .graph
                .create_relationship(principal, resource, self.rel_type),
        }
    }

    /// Permission names stored on the edge; empty if absent.
    pub fn permissions_of(&self, edge: &Relationship) -> AHashSet<String> {
        match self.graph.get_property(&edge.id, self.key) {
            Some(Value::Array(values)) => values
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            Some(Value::Null) | None => AHashSet::new(),
            Some(other) => {
                tracing::warn!(
                    edge = %edge.id,
                    value = %other,
                    "grant edge permissions are not an array, treating as empty"
                );
                AHashSet::new()
            }
        }
    }

    /// Stored names parsed into a permission set. Unknown names are ignored.
    pub fn permission_set_of(&self, edge: &Relationship) -> PermissionSet {
        PermissionSet::from_names(self.permissions_of(edge))
    }

    pub fn is_allowed(&self, edge: &Relationship, permission: Permission) -> bool {
        self.permissions_of(edge)
            .contains(PermissionRegistry::name_of(permission))
    }

    /// Overwrite the edge's permissions. An empty set deletes the edge.
    pub fn set_allowed(&self, edge: &Relationship, names: &AHashSet<String>) -> Result<()> {
        if names.is_empty() {
            tracing::debug!(edge = %edge.id, "removing grant edge with no permissions");
            return self.graph.delete_relationship(edge);
        }
        let mut sorted: Vec<&String> = names.iter().collect();
        sorted.sort();
        let value = Value::Array(sorted.into_iter().cloned().map(Value::String).collect());
        self.graph.set_property(&edge.id, self.key, value)
    }

    /// Add permissions; writes only when the stored set changes.
    pub fn add_permissions(
        &self,
        edge: &Relationship,
        permissions: impl Into<PermissionSet>,
    ) -> Result<bool> {
        let current = self.permissions_of(edge);
        let mut updated = current.clone();
        updated.extend(permissions.into().names());
        self.write_if_changed(edge, &current, &updated)
    }

    /// Remove permissions; writes (or deletes the edge) only when the stored
    /// set changes.
    pub fn remove_permissions(
        &self,
        edge: &Relationship,
        permissions: impl Into<PermissionSet>,
    ) -> Result<bool> {
        let current = self.permissions_of(edge);
        let mut updated = current.clone();
        for name in permissions.into().names() {
            updated.remove(&name);
        }
        self.write_if_changed(edge, &current, &updated)
    }

    fn write_if_changed(
        &self,
        edge: &Relationship,
        current: &AHashSet<String>,
        updated: &AHashSet<String>,
    ) -> Result<bool> {
        if current == updated {
            return Ok(false);
        }
        self.set_allowed(edge, updated)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use crate::graph::MemoryGraph;
    use serde_json::json;

    fn setup() -> (MemoryGraph, Relationship) {
        let graph = MemoryGraph::new();
        let user = graph.create_node(Vec::<(String, Value)>::new());
        let doc = graph.create_node(Vec::<(String, Value)>::new());
        let edge = graph.create_relationship(&user, &doc, "SECURITY").unwrap();
        (graph, edge)
    }

    fn names(list: &[&str]) -> AHashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn absent_property_is_empty() {
        let (graph, edge) = setup();
        let store = ExplicitGrantStore::new(&graph, "SECURITY", "allowed");
        assert!(store.permissions_of(&edge).is_empty());
        assert!(!store.is_allowed(&edge, Permission::Read));
    }

    #[test]
    fn set_and_read_back() {
        let (graph, edge) = setup();
        let store = ExplicitGrantStore::new(&graph, "SECURITY", "allowed");
        store.set_allowed(&edge, &names(&["write", "read"])).unwrap();

        assert_eq!(
            graph.get_property(&edge.id, "allowed"),
            Some(json!(["read", "write"]))
        );
        assert!(store.is_allowed(&edge, Permission::Write));
        assert_eq!(
            store.permission_set_of(&edge),
            PermissionSet::READ | PermissionSet::WRITE
        );
    }

    #[test]
    fn empty_set_deletes_edge() {
        let (graph, edge) = setup();
        let store = ExplicitGrantStore::new(&graph, "SECURITY", "allowed");
        store.set_allowed(&edge, &names(&["read"])).unwrap();
        store.set_allowed(&edge, &AHashSet::new()).unwrap();

        assert!(graph.relationship(&edge.id).is_none());
        assert!(store.permissions_of(&edge).is_empty());
        assert!(store.find(&edge.source, &edge.target).is_none());
    }

    #[test]
    fn add_and_remove_only_write_on_change() {
        let (graph, edge) = setup();
        let store = ExplicitGrantStore::new(&graph, "SECURITY", "allowed");

        assert!(store.add_permissions(&edge, Permission::Read).unwrap());
        assert!(!store.add_permissions(&edge, Permission::Read).unwrap());
        assert!(!store.remove_permissions(&edge, Permission::Delete).unwrap());
        assert!(store
            .add_permissions(&edge, PermissionSet::WRITE | PermissionSet::DELETE)
            .unwrap());
        assert_eq!(store.permissions_of(&edge).len(), 3);

        assert!(store
            .remove_permissions(&edge, PermissionSet::all())
            .unwrap());
        assert!(graph.relationship(&edge.id).is_none());
    }

    #[test]
    fn storage_errors_propagate() {
        let (graph, edge) = setup();
        let store = ExplicitGrantStore::new(&graph, "SECURITY", "allowed");
        graph.delete_relationship(&edge).unwrap();

        let err = store.add_permissions(&edge, Permission::Read).unwrap_err();
        assert!(matches!(err, AccessError::ElementNotFound(id) if id == edge.id));
        let err = store.set_allowed(&edge, &AHashSet::new()).unwrap_err();
        assert!(matches!(err, AccessError::RelationshipNotFound(_)));
    }

    #[test]
    fn malformed_property_is_empty() {
        let (graph, edge) = setup();
        graph
            .set_property(&edge.id, "allowed", json!("read"))
            .unwrap();
        let store = ExplicitGrantStore::new(&graph, "SECURITY", "allowed");
        assert!(store.permissions_of(&edge).is_empty());
    }

    #[test]
    fn find_or_create_reuses_edge() {
        let (graph, edge) = setup();
        let store = ExplicitGrantStore::new(&graph, "SECURITY", "allowed");
        let found = store.find_or_create(&edge.source, &edge.target).unwrap();
        assert_eq!(found, edge);
        assert_eq!(graph.relationship_count(), 1);
    }
}
