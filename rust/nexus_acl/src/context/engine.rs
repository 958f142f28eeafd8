//! The shared access-control service: graph, path cache and configuration.
//!
//! One engine lives for the whole process and hands out a
//! [`SecurityContext`] per operation.

use std::sync::Arc;

use ahash::AHashSet;
use parking_lot::RwLock;

use super::{PrincipalContext, SecurityContext, SuperUserContext};
use crate::cache::AccessPathCache;
use crate::config::AccessConfig;
use crate::error::{AccessError, Result};
use crate::grant::ExplicitGrantStore;
use crate::graph::{GraphStore, MemoryGraph};
use crate::mask::PermissionResolutionMask;
use crate::permission::{Permission, PermissionSet};
use crate::principal::ResolvedPrincipal;
use crate::resolve::PathResolver;

pub struct AccessEngine {
    graph: Arc<dyn GraphStore>,
    cache: Arc<AccessPathCache>,
    config: RwLock<Arc<AccessConfig>>,
}

impl AccessEngine {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        cache: Arc<AccessPathCache>,
        config: AccessConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            graph,
            cache,
            config: RwLock::new(Arc::new(config)),
        })
    }

    /// Engine over a fresh in-memory graph wired to a fresh cache.
    pub fn in_memory(config: AccessConfig) -> (Arc<Self>, Arc<MemoryGraph>) {
        let cache = Arc::new(AccessPathCache::new(config.cache.max_entries));
        let graph = Arc::new(MemoryGraph::with_cache(Arc::clone(&cache)));
        let engine = Self::new(graph.clone(), cache, config);
        (engine, graph)
    }

    pub fn graph(&self) -> &dyn GraphStore {
        self.graph.as_ref()
    }

    pub fn cache(&self) -> &Arc<AccessPathCache> {
        &self.cache
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Arc<AccessConfig> {
        Arc::clone(&self.config.read())
    }

    /// Swap the configuration and drop the cache entries it affects.
    ///
    /// Changed or removed propagation rules invalidate by relationship type.
    /// New propagation rules, or any change to the core relationship types,
    /// property keys or walk depth, invalidate everything: paths that never
    /// crossed a newly propagating type have nothing recorded to match on.
    pub fn reload_config(&self, config: AccessConfig) {
        let new = Arc::new(config);
        let old = std::mem::replace(&mut *self.config.write(), Arc::clone(&new));

        let structural = old.relationship_types != new.relationship_types
            || old.properties != new.properties
            || old.max_depth != new.max_depth
            || new
                .propagation
                .keys()
                .any(|t| !old.propagation.contains_key(t));

        if structural {
            self.cache.invalidate_all();
            tracing::info!("access config reloaded, cache cleared");
            return;
        }
        let changed = old.changed_propagation_types(&new);
        for rel_type in &changed {
            self.cache.invalidate_for_relationship_type(rel_type);
        }
        tracing::info!(changed = ?changed, "access config reloaded");
    }

    /// Context acting for `principal`; `None` is anonymous.
    pub fn context(self: &Arc<Self>, principal: Option<&str>) -> SecurityContext {
        SecurityContext::Principal(PrincipalContext::new(
            Arc::clone(self),
            principal.map(str::to_string),
        ))
    }

    pub fn anonymous_context(self: &Arc<Self>) -> SecurityContext {
        self.context(None)
    }

    /// Context that bypasses every check, for system-internal work.
    pub fn super_user_context(self: &Arc<Self>) -> SecurityContext {
        SecurityContext::SuperUser(SuperUserContext::new(Arc::clone(self)))
    }

    /// Explicit grants `principal` holds directly on `resource`.
    pub fn allowed_permissions(&self, resource: &str, principal: &str) -> PermissionSet {
        let config = self.config();
        let store = self.grant_store(&config);
        store
            .find(principal, resource)
            .map(|edge| store.permission_set_of(&edge))
            .unwrap_or_default()
    }

    /// Add `permissions` to the grant edge `principal → resource`, creating
    /// the edge if needed.
    pub fn grant(
        &self,
        resource: &str,
        principal: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<()> {
        let permissions = permissions.into();
        self.ensure_endpoints(resource, principal)?;
        if permissions.is_empty() {
            return Ok(());
        }
        let config = self.config();
        let store = self.grant_store(&config);
        let edge = store.find_or_create(principal, resource)?;
        if store.add_permissions(&edge, permissions)? {
            self.cache.on_relationship_changed(&edge);
            tracing::debug!(resource, principal, ?permissions, "granted");
        }
        Ok(())
    }

    /// Remove `permissions` from the grant edge; the edge goes away once empty.
    pub fn revoke(
        &self,
        resource: &str,
        principal: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<()> {
        let permissions = permissions.into();
        self.ensure_endpoints(resource, principal)?;
        let config = self.config();
        let store = self.grant_store(&config);
        let Some(edge) = store.find(principal, resource) else {
            return Ok(());
        };
        if store.remove_permissions(&edge, permissions)? {
            self.cache.on_relationship_changed(&edge);
            tracing::debug!(resource, principal, ?permissions, "revoked");
        }
        Ok(())
    }

    /// Replace the grant edge's permissions with exactly `permissions`.
    pub fn set_allowed(
        &self,
        resource: &str,
        principal: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<()> {
        let permissions = permissions.into();
        self.ensure_endpoints(resource, principal)?;
        let config = self.config();
        let store = self.grant_store(&config);
        let edge = match store.find(principal, resource) {
            Some(edge) => edge,
            None if permissions.is_empty() => return Ok(()),
            None => store.find_or_create(principal, resource)?,
        };
        let names: AHashSet<String> = permissions.names().into_iter().collect();
        store.set_allowed(&edge, &names)?;
        self.cache.on_relationship_changed(&edge);
        Ok(())
    }

    pub(crate) fn load_principal(&self, id: &str) -> Option<ResolvedPrincipal> {
        let generation = self.cache.generation();
        ResolvedPrincipal::load(self.graph(), &self.config(), id, generation)
    }

    /// Whether `principal` or one of its groups owns `resource`. A
    /// relationship is also owned by whoever owns its source.
    pub(crate) fn is_owned_by(&self, resource: &str, principal: &ResolvedPrincipal) -> bool {
        let config = self.config();
        let owns = config.relationship_types.owns.as_str();
        let owned = |id: &str| {
            self.graph
                .incoming(id, Some(owns))
                .iter()
                .any(|rel| principal.is_self_or_parent(&rel.source))
        };
        owned(resource)
            || self
                .graph
                .relationship(resource)
                .is_some_and(|rel| owned(rel.source.as_str()))
    }

    pub(crate) fn resolve_granted(
        &self,
        principal: &ResolvedPrincipal,
        resource: &str,
        permission: Permission,
    ) -> bool {
        let config = self.config();
        self.resolver(&config)
            .is_granted(principal, resource, permission)
    }

    pub(crate) fn resolve_mask(
        &self,
        principal: &ResolvedPrincipal,
        resource: &str,
    ) -> PermissionResolutionMask {
        let config = self.config();
        self.resolver(&config).mask(principal, resource)
    }

    fn resolver<'a>(&'a self, config: &'a AccessConfig) -> PathResolver<'a> {
        PathResolver {
            graph: self.graph(),
            config,
            cache: &self.cache,
        }
    }

    fn grant_store<'a>(&'a self, config: &'a AccessConfig) -> ExplicitGrantStore<'a> {
        ExplicitGrantStore::new(
            self.graph(),
            &config.relationship_types.security,
            &config.properties.allowed,
        )
    }

    /// The resource may be a node or a relationship; the principal is a node.
    fn ensure_endpoints(&self, resource: &str, principal: &str) -> Result<()> {
        if !self.graph.element_exists(resource) {
            return Err(AccessError::ElementNotFound(resource.to_string()));
        }
        if !self.graph.node_exists(principal) {
            return Err(AccessError::NodeNotFound(principal.to_string()));
        }
        Ok(())
    }
}
