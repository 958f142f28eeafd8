//! Path resolution: what a principal may do on a resource through explicit
//! grants and permission-propagating relationships.
//!
//! Every node and relationship the walk looks at is recorded on the cache
//! entry for (principal, resource), so a later mutation of any of them
//! invalidates exactly that entry.

use std::collections::VecDeque;

use ahash::AHashSet;

use crate::cache::AccessPathCache;
use crate::config::AccessConfig;
use crate::grant::ExplicitGrantStore;
use crate::graph::GraphStore;
use crate::mask::PermissionResolutionMask;
use crate::permission::Permission;
use crate::principal::ResolvedPrincipal;

pub(crate) struct PathResolver<'a> {
    pub graph: &'a dyn GraphStore,
    pub config: &'a AccessConfig,
    pub cache: &'a AccessPathCache,
}

impl PathResolver<'_> {
    /// Cached answer when the permission was already resolved for the path,
    /// otherwise walk, memoize and answer.
    pub fn is_granted(
        &self,
        principal: &ResolvedPrincipal,
        resource: &str,
        permission: Permission,
    ) -> bool {
        let start = principal.id.as_str();
        let cached = self.cache.get(start, resource);
        if let Some(mask) = &cached {
            if mask.already_checked(permission) {
                return mask.allows(permission);
            }
        }

        let generation = self.guard_generation(principal);
        let resolved = self.resolve(principal, resource);

        let mut updated = cached.unwrap_or_default();
        updated.restore(&resolved);
        updated.set_checked(permission);
        let allowed = updated.allows(permission);

        if !self
            .cache
            .put_if_unchanged(start, resource, updated, generation)
        {
            tracing::trace!(start, resource, "graph changed during resolution, not cached");
        }
        allowed
    }

    /// The full mask for the path, memoized without marking anything checked.
    pub fn mask(&self, principal: &ResolvedPrincipal, resource: &str) -> PermissionResolutionMask {
        let start = principal.id.as_str();
        if let Some(mask) = self.cache.get(start, resource) {
            return mask;
        }
        let generation = self.guard_generation(principal);
        let resolved = self.resolve(principal, resource);
        self.cache
            .put_if_unchanged(start, resource, resolved.copy(), generation);
        resolved
    }

    /// Generation a result must still match to be cached. A principal loaded
    /// before a later invalidation may carry a stale group set, so the older
    /// of the two wins.
    fn guard_generation(&self, principal: &ResolvedPrincipal) -> u64 {
        self.cache.generation().min(principal.loaded_at)
    }

    /// Walk grants and propagation paths from the principal to `resource`.
    pub fn resolve(&self, principal: &ResolvedPrincipal, resource: &str) -> PermissionResolutionMask {
        let start = principal.id.as_str();
        let mut result = PermissionResolutionMask::new();
        let mut first = true;

        for parent in &principal.parents {
            self.cache.update_node(start, resource, parent);
        }

        let grants = ExplicitGrantStore::new(
            self.graph,
            &self.config.relationship_types.security,
            &self.config.properties.allowed,
        );
        for rel in self
            .graph
            .incoming(resource, Some(self.config.relationship_types.security.as_str()))
        {
            if !principal.is_self_or_parent(&rel.source) {
                continue;
            }
            self.cache.update_relationship(start, resource, &rel);
            let permissions = grants.permission_set_of(&rel);
            if permissions.is_empty() {
                continue;
            }
            let mut route = PermissionResolutionMask::new();
            route.grant_all(permissions);
            result.merge_route(&route, first);
            first = false;
        }

        if !self.config.propagation.is_empty() {
            self.propagate(principal, resource, &mut result, &mut first);
        }

        tracing::trace!(
            start,
            resource,
            granted = ?result.granted(),
            "resolved access path"
        );
        result
    }

    /// Breadth-first walk along relationships that have a propagation rule.
    /// Each node is expanded once; every arrival at `resource` is a route.
    fn propagate(
        &self,
        principal: &ResolvedPrincipal,
        resource: &str,
        result: &mut PermissionResolutionMask,
        first: &mut bool,
    ) {
        let start = principal.id.as_str();
        let mut visited: AHashSet<String> = principal.sources().map(str::to_string).collect();
        let mut queue: VecDeque<(String, PermissionResolutionMask, u32)> = principal
            .sources()
            .map(|s| (s.to_string(), PermissionResolutionMask::all(), 0))
            .collect();

        while let Some((node, mask, depth)) = queue.pop_front() {
            if depth >= self.config.max_depth {
                continue;
            }
            let rels = self
                .graph
                .outgoing(&node, None)
                .into_iter()
                .chain(self.graph.incoming(&node, None));

            for rel in rels {
                let Some(rule) = self.config.propagation_rule(rel.type_name()) else {
                    continue;
                };
                self.cache.update_relationship(start, resource, &rel);

                let from_is_source = rel.source == node;
                if !rule.allows_flow(from_is_source) {
                    continue;
                }
                let Some(next) = rel.other_end(&node) else {
                    continue;
                };
                if next == node {
                    continue;
                }

                let mut next_mask = mask.copy();
                rule.apply(&mut next_mask);

                if next == resource {
                    if !next_mask.granted().is_empty() {
                        result.merge_route(&next_mask, *first);
                        *first = false;
                    }
                    continue;
                }
                if visited.insert(next.to_string()) {
                    self.cache.update_node(start, resource, next);
                    queue.push_back((next.to_string(), next_mask, depth + 1));
                }
            }
        }
    }
}
