//! Principal resolution: admin flag and transitive parent groups.

use std::collections::VecDeque;

use ahash::AHashSet;

use crate::config::AccessConfig;
use crate::graph::GraphStore;

/// A principal as seen by one security context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrincipal {
    pub id: String,
    pub is_admin: bool,
    /// Every group that contains the principal, directly or transitively.
    pub parents: AHashSet<String>,
    /// Cache generation read before the principal was loaded. Answers
    /// computed from this snapshot may only be cached while no
    /// invalidation has happened since.
    pub loaded_at: u64,
}

impl ResolvedPrincipal {
    /// Load the principal from the graph. A dangling id resolves to `None`.
    ///
    /// `generation` must be read from the path cache before calling.
    pub fn load(
        graph: &dyn GraphStore,
        config: &AccessConfig,
        id: &str,
        generation: u64,
    ) -> Option<Self> {
        if !graph.node_exists(id) {
            tracing::debug!(principal = id, "principal does not exist");
            return None;
        }
        Some(Self {
            id: id.to_string(),
            is_admin: graph.flag(id, &config.properties.is_admin),
            parents: transitive_parents(graph, config, id),
            loaded_at: generation,
        })
    }

    /// The principal itself followed by its parent groups. These are the
    /// nodes grants and propagation paths may originate from.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.parents.iter().map(String::as_str))
    }

    pub fn is_self_or_parent(&self, id: &str) -> bool {
        self.id == id || self.parents.contains(id)
    }
}

/// Breadth-first walk up `contains` edges, bounded by `max_depth`.
/// Cycles are tolerated; the principal itself is never its own parent.
pub fn transitive_parents(
    graph: &dyn GraphStore,
    config: &AccessConfig,
    principal: &str,
) -> AHashSet<String> {
    let contains = config.relationship_types.contains.as_str();
    let mut parents = AHashSet::new();
    let mut queue = VecDeque::from([(principal.to_string(), 0u32)]);

    while let Some((member, depth)) = queue.pop_front() {
        if depth >= config.max_depth {
            continue;
        }
        for rel in graph.incoming(&member, Some(contains)) {
            if rel.source != principal && parents.insert(rel.source.clone()) {
                queue.push_back((rel.source, depth + 1));
            }
        }
    }
    parents
}
