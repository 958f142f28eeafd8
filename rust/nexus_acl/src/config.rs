//! Access-control configuration.
//!
//! Parsed from JSON; every field has a default so `{}` is a complete config.

use std::collections::HashMap as StdHashMap;

use serde::Deserialize;

use crate::mask::PermissionResolutionMask;
use crate::permission::Permission;

/// Maximum depth for group-ancestry and propagation walks.
pub const MAX_DEPTH: u32 = 50;

/// Default bound on cached paths.
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessConfig {
    pub relationship_types: RelationshipTypes,
    pub properties: PropertyKeys,
    pub max_depth: u32,
    pub cache: CacheConfig,
    /// Relationship type → how permissions flow across it.
    pub propagation: StdHashMap<String, PropagationRule>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            relationship_types: RelationshipTypes::default(),
            properties: PropertyKeys::default(),
            max_depth: MAX_DEPTH,
            cache: CacheConfig::default(),
            propagation: StdHashMap::new(),
        }
    }
}

impl AccessConfig {
    pub fn propagation_rule(&self, rel_type: &str) -> Option<&PropagationRule> {
        self.propagation.get(rel_type)
    }

    /// Relationship types whose propagation rule differs between the two
    /// configs (added, removed or changed).
    pub fn changed_propagation_types(&self, other: &AccessConfig) -> Vec<String> {
        let mut changed: Vec<String> = self
            .propagation
            .iter()
            .filter(|(t, rule)| other.propagation.get(*t) != Some(*rule))
            .map(|(t, _)| t.clone())
            .collect();
        changed.extend(
            other
                .propagation
                .keys()
                .filter(|t| !self.propagation.contains_key(*t))
                .cloned(),
        );
        changed.sort();
        changed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelationshipTypes {
    /// Principal → resource edge carrying explicit grants.
    pub security: String,
    /// Principal → resource ownership edge.
    pub owns: String,
    /// Group → member edge.
    pub contains: String,
}

impl Default for RelationshipTypes {
    fn default() -> Self {
        Self {
            security: "SECURITY".to_string(),
            owns: "OWNS".to_string(),
            contains: "CONTAINS".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyKeys {
    /// String-array property on grant edges.
    pub allowed: String,
    pub hidden: String,
    pub visible_to_public_users: String,
    pub visible_to_authenticated_users: String,
    pub is_admin: String,
}

impl Default for PropertyKeys {
    fn default() -> Self {
        Self {
            allowed: "allowed".to_string(),
            hidden: "hidden".to_string(),
            visible_to_public_users: "visibleToPublicUsers".to_string(),
            visible_to_authenticated_users: "visibleToAuthenticatedUsers".to_string(),
            is_admin: "isAdmin".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Which way permissions flow across a relationship.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropagationDirection {
    #[default]
    None,
    /// Source → target.
    Out,
    /// Target → source.
    In,
    Both,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropagationAction {
    Add,
    Keep,
    #[default]
    Remove,
}

/// Permission flow across one relationship type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropagationRule {
    pub direction: PropagationDirection,
    pub read: PropagationAction,
    pub write: PropagationAction,
    pub delete: PropagationAction,
    pub access_control: PropagationAction,
    /// Property-mask delta, e.g. `"-ssn -salary"`.
    pub hidden_properties: String,
}

impl PropagationRule {
    pub fn action(&self, permission: Permission) -> PropagationAction {
        match permission {
            Permission::Read => self.read,
            Permission::Write => self.write,
            Permission::Delete => self.delete,
            Permission::AccessControl => self.access_control,
        }
    }

    /// Whether permissions may leave the relationship's source
    /// (`from_is_source`) or its target (`!from_is_source`).
    pub fn allows_flow(&self, from_is_source: bool) -> bool {
        match self.direction {
            PropagationDirection::None => false,
            PropagationDirection::Out => from_is_source,
            PropagationDirection::In => !from_is_source,
            PropagationDirection::Both => true,
        }
    }

    /// Applies this hop to a running mask.
    pub fn apply(&self, mask: &mut PermissionResolutionMask) {
        for permission in Permission::ALL {
            match self.action(permission) {
                PropagationAction::Add => mask.set_permission(permission, true),
                PropagationAction::Keep => {}
                PropagationAction::Remove => mask.set_permission(permission, false),
            }
        }
        if !self.hidden_properties.is_empty() {
            mask.handle_property_delta(&self.hidden_properties);
        }
    }
}

/// Parse an access config from a JSON string.
pub fn parse_access_config(json: &str) -> Result<AccessConfig, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        let config = parse_access_config("{}").unwrap();
        assert_eq!(config, AccessConfig::default());
        assert_eq!(config.relationship_types.security, "SECURITY");
        assert_eq!(config.properties.allowed, "allowed");
        assert_eq!(config.max_depth, MAX_DEPTH);
        assert_eq!(config.cache.max_entries, DEFAULT_MAX_ENTRIES);
    }

    #[test]
    fn parse_propagation_rule() {
        let json = r#"{
            "propagation": {
                "PROJECT_MEMBER": {
                    "direction": "out",
                    "read": "add",
                    "write": "keep",
                    "hiddenProperties": "-budget"
                }
            }
        }"#;
        let config = parse_access_config(json).unwrap();
        let rule = config.propagation_rule("PROJECT_MEMBER").unwrap();
        assert_eq!(rule.direction, PropagationDirection::Out);
        assert_eq!(rule.action(Permission::Read), PropagationAction::Add);
        assert_eq!(rule.action(Permission::Write), PropagationAction::Keep);
        assert_eq!(rule.action(Permission::Delete), PropagationAction::Remove);
        assert_eq!(rule.hidden_properties, "-budget");
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let json = r#"{"relationshipTypes":{"security":"ACL"},"properties":{"isAdmin":"admin"}}"#;
        let config = parse_access_config(json).unwrap();
        assert_eq!(config.relationship_types.security, "ACL");
        assert_eq!(config.relationship_types.owns, "OWNS");
        assert_eq!(config.properties.is_admin, "admin");
        assert_eq!(config.properties.hidden, "hidden");
    }

    #[test]
    fn unknown_direction_is_rejected() {
        let json = r#"{"propagation":{"X":{"direction":"sideways"}}}"#;
        assert!(parse_access_config(json).is_err());
    }

    #[test]
    fn apply_rule_to_mask() {
        let rule = PropagationRule {
            direction: PropagationDirection::Out,
            read: PropagationAction::Keep,
            write: PropagationAction::Add,
            hidden_properties: "-ssn".to_string(),
            ..PropagationRule::default()
        };
        let mut mask = PermissionResolutionMask::new();
        mask.set_permission(Permission::Read, true);
        mask.set_permission(Permission::Delete, true);
        rule.apply(&mut mask);

        assert!(mask.allows(Permission::Read));
        assert!(mask.allows(Permission::Write));
        assert!(!mask.allows(Permission::Delete));
        assert!(!mask.allows_property("ssn"));
    }

    #[test]
    fn flow_direction() {
        let mut rule = PropagationRule::default();
        assert!(!rule.allows_flow(true));
        rule.direction = PropagationDirection::Out;
        assert!(rule.allows_flow(true) && !rule.allows_flow(false));
        rule.direction = PropagationDirection::In;
        assert!(!rule.allows_flow(true) && rule.allows_flow(false));
        rule.direction = PropagationDirection::Both;
        assert!(rule.allows_flow(true) && rule.allows_flow(false));
    }

    #[test]
    fn changed_propagation_types_detects_all_kinds() {
        let old = parse_access_config(
            r#"{"propagation":{"A":{"direction":"out"},"B":{"direction":"in"}}}"#,
        )
        .unwrap();
        let new = parse_access_config(
            r#"{"propagation":{"A":{"direction":"out"},"B":{"direction":"both"},"C":{}}}"#,
        )
        .unwrap();
        assert_eq!(old.changed_propagation_types(&new), vec!["B", "C"]);
    }
}
