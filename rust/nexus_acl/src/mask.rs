//! Per-path permission resolution result.

use ahash::AHashSet;

use crate::permission::{Permission, PermissionSet};

/// Properties that can never be masked out of a node's visible property set.
pub const SYSTEM_PROPERTIES: [&str; 2] = ["id", "type"];

/// Granted permissions, resolved permissions, and hidden properties for one
/// (start, end) path.
///
/// `checked` lets a caller tell "not granted" apart from "not evaluated yet".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionResolutionMask {
    granted: PermissionSet,
    checked: PermissionSet,
    removed_properties: AHashSet<String>,
}

impl PermissionResolutionMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mask granting every permission, with nothing checked or hidden.
    pub fn all() -> Self {
        Self {
            granted: PermissionSet::all(),
            ..Self::default()
        }
    }

    pub fn set_permission(&mut self, permission: Permission, allowed: bool) {
        self.granted.set_permission(permission, allowed);
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.granted.has(permission)
    }

    pub fn set_checked(&mut self, permission: Permission) {
        self.checked.set_permission(permission, true);
    }

    pub fn already_checked(&self, permission: Permission) -> bool {
        self.checked.has(permission)
    }

    pub fn granted(&self) -> PermissionSet {
        self.granted
    }

    pub fn checked(&self) -> PermissionSet {
        self.checked
    }

    pub fn grant_all(&mut self, permissions: PermissionSet) {
        self.granted |= permissions;
    }

    /// Zeroes the granted bits only. `checked` and the property mask survive.
    pub fn clear(&mut self) {
        self.granted = PermissionSet::empty();
    }

    /// Applies a property-mask delta such as `"-ssn -salary"`.
    ///
    /// Tokens are separated by whitespace or commas. `-name` hides a property
    /// on this path, `+name` exposes it again. A token without a prefix is
    /// taken as a hide; this runs on the read path and must never fail.
    pub fn handle_property_delta(&mut self, delta: &str) {
        for token in delta
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
        {
            if let Some(name) = token.strip_prefix('+') {
                self.removed_properties.remove(name);
                continue;
            }
            let name = match token.strip_prefix('-') {
                Some(name) => name,
                None => {
                    tracing::trace!(token, "property delta token without prefix");
                    token
                }
            };
            if !name.is_empty() {
                self.removed_properties.insert(name.to_string());
            }
        }
    }

    /// Whether `key` remains visible on this path.
    pub fn allows_property(&self, key: &str) -> bool {
        SYSTEM_PROPERTIES.contains(&key) || !self.removed_properties.contains(key)
    }

    pub fn removed_properties(&self) -> &AHashSet<String> {
        &self.removed_properties
    }

    /// Folds one resolved route into this mask: granted bits are unioned,
    /// removed properties intersected. The first route sets the removals.
    pub(crate) fn merge_route(&mut self, route: &PermissionResolutionMask, first: bool) {
        self.granted |= route.granted;
        if first {
            self.removed_properties = route.removed_properties.clone();
        } else {
            self.removed_properties
                .retain(|p| route.removed_properties.contains(p));
        }
    }

    /// Deep, independent clone.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Adopts `other`'s granted bits and property mask, keeping this mask's
    /// `checked` bookkeeping.
    pub fn restore(&mut self, other: &PermissionResolutionMask) {
        self.granted = other.granted;
        self.removed_properties = other.removed_properties.clone();
    }
}
