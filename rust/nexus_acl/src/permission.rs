//! The four capabilities an access decision is made about.
//!
//! Bit positions are persisted indirectly (grant edges store names, cached
//! masks store bits) and must never be renumbered.

use std::fmt;

use ahash::AHashMap;
use bitflags::bitflags;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{AccessError, Result};

/// A single capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    Read,
    Write,
    Delete,
    AccessControl,
}

impl Permission {
    /// Every permission, in bit order.
    pub const ALL: [Permission; 4] = [
        Permission::Read,
        Permission::Write,
        Permission::Delete,
        Permission::AccessControl,
    ];

    /// Stable name, as stored in grant edges and accepted at API boundaries.
    pub fn name(self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Delete => "delete",
            Permission::AccessControl => "accessControl",
        }
    }

    /// Bit position in a 32-bit field.
    pub fn bit(self) -> u32 {
        match self {
            Permission::Read => 0,
            Permission::Write => 1,
            Permission::Delete => 2,
            Permission::AccessControl => 3,
        }
    }

    pub fn from_bit(bit: u32) -> Option<Permission> {
        Permission::ALL.into_iter().find(|p| p.bit() == bit)
    }

    /// Reverse lookup by name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Permission> {
        PermissionRegistry::from_name(name)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// A set of permissions packed into a `u32`.
    ///
    /// Kept distinct from plain integers so it cannot be mixed up with
    /// unrelated bitmasks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PermissionSet: u32 {
        const READ           = 1 << 0;
        const WRITE          = 1 << 1;
        const DELETE         = 1 << 2;
        const ACCESS_CONTROL = 1 << 3;
    }
}

impl PermissionSet {
    pub fn has(self, permission: Permission) -> bool {
        self.contains(PermissionSet::from(permission))
    }

    pub fn set_permission(&mut self, permission: Permission, allowed: bool) {
        self.set(PermissionSet::from(permission), allowed);
    }

    /// Permissions contained in this set, in bit order.
    pub fn permissions(self) -> impl Iterator<Item = Permission> {
        Permission::ALL.into_iter().filter(move |p| self.has(*p))
    }

    /// Names of the contained permissions, in bit order.
    pub fn names(self) -> Vec<String> {
        self.permissions()
            .map(|p| PermissionRegistry::name_of(p).to_string())
            .collect()
    }

    /// Lenient conversion from stored names: unknown names are skipped.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter_map(|n| PermissionRegistry::from_name(n.as_ref()))
            .collect()
    }
}

impl From<Permission> for PermissionSet {
    fn from(permission: Permission) -> Self {
        PermissionSet::from_bits_retain(1 << permission.bit())
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        iter.into_iter()
            .fold(PermissionSet::empty(), |acc, p| acc | PermissionSet::from(p))
    }
}

static REGISTRY: Lazy<AHashMap<&'static str, Permission>> =
    Lazy::new(|| Permission::ALL.iter().map(|p| (p.name(), *p)).collect());

/// Name ↔ permission lookup used where permission names cross the API
/// boundary (request bodies, stored grant arrays).
pub struct PermissionRegistry;

impl PermissionRegistry {
    pub fn from_name(name: &str) -> Option<Permission> {
        REGISTRY.get(name).copied()
    }

    pub fn name_of(permission: Permission) -> &'static str {
        permission.name()
    }

    /// Strict parsing of a list of names; the first unknown name is an error.
    pub fn parse_all<I, S>(names: I) -> Result<PermissionSet>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(PermissionSet::empty(), |acc, name| {
            let name = name.as_ref();
            PermissionRegistry::from_name(name)
                .map(|p| acc | PermissionSet::from(p))
                .ok_or_else(|| AccessError::UnknownPermission(name.to_string()))
        })
    }
}
