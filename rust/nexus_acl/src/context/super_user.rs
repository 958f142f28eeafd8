use std::sync::Arc;

use super::{AccessEngine, AccessMode, ContextFlags};
use crate::error::Result;
use crate::mask::PermissionResolutionMask;
use crate::permission::PermissionSet;

/// Fixed identity reported by the superuser context.
pub const SUPERUSER_ID: &str = "00000000000000000000000000000000";

/// Bypasses every check. Never reads or writes the path cache.
pub struct SuperUserContext {
    engine: Arc<AccessEngine>,
    flags: ContextFlags,
}

impl SuperUserContext {
    pub(crate) fn new(engine: Arc<AccessEngine>) -> Self {
        Self {
            engine,
            flags: ContextFlags::default(),
        }
    }

    pub fn access_mode(&self) -> AccessMode {
        AccessMode::Backend
    }

    pub fn flags(&self) -> &ContextFlags {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut ContextFlags {
        &mut self.flags
    }

    pub fn resolution_mask(&self) -> PermissionResolutionMask {
        PermissionResolutionMask::all()
    }

    pub fn grant(
        &self,
        resource: &str,
        principal: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<()> {
        self.engine.grant(resource, principal, permissions)
    }

    pub fn revoke(
        &self,
        resource: &str,
        principal: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<()> {
        self.engine.revoke(resource, principal, permissions)
    }

    pub fn set_allowed(
        &self,
        resource: &str,
        principal: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<()> {
        self.engine.set_allowed(resource, principal, permissions)
    }
}
