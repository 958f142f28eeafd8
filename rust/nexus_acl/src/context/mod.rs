//! Per-operation security contexts and the engine that creates them.
//!
//! A [`SecurityContext`] is either a regular principal (possibly anonymous)
//! or the superuser. The superuser arm answers every decision with `true`
//! and never consults the path cache, so its bypass cannot leak into the
//! answers cached for real principals.

mod engine;
mod flags;
mod standard;
mod super_user;

pub use engine::AccessEngine;
pub use flags::{AccessMode, ContextFlags};
pub use standard::PrincipalContext;
pub use super_user::{SuperUserContext, SUPERUSER_ID};

use crate::error::Result;
use crate::mask::PermissionResolutionMask;
use crate::permission::{Permission, PermissionSet};
use crate::principal::ResolvedPrincipal;

pub enum SecurityContext {
    Principal(PrincipalContext),
    SuperUser(SuperUserContext),
}

impl SecurityContext {
    /// The acting principal's id: `None` when anonymous, the fixed
    /// [`SUPERUSER_ID`] for the superuser.
    pub fn principal_id(&self) -> Option<&str> {
        match self {
            SecurityContext::Principal(ctx) => ctx.principal_id(),
            SecurityContext::SuperUser(_) => Some(SUPERUSER_ID),
        }
    }

    /// The resolved principal; `None` when anonymous, dangling or superuser.
    pub fn principal(&self) -> Option<&ResolvedPrincipal> {
        match self {
            SecurityContext::Principal(ctx) => ctx.principal(),
            SecurityContext::SuperUser(_) => None,
        }
    }

    pub fn is_super_user(&self) -> bool {
        matches!(self, SecurityContext::SuperUser(_))
    }

    pub fn access_mode(&self) -> AccessMode {
        match self {
            SecurityContext::Principal(ctx) => ctx.access_mode(),
            SecurityContext::SuperUser(ctx) => ctx.access_mode(),
        }
    }

    /// No effect on the superuser, which always runs in backend mode.
    pub fn set_access_mode(&mut self, mode: AccessMode) {
        if let SecurityContext::Principal(ctx) = self {
            ctx.set_access_mode(mode);
        }
    }

    pub fn flags(&self) -> &ContextFlags {
        match self {
            SecurityContext::Principal(ctx) => ctx.flags(),
            SecurityContext::SuperUser(ctx) => ctx.flags(),
        }
    }

    pub fn flags_mut(&mut self) -> &mut ContextFlags {
        match self {
            SecurityContext::Principal(ctx) => ctx.flags_mut(),
            SecurityContext::SuperUser(ctx) => ctx.flags_mut(),
        }
    }

    pub fn is_granted(&self, resource: &str, permission: Permission) -> bool {
        match self {
            SecurityContext::Principal(ctx) => ctx.is_granted(resource, permission),
            SecurityContext::SuperUser(_) => true,
        }
    }

    /// Visibility under the context's access mode.
    pub fn is_visible(&self, resource: Option<&str>) -> bool {
        match self {
            SecurityContext::Principal(ctx) => ctx.is_visible(resource),
            SecurityContext::SuperUser(_) => true,
        }
    }

    pub fn is_visible_in_frontend(&self, resource: Option<&str>) -> bool {
        match self {
            SecurityContext::Principal(ctx) => ctx.is_visible_in_frontend(resource),
            SecurityContext::SuperUser(_) => true,
        }
    }

    pub fn is_visible_in_backend(&self, resource: Option<&str>) -> bool {
        match self {
            SecurityContext::Principal(ctx) => ctx.is_visible_in_backend(resource),
            SecurityContext::SuperUser(_) => true,
        }
    }

    pub fn is_readable(&self, resource: &str, include_hidden: bool, public_only: bool) -> bool {
        match self {
            SecurityContext::Principal(ctx) => {
                ctx.is_readable(resource, include_hidden, public_only)
            }
            SecurityContext::SuperUser(_) => true,
        }
    }

    pub fn resolution_mask(&self, resource: &str) -> PermissionResolutionMask {
        match self {
            SecurityContext::Principal(ctx) => ctx.resolution_mask(resource),
            SecurityContext::SuperUser(ctx) => ctx.resolution_mask(),
        }
    }

    pub fn is_property_readable(&self, resource: &str, key: &str) -> bool {
        match self {
            SecurityContext::Principal(ctx) => ctx.is_property_readable(resource, key),
            SecurityContext::SuperUser(_) => true,
        }
    }

    /// Grant `permissions` to `principal` on `resource`. Requires
    /// `accessControl` on the resource.
    pub fn grant(
        &self,
        resource: &str,
        principal: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<()> {
        match self {
            SecurityContext::Principal(ctx) => ctx.grant(resource, principal, permissions),
            SecurityContext::SuperUser(ctx) => ctx.grant(resource, principal, permissions),
        }
    }

    pub fn revoke(
        &self,
        resource: &str,
        principal: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<()> {
        match self {
            SecurityContext::Principal(ctx) => ctx.revoke(resource, principal, permissions),
            SecurityContext::SuperUser(ctx) => ctx.revoke(resource, principal, permissions),
        }
    }

    pub fn set_allowed(
        &self,
        resource: &str,
        principal: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<()> {
        match self {
            SecurityContext::Principal(ctx) => ctx.set_allowed(resource, principal, permissions),
            SecurityContext::SuperUser(ctx) => ctx.set_allowed(resource, principal, permissions),
        }
    }
}
