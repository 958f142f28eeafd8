//! Security context for a regular (possibly anonymous) principal.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{AccessEngine, AccessMode, ContextFlags};
use crate::error::{AccessError, Result};
use crate::mask::PermissionResolutionMask;
use crate::permission::{Permission, PermissionSet};
use crate::principal::ResolvedPrincipal;

pub struct PrincipalContext {
    engine: Arc<AccessEngine>,
    principal_id: Option<String>,
    /// Resolved on first use. Racing initializers compute the same value and
    /// only the first assignment is kept.
    principal: OnceCell<Option<ResolvedPrincipal>>,
    access_mode: AccessMode,
    flags: ContextFlags,
}

impl PrincipalContext {
    pub(crate) fn new(engine: Arc<AccessEngine>, principal_id: Option<String>) -> Self {
        Self {
            engine,
            principal_id,
            principal: OnceCell::new(),
            access_mode: AccessMode::default(),
            flags: ContextFlags::default(),
        }
    }

    pub fn principal_id(&self) -> Option<&str> {
        self.principal_id.as_deref()
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access_mode
    }

    pub fn set_access_mode(&mut self, mode: AccessMode) {
        self.access_mode = mode;
    }

    pub fn flags(&self) -> &ContextFlags {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut ContextFlags {
        &mut self.flags
    }

    /// The principal, loaded lazily. A dangling principal id behaves like
    /// anonymous.
    pub fn principal(&self) -> Option<&ResolvedPrincipal> {
        self.principal
            .get_or_init(|| {
                self.principal_id
                    .as_deref()
                    .and_then(|id| self.engine.load_principal(id))
            })
            .as_ref()
    }

    fn is_admin(&self) -> bool {
        self.principal().is_some_and(|p| p.is_admin)
    }

    /// Self, owner or owning-group bypass.
    fn is_self_or_owner(&self, principal: &ResolvedPrincipal, resource: &str) -> bool {
        principal.id == resource || self.engine.is_owned_by(resource, principal)
    }

    pub fn is_granted(&self, resource: &str, permission: Permission) -> bool {
        if !self.engine.graph().element_exists(resource) {
            return false;
        }
        let Some(principal) = self.principal() else {
            return false;
        };
        if principal.is_admin || self.is_self_or_owner(principal, resource) {
            return true;
        }
        self.engine.resolve_granted(principal, resource, permission)
    }

    pub fn is_visible(&self, resource: Option<&str>) -> bool {
        match self.access_mode {
            AccessMode::Backend => self.is_visible_in_backend(resource),
            AccessMode::Frontend => self.is_visible_in_frontend(resource),
        }
    }

    pub fn is_visible_in_frontend(&self, resource: Option<&str>) -> bool {
        let Some(resource) = resource else {
            return false;
        };
        let config = self.engine.config();
        let keys = &config.properties;
        let graph = self.engine.graph();

        if graph.flag(resource, &keys.hidden) {
            return false;
        }
        let principal = self.principal();
        if let Some(principal) = principal {
            if self.is_self_or_owner(principal, resource) {
                return true;
            }
        }
        if principal.is_none() && graph.flag(resource, &keys.visible_to_public_users) {
            return true;
        }
        if principal.is_some() && graph.flag(resource, &keys.visible_to_authenticated_users) {
            return true;
        }
        self.is_granted(resource, Permission::Read)
    }

    pub fn is_visible_in_backend(&self, resource: Option<&str>) -> bool {
        if self.is_visible_in_frontend(resource) {
            return true;
        }
        let Some(resource) = resource else {
            return false;
        };
        if self.principal().is_none() {
            return false;
        }
        if self.is_admin() {
            return true;
        }
        self.is_granted(resource, Permission::Read)
    }

    /// Readability for bulk filtering.
    pub fn is_readable(&self, resource: &str, include_hidden: bool, public_only: bool) -> bool {
        let config = self.engine.config();
        let keys = &config.properties;
        let graph = self.engine.graph();

        if !include_hidden && graph.flag(resource, &keys.hidden) {
            return false;
        }
        let public = graph.flag(resource, &keys.visible_to_public_users);
        if public {
            return true;
        }
        if public_only {
            return false;
        }
        if self.principal().is_some() && graph.flag(resource, &keys.visible_to_authenticated_users)
        {
            return true;
        }
        self.is_granted(resource, Permission::Read)
    }

    /// Everything this context's principal may do on `resource`, with the
    /// property mask of the path.
    pub fn resolution_mask(&self, resource: &str) -> PermissionResolutionMask {
        if !self.engine.graph().element_exists(resource) {
            return PermissionResolutionMask::new();
        }
        let Some(principal) = self.principal() else {
            return PermissionResolutionMask::new();
        };
        if principal.is_admin || self.is_self_or_owner(principal, resource) {
            return PermissionResolutionMask::all();
        }
        self.engine.resolve_mask(principal, resource)
    }

    /// Whether `key` on `resource` is readable and not masked out on the
    /// principal's path to it.
    pub fn is_property_readable(&self, resource: &str, key: &str) -> bool {
        self.is_readable(resource, false, false)
            && self.resolution_mask(resource).allows_property(key)
    }

    pub fn grant(
        &self,
        resource: &str,
        principal: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<()> {
        self.check_access_control(resource)?;
        self.engine.grant(resource, principal, permissions)
    }

    pub fn revoke(
        &self,
        resource: &str,
        principal: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<()> {
        self.check_access_control(resource)?;
        self.engine.revoke(resource, principal, permissions)
    }

    pub fn set_allowed(
        &self,
        resource: &str,
        principal: &str,
        permissions: impl Into<PermissionSet>,
    ) -> Result<()> {
        self.check_access_control(resource)?;
        self.engine.set_allowed(resource, principal, permissions)
    }

    fn check_access_control(&self, resource: &str) -> Result<()> {
        if self.is_granted(resource, Permission::AccessControl) {
            return Ok(());
        }
        tracing::debug!(
            principal = self.principal_id.as_deref().unwrap_or("anonymous"),
            resource,
            "access control change refused"
        );
        Err(AccessError::Forbidden {
            permission: Permission::AccessControl,
            resource: resource.to_string(),
        })
    }
}
