//! Error types for grant mutation and configuration.
//!
//! Authorization decisions never produce an error; only writes to
//! authorization state and configuration parsing do.

use thiserror::Error;

use crate::permission::Permission;

/// Errors raised by the access-control layer.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Storage collaborator failure, propagated unchanged.
    #[error("storage error: {0}")]
    Storage(String),

    /// A mutation referenced a node that does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// A mutation referenced a relationship that does not exist.
    #[error("relationship not found: {0}")]
    RelationshipNotFound(String),

    /// An id that is neither a node nor a relationship.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// The acting context may not change access control on the resource.
    #[error("{permission} not permitted on {resource}")]
    Forbidden {
        permission: Permission,
        resource: String,
    },

    /// A permission name that is not one of the four known permissions.
    #[error("unknown permission: {0}")]
    UnknownPermission(String),

    /// Malformed configuration.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl AccessError {
    /// Shorthand for a storage failure.
    pub fn storage(msg: impl Into<String>) -> Self {
        AccessError::Storage(msg.into())
    }
}

/// Result type for access-control mutations.
pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_display_names_permission() {
        let err = AccessError::Forbidden {
            permission: Permission::AccessControl,
            resource: "abc".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("accessControl"), "got: {msg}");
        assert!(msg.contains("abc"), "got: {msg}");
    }

    #[test]
    fn config_error_from_serde() {
        let err: AccessError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AccessError::Config(_)));
    }
}
