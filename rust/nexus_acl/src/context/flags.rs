//! Per-operation switches carried by a security context.

use serde::{Deserialize, Serialize};

/// Which visibility rule set `is_visible` applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    Frontend,
    Backend,
}

/// Operation switches that travel with the context. None of them affect
/// authorization decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextFlags {
    pub cascading_delete: bool,
    pub prevent_duplicate_relationships: bool,
    pub read_only_transaction: bool,
    pub transaction_notifications: bool,
}

impl Default for ContextFlags {
    fn default() -> Self {
        Self {
            cascading_delete: true,
            prevent_duplicate_relationships: true,
            read_only_transaction: false,
            transaction_notifications: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let flags = ContextFlags::default();
        assert!(flags.cascading_delete);
        assert!(flags.prevent_duplicate_relationships);
        assert!(!flags.read_only_transaction);
        assert!(flags.transaction_notifications);
        assert_eq!(AccessMode::default(), AccessMode::Frontend);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let flags: ContextFlags = serde_json::from_str(r#"{"readOnlyTransaction":true}"#).unwrap();
        assert!(flags.read_only_transaction);
        assert!(flags.cascading_delete);
    }
}
