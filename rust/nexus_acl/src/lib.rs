//! `nexus_acl`: graph-backed access control resolution for Nexus.
//!
//! Answers "may this principal do P on resource R?" from explicit grant
//! edges, ownership, visibility flags and permission-propagating
//! relationships, and memoizes each answer per (principal, resource) path
//! in a cache that graph mutations invalidate precisely.
//!
//! Modules:
//! - `permission`: the four permissions, `PermissionSet`, name registry
//! - `mask`:       per-path resolution result
//! - `graph`:      storage seam (`GraphStore`) and an in-memory graph
//! - `grant`:      explicit grant edges
//! - `cache`:      mutation-aware path cache
//! - `config`:     JSON configuration and propagation rules
//! - `principal`:  admin flag and transitive group membership
//! - `context`:    `AccessEngine` and per-operation `SecurityContext`
//! - `error`:      error type for grant mutation and configuration

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod grant;
pub mod graph;
pub mod mask;
pub mod permission;
pub mod principal;
mod resolve;

pub use cache::{AccessPathCache, CacheStats};
pub use config::{parse_access_config, AccessConfig, PropagationRule};
pub use context::{AccessEngine, AccessMode, ContextFlags, SecurityContext, SUPERUSER_ID};
pub use error::{AccessError, Result};
pub use grant::ExplicitGrantStore;
pub use graph::{GraphStore, MemoryGraph, Relationship};
pub use mask::PermissionResolutionMask;
pub use permission::{Permission, PermissionRegistry, PermissionSet};
