//! Integration tests for access resolution through the public API.
//!
//! Builds a small organisation graph (users, nested groups, a project with
//! tasks) and verifies:
//! - Explicit grants inherited through nested groups
//! - Permission propagation along configured relationship types
//! - Property masking on propagated paths
//! - Cache invalidation when an intermediate link is removed
//! - Boundary parsing of permission names

use std::sync::Arc;

use nexus_acl::{
    parse_access_config, AccessEngine, AccessError, GraphStore, MemoryGraph, Permission,
    PermissionRegistry, PermissionSet,
};
use serde_json::{json, Value};

const ORG_CONFIG: &str = r#"{
    "maxDepth": 10,
    "propagation": {
        "WORKS_ON": {
            "direction": "out",
            "read": "keep",
            "write": "keep",
            "delete": "keep"
        },
        "HAS_TASK": {
            "direction": "out",
            "read": "keep",
            "write": "keep",
            "delete": "remove",
            "hiddenProperties": "-estimate"
        }
    }
}"#;

struct Org {
    engine: Arc<AccessEngine>,
    graph: Arc<MemoryGraph>,
    alice: String,
    bob: String,
    engineering: String,
    staff: String,
    project: String,
    task: String,
}

fn blank(graph: &MemoryGraph) -> String {
    graph.create_node(Vec::<(String, Value)>::new())
}

fn org() -> Org {
    let config = parse_access_config(ORG_CONFIG).expect("valid config");
    let (engine, graph) = AccessEngine::in_memory(config);

    let alice = blank(&graph);
    let bob = blank(&graph);
    let engineering = blank(&graph);
    let staff = blank(&graph);
    let project = graph.create_node([("name", json!("apollo"))]);
    let task = graph.create_node([("name", json!("launch")), ("estimate", json!(5))]);

    graph.create_relationship(&staff, &engineering, "CONTAINS").unwrap();
    graph.create_relationship(&engineering, &alice, "CONTAINS").unwrap();
    graph.create_relationship(&project, &task, "HAS_TASK").unwrap();

    Org {
        engine,
        graph,
        alice,
        bob,
        engineering,
        staff,
        project,
        task,
    }
}

#[test]
fn nested_group_grant_reaches_member() {
    let org = org();
    org.engine
        .grant(&org.project, &org.staff, PermissionSet::READ | PermissionSet::WRITE)
        .unwrap();

    let alice = org.engine.context(Some(org.alice.as_str()));
    assert!(alice.is_granted(&org.project, Permission::Read));
    assert!(alice.is_granted(&org.project, Permission::Write));
    assert!(!alice.is_granted(&org.project, Permission::Delete));

    let bob = org.engine.context(Some(org.bob.as_str()));
    assert!(!bob.is_granted(&org.project, Permission::Read));
    assert!(!bob.is_readable(&org.project, false, false));
}

#[test]
fn team_link_propagates_to_tasks_with_masked_properties() {
    let org = org();
    org.graph
        .create_relationship(&org.engineering, &org.project, "WORKS_ON")
        .unwrap();

    let alice = org.engine.context(Some(org.alice.as_str()));
    assert!(alice.is_granted(&org.project, Permission::Delete));
    assert!(!alice.is_granted(&org.project, Permission::AccessControl));
    assert!(alice.is_granted(&org.task, Permission::Write));
    assert!(!alice.is_granted(&org.task, Permission::Delete));
    assert!(alice.is_property_readable(&org.task, "name"));
    assert!(!alice.is_property_readable(&org.task, "estimate"));
}

#[test]
fn removing_upstream_link_invalidates_downstream_answer() {
    let org = org();
    let link = org
        .graph
        .create_relationship(&org.engineering, &org.project, "WORKS_ON")
        .unwrap();

    let alice = org.engine.context(Some(org.alice.as_str()));
    assert!(alice.is_granted(&org.task, Permission::Read));
    assert!(org.engine.cache().get(&org.alice, &org.task).is_some());

    org.graph.delete_relationship(&link).unwrap();
    assert!(org.engine.cache().get(&org.alice, &org.task).is_none());
    assert!(!alice.is_granted(&org.task, Permission::Read));
}

#[test]
fn unrelated_mutation_keeps_cached_answer() {
    let org = org();
    org.engine
        .grant(&org.project, &org.alice, Permission::Read)
        .unwrap();

    let alice = org.engine.context(Some(org.alice.as_str()));
    assert!(alice.is_granted(&org.project, Permission::Read));

    let elsewhere = blank(&org.graph);
    org.graph
        .set_property(&elsewhere, "name", json!("unrelated"))
        .unwrap();
    org.engine
        .grant(&elsewhere, &org.bob, Permission::Write)
        .unwrap();

    assert!(org.engine.cache().get(&org.alice, &org.project).is_some());
    let stats = org.engine.cache().stats();
    assert!(stats.entries >= 1);
}

#[test]
fn deleting_a_node_drops_its_paths() {
    let org = org();
    org.engine
        .grant(&org.project, &org.engineering, Permission::Read)
        .unwrap();

    let alice = org.engine.context(Some(org.alice.as_str()));
    assert!(alice.is_granted(&org.project, Permission::Read));

    org.graph.delete_node(&org.engineering).unwrap();
    assert!(org.engine.cache().get(&org.alice, &org.project).is_none());
    assert!(!org
        .engine
        .context(Some(org.alice.as_str()))
        .is_granted(&org.project, Permission::Read));
}

#[test]
fn permission_names_at_the_boundary() {
    let parsed = PermissionRegistry::parse_all(["read", "accessControl"]).unwrap();
    assert_eq!(parsed, PermissionSet::READ | PermissionSet::ACCESS_CONTROL);
    assert_eq!(PermissionRegistry::from_name("delete"), Some(Permission::Delete));
    assert_eq!(PermissionRegistry::from_name("admin"), None);

    let err = PermissionRegistry::parse_all(["read", "admin"]).unwrap_err();
    assert!(matches!(err, AccessError::UnknownPermission(name) if name == "admin"));
}
