//! End-to-end authorization scenarios.

mod pipelines;

use serde_json::Value;

use crate::checker::{AuthorizationChecker, AuthorizationDecision, Principal};
use crate::command::{NoViews, ViewCatalog, parse_command};
use crate::graph::RoleGraph;
use crate::permissions::{ADMIN_DB, BuiltinRole, RoleDefinition, RoleName};

pub(crate) const FIRST_DB: &str = "roles_commands_1";
pub(crate) const SECOND_DB: &str = "roles_commands_2";

/// Database roles are granted on the first database, the rest on admin.
pub(crate) fn grant(role: BuiltinRole) -> RoleName {
    if role.is_admin_only() {
        RoleName::new(role.name(), ADMIN_DB)
    } else {
        RoleName::new(role.name(), FIRST_DB)
    }
}

pub(crate) fn user(roles: Vec<RoleName>) -> Principal {
    Principal::new("tester", ADMIN_DB, roles)
}

pub(crate) fn graph_from(json: &str) -> RoleGraph {
    RoleGraph::from_definitions(&RoleDefinition::parse_list(json).unwrap()).unwrap()
}

pub(crate) fn decide(
    checker: &AuthorizationChecker,
    graph: &RoleGraph,
    roles: Vec<RoleName>,
    db: &str,
    command: &Value,
    views: &dyn ViewCatalog,
) -> AuthorizationDecision {
    let cmd = parse_command(db, command).unwrap();
    checker
        .is_authorized_with_views(graph, &user(roles), &cmd, views)
        .unwrap()
}

/// Names of the built-in roles that may run `command` on `db` when held alone.
pub(crate) fn authorized_builtins(db: &str, command: &Value) -> Vec<&'static str> {
    let checker = AuthorizationChecker::default();
    let graph = RoleGraph::new();
    BuiltinRole::ALL
        .iter()
        .filter(|role| decide(&checker, &graph, vec![grant(**role)], db, command, &NoViews).authorized)
        .map(|role| role.name())
        .collect()
}

/// Expected role names, put in `BuiltinRole::ALL` order.
pub(crate) fn in_role_order(expected: &[&str]) -> Vec<&'static str> {
    for name in expected {
        assert!(
            BuiltinRole::ALL.iter().any(|r| r.name() == *name),
            "not a built-in role: {name}"
        );
    }
    BuiltinRole::ALL
        .iter()
        .map(|r| r.name())
        .filter(|name| expected.contains(name))
        .collect()
}
