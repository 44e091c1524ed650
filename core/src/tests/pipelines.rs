use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use super::{decide, graph_from, user};
use crate::checker::{AuthorizationChecker, DecisionReason};
use crate::command::{NoViews, ViewGraph, parse_command};
use crate::config::AuthzConfig;
use crate::error::AuthzError;
use crate::namespace::Namespace;
use crate::permissions::{Action, Privilege, ResourcePattern, RoleName};

const ANALYST_ROLES: &str = r#"[
    {"role": "fooReader", "db": "d", "privileges": [
        {"resource": {"db": "d", "collection": "foo"}, "actions": ["find"]}
    ]},
    {"role": "barReader", "db": "d", "privileges": [
        {"resource": {"db": "d", "collection": "bar"}, "actions": ["find"]}
    ]},
    {"role": "reporter", "db": "d", "privileges": [
        {"resource": {"db": "d", "collection": "report"}, "actions": ["insert", "remove"]}
    ], "roles": [{"role": "fooReader", "db": "d"}]},
    {"role": "dbReader", "db": "d", "privileges": [
        {"resource": {"db": "d", "collection": ""}, "actions": ["find"]}
    ]}
]"#;

fn role(name: &str) -> RoleName {
    RoleName::new(name, "d")
}

fn exact(db: &str, coll: &str) -> ResourcePattern {
    ResourcePattern::for_namespace(&Namespace::new(db, coll).unwrap())
}

fn aggregate(pipeline: Value) -> Value {
    json!({"aggregate": "foo", "pipeline": pipeline, "cursor": {}})
}

#[test]
fn test_lookup_needs_find_on_foreign_collection() {
    let graph = graph_from(ANALYST_ROLES);
    let checker = AuthorizationChecker::default();
    let cmd = aggregate(json!([
        {"$lookup": {"from": "bar", "localField": "a", "foreignField": "b", "as": "joined"}}
    ]));

    let denied = decide(&checker, &graph, vec![role("fooReader")], "d", &cmd, &NoViews);
    assert!(!denied.authorized);
    assert_eq!(
        denied.missing_privileges,
        vec![Privilege::single(exact("d", "bar"), Action::Find)]
    );

    let allowed = decide(
        &checker,
        &graph,
        vec![role("fooReader"), role("barReader")],
        "d",
        &cmd,
        &NoViews,
    );
    assert!(allowed.authorized);
    assert_eq!(allowed.reason, DecisionReason::Granted);
}

#[test]
fn test_facet_branches_are_checked() {
    let graph = graph_from(ANALYST_ROLES);
    let checker = AuthorizationChecker::default();
    let cmd = aggregate(json!([
        {"$facet": {
            "plain": [{"$match": {}}],
            "joined": [{"$unionWith": {"coll": "bar", "pipeline": [{"$project": {"x": 1}}]}}]
        }}
    ]));

    assert!(!decide(&checker, &graph, vec![role("fooReader")], "d", &cmd, &NoViews).authorized);
    assert!(decide(&checker, &graph, vec![role("dbReader")], "d", &cmd, &NoViews).authorized);
}

#[test]
fn test_out_needs_insert_and_remove() {
    let graph = graph_from(ANALYST_ROLES);
    let checker = AuthorizationChecker::default();
    let cmd = aggregate(json!([{"$match": {}}, {"$out": "report"}]));

    assert!(decide(&checker, &graph, vec![role("reporter")], "d", &cmd, &NoViews).authorized);

    let denied = decide(&checker, &graph, vec![role("fooReader")], "d", &cmd, &NoViews);
    assert_eq!(
        denied.missing_privileges,
        vec![Privilege::new(
            exact("d", "report"),
            crate::permissions::ActionSet::of(&[Action::Insert, Action::Remove])
        )]
    );
}

#[test]
fn test_internal_stage_is_system_only() {
    let graph = graph_from(ANALYST_ROLES);
    let checker = AuthorizationChecker::default();
    let cmd = aggregate(json!([{"$_internalInhibitOptimization": {}}]));

    let root = decide(
        &checker,
        &graph,
        vec![RoleName::new("root", "admin")],
        "d",
        &cmd,
        &NoViews,
    );
    assert!(!root.authorized);
    assert_eq!(
        root.missing_privileges,
        vec![Privilege::single(ResourcePattern::ClusterResource, Action::Internal)]
    );

    let system = decide(
        &checker,
        &graph,
        vec![RoleName::new("__system", "admin")],
        "d",
        &cmd,
        &NoViews,
    );
    assert!(system.authorized);
}

#[test]
fn test_unknown_stage_is_denied() {
    let graph = graph_from(ANALYST_ROLES);
    let checker = AuthorizationChecker::default();
    let cmd = aggregate(json!([{"$teleport": {}}]));

    let decision = decide(
        &checker,
        &graph,
        vec![RoleName::new("__system", "admin")],
        "d",
        &cmd,
        &NoViews,
    );
    assert!(!decision.authorized);
    assert_eq!(decision.reason, DecisionReason::UnknownOperation("$teleport".into()));
}

fn nested_lookups(levels: usize) -> Value {
    let mut pipeline = json!([{"$match": {}}]);
    for level in 0..levels {
        pipeline = json!([{"$lookup": {
            "from": format!("c{level}"),
            "pipeline": pipeline,
            "as": "inner"
        }}]);
    }
    pipeline
}

#[test]
fn test_deep_nesting_within_limit() {
    let graph = graph_from(ANALYST_ROLES);
    let checker = AuthorizationChecker::default();
    let cmd = aggregate(nested_lookups(66));

    let decision = decide(&checker, &graph, vec![role("dbReader")], "d", &cmd, &NoViews);
    assert!(decision.authorized);
    // foo plus one foreign collection per level
    assert_eq!(decision.required_privileges.len(), 67);
}

#[test]
fn test_nesting_past_limit_is_denied() {
    let graph = graph_from(ANALYST_ROLES);
    let checker = AuthorizationChecker::new(AuthzConfig {
        max_recursion_depth: 8,
        ..Default::default()
    });
    let cmd = aggregate(nested_lookups(20));

    let decision = decide(&checker, &graph, vec![role("dbReader")], "d", &cmd, &NoViews);
    assert!(!decision.authorized);
    assert_eq!(decision.reason, DecisionReason::RecursionLimitExceeded(8));
}

const VIEWS: &str = r#"[
    {"view": "d.recent", "viewOn": "foo", "pipeline": [{"$match": {"recent": true}}]},
    {"view": "d.summary", "viewOn": "recent", "pipeline": [
        {"$lookup": {"from": "bar", "localField": "a", "foreignField": "b", "as": "j"}}
    ]}
]"#;

const VIEW_ROLES: &str = r#"[
    {"role": "summaryReader", "db": "d", "privileges": [
        {"resource": {"db": "d", "collection": "summary"}, "actions": ["find"]}
    ]},
    {"role": "fooReader", "db": "d", "privileges": [
        {"resource": {"db": "d", "collection": "foo"}, "actions": ["find"]}
    ]}
]"#;

#[test]
fn test_view_read_through_needs_only_the_view() {
    let graph = graph_from(VIEW_ROLES);
    let views = ViewGraph::from_json_str(VIEWS).unwrap();
    let checker = AuthorizationChecker::default();
    let cmd = json!({"find": "summary"});

    assert!(decide(&checker, &graph, vec![role("summaryReader")], "d", &cmd, &views).authorized);

    // Access to the collection behind a view does not grant the view.
    let denied = decide(&checker, &graph, vec![role("fooReader")], "d", &cmd, &views);
    assert!(!denied.authorized);
    assert_eq!(
        denied.missing_privileges,
        vec![Privilege::single(exact("d", "summary"), Action::Find)]
    );
}

#[test]
fn test_strict_views_require_the_whole_chain() {
    let graph = graph_from(VIEW_ROLES);
    let views = ViewGraph::from_json_str(VIEWS).unwrap();
    let checker = AuthorizationChecker::new(AuthzConfig {
        resolve_view_dependents: true,
        ..Default::default()
    });
    let cmd = json!({"find": "summary"});

    let decision = decide(&checker, &graph, vec![role("summaryReader")], "d", &cmd, &views);
    assert!(!decision.authorized);
    let missing: Vec<ResourcePattern> = decision
        .missing_privileges
        .iter()
        .map(|p| p.resource.clone())
        .collect();
    assert!(missing.contains(&exact("d", "recent")));
    assert!(missing.contains(&exact("d", "foo")));
    assert!(missing.contains(&exact("d", "bar")));

    let db_reader = graph_from(
        r#"[{"role": "all", "db": "d", "privileges": [
            {"resource": {"db": "d", "collection": ""}, "actions": ["find"]}
        ]}]"#,
    );
    assert!(decide(&checker, &db_reader, vec![role("all")], "d", &cmd, &views).authorized);
}

#[test]
fn test_strict_view_joining_itself_is_a_cycle() {
    let graph = graph_from(VIEW_ROLES);
    let views = ViewGraph::from_json_str(
        r#"[{"view": "d.loop", "viewOn": "foo", "pipeline": [
            {"$lookup": {"from": "loop", "localField": "a", "foreignField": "b", "as": "j"}}
        ]}]"#,
    )
    .unwrap();
    let checker = AuthorizationChecker::new(AuthzConfig {
        resolve_view_dependents: true,
        ..Default::default()
    });
    let cmd = parse_command("d", &json!({"find": "loop"})).unwrap();

    let err = checker
        .is_authorized_with_views(&graph, &user(vec![role("summaryReader")]), &cmd, &views)
        .unwrap_err();
    assert_eq!(err, AuthzError::ViewCycle(Namespace::new("d", "loop").unwrap()));
    assert!(err.is_integrity_error());
}
