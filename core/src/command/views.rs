//! View definitions consumed from the catalog.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use super::descriptor::Pipeline;
use super::parser::parse_pipeline;
use crate::error::{AuthzError, Result};
use crate::namespace::Namespace;

/// A view: the namespace it reads from and its defining pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDefinition {
    pub view_on: Namespace,
    pub pipeline: Pipeline,
}

/// Source of view definitions. Implemented by whatever owns the catalog.
pub trait ViewCatalog {
    /// The definition of `ns` when it is a view, `None` for a collection.
    fn lookup_view(&self, ns: &Namespace) -> Option<ViewDefinition>;
}

/// A catalog without views.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoViews;

impl ViewCatalog for NoViews {
    fn lookup_view(&self, _ns: &Namespace) -> Option<ViewDefinition> {
        None
    }
}

/// One hop of a resolved view chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDependency {
    pub view: Namespace,
    pub definition: ViewDefinition,
}

/// In-memory view catalog.
#[derive(Debug, Clone, Default)]
pub struct ViewGraph {
    views: HashMap<Namespace, ViewDefinition>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawView {
    /// `db.view`
    view: String,
    /// Collection or view in the same database
    view_on: String,
    #[serde(default)]
    pipeline: Value,
}

impl ViewGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, view: Namespace, definition: ViewDefinition) {
        self.views.insert(view, definition);
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Load `[{"view": "db.v", "viewOn": "coll", "pipeline": [...]}, ...]`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: Vec<RawView> = serde_json::from_str(json)?;
        let mut graph = ViewGraph::new();
        for entry in raw {
            let view = Namespace::parse(&entry.view)?;
            let view_on = view.sibling(entry.view_on)?;
            let pipeline = match entry.pipeline {
                Value::Null => Vec::new(),
                ref value => parse_pipeline(value, 0)?,
            };
            graph.insert(view, ViewDefinition { view_on, pipeline });
        }
        Ok(graph)
    }
}

impl ViewCatalog for ViewGraph {
    fn lookup_view(&self, ns: &Namespace) -> Option<ViewDefinition> {
        self.views.get(ns).cloned()
    }
}

/// Follow `ns` through views until a concrete collection is reached.
///
/// Returns one entry per view hop; an empty chain means `ns` is not a view.
/// Fails with `ViewCycle` when a view is revisited and with
/// `RecursionLimitExceeded` when the chain is longer than `max_depth`.
pub fn resolve_view_chain(
    catalog: &dyn ViewCatalog,
    ns: &Namespace,
    max_depth: usize,
) -> Result<Vec<ResolvedDependency>> {
    let mut chain = Vec::new();
    let mut seen: HashSet<Namespace> = HashSet::new();
    let mut current = ns.clone();

    while let Some(definition) = catalog.lookup_view(&current) {
        if !seen.insert(current.clone()) {
            return Err(AuthzError::ViewCycle(current));
        }
        if chain.len() >= max_depth {
            return Err(AuthzError::RecursionLimitExceeded(max_depth));
        }
        let next = definition.view_on.clone();
        chain.push(ResolvedDependency {
            view: current,
            definition,
        });
        current = next;
    }

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(coll: &str) -> Namespace {
        Namespace::new("d", coll).unwrap()
    }

    fn view(graph: &mut ViewGraph, name: &str, on: &str) {
        graph.insert(
            ns(name),
            ViewDefinition {
                view_on: ns(on),
                pipeline: vec![],
            },
        );
    }

    #[test]
    fn test_collection_has_empty_chain() {
        let graph = ViewGraph::new();
        assert!(resolve_view_chain(&graph, &ns("plain"), 10).unwrap().is_empty());
    }

    #[test]
    fn test_chain_through_views() {
        let mut graph = ViewGraph::new();
        view(&mut graph, "v2", "v1");
        view(&mut graph, "v1", "base");

        let chain = resolve_view_chain(&graph, &ns("v2"), 10).unwrap();
        let hops: Vec<String> = chain
            .iter()
            .map(|d| format!("{}->{}", d.view.coll, d.definition.view_on.coll))
            .collect();
        assert_eq!(hops, vec!["v2->v1", "v1->base"]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut graph = ViewGraph::new();
        view(&mut graph, "a", "b");
        view(&mut graph, "b", "a");
        assert!(matches!(
            resolve_view_chain(&graph, &ns("a"), 10),
            Err(AuthzError::ViewCycle(_))
        ));
    }

    #[test]
    fn test_depth_limit() {
        let mut graph = ViewGraph::new();
        for i in 0..5 {
            view(&mut graph, &format!("v{i}"), &format!("v{}", i + 1));
        }
        assert!(resolve_view_chain(&graph, &ns("v0"), 5).is_ok());
        assert_eq!(
            resolve_view_chain(&graph, &ns("v0"), 4).unwrap_err(),
            AuthzError::RecursionLimitExceeded(4)
        );
    }

    #[test]
    fn test_load_from_json() {
        let graph = ViewGraph::from_json_str(
            r#"[{"view": "d.recent", "viewOn": "orders", "pipeline": [{"$lookup": {"from": "users"}}]}]"#,
        )
        .unwrap();
        let def = graph.lookup_view(&ns("recent")).unwrap();
        assert_eq!(def.view_on, ns("orders"));
        assert_eq!(def.pipeline.len(), 1);
        assert!(ViewGraph::from_json_str(r#"[{"view": "nodot", "viewOn": "x"}]"#).is_err());
    }
}
