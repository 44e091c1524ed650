//! Works out which privileges a command needs.

use std::collections::HashSet;

use super::descriptor::{CommandDescriptor, Stage, StageTarget};
use super::registry;
use super::views::{NoViews, ResolvedDependency, ViewCatalog, resolve_view_chain};
use crate::error::{AuthzError, Result};
use crate::namespace::Namespace;
use crate::permissions::{Action, PrivilegeSet, ResourcePattern};

pub const DEFAULT_MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorOptions {
    /// Bound on nested pipelines plus view hops
    pub max_depth: usize,
    /// Reading through a view also needs `find` on everything it reads
    pub resolve_view_dependents: bool,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            resolve_view_dependents: false,
        }
    }
}

/// Maps a [`CommandDescriptor`] to the privileges it requires.
#[derive(Debug, Clone, Default)]
pub struct PrivilegeExtractor {
    options: ExtractorOptions,
}

impl PrivilegeExtractor {
    pub fn new(options: ExtractorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractorOptions {
        &self.options
    }

    /// Required privileges, treating every namespace as a collection.
    pub fn required_privileges(&self, cmd: &CommandDescriptor) -> Result<PrivilegeSet> {
        self.required_privileges_with_views(cmd, &NoViews)
    }

    /// Required privileges for `cmd`, resolving views through `views`.
    ///
    /// Unrecognized commands and stages fail with `UnknownOperation`; the
    /// caller must treat that as a denial.
    pub fn required_privileges_with_views(
        &self,
        cmd: &CommandDescriptor,
        views: &dyn ViewCatalog,
    ) -> Result<PrivilegeSet> {
        let template = registry::lookup(&cmd.name)
            .ok_or_else(|| AuthzError::UnknownOperation(cmd.name.clone()))?;

        let mut extraction = Extraction {
            options: &self.options,
            views,
            cmd,
            required: PrivilegeSet::new(),
            expanding: HashSet::new(),
            expanded: HashSet::new(),
        };
        template.apply(&mut extraction)?;
        if cmd.name.starts_with('_') {
            extraction.require(ResourcePattern::ClusterResource, &[Action::Internal]);
        }

        tracing::trace!(
            command = %cmd.name,
            db = %cmd.db,
            required = extraction.required.len(),
            "Extracted required privileges"
        );
        Ok(extraction.required)
    }
}

/// Where a pipeline runs: always a database, usually a collection.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    pub db: String,
    pub ns: Option<Namespace>,
}

impl Scope {
    pub fn collection(ns: Namespace) -> Self {
        Self {
            db: ns.db.clone(),
            ns: Some(ns),
        }
    }

    pub fn database(db: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            ns: None,
        }
    }

    fn namespace(&self, stage: &Stage) -> Result<&Namespace> {
        self.ns.as_ref().ok_or_else(|| {
            AuthzError::InvalidNamespace(format!(
                "{} must run against a collection",
                stage.name()
            ))
        })
    }
}

/// In-progress extraction for one command.
pub(crate) struct Extraction<'a> {
    options: &'a ExtractorOptions,
    views: &'a dyn ViewCatalog,
    pub cmd: &'a CommandDescriptor,
    required: PrivilegeSet,
    /// Views whose dependents are being added
    expanding: HashSet<Namespace>,
    /// Views whose dependents are already in `required`
    expanded: HashSet<Namespace>,
}

impl Extraction<'_> {
    pub fn require(&mut self, resource: ResourcePattern, actions: &[Action]) {
        self.required.add_actions(resource, actions);
    }

    pub fn require_namespace(&mut self, ns: &Namespace, actions: &[Action]) {
        self.require(ResourcePattern::for_namespace(ns), actions);
    }

    /// Actions on a namespace the command writes to.
    pub fn write(&mut self, ns: &Namespace, actions: &[Action]) {
        self.require_namespace(ns, actions);
        if self.cmd.args.bypass_document_validation {
            self.require_namespace(ns, &[Action::BypassDocumentValidation]);
        }
    }

    /// `find` on `ns`, following it through views when it is one.
    pub fn read(&mut self, ns: &Namespace, depth: usize) -> Result<()> {
        self.require_namespace(ns, &[Action::Find]);
        self.follow_views(ns, depth)
    }

    /// Walk the view chain behind `ns`. The walk always happens so cycles
    /// and over-long chains are caught; only strict mode turns the chain
    /// into requirements.
    fn follow_views(&mut self, ns: &Namespace, depth: usize) -> Result<()> {
        let remaining = self.options.max_depth.saturating_sub(depth);
        let chain = resolve_view_chain(self.views, ns, remaining)
            .map_err(|err| match err {
                AuthzError::RecursionLimitExceeded(_) => {
                    AuthzError::RecursionLimitExceeded(self.options.max_depth)
                }
                other => other,
            })?;
        if !self.options.resolve_view_dependents {
            return Ok(());
        }
        self.expand_chain(&chain, depth)
    }

    /// Add the dependents of each view in `chain`. A view's own source and
    /// pipeline are expanded while it stays on the path, so reaching it
    /// again from inside is a cycle. Each view is expanded once per command.
    fn expand_chain(&mut self, chain: &[ResolvedDependency], depth: usize) -> Result<()> {
        let Some((dependency, rest)) = chain.split_first() else {
            return Ok(());
        };
        let view = &dependency.view;
        if self.expanding.contains(view) {
            return Err(AuthzError::ViewCycle(view.clone()));
        }
        if self.expanded.contains(view) {
            return Ok(());
        }

        self.expanding.insert(view.clone());
        let source = &dependency.definition.view_on;
        self.require_namespace(source, &[Action::Find]);
        let result = self
            .pipeline(
                &Scope::collection(source.clone()),
                &dependency.definition.pipeline,
                depth + 1,
            )
            .and_then(|()| self.expand_chain(rest, depth + 1));
        self.expanding.remove(view);

        if result.is_ok() {
            self.expanded.insert(view.clone());
        }
        result
    }

    /// Top-level aggregation against `scope`.
    pub fn aggregate(&mut self, scope: &Scope) -> Result<()> {
        let cmd = self.cmd;
        let pipeline = cmd.pipeline.as_deref().unwrap_or(&[]);
        let leads_with_source = pipeline.first().is_some_and(Stage::is_initial_source);

        if !leads_with_source {
            match &scope.ns {
                Some(ns) => self.read(ns, 0)?,
                None => {
                    return Err(AuthzError::InvalidNamespace(format!(
                        "aggregate on {} without a collection needs an initial source stage",
                        scope.db
                    )));
                }
            }
        }
        self.pipeline(scope, pipeline, 0)
    }

    /// Requirements of every stage in `stages`, at nesting level `depth`.
    pub fn pipeline(&mut self, scope: &Scope, stages: &[Stage], depth: usize) -> Result<()> {
        if depth > self.options.max_depth {
            return Err(AuthzError::RecursionLimitExceeded(self.options.max_depth));
        }
        for stage in stages {
            tracing::trace!(stage = stage.name(), depth, "Visiting stage");
            self.stage(scope, stage, depth)?;
        }
        Ok(())
    }

    fn stage(&mut self, scope: &Scope, stage: &Stage, depth: usize) -> Result<()> {
        match stage {
            Stage::CollStats => {
                let ns = scope.namespace(stage)?.clone();
                self.require_namespace(&ns, &[Action::CollStats]);
            }
            Stage::IndexStats => {
                let ns = scope.namespace(stage)?.clone();
                self.require_namespace(&ns, &[Action::IndexStats]);
            }
            Stage::PlanCacheStats => {
                let ns = scope.namespace(stage)?.clone();
                self.require_namespace(&ns, &[Action::PlanCacheRead]);
            }
            Stage::CurrentOp { all_users } => {
                if *all_users {
                    self.require(ResourcePattern::ClusterResource, &[Action::Inprog]);
                }
            }
            Stage::ListSessions { all_users } | Stage::ListLocalSessions { all_users } => {
                if *all_users {
                    self.require(ResourcePattern::ClusterResource, &[Action::ListSessions]);
                }
            }
            Stage::ChangeStream {
                all_changes_for_cluster,
            } => {
                let resource = if *all_changes_for_cluster {
                    ResourcePattern::AnyNormalResource
                } else {
                    match &scope.ns {
                        Some(ns) => ResourcePattern::for_namespace(ns),
                        None => ResourcePattern::for_db(scope.db.clone()),
                    }
                };
                self.require(resource, &[Action::ChangeStream, Action::Find]);
            }
            Stage::Documents | Stage::Queue | Stage::Transform(_) => {}
            Stage::ListCatalog => {
                self.require(
                    ResourcePattern::for_db(scope.db.clone()),
                    &[Action::ListCollections],
                );
            }
            Stage::Lookup { from, pipeline } => {
                self.sub_pipeline(scope, from.as_ref(), pipeline, depth)?;
            }
            Stage::UnionWith { coll, pipeline } => {
                self.sub_pipeline(scope, coll.as_ref(), pipeline, depth)?;
            }
            Stage::GraphLookup { from } => {
                let target = from.resolve(&scope.db)?;
                self.read(&target, depth + 1)?;
            }
            Stage::Facet(branches) => {
                for (_, branch) in branches {
                    self.pipeline(scope, branch, depth + 1)?;
                }
            }
            Stage::Out(target) => {
                let ns = target.resolve(&scope.db)?;
                self.write(&ns, &[Action::Insert, Action::Remove]);
            }
            Stage::Merge { into, when_matched } => {
                let ns = into.resolve(&scope.db)?;
                if when_matched.modifies_existing() {
                    self.write(&ns, &[Action::Insert, Action::Update]);
                } else {
                    self.write(&ns, &[Action::Insert]);
                }
            }
            Stage::Internal(_) => {
                self.require(ResourcePattern::ClusterResource, &[Action::Internal]);
            }
            Stage::Unknown(name) => return Err(AuthzError::UnknownOperation(name.clone())),
        }
        Ok(())
    }

    /// `$lookup`/`$unionWith`: read the foreign collection, then run the
    /// nested pipeline against it.
    fn sub_pipeline(
        &mut self,
        scope: &Scope,
        target: Option<&StageTarget>,
        stages: &[Stage],
        depth: usize,
    ) -> Result<()> {
        let inner = match target {
            Some(target) => {
                let ns = target.resolve(&scope.db)?;
                self.read(&ns, depth + 1)?;
                Scope::collection(ns)
            }
            None => Scope::database(scope.db.clone()),
        };
        self.pipeline(&inner, stages, depth + 1)
    }
}
