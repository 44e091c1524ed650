//! Typed command descriptors and the aggregation pipeline AST.
//!
//! Everything the extractor looks at has already been pulled out of the raw
//! command document by the parser; nothing downstream inspects JSON.

use serde::Serialize;

use crate::error::{AuthzError, Result};
use crate::namespace::Namespace;

/// A command addressed to a database, ready for privilege extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandDescriptor {
    /// Command name, the first key of the command document
    pub name: String,
    /// Database the command runs against (`$db`)
    pub db: String,
    /// Value of the first key
    pub target: CommandTarget,
    pub args: CommandArgs,
    /// `pipeline` argument: the aggregation pipeline, or a view definition
    /// for `create`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Pipeline>,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, db: impl Into<String>, target: CommandTarget) -> Self {
        Self {
            name: name.into(),
            db: db.into(),
            target,
            args: CommandArgs::default(),
            pipeline: None,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn with_args(mut self, args: CommandArgs) -> Self {
        self.args = args;
        self
    }

    /// The target collection in the command's own database.
    pub fn target_namespace(&self) -> Result<Namespace> {
        match &self.target {
            CommandTarget::Collection(coll) => Namespace::new(self.db.clone(), coll.clone()),
            other => Err(AuthzError::InvalidNamespace(format!(
                "{} expects a collection name, got {other}",
                self.name
            ))),
        }
    }

    /// The first argument parsed as a full `db.coll` namespace.
    pub fn namespace_argument(&self) -> Result<Namespace> {
        match &self.target {
            CommandTarget::Collection(full) => Namespace::parse(full),
            other => Err(AuthzError::InvalidNamespace(format!(
                "{} expects a namespace, got {other}",
                self.name
            ))),
        }
    }

    /// The first argument as a database name.
    pub fn database_argument(&self) -> Result<&str> {
        match &self.target {
            CommandTarget::Collection(db) if !db.is_empty() && !db.contains('.') => Ok(db),
            other => Err(AuthzError::InvalidNamespace(format!(
                "{} expects a database name, got {other}",
                self.name
            ))),
        }
    }

    /// A sibling collection of the command's database.
    pub fn namespace_in_db(&self, coll: &str) -> Result<Namespace> {
        Namespace::new(self.db.clone(), coll)
    }
}

/// The first value of the command document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandTarget {
    Collection(String),
    Number(f64),
    Flag(bool),
    /// A document or array with no namespace in it
    Other,
}

impl std::fmt::Display for CommandTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandTarget::Collection(s) => write!(f, "\"{s}\""),
            CommandTarget::Number(n) => write!(f, "{n}"),
            CommandTarget::Flag(b) => write!(f, "{b}"),
            CommandTarget::Other => write!(f, "<document>"),
        }
    }
}

/// Options that change which privileges a command needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandArgs {
    pub bypass_document_validation: bool,
    /// Replication term was supplied (`find`/`getMore` from a secondary)
    pub has_term: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_on: Option<String>,
    pub capped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub drop_target: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out: Option<MapReduceOutput>,
    /// `currentOp` with `$all: true`
    pub all_ops: bool,
    /// `currentOp` with `$ownOps: true`
    pub own_ops: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_db: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_db: Option<String>,
    /// `getMore` collection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Any update in the command may insert
    pub upsert: bool,
    /// `findAndModify` deletes instead of updating
    pub remove: bool,
}

/// Where `mapReduce` writes its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum MapReduceOutput {
    Inline,
    Replace { db: Option<String>, coll: String },
    Merge { db: Option<String>, coll: String },
    Reduce { db: Option<String>, coll: String },
}

pub type Pipeline = Vec<Stage>;

/// A stage's reference to another collection: a bare name in the current
/// database or an explicit `{db, coll}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
    pub coll: String,
}

impl StageTarget {
    pub fn collection(coll: impl Into<String>) -> Self {
        Self {
            db: None,
            coll: coll.into(),
        }
    }

    pub fn in_db(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: Some(db.into()),
            coll: coll.into(),
        }
    }

    /// Resolve against the database the enclosing pipeline runs in.
    pub fn resolve(&self, current_db: &str) -> Result<Namespace> {
        let db = self.db.as_deref().unwrap_or(current_db);
        Namespace::new(db, self.coll.clone())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WhenMatched {
    Replace,
    KeepExisting,
    #[default]
    Merge,
    Fail,
    Pipeline,
}

impl WhenMatched {
    pub fn modifies_existing(self) -> bool {
        matches!(
            self,
            WhenMatched::Replace | WhenMatched::Merge | WhenMatched::Pipeline
        )
    }
}

/// One aggregation stage, reduced to what matters for authorization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    CollStats,
    IndexStats,
    PlanCacheStats,
    CurrentOp {
        all_users: bool,
    },
    ListSessions {
        all_users: bool,
    },
    ListLocalSessions {
        all_users: bool,
    },
    ChangeStream {
        all_changes_for_cluster: bool,
    },
    Documents,
    Queue,
    ListCatalog,
    Lookup {
        from: Option<StageTarget>,
        pipeline: Pipeline,
    },
    GraphLookup {
        from: StageTarget,
    },
    UnionWith {
        coll: Option<StageTarget>,
        pipeline: Pipeline,
    },
    Facet(Vec<(String, Pipeline)>),
    Out(StageTarget),
    Merge {
        into: StageTarget,
        when_matched: WhenMatched,
    },
    /// `$_internal*` and other server-to-server stages
    Internal(String),
    /// Stages that only reshape documents already flowing through
    Transform(String),
    /// Anything the parser does not recognize
    Unknown(String),
}

impl Stage {
    /// Whether this stage produces its own documents when it leads a
    /// pipeline, so no base `find` is needed.
    pub fn is_initial_source(&self) -> bool {
        matches!(
            self,
            Stage::CollStats
                | Stage::IndexStats
                | Stage::PlanCacheStats
                | Stage::CurrentOp { .. }
                | Stage::ListSessions { .. }
                | Stage::ListLocalSessions { .. }
                | Stage::ChangeStream { .. }
                | Stage::Documents
                | Stage::Queue
                | Stage::ListCatalog
        )
    }

    pub fn name(&self) -> &str {
        match self {
            Stage::CollStats => "$collStats",
            Stage::IndexStats => "$indexStats",
            Stage::PlanCacheStats => "$planCacheStats",
            Stage::CurrentOp { .. } => "$currentOp",
            Stage::ListSessions { .. } => "$listSessions",
            Stage::ListLocalSessions { .. } => "$listLocalSessions",
            Stage::ChangeStream { .. } => "$changeStream",
            Stage::Documents => "$documents",
            Stage::Queue => "$queue",
            Stage::ListCatalog => "$listCatalog",
            Stage::Lookup { .. } => "$lookup",
            Stage::GraphLookup { .. } => "$graphLookup",
            Stage::UnionWith { .. } => "$unionWith",
            Stage::Facet(_) => "$facet",
            Stage::Out(_) => "$out",
            Stage::Merge { .. } => "$merge",
            Stage::Internal(name) | Stage::Transform(name) | Stage::Unknown(name) => name,
        }
    }
}
