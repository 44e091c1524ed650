//! Resource patterns: what a privilege applies to.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AuthzError, Result};
use crate::namespace::Namespace;

const SYSTEM_BUCKETS_PREFIX: &str = "system.buckets.";

/// Resource types that privileges are attached to.
///
/// A pattern is either granted (held by a role) or requested (required by a
/// command). Requested patterns for concrete namespaces are built with
/// [`ResourcePattern::for_namespace`], which picks the system or non-system
/// exact variant so the kind never changes after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourcePattern {
    /// A single non-system collection.
    ExactNamespace(Namespace),

    /// A single `system.*` collection, e.g. `admin.system.users`.
    ExactSystemNamespace(Namespace),

    /// Every non-system collection in one database.
    AnyCollectionInDb { db: String },

    /// The named collection in every database, system collections included.
    AnyCollectionNamed { collection: String },

    /// Every non-system collection outside the `local` and `config`
    /// databases, cluster-wide.
    ///
    /// Think carefully about whether a database-scoped pattern would do;
    /// this one spans every user database.
    AnyNormalResource,

    /// Every time-series buckets collection in every database.
    AnySystemBuckets,

    /// Every time-series buckets collection in one database.
    SystemBucketsInDb { db: String },

    /// The buckets collection backing one time-series collection.
    SystemBucketsExact { db: String, collection: String },

    /// Cluster-wide operations (replication, sharding, diagnostics).
    ClusterResource,

    /// Absolutely everything. Reserved for `root`/`__system`.
    AnyResource,
}

impl ResourcePattern {
    /// Requested pattern for a concrete namespace.
    pub fn for_namespace(ns: &Namespace) -> Self {
        if ns.is_system() {
            ResourcePattern::ExactSystemNamespace(ns.clone())
        } else {
            ResourcePattern::ExactNamespace(ns.clone())
        }
    }

    pub fn for_db(db: impl Into<String>) -> Self {
        ResourcePattern::AnyCollectionInDb { db: db.into() }
    }

    pub fn for_collection_name(collection: impl Into<String>) -> Self {
        ResourcePattern::AnyCollectionNamed {
            collection: collection.into(),
        }
    }

    /// Namespace of an exact pattern, buckets included.
    pub fn namespace(&self) -> Option<Namespace> {
        match self {
            ResourcePattern::ExactNamespace(ns) | ResourcePattern::ExactSystemNamespace(ns) => {
                Some(ns.clone())
            }
            ResourcePattern::SystemBucketsExact { db, collection } => Some(Namespace {
                db: db.clone(),
                coll: format!("{SYSTEM_BUCKETS_PREFIX}{collection}"),
            }),
            _ => None,
        }
    }

    /// Database this pattern is confined to, if any.
    pub fn db(&self) -> Option<&str> {
        match self {
            ResourcePattern::ExactNamespace(ns) | ResourcePattern::ExactSystemNamespace(ns) => {
                Some(&ns.db)
            }
            ResourcePattern::AnyCollectionInDb { db }
            | ResourcePattern::SystemBucketsInDb { db }
            | ResourcePattern::SystemBucketsExact { db, .. } => Some(db),
            _ => None,
        }
    }

    /// Rank used by policy tooling to pick the most specific of several
    /// matching grants. Higher is more specific. Never consulted for the
    /// allow/deny decision itself.
    pub fn specificity(&self) -> u8 {
        match self {
            ResourcePattern::ExactNamespace(_)
            | ResourcePattern::ExactSystemNamespace(_)
            | ResourcePattern::SystemBucketsExact { .. } => 7,
            ResourcePattern::SystemBucketsInDb { .. } => 6,
            ResourcePattern::AnyCollectionInDb { .. } => 5,
            ResourcePattern::AnyCollectionNamed { .. } => 4,
            ResourcePattern::AnySystemBuckets => 3,
            ResourcePattern::AnyNormalResource => 2,
            ResourcePattern::ClusterResource => 1,
            ResourcePattern::AnyResource => 0,
        }
    }

    /// Parse a resource document as found in role definitions.
    pub fn from_document(doc: &ResourceDocument) -> Result<Self> {
        let invalid = || AuthzError::InvalidResource(doc.to_string());

        match doc {
            ResourceDocument {
                cluster: Some(true),
                any_resource: None,
                db: None,
                collection: None,
                system_buckets: None,
            } => Ok(ResourcePattern::ClusterResource),
            ResourceDocument {
                any_resource: Some(true),
                cluster: None,
                db: None,
                collection: None,
                system_buckets: None,
            } => Ok(ResourcePattern::AnyResource),
            ResourceDocument {
                db: Some(db),
                collection: Some(coll),
                cluster: None,
                any_resource: None,
                system_buckets: None,
            } => match (db.is_empty(), coll.is_empty()) {
                (true, true) => Ok(ResourcePattern::AnyNormalResource),
                (true, false) => Ok(ResourcePattern::for_collection_name(coll.as_str())),
                (false, true) => Ok(ResourcePattern::for_db(db.as_str())),
                (false, false) => {
                    let ns = Namespace::new(db.as_str(), coll.as_str()).map_err(|_| invalid())?;
                    Ok(ResourcePattern::for_namespace(&ns))
                }
            },
            ResourceDocument {
                db: Some(db),
                system_buckets: Some(buckets),
                cluster: None,
                any_resource: None,
                collection: None,
            } => match (db.is_empty(), buckets.is_empty()) {
                (true, true) => Ok(ResourcePattern::AnySystemBuckets),
                (false, true) => Ok(ResourcePattern::SystemBucketsInDb { db: db.clone() }),
                (false, false) => Ok(ResourcePattern::SystemBucketsExact {
                    db: db.clone(),
                    collection: buckets.clone(),
                }),
                (true, false) => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }

    /// Render back to the document form.
    pub fn to_document(&self) -> ResourceDocument {
        let mut doc = ResourceDocument::default();
        match self {
            ResourcePattern::ExactNamespace(ns) | ResourcePattern::ExactSystemNamespace(ns) => {
                doc.db = Some(ns.db.clone());
                doc.collection = Some(ns.coll.clone());
            }
            ResourcePattern::AnyCollectionInDb { db } => {
                doc.db = Some(db.clone());
                doc.collection = Some(String::new());
            }
            ResourcePattern::AnyCollectionNamed { collection } => {
                doc.db = Some(String::new());
                doc.collection = Some(collection.clone());
            }
            ResourcePattern::AnyNormalResource => {
                doc.db = Some(String::new());
                doc.collection = Some(String::new());
            }
            ResourcePattern::AnySystemBuckets => {
                doc.db = Some(String::new());
                doc.system_buckets = Some(String::new());
            }
            ResourcePattern::SystemBucketsInDb { db } => {
                doc.db = Some(db.clone());
                doc.system_buckets = Some(String::new());
            }
            ResourcePattern::SystemBucketsExact { db, collection } => {
                doc.db = Some(db.clone());
                doc.system_buckets = Some(collection.clone());
            }
            ResourcePattern::ClusterResource => doc.cluster = Some(true),
            ResourcePattern::AnyResource => doc.any_resource = Some(true),
        }
        doc
    }
}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourcePattern::ExactNamespace(ns) | ResourcePattern::ExactSystemNamespace(ns) => {
                write!(f, "{ns}")
            }
            ResourcePattern::AnyCollectionInDb { db } => write!(f, "{db}.*"),
            ResourcePattern::AnyCollectionNamed { collection } => write!(f, "*.{collection}"),
            ResourcePattern::AnyNormalResource => write!(f, "anyNormalResource"),
            ResourcePattern::AnySystemBuckets => write!(f, "*.{SYSTEM_BUCKETS_PREFIX}*"),
            ResourcePattern::SystemBucketsInDb { db } => write!(f, "{db}.{SYSTEM_BUCKETS_PREFIX}*"),
            ResourcePattern::SystemBucketsExact { db, collection } => {
                write!(f, "{db}.{SYSTEM_BUCKETS_PREFIX}{collection}")
            }
            ResourcePattern::ClusterResource => write!(f, "cluster"),
            ResourcePattern::AnyResource => write!(f, "anyResource"),
        }
    }
}

/// Raw resource document: `{db, collection}`, `{cluster: true}`,
/// `{anyResource: true}` or `{db, system_buckets}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<bool>,
    #[serde(
        default,
        rename = "anyResource",
        skip_serializing_if = "Option::is_none"
    )]
    pub any_resource: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_buckets: Option<String>,
}

impl fmt::Display for ResourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

impl Serialize for ResourcePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResourcePattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let doc = ResourceDocument::deserialize(deserializer)?;
        ResourcePattern::from_document(&doc).map_err(serde::de::Error::custom)
    }
}
