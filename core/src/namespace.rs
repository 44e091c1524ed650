//! Database/collection namespaces.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};

/// Databases whose contents are never "normal" user data.
const INTERNAL_DATABASES: &[&str] = &["local", "config"];

const SYSTEM_PREFIX: &str = "system.";
const SYSTEM_BUCKETS_PREFIX: &str = "system.buckets.";

/// A concrete `db.collection` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace {
    pub db: String,
    pub coll: String,
}

impl Namespace {
    /// Create a namespace, rejecting empty components.
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Result<Self> {
        let ns = Self {
            db: db.into(),
            coll: coll.into(),
        };
        ns.validate()?;
        Ok(ns)
    }

    /// Parse `"db.coll"`, splitting at the first dot.
    pub fn parse(full: &str) -> Result<Self> {
        let (db, coll) = full
            .split_once('.')
            .ok_or_else(|| AuthzError::InvalidNamespace(full.to_string()))?;
        Self::new(db, coll)
    }

    fn validate(&self) -> Result<()> {
        if self.db.is_empty() || self.coll.is_empty() {
            return Err(AuthzError::InvalidNamespace(self.to_string()));
        }
        if self.db.contains('.') || self.db.contains('\0') || self.coll.contains('\0') {
            return Err(AuthzError::InvalidNamespace(self.to_string()));
        }
        Ok(())
    }

    pub fn is_system(&self) -> bool {
        self.coll.starts_with(SYSTEM_PREFIX)
    }

    pub fn is_system_buckets(&self) -> bool {
        self.coll.starts_with(SYSTEM_BUCKETS_PREFIX)
    }

    /// A namespace is normal when it is neither a system collection nor in
    /// one of the server-internal databases.
    pub fn is_normal(&self) -> bool {
        !self.is_system() && !is_internal_database(&self.db)
    }

    /// Same database, different collection.
    pub fn sibling(&self, coll: impl Into<String>) -> Result<Self> {
        Self::new(self.db.clone(), coll)
    }
}

/// Whether `db` is one of the databases excluded from the "normal" resources.
pub fn is_internal_database(db: &str) -> bool {
    INTERNAL_DATABASES.contains(&db)
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}
