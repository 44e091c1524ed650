//! Resource matching between granted and requested patterns.

use crate::namespace::is_internal_database;
use crate::permissions::{ActionSet, Privilege, ResourcePattern};

/// Whether a granted pattern covers a requested pattern.
///
/// Any matching grant counts; specificity plays no part here.
pub fn matches(granted: &ResourcePattern, requested: &ResourcePattern) -> bool {
    use ResourcePattern as P;

    if granted == requested {
        return true;
    }

    match (granted, requested) {
        (P::AnyResource, _) => true,

        // Exact grants only match themselves, handled above.
        (P::ExactNamespace(_) | P::ExactSystemNamespace(_), _) => false,

        (P::AnyCollectionInDb { db }, P::ExactNamespace(ns)) => *db == ns.db,

        (P::AnyCollectionNamed { collection }, P::ExactNamespace(ns))
        | (P::AnyCollectionNamed { collection }, P::ExactSystemNamespace(ns)) => {
            *collection == ns.coll
        }

        (P::AnyNormalResource, P::ExactNamespace(ns)) => ns.is_normal(),
        (P::AnyNormalResource, P::AnyCollectionInDb { db }) => !is_internal_database(db),

        (P::AnySystemBuckets, P::ExactSystemNamespace(ns)) => ns.is_system_buckets(),
        (P::AnySystemBuckets, P::SystemBucketsInDb { .. } | P::SystemBucketsExact { .. }) => true,

        (P::SystemBucketsInDb { db }, P::ExactSystemNamespace(ns)) => {
            *db == ns.db && ns.is_system_buckets()
        }
        (P::SystemBucketsInDb { db }, P::SystemBucketsExact { db: other, .. }) => db == other,

        (P::SystemBucketsExact { .. }, P::ExactSystemNamespace(ns)) => {
            granted.namespace().as_ref() == Some(ns)
        }

        // Cluster only matches cluster, handled above.
        _ => false,
    }
}

/// Stateless matcher over a set of held privileges.
pub struct ResourceMatcher;

impl ResourceMatcher {
    /// Union of the actions of every held privilege whose pattern matches
    /// `requested`.
    pub fn granted_actions<'a, I>(held: I, requested: &ResourcePattern) -> ActionSet
    where
        I: IntoIterator<Item = &'a Privilege>,
    {
        let mut actions = ActionSet::empty();
        for privilege in held {
            if matches(&privilege.resource, requested) {
                actions.union_with(&privilege.actions);
            }
        }
        actions
    }

    /// The most specific held privilege that alone covers the requirement.
    /// Intended for diagnostics and policy tooling.
    pub fn best_match<'a, I>(held: I, required: &Privilege) -> Option<&'a Privilege>
    where
        I: IntoIterator<Item = &'a Privilege>,
    {
        held.into_iter()
            .filter(|p| p.covers(&required.resource, &required.actions))
            .max_by_key(|p| p.resource.specificity())
    }
}
