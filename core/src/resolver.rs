//! Transitive role resolution.

use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::Serialize;

use crate::error::{AuthzError, Result};
use crate::graph::RoleGraph;
use crate::permissions::{AuthenticationRestriction, PrivilegeSet, RoleName};

/// Everything a principal holds after following role inheritance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedPrivileges {
    /// Every role reached, directly granted ones included
    pub roles: BTreeSet<RoleName>,
    pub privileges: PrivilegeSet,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<AuthenticationRestriction>,
}

impl ResolvedPrivileges {
    pub fn has_role(&self, name: &RoleName) -> bool {
        self.roles.contains(name)
    }
}

pub struct PrivilegeResolver<'g> {
    graph: &'g RoleGraph,
}

impl<'g> PrivilegeResolver<'g> {
    pub fn new(graph: &'g RoleGraph) -> Self {
        Self { graph }
    }

    /// Breadth-first walk over parent roles starting from `granted`,
    /// visiting each role once and unioning direct privileges.
    ///
    /// An unknown role anywhere in the walk aborts resolution.
    pub fn resolve(&self, granted: &[RoleName]) -> Result<ResolvedPrivileges> {
        let mut resolved = ResolvedPrivileges::default();
        let mut visited: HashSet<RoleName> = HashSet::new();
        let mut queue: VecDeque<RoleName> = granted.iter().cloned().collect();

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let role = self
                .graph
                .get_role(&name)
                .ok_or_else(|| AuthzError::UnknownRole(name.clone()))?;
            tracing::trace!(role = %name, parents = role.parents.len(), "Visiting role");

            resolved.privileges.merge(&role.privileges);
            resolved.restrictions.extend(role.restrictions.iter().cloned());
            for parent in &role.parents {
                if !visited.contains(parent) {
                    queue.push_back(parent.clone());
                }
            }
            resolved.roles.insert(name);
        }

        Ok(resolved)
    }
}
