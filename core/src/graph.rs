//! Role inheritance graph and its versioned, copy-on-write catalog.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{AuthzError, Result};
use crate::permissions::{BuiltinRole, Privilege, Role, RoleDefinition, RoleName};

/// The set of user-defined roles plus the implicit built-ins.
///
/// Built-in roles are not stored; they are materialized on lookup so they
/// exist in every database without seeding per-database copies. A graph is
/// immutable once published through a [`RoleCatalog`]; edits happen on a
/// private clone.
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    roles: HashMap<RoleName, Role>,
    version: u64,
}

impl RoleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a batch of definitions that may reference each
    /// other in any order. Parents must exist and the result must be acyclic.
    pub fn from_definitions(defs: &[RoleDefinition]) -> Result<Self> {
        let mut graph = RoleGraph::new();
        for def in defs {
            let role = Role::from_definition(def)?;
            graph.check_insertable(&role.name)?;
            graph.roles.insert(role.name.clone(), role);
        }
        for role in graph.roles.values() {
            for parent in &role.parents {
                if !graph.role_exists(parent) {
                    return Err(AuthzError::InvalidRoleGraph(format!(
                        "role {} inherits from unknown role {parent}",
                        role.name
                    )));
                }
            }
        }
        graph.validate_acyclic()?;
        tracing::debug!(roles = graph.roles.len(), "Loaded role definitions");
        Ok(graph)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn role_exists(&self, name: &RoleName) -> bool {
        BuiltinRole::is_builtin(name) || self.roles.contains_key(name)
    }

    /// Look up a role, materializing built-ins on demand.
    pub fn get_role(&self, name: &RoleName) -> Option<Cow<'_, Role>> {
        if let Some(builtin) = BuiltinRole::lookup(name) {
            return Some(Cow::Owned(builtin.to_role(&name.db)));
        }
        self.roles.get(name).map(Cow::Borrowed)
    }

    /// Parents of a role, or `UnknownRole`.
    pub fn parents(&self, name: &RoleName) -> Result<Vec<RoleName>> {
        if let Some(builtin) = BuiltinRole::lookup(name) {
            return Ok(builtin.parents(&name.db));
        }
        self.roles
            .get(name)
            .map(|r| r.parents.clone())
            .ok_or_else(|| AuthzError::UnknownRole(name.clone()))
    }

    /// User-defined roles in `db`, optionally followed by the built-ins that
    /// exist there.
    pub fn roles_in_db(&self, db: &str, include_builtin: bool) -> Vec<RoleName> {
        let mut names: Vec<RoleName> = self
            .roles
            .keys()
            .filter(|name| name.db == db)
            .cloned()
            .collect();
        names.sort();
        if include_builtin {
            names.extend(
                BuiltinRole::ALL
                    .iter()
                    .map(|b| RoleName::new(b.name(), db))
                    .filter(BuiltinRole::is_builtin),
            );
        }
        names
    }

    pub fn custom_role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn create_role(&mut self, def: &RoleDefinition) -> Result<()> {
        let role = Role::from_definition(def)?;
        self.check_insertable(&role.name)?;
        self.check_parents(&role.name, &role.parents)?;

        tracing::debug!(role = %role.name, parents = role.parents.len(), "Created role");
        self.roles.insert(role.name.clone(), role);
        Ok(())
    }

    /// Replace a role's privileges and/or parents.
    pub fn update_role(
        &mut self,
        name: &RoleName,
        privileges: Option<Vec<Privilege>>,
        parents: Option<Vec<RoleName>>,
    ) -> Result<()> {
        let mut updated = self.custom_role(name)?.clone();
        if let Some(privileges) = privileges {
            let def = RoleDefinition {
                privileges,
                ..updated.to_definition()
            };
            updated.privileges = Role::from_definition(&def)?.privileges;
        }
        if let Some(parents) = parents {
            updated.parents.clear();
            for parent in parents {
                updated.add_parent(parent);
            }
            self.check_parents(name, &updated.parents)?;
        }

        tracing::debug!(role = %name, "Updated role");
        self.roles.insert(name.clone(), updated);
        Ok(())
    }

    pub fn grant_roles_to_role(&mut self, name: &RoleName, parents: &[RoleName]) -> Result<()> {
        let mut updated = self.custom_role(name)?.clone();
        for parent in parents {
            updated.add_parent(parent.clone());
        }
        self.check_parents(name, &updated.parents)?;

        tracing::debug!(role = %name, granted = parents.len(), "Granted roles to role");
        self.roles.insert(name.clone(), updated);
        Ok(())
    }

    pub fn revoke_roles_from_role(&mut self, name: &RoleName, parents: &[RoleName]) -> Result<()> {
        let role = self.custom_role_mut(name)?;
        role.parents.retain(|p| !parents.contains(p));
        tracing::debug!(role = %name, revoked = parents.len(), "Revoked roles from role");
        Ok(())
    }

    pub fn grant_privileges_to_role(
        &mut self,
        name: &RoleName,
        privileges: &[Privilege],
    ) -> Result<()> {
        for privilege in privileges {
            if privilege.actions.is_empty() {
                return Err(AuthzError::EmptyPrivilege(privilege.resource.to_string()));
            }
        }
        let role = self.custom_role_mut(name)?;
        for privilege in privileges {
            role.privileges.add(privilege.clone());
        }
        tracing::debug!(role = %name, granted = privileges.len(), "Granted privileges to role");
        Ok(())
    }

    pub fn revoke_privileges_from_role(
        &mut self,
        name: &RoleName,
        privileges: &[Privilege],
    ) -> Result<()> {
        let role = self.custom_role_mut(name)?;
        for privilege in privileges {
            role.privileges.subtract(privilege);
        }
        tracing::debug!(role = %name, revoked = privileges.len(), "Revoked privileges from role");
        Ok(())
    }

    /// Drop a role and every inheritance edge that points at it.
    pub fn drop_role(&mut self, name: &RoleName) -> Result<Role> {
        self.custom_role(name)?;
        let removed = self
            .roles
            .remove(name)
            .ok_or_else(|| AuthzError::RoleNotFound(name.clone()))?;
        for role in self.roles.values_mut() {
            role.parents.retain(|p| p != name);
        }
        tracing::debug!(role = %name, "Dropped role");
        Ok(removed)
    }

    /// Verify the whole graph is acyclic.
    pub fn validate_acyclic(&self) -> Result<()> {
        let mut done: HashSet<&RoleName> = HashSet::new();
        // Sorted so a reported cycle is deterministic.
        let ordered: BTreeMap<&RoleName, &Role> = self.roles.iter().collect();

        for start in ordered.keys() {
            if done.contains(start) {
                continue;
            }
            let mut on_path: HashSet<&RoleName> = HashSet::new();
            let mut stack: Vec<(&RoleName, usize)> = vec![(start, 0)];
            on_path.insert(start);

            while let Some((current, next_parent)) = stack.pop() {
                let parents = self
                    .roles
                    .get(current)
                    .map(|r| r.parents.as_slice())
                    .unwrap_or(&[]);
                if let Some(parent) = parents.get(next_parent) {
                    stack.push((current, next_parent + 1));
                    if on_path.contains(parent) {
                        return Err(AuthzError::InvalidRoleGraph(format!(
                            "cycle detected: {current} inherits from {parent}"
                        )));
                    }
                    if !done.contains(parent) && self.roles.contains_key(parent) {
                        on_path.insert(parent);
                        stack.push((parent, 0));
                    }
                } else {
                    on_path.remove(current);
                    done.insert(current);
                }
            }
        }
        Ok(())
    }

    fn check_insertable(&self, name: &RoleName) -> Result<()> {
        if BuiltinRole::is_builtin(name) {
            return Err(AuthzError::BuiltinRoleImmutable(name.clone()));
        }
        if self.roles.contains_key(name) {
            return Err(AuthzError::RoleAlreadyExists(name.clone()));
        }
        Ok(())
    }

    /// Parents must exist and must not lead back to `name`.
    fn check_parents(&self, name: &RoleName, parents: &[RoleName]) -> Result<()> {
        for parent in parents {
            if !self.role_exists(parent) {
                return Err(AuthzError::InvalidRoleGraph(format!(
                    "role {name} inherits from unknown role {parent}"
                )));
            }
            if parent == name || self.reaches(parent, name) {
                return Err(AuthzError::InvalidRoleGraph(format!(
                    "granting {parent} to {name} would create a cycle"
                )));
            }
        }
        Ok(())
    }

    /// Whether `target` is reachable from `from` by following parents.
    fn reaches(&self, from: &RoleName, target: &RoleName) -> bool {
        let mut visited: HashSet<&RoleName> = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(role) = self.roles.get(current) {
                stack.extend(role.parents.iter());
            }
        }
        false
    }

    fn custom_role(&self, name: &RoleName) -> Result<&Role> {
        if BuiltinRole::is_builtin(name) {
            return Err(AuthzError::BuiltinRoleImmutable(name.clone()));
        }
        self.roles
            .get(name)
            .ok_or_else(|| AuthzError::RoleNotFound(name.clone()))
    }

    fn custom_role_mut(&mut self, name: &RoleName) -> Result<&mut Role> {
        if BuiltinRole::is_builtin(name) {
            return Err(AuthzError::BuiltinRoleImmutable(name.clone()));
        }
        self.roles
            .get_mut(name)
            .ok_or_else(|| AuthzError::RoleNotFound(name.clone()))
    }
}

/// Shared, versioned holder of the current role graph.
///
/// Readers take a [`RoleCatalog::snapshot`] and keep using it for the whole
/// authorization check. Writers clone the current graph, apply the change
/// and publish the clone only if the change succeeded, so a reader never
/// sees a half-applied edit.
#[derive(Debug, Default)]
pub struct RoleCatalog {
    current: RwLock<Arc<RoleGraph>>,
}

impl RoleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(graph: RoleGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
        }
    }

    /// The current graph. Cheap: an `Arc` clone under a read lock.
    pub fn snapshot(&self) -> Arc<RoleGraph> {
        Arc::clone(&self.current.read())
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Apply `change` to a private copy and publish it on success.
    pub fn update<T>(&self, change: impl FnOnce(&mut RoleGraph) -> Result<T>) -> Result<T> {
        let mut guard = self.current.write();
        let mut next = RoleGraph::clone(&guard);
        let out = change(&mut next)?;
        next.version = guard.version + 1;
        tracing::debug!(version = next.version, "Published role graph");
        *guard = Arc::new(next);
        Ok(out)
    }

    pub fn create_role(&self, def: &RoleDefinition) -> Result<()> {
        self.update(|g| g.create_role(def))
    }

    pub fn drop_role(&self, name: &RoleName) -> Result<Role> {
        self.update(|g| g.drop_role(name))
    }

    pub fn grant_roles_to_role(&self, name: &RoleName, parents: &[RoleName]) -> Result<()> {
        self.update(|g| g.grant_roles_to_role(name, parents))
    }

    pub fn revoke_roles_from_role(&self, name: &RoleName, parents: &[RoleName]) -> Result<()> {
        self.update(|g| g.revoke_roles_from_role(name, parents))
    }

    pub fn grant_privileges_to_role(&self, name: &RoleName, privileges: &[Privilege]) -> Result<()> {
        self.update(|g| g.grant_privileges_to_role(name, privileges))
    }

    pub fn revoke_privileges_from_role(
        &self,
        name: &RoleName,
        privileges: &[Privilege],
    ) -> Result<()> {
        self.update(|g| g.revoke_privileges_from_role(name, privileges))
    }
}
