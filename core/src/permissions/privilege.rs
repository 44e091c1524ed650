//! Privileges and privilege sets.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Action, ActionSet, ResourcePattern};
use crate::error::{AuthzError, Result};
use crate::matcher;

/// A resource pattern paired with the actions permitted on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPrivilege")]
pub struct Privilege {
    pub resource: ResourcePattern,
    pub actions: ActionSet,
}

#[derive(Deserialize)]
struct RawPrivilege {
    resource: ResourcePattern,
    actions: ActionSet,
}

impl TryFrom<RawPrivilege> for Privilege {
    type Error = AuthzError;

    fn try_from(raw: RawPrivilege) -> Result<Self> {
        Privilege::try_new(raw.resource, raw.actions)
    }
}

impl Privilege {
    /// Create a privilege without validation. Callers building requirements
    /// internally always supply at least one action.
    pub fn new(resource: ResourcePattern, actions: ActionSet) -> Self {
        Self { resource, actions }
    }

    /// Create a privilege, rejecting an empty action set.
    pub fn try_new(resource: ResourcePattern, actions: ActionSet) -> Result<Self> {
        if actions.is_empty() {
            return Err(AuthzError::EmptyPrivilege(resource.to_string()));
        }
        Ok(Self { resource, actions })
    }

    pub fn single(resource: ResourcePattern, action: Action) -> Self {
        Self::new(resource, action.into())
    }

    /// True iff this privilege's pattern matches `resource` and its actions
    /// permit every action in `actions`.
    pub fn covers(&self, resource: &ResourcePattern, actions: &ActionSet) -> bool {
        !self.actions.is_empty()
            && matcher::matches(&self.resource, resource)
            && self.actions.allows_all(actions)
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.resource, self.actions)
    }
}

/// A collection of privileges, at most one entry per resource pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivilegeSet {
    privileges: Vec<Privilege>,
}

impl PrivilegeSet {
    pub fn new() -> Self {
        Self {
            privileges: Vec::new(),
        }
    }

    pub fn with_privileges(privileges: impl IntoIterator<Item = Privilege>) -> Self {
        let mut set = Self::new();
        for privilege in privileges {
            set.add(privilege);
        }
        set
    }

    /// Add a privilege, merging its actions into an existing entry for the
    /// same resource. Empty privileges are elided.
    pub fn add(&mut self, privilege: Privilege) {
        if privilege.actions.is_empty() {
            return;
        }
        match self
            .privileges
            .iter_mut()
            .find(|p| p.resource == privilege.resource)
        {
            Some(existing) => existing.actions.union_with(&privilege.actions),
            None => self.privileges.push(privilege),
        }
    }

    pub fn add_actions(&mut self, resource: ResourcePattern, actions: &[Action]) {
        self.add(Privilege::new(resource, ActionSet::of(actions)));
    }

    /// Remove the given actions from the entry for the same resource,
    /// dropping the entry when nothing is left.
    pub fn subtract(&mut self, privilege: &Privilege) {
        if let Some(existing) = self
            .privileges
            .iter_mut()
            .find(|p| p.resource == privilege.resource)
        {
            existing.actions = existing.actions.subtract(&privilege.actions);
        }
        self.privileges.retain(|p| !p.actions.is_empty());
    }

    /// Merge another privilege set into this one
    pub fn merge(&mut self, other: &PrivilegeSet) {
        for privilege in &other.privileges {
            self.add(privilege.clone());
        }
    }

    pub fn get(&self, resource: &ResourcePattern) -> Option<&Privilege> {
        self.privileges.iter().find(|p| &p.resource == resource)
    }

    pub fn privileges(&self) -> &[Privilege] {
        &self.privileges
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Privilege> {
        self.privileges.iter()
    }

    pub fn len(&self) -> usize {
        self.privileges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.privileges.is_empty()
    }

    /// Whether the held privileges together permit `actions` on `resource`.
    pub fn allows(&self, resource: &ResourcePattern, actions: &ActionSet) -> bool {
        self.missing_actions(resource, actions).is_empty()
    }

    /// Actions of `actions` on `resource` not permitted by any matching grant.
    pub fn missing_actions(&self, resource: &ResourcePattern, actions: &ActionSet) -> ActionSet {
        let granted = matcher::ResourceMatcher::granted_actions(&self.privileges, resource);
        actions.not_allowed_by(&granted)
    }

    /// Sorted copy, for stable output.
    pub fn sorted(&self) -> Vec<Privilege> {
        let mut out = self.privileges.clone();
        out.sort_by(|a, b| a.resource.cmp(&b.resource));
        out
    }
}

impl<'a> IntoIterator for &'a PrivilegeSet {
    type Item = &'a Privilege;
    type IntoIter = std::slice::Iter<'a, Privilege>;

    fn into_iter(self) -> Self::IntoIter {
        self.privileges.iter()
    }
}

impl FromIterator<Privilege> for PrivilegeSet {
    fn from_iter<I: IntoIterator<Item = Privilege>>(iter: I) -> Self {
        Self::with_privileges(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;
    use pretty_assertions::assert_eq;

    fn foo() -> ResourcePattern {
        ResourcePattern::for_namespace(&Namespace::new("d", "foo").unwrap())
    }

    #[test]
    fn test_covers_requires_superset() {
        let privilege = Privilege::new(foo(), ActionSet::of(&[Action::Find, Action::Insert]));
        assert!(privilege.covers(&foo(), &Action::Find.into()));
        assert!(privilege.covers(&foo(), &ActionSet::of(&[Action::Find, Action::Insert])));
        assert!(!privilege.covers(&foo(), &ActionSet::of(&[Action::Find, Action::Remove])));
        assert!(!privilege.covers(&ResourcePattern::for_db("d"), &Action::Find.into()));
    }

    #[test]
    fn test_empty_privilege_rejected() {
        assert!(matches!(
            Privilege::try_new(foo(), ActionSet::empty()),
            Err(AuthzError::EmptyPrivilege(_))
        ));

        let json = r#"{"resource":{"db":"d","collection":"foo"},"actions":[]}"#;
        assert!(serde_json::from_str::<Privilege>(json).is_err());
    }

    #[test]
    fn test_privilege_document_parsing() {
        let json = r#"{"resource":{"db":"d","collection":"foo"},"actions":["find","insert"]}"#;
        let privilege: Privilege = serde_json::from_str(json).unwrap();
        assert_eq!(privilege.resource, foo());
        assert_eq!(privilege.actions, ActionSet::of(&[Action::Find, Action::Insert]));

        let unknown = r#"{"resource":{"db":"d","collection":"foo"},"actions":["fly"]}"#;
        let err = serde_json::from_str::<Privilege>(unknown).unwrap_err();
        assert!(err.to_string().contains("Unknown action: fly"));
    }

    #[test]
    fn test_set_merges_by_resource() {
        let mut set = PrivilegeSet::new();
        set.add_actions(foo(), &[Action::Find]);
        set.add_actions(foo(), &[Action::Insert]);
        set.add_actions(ResourcePattern::ClusterResource, &[Action::Inprog]);
        set.add(Privilege::new(foo(), ActionSet::empty()));

        assert_eq!(set.len(), 2);
        assert_eq!(
            set.get(&foo()).unwrap().actions,
            ActionSet::of(&[Action::Find, Action::Insert])
        );

        set.subtract(&Privilege::new(foo(), ActionSet::of(&[Action::Find, Action::Insert])));
        assert_eq!(set.len(), 1);
        assert!(set.get(&foo()).is_none());
    }

    #[test]
    fn test_allows_across_several_grants() {
        let set = PrivilegeSet::with_privileges(vec![
            Privilege::single(foo(), Action::Insert),
            Privilege::single(ResourcePattern::for_db("d"), Action::Remove),
        ]);
        let required = ActionSet::of(&[Action::Insert, Action::Remove]);

        assert!(set.allows(&foo(), &required));
        assert_eq!(
            set.missing_actions(&foo(), &ActionSet::of(&[Action::Insert, Action::Update])),
            ActionSet::from(Action::Update)
        );
    }
}
