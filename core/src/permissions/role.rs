//! Role names and role definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Privilege, PrivilegeSet};
use crate::error::{AuthzError, Result};

/// A role reference: role name plus the database that defines it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleName {
    #[serde(alias = "name")]
    pub role: String,
    pub db: String,
}

impl RoleName {
    pub fn new(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: db.into(),
        }
    }

    /// Parse `role@db`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.rsplit_once('@') {
            Some((role, db)) if !role.is_empty() && !db.is_empty() => Ok(Self::new(role, db)),
            _ => Err(AuthzError::InvalidRoleGraph(format!(
                "invalid role reference '{s}', expected role@db"
            ))),
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.db)
    }
}

/// Client/server address restrictions attached to a role. Recorded and
/// carried through resolution; enforcing them belongs to the
/// authentication layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AuthenticationRestriction {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub client_source: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_address: Vec<String>,
}

/// Role definition as supplied by role storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    #[serde(alias = "name")]
    pub role: String,
    pub db: String,
    #[serde(default)]
    pub privileges: Vec<Privilege>,
    #[serde(default)]
    pub roles: Vec<RoleName>,
    #[serde(default)]
    pub authentication_restrictions: Vec<AuthenticationRestriction>,
}

impl RoleDefinition {
    pub fn name(&self) -> RoleName {
        RoleName::new(self.role.clone(), self.db.clone())
    }

    /// Parse a JSON array of role definitions.
    pub fn parse_list(json: &str) -> Result<Vec<RoleDefinition>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A role node in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub name: RoleName,
    /// Direct privileges, not including inherited ones
    pub privileges: PrivilegeSet,
    /// Roles this role inherits from
    pub parents: Vec<RoleName>,
    pub restrictions: Vec<AuthenticationRestriction>,
    pub builtin: bool,
}

impl Role {
    pub fn new(name: RoleName) -> Self {
        Self {
            name,
            privileges: PrivilegeSet::new(),
            parents: Vec::new(),
            restrictions: Vec::new(),
            builtin: false,
        }
    }

    pub fn from_definition(def: &RoleDefinition) -> Result<Self> {
        if def.role.is_empty() || def.db.is_empty() {
            return Err(AuthzError::InvalidRoleGraph(
                "role name and db must be non-empty".into(),
            ));
        }
        let mut role = Role::new(def.name());
        for privilege in &def.privileges {
            if privilege.actions.is_empty() {
                return Err(AuthzError::EmptyPrivilege(privilege.resource.to_string()));
            }
            role.privileges.add(privilege.clone());
        }
        for parent in &def.roles {
            role.add_parent(parent.clone());
        }
        role.restrictions = def.authentication_restrictions.clone();
        Ok(role)
    }

    pub fn to_definition(&self) -> RoleDefinition {
        RoleDefinition {
            role: self.name.role.clone(),
            db: self.name.db.clone(),
            privileges: self.privileges.privileges().to_vec(),
            roles: self.parents.clone(),
            authentication_restrictions: self.restrictions.clone(),
        }
    }

    /// Add a role to inherit from
    pub fn add_parent(&mut self, parent: RoleName) {
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{Action, ResourcePattern};

    #[test]
    fn test_role_name_parse() {
        let name = RoleName::parse("read@roles_commands_1").unwrap();
        assert_eq!(name, RoleName::new("read", "roles_commands_1"));
        assert_eq!(name.to_string(), "read@roles_commands_1");

        assert!(RoleName::parse("read").is_err());
        assert!(RoleName::parse("@db").is_err());
        assert!(RoleName::parse("read@").is_err());
    }

    #[test]
    fn test_definition_from_json() {
        let json = r#"[{
            "role": "reporting",
            "db": "app",
            "privileges": [
                {"resource": {"db": "app", "collection": "orders"}, "actions": ["find"]},
                {"resource": {"cluster": true}, "actions": ["serverStatus"]}
            ],
            "roles": [{"role": "read", "db": "app"}, {"name": "read", "db": "app"}],
            "authenticationRestrictions": [{"clientSource": ["10.0.0.0/8"]}]
        }]"#;

        let defs = RoleDefinition::parse_list(json).unwrap();
        assert_eq!(defs.len(), 1);
        let role = Role::from_definition(&defs[0]).unwrap();

        assert_eq!(role.name, RoleName::new("reporting", "app"));
        assert_eq!(role.parents, vec![RoleName::new("read", "app")]);
        assert_eq!(role.privileges.len(), 2);
        assert!(
            role.privileges
                .get(&ResourcePattern::ClusterResource)
                .unwrap()
                .actions
                .contains(Action::ServerStatus)
        );
        assert_eq!(role.restrictions[0].client_source, vec!["10.0.0.0/8"]);
    }

    #[test]
    fn test_definition_with_unknown_action_fails_to_load() {
        let json = r#"[{"role":"r","db":"d","privileges":[
            {"resource":{"db":"d","collection":""},"actions":["teleport"]}]}]"#;
        assert!(RoleDefinition::parse_list(json).is_err());
    }
}
