//! MonoDB authorization: role resolution, command privilege extraction and
//! access decisions.

pub mod checker;
pub mod command;
pub mod config;
pub mod error;
pub mod graph;
pub mod matcher;
pub mod namespace;
pub mod permissions;
pub mod resolver;

pub use checker::{AuthorizationChecker, AuthorizationDecision, DecisionReason, Principal};
pub use command::{CommandDescriptor, PrivilegeExtractor, ViewCatalog, ViewGraph, parse_command};
pub use config::AuthzConfig;
pub use error::{AuthzError, Result};
pub use graph::{RoleCatalog, RoleGraph};
pub use matcher::ResourceMatcher;
pub use namespace::Namespace;
pub use permissions::{
    Action, ActionSet, BuiltinRole, Privilege, PrivilegeSet, ResourcePattern, RoleDefinition,
    RoleName,
};
pub use resolver::{PrivilegeResolver, ResolvedPrivileges};

#[cfg(test)]
mod tests;
