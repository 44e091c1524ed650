//! Permissions and authorization primitives.

mod action;
mod builtin;
mod privilege;
mod resource;
mod role;

pub use action::{Action, ActionSet};
pub use builtin::{ADMIN_DB, BuiltinRole};
pub use privilege::{Privilege, PrivilegeSet};
pub use resource::{ResourceDocument, ResourcePattern};
pub use role::{AuthenticationRestriction, Role, RoleDefinition, RoleName};
