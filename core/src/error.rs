//! Error definitions for the authorization engine

use thiserror::Error;

use crate::namespace::Namespace;
use crate::permissions::RoleName;

/// Wire error codes surfaced to clients by the command-dispatch layer.
pub mod codes {
    pub const BAD_VALUE: i32 = 2;
    pub const FAILED_TO_PARSE: i32 = 9;
    pub const UNAUTHORIZED: i32 = 13;
    pub const ROLE_NOT_FOUND: i32 = 31;
    pub const ROLE_ALREADY_EXISTS: i32 = 51002;
    pub const INVALID_ROLE_MODIFICATION: i32 = 53;
    pub const INVALID_NAMESPACE: i32 = 73;
    pub const COMMAND_NOT_SUPPORTED: i32 = 115;
    pub const INTERNAL_ERROR: i32 = 1;
}

/// Represents errors that can occur while resolving roles, extracting
/// required privileges or deciding authorization.
///
/// # Example
/// ```rust
/// use mono_authz::AuthzError;
///
/// let err = AuthzError::Unauthorized {
///     db: "test".into(),
///     command: "find".into(),
/// };
/// assert_eq!(err.code(), 13);
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The generic access-denied error. Deliberately carries no privilege
    /// detail so clients cannot enumerate what they are missing.
    #[error("not authorized on {db} to execute command {command}")]
    Unauthorized { db: String, command: String },

    #[error("command not supported: {0}")]
    CommandNotSupported(String),

    #[error("Unknown role: {0}")]
    UnknownRole(RoleName),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid role graph: {0}")]
    InvalidRoleGraph(String),

    #[error("Cannot modify built-in role {0}")]
    BuiltinRoleImmutable(RoleName),

    #[error("Role already exists: {0}")]
    RoleAlreadyExists(RoleName),

    #[error("Role not found: {0}")]
    RoleNotFound(RoleName),

    #[error("Invalid resource pattern: {0}")]
    InvalidResource(String),

    #[error("Privilege grants no actions: {0}")]
    EmptyPrivilege(String),

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Recursion limit of {0} exceeded while extracting privileges")]
    RecursionLimitExceeded(usize),

    #[error("View cycle detected at {0}")]
    ViewCycle(Namespace),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, AuthzError>;

impl AuthzError {
    /// Numeric error code reported to the client.
    pub fn code(&self) -> i32 {
        match self {
            AuthzError::Unauthorized { .. } => codes::UNAUTHORIZED,
            AuthzError::CommandNotSupported(_) => codes::COMMAND_NOT_SUPPORTED,
            AuthzError::UnknownRole(_) | AuthzError::RoleNotFound(_) => codes::ROLE_NOT_FOUND,
            AuthzError::RoleAlreadyExists(_) => codes::ROLE_ALREADY_EXISTS,
            AuthzError::InvalidRoleGraph(_) | AuthzError::BuiltinRoleImmutable(_) => {
                codes::INVALID_ROLE_MODIFICATION
            }
            AuthzError::InvalidNamespace(_) => codes::INVALID_NAMESPACE,
            AuthzError::MalformedCommand(_)
            | AuthzError::InvalidResource(_)
            | AuthzError::Json(_) => codes::FAILED_TO_PARSE,
            AuthzError::UnknownAction(_)
            | AuthzError::EmptyPrivilege(_)
            | AuthzError::UnknownOperation(_)
            | AuthzError::RecursionLimitExceeded(_)
            | AuthzError::ViewCycle(_)
            | AuthzError::Config(_) => codes::BAD_VALUE,
            AuthzError::Io(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get a short error kind name
    pub fn kind(&self) -> &'static str {
        match self {
            AuthzError::Unauthorized { .. } => "unauthorized",
            AuthzError::CommandNotSupported(_) => "command_not_supported",
            AuthzError::UnknownRole(_) => "unknown_role",
            AuthzError::UnknownAction(_) => "unknown_action",
            AuthzError::InvalidRoleGraph(_) => "invalid_role_graph",
            AuthzError::BuiltinRoleImmutable(_) => "builtin_role_immutable",
            AuthzError::RoleAlreadyExists(_) => "role_already_exists",
            AuthzError::RoleNotFound(_) => "role_not_found",
            AuthzError::InvalidResource(_) => "invalid_resource",
            AuthzError::EmptyPrivilege(_) => "empty_privilege",
            AuthzError::InvalidNamespace(_) => "invalid_namespace",
            AuthzError::MalformedCommand(_) => "malformed_command",
            AuthzError::UnknownOperation(_) => "unknown_operation",
            AuthzError::RecursionLimitExceeded(_) => "recursion_limit_exceeded",
            AuthzError::ViewCycle(_) => "view_cycle",
            AuthzError::Config(_) => "config_error",
            AuthzError::Io(_) => "io_error",
            AuthzError::Json(_) => "json_error",
        }
    }

    /// Whether this error is a configuration-integrity problem (as opposed
    /// to a plain denial or a malformed request).
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            AuthzError::UnknownRole(_)
                | AuthzError::UnknownAction(_)
                | AuthzError::InvalidRoleGraph(_)
                | AuthzError::ViewCycle(_)
        )
    }
}

impl From<std::io::Error> for AuthzError {
    fn from(err: std::io::Error) -> Self {
        AuthzError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AuthzError {
    fn from(err: serde_json::Error) -> Self {
        AuthzError::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_and_unsupported_codes_differ() {
        let denied = AuthzError::Unauthorized {
            db: "test".into(),
            command: "find".into(),
        };
        let unsupported = AuthzError::CommandNotSupported("diagLogging".into());

        assert_eq!(denied.code(), 13);
        assert_eq!(unsupported.code(), 115);
        assert_ne!(denied.kind(), unsupported.kind());
    }

    #[test]
    fn test_unauthorized_message_is_generic() {
        let err = AuthzError::Unauthorized {
            db: "test".into(),
            command: "insert".into(),
        };
        let msg = err.to_string();
        assert_eq!(msg, "not authorized on test to execute command insert");
        assert!(!msg.contains("system.users"));
    }

    #[test]
    fn test_integrity_errors() {
        assert!(AuthzError::UnknownAction("frobnicate".into()).is_integrity_error());
        assert!(AuthzError::InvalidRoleGraph("cycle".into()).is_integrity_error());
        assert!(!AuthzError::UnknownOperation("$foo".into()).is_integrity_error());
    }
}
