//! The authorization decision.

use serde::Serialize;

use crate::command::{CommandDescriptor, NoViews, PrivilegeExtractor, ViewCatalog};
use crate::config::AuthzConfig;
use crate::error::{AuthzError, Result};
use crate::graph::RoleGraph;
use crate::permissions::{Action, ActionSet, Privilege, PrivilegeSet, ResourcePattern, RoleName};
use crate::resolver::{PrivilegeResolver, ResolvedPrivileges};

/// An authenticated user and the roles granted to them directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user: String,
    pub db: String,
    pub roles: Vec<RoleName>,
}

impl Principal {
    pub fn new(user: impl Into<String>, db: impl Into<String>, roles: Vec<RoleName>) -> Self {
        Self {
            user: user.into(),
            db: db.into(),
            roles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum DecisionReason {
    /// Every required privilege is held
    Granted,
    AuthorizationDisabled,
    MissingPrivileges,
    UnknownOperation(String),
    RecursionLimitExceeded(usize),
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDecision {
    pub authorized: bool,
    pub command: String,
    pub db: String,
    pub required_privileges: PrivilegeSet,
    /// Uncovered requirements, reduced to the actions actually missing.
    /// For server-side logs only; never shown to the client.
    pub missing_privileges: Vec<Privilege>,
    pub reason: DecisionReason,
}

impl AuthorizationDecision {
    /// Convert a denial into the generic access-denied error.
    pub fn into_result(self) -> Result<()> {
        if self.authorized {
            Ok(())
        } else {
            Err(AuthzError::Unauthorized {
                db: self.db,
                command: self.command,
            })
        }
    }
}

/// Requirement reported for operations that can never be authorized.
fn impossible_privilege() -> Privilege {
    Privilege::new(
        ResourcePattern::AnyResource,
        ActionSet::of(&[Action::Internal, Action::AnyAction]),
    )
}

/// Decides whether a principal may run a command.
///
/// Stateless apart from its configuration; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationChecker {
    config: AuthzConfig,
    extractor: PrivilegeExtractor,
}

impl AuthorizationChecker {
    pub fn new(config: AuthzConfig) -> Self {
        let extractor = PrivilegeExtractor::new(config.extractor_options());
        Self { config, extractor }
    }

    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    pub fn extractor(&self) -> &PrivilegeExtractor {
        &self.extractor
    }

    /// Resolve the principal's roles against `graph` and decide.
    pub fn is_authorized(
        &self,
        graph: &RoleGraph,
        principal: &Principal,
        cmd: &CommandDescriptor,
    ) -> Result<AuthorizationDecision> {
        self.is_authorized_with_views(graph, principal, cmd, &NoViews)
    }

    pub fn is_authorized_with_views(
        &self,
        graph: &RoleGraph,
        principal: &Principal,
        cmd: &CommandDescriptor,
        views: &dyn ViewCatalog,
    ) -> Result<AuthorizationDecision> {
        let resolved = PrivilegeResolver::new(graph).resolve(&principal.roles)?;
        self.authorize(&resolved, cmd, views)
    }

    /// Decide against an already resolved privilege set.
    ///
    /// Integrity problems (unknown roles, view cycles, malformed commands)
    /// are errors. Unknown operations and runaway nesting are denials.
    pub fn authorize(
        &self,
        held: &ResolvedPrivileges,
        cmd: &CommandDescriptor,
        views: &dyn ViewCatalog,
    ) -> Result<AuthorizationDecision> {
        if !self.config.is_supported(&cmd.name) {
            return Err(AuthzError::CommandNotSupported(cmd.name.clone()));
        }

        let mut decision = AuthorizationDecision {
            authorized: false,
            command: cmd.name.clone(),
            db: cmd.db.clone(),
            required_privileges: PrivilegeSet::new(),
            missing_privileges: Vec::new(),
            reason: DecisionReason::MissingPrivileges,
        };

        if !self.config.enabled {
            decision.authorized = true;
            decision.reason = DecisionReason::AuthorizationDisabled;
            return Ok(decision);
        }

        match self.extractor.required_privileges_with_views(cmd, views) {
            Ok(required) => {
                decision.missing_privileges = Self::check_privileges(&held.privileges, &required);
                decision.authorized = decision.missing_privileges.is_empty();
                if decision.authorized {
                    decision.reason = DecisionReason::Granted;
                }
                decision.required_privileges = required;
            }
            Err(AuthzError::UnknownOperation(name)) => {
                decision.missing_privileges = vec![impossible_privilege()];
                decision.reason = DecisionReason::UnknownOperation(name);
            }
            Err(AuthzError::RecursionLimitExceeded(limit)) => {
                decision.missing_privileges = vec![impossible_privilege()];
                decision.reason = DecisionReason::RecursionLimitExceeded(limit);
            }
            Err(e) => return Err(e),
        }

        tracing::debug!(
            command = %decision.command,
            db = %decision.db,
            authorized = decision.authorized,
            required = decision.required_privileges.len(),
            "Authorization decision"
        );
        if !decision.authorized {
            let missing: Vec<String> = decision
                .missing_privileges
                .iter()
                .map(ToString::to_string)
                .collect();
            tracing::warn!(
                command = %decision.command,
                db = %decision.db,
                reason = ?decision.reason,
                missing = ?missing,
                "Authorization denied"
            );
        }

        Ok(decision)
    }

    /// Required privileges not covered by `held`, each reduced to its
    /// uncovered actions. Empty means authorized.
    pub fn check_privileges(held: &PrivilegeSet, required: &PrivilegeSet) -> Vec<Privilege> {
        required
            .iter()
            .filter_map(|req| {
                let missing = held.missing_actions(&req.resource, &req.actions);
                (!missing.is_empty()).then(|| Privilege::new(req.resource.clone(), missing))
            })
            .collect()
    }
}
