//! Text and JSON rendering of results

use anyhow::Result;
use colored::*;
use mono_authz::{
    AuthorizationDecision, BuiltinRole, DecisionReason, Privilege, PrivilegeSet,
    ResolvedPrivileges,
};
use serde::Serialize;
use serde_json::json;

pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn decision(&self, decision: &AuthorizationDecision) -> Result<()> {
        if self.json {
            return self.print_json(decision);
        }

        let verdict = if decision.authorized {
            "Authorized".green().bold()
        } else {
            "Denied".red().bold()
        };
        println!(
            "{} {} on {}",
            verdict,
            decision.command.bold(),
            decision.db.bold()
        );
        println!("{}", describe_reason(&decision.reason).dimmed());

        if !decision.required_privileges.is_empty() {
            println!();
            println!("{}", "Required:".bold());
            print_privilege_list(&decision.required_privileges.sorted());
        }
        if !decision.missing_privileges.is_empty() {
            println!();
            println!("{}", "Missing:".red().bold());
            for privilege in &decision.missing_privileges {
                println!("  {}", privilege.to_string().red());
            }
        }
        Ok(())
    }

    pub fn privileges(&self, required: &PrivilegeSet) -> Result<()> {
        if self.json {
            return self.print_json(required);
        }
        if required.is_empty() {
            println!("{}", "(no privileges required)".dimmed());
            return Ok(());
        }
        print_privilege_list(&required.sorted());
        Ok(())
    }

    pub fn resolved(&self, resolved: &ResolvedPrivileges) -> Result<()> {
        if self.json {
            return self.print_json(resolved);
        }

        println!("{}", "Roles:".bold());
        for role in &resolved.roles {
            println!("  {}", role.to_string().cyan());
        }
        println!();
        println!("{}", "Privileges:".bold());
        if resolved.privileges.is_empty() {
            println!("  {}", "(none)".dimmed());
        } else {
            print_privilege_list(&resolved.privileges.sorted());
        }
        if !resolved.restrictions.is_empty() {
            println!();
            println!(
                "{} {}",
                resolved.restrictions.len(),
                "authentication restriction(s) apply".yellow()
            );
        }
        Ok(())
    }

    pub fn builtin_roles(&self) -> Result<()> {
        if self.json {
            let roles: Vec<_> = BuiltinRole::ALL
                .iter()
                .map(|r| json!({"role": r.name(), "adminOnly": r.is_admin_only()}))
                .collect();
            return self.print_json(&roles);
        }

        for role in BuiltinRole::ALL {
            let scope = if role.is_admin_only() {
                "admin only"
            } else {
                "every database"
            };
            println!("{:<24} {}", role.name().cyan(), scope.dimmed());
        }
        Ok(())
    }
}

fn print_privilege_list(privileges: &[Privilege]) {
    for privilege in privileges {
        println!(
            "  {:<40} {}",
            privilege.resource.to_string().cyan(),
            privilege.actions.names().join(", ")
        );
    }
}

fn describe_reason(reason: &DecisionReason) -> String {
    match reason {
        DecisionReason::Granted => "all required privileges held".into(),
        DecisionReason::AuthorizationDisabled => "authorization is disabled".into(),
        DecisionReason::MissingPrivileges => "required privileges not held".into(),
        DecisionReason::UnknownOperation(name) => format!("unknown operation {name}"),
        DecisionReason::RecursionLimitExceeded(limit) => {
            format!("nesting exceeds the limit of {limit}")
        }
    }
}
