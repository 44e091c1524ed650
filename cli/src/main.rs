//! authzctl: offline role resolution and command authorization checks

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mono_authz::{
    AuthorizationChecker, AuthzConfig, Principal, PrivilegeResolver, RoleDefinition, RoleGraph,
    RoleName, ViewGraph, parse_command,
};
use serde_json::Value;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

mod output;

use output::Printer;

#[derive(Parser)]
#[command(name = "authzctl", version, about = "Inspect MonoDB role privileges and authorization decisions")]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide whether the given roles may run a command
    Check {
        #[command(flatten)]
        input: CommandInput,
        #[command(flatten)]
        roles: RoleInput,
        /// JSON file of view definitions
        #[arg(long)]
        views_file: Option<PathBuf>,
    },
    /// Print the privileges a command requires
    Privileges {
        #[command(flatten)]
        input: CommandInput,
        #[arg(long)]
        views_file: Option<PathBuf>,
    },
    /// Print everything the given roles grant, inherited roles included
    Resolve {
        #[command(flatten)]
        roles: RoleInput,
    },
    /// List the built-in roles
    Roles,
}

#[derive(Args)]
struct CommandInput {
    /// Database the command runs against
    #[arg(long)]
    db: String,

    /// Command document as JSON, or @path to read it from a file
    #[arg(long = "command", value_name = "JSON|@FILE")]
    document: String,
}

#[derive(Args)]
struct RoleInput {
    /// Granted role, as role@db (repeatable)
    #[arg(long = "role", value_name = "ROLE@DB")]
    roles: Vec<String>,

    /// JSON file of custom role definitions
    #[arg(long)]
    roles_file: Option<PathBuf>,
}

fn get_env_filter() -> EnvFilter {
    if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else if cfg!(debug_assertions) {
        EnvFilter::new("authzctl=debug,mono_authz=debug")
    } else {
        EnvFilter::new("authzctl=info,mono_authz=info")
    }
}

fn main() -> anyhow::Result<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    Registry::default()
        .with(get_env_filter())
        .with(stderr_layer)
        .init();

    let cli = Cli::parse();
    let config = AuthzConfig::load_from_path(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    tracing::debug!(?config, "Loaded configuration");

    let printer = Printer::new(cli.json);
    let authorized = run(cli.command, config, &printer)?;
    if !authorized {
        std::process::exit(1);
    }
    Ok(())
}

/// Run one subcommand. Returns false when a check was denied.
fn run(command: Command, config: AuthzConfig, printer: &Printer) -> Result<bool> {
    match command {
        Command::Check {
            input,
            roles,
            views_file,
        } => {
            let graph = load_graph(&roles, &config)?;
            let views = load_views(views_file.as_deref())?;
            let cmd = parse_command(&input.db, &read_document(&input.document)?)?;
            let principal = Principal::new("authzctl", "admin", parse_roles(&roles.roles)?);

            let checker = AuthorizationChecker::new(config);
            let decision = checker.is_authorized_with_views(&graph, &principal, &cmd, &views)?;
            printer.decision(&decision)?;
            Ok(decision.authorized)
        }
        Command::Privileges { input, views_file } => {
            let views = load_views(views_file.as_deref())?;
            let cmd = parse_command(&input.db, &read_document(&input.document)?)?;

            let checker = AuthorizationChecker::new(config);
            let required = checker
                .extractor()
                .required_privileges_with_views(&cmd, &views)?;
            printer.privileges(&required)?;
            Ok(true)
        }
        Command::Resolve { roles } => {
            let graph = load_graph(&roles, &config)?;
            let resolved = PrivilegeResolver::new(&graph).resolve(&parse_roles(&roles.roles)?)?;
            printer.resolved(&resolved)?;
            Ok(true)
        }
        Command::Roles => {
            printer.builtin_roles()?;
            Ok(true)
        }
    }
}

/// Inline JSON, or `@path` to read the document from a file.
fn read_document(arg: &str) -> Result<Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {path}"))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("command is not valid JSON")
}

fn parse_roles(roles: &[String]) -> Result<Vec<RoleName>> {
    roles
        .iter()
        .map(|r| RoleName::parse(r).with_context(|| format!("bad role '{r}', expected role@db")))
        .collect()
}

/// Custom roles from `--roles-file`, falling back to the configured file.
fn load_graph(input: &RoleInput, config: &AuthzConfig) -> Result<RoleGraph> {
    let Some(path) = input.roles_file.as_ref().or(config.roles_file.as_ref()) else {
        return Ok(RoleGraph::new());
    };
    let json =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let defs = RoleDefinition::parse_list(&json)
        .with_context(|| format!("parsing roles in {}", path.display()))?;
    let graph = RoleGraph::from_definitions(&defs)?;
    tracing::info!(path = %path.display(), roles = graph.custom_role_count(), "Loaded roles");
    Ok(graph)
}

fn load_views(path: Option<&Path>) -> Result<ViewGraph> {
    let Some(path) = path else {
        return Ok(ViewGraph::new());
    };
    let json =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let views = ViewGraph::from_json_str(&json)
        .with_context(|| format!("parsing views in {}", path.display()))?;
    tracing::info!(path = %path.display(), views = views.len(), "Loaded views");
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_document_inline_and_file() {
        assert_eq!(
            read_document(r#"{"find": "foo"}"#).unwrap(),
            serde_json::json!({"find": "foo"})
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"count": "bar"}}"#).unwrap();
        let arg = format!("@{}", file.path().display());
        assert_eq!(
            read_document(&arg).unwrap(),
            serde_json::json!({"count": "bar"})
        );

        assert!(read_document("{not json").is_err());
    }

    #[test]
    fn test_parse_roles() {
        let roles = parse_roles(&["read@test".to_string(), "root@admin".to_string()]).unwrap();
        assert_eq!(roles, vec![RoleName::new("read", "test"), RoleName::new("root", "admin")]);
        assert!(parse_roles(&["nodb".to_string()]).is_err());
    }

    #[test]
    fn test_roles_file_overrides_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"role": "auditor", "db": "app", "privileges": [
                {{"resource": {{"db": "app", "collection": ""}}, "actions": ["find"]}}
            ]}}]"#
        )
        .unwrap();

        let input = RoleInput {
            roles: vec![],
            roles_file: Some(file.path().to_path_buf()),
        };
        let config = AuthzConfig {
            roles_file: Some(PathBuf::from("/nonexistent/roles.json")),
            ..Default::default()
        };
        let graph = load_graph(&input, &config).unwrap();
        assert_eq!(graph.custom_role_count(), 1);

        let missing = RoleInput {
            roles: vec![],
            roles_file: None,
        };
        assert!(load_graph(&missing, &config).is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "authzctl", "check", "--db", "test", "--command", "{\"find\":\"foo\"}", "--role",
            "read@test", "--role", "readWrite@test", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Check { input, roles, .. } => {
                assert_eq!(input.db, "test");
                assert_eq!(roles.roles.len(), 2);
            }
            _ => panic!("Expected check command"),
        }
    }
}
