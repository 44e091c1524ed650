use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::command::{DEFAULT_MAX_DEPTH, ExtractorOptions};
use crate::error::{AuthzError, Result};

/// Authorization engine settings, read from the `[authz]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// When false every command is authorized
    pub enabled: bool,
    /// Bound on nested pipelines plus view hops (default: 100)
    pub max_recursion_depth: usize,
    /// Reading through a view also needs `find` on the namespaces behind it
    pub resolve_view_dependents: bool,
    /// Commands switched off on this deployment; they fail with code 115
    pub unsupported_commands: Vec<String>,
    /// JSON file of custom role definitions to preload
    pub roles_file: Option<PathBuf>,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_recursion_depth: DEFAULT_MAX_DEPTH,
            resolve_view_dependents: false,
            unsupported_commands: Vec::new(),
            roles_file: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    authz: AuthzConfig,
}

impl AuthzConfig {
    /// Load config from a TOML file, with environment variable overrides.
    /// Falls back to defaults if the file is not found. MDB_CONFIG or
    /// MONODB_CONFIG override the path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let cfg_path = env::var("MDB_CONFIG")
            .or_else(|_| env::var("MONODB_CONFIG"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        let mut cfg = Self::read_file(&cfg_path)?;
        cfg.apply_env_overrides(|key| env::var(key).ok());
        Ok(cfg)
    }

    /// Parse the file at `path` without looking at the environment.
    pub fn read_file(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(s) => Self::from_toml(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(s).map_err(|e| AuthzError::Config(e.to_string()))?;
        file.authz.validate()?;
        Ok(file.authz)
    }

    /// Apply MONODB_AUTHZ_*/MDB_AUTHZ_* overrides, reading variables
    /// through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("MONODB_AUTHZ_{name}")).or_else(|| lookup(&format!("MDB_AUTHZ_{name}")))
        };

        if let Some(v) = var("ENABLED")
            && let Ok(enabled) = v.parse::<bool>()
        {
            self.enabled = enabled;
        }

        if let Some(v) = var("MAX_DEPTH")
            && let Ok(depth) = v.parse::<usize>()
            && depth > 0
        {
            self.max_recursion_depth = depth;
        }

        if let Some(v) = var("ROLES_FILE") {
            self.roles_file = Some(PathBuf::from(v));
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_recursion_depth == 0 {
            return Err(AuthzError::Config(
                "max_recursion_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn is_supported(&self, command: &str) -> bool {
        !self.unsupported_commands.iter().any(|c| c == command)
    }

    pub fn extractor_options(&self) -> ExtractorOptions {
        ExtractorOptions {
            max_depth: self.max_recursion_depth,
            resolve_view_dependents: self.resolve_view_dependents,
        }
    }
}
