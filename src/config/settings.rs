use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{EnvironmentSignals, NamespaceIdentifier};

/// Read from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "schemaline.toml";

/// Process configuration, populated once at startup and passed down.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub migrations_dir: PathBuf,
    pub database: DatabaseConfig,
    pub signals: SignalSources,
}

impl Settings {
    /// Loads settings from an explicit file, or from `schemaline.toml` in the
    /// current directory when it exists, or falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Fills environment-derived values using `lookup`.
    pub fn with_environment<F>(mut self, lookup: F) -> (Self, EnvironmentSignals)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.database.url.is_none() {
            self.database.url = lookup(&self.database.url_var);
        }
        let signals = self.signals.collect(&lookup);
        (self, signals)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            database: DatabaseConfig::default(),
            signals: SignalSources::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string. Usually left unset in files and read from `url_var`.
    pub url: Option<String>,
    /// Environment variable holding the connection string.
    pub url_var: String,
    /// Schemas searched after the preview schema while migrations run.
    /// Empty by default, so migrations see only their own schema.
    pub search_path: Vec<String>,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Returns the connection string, or a configuration error naming the
    /// variable that should have provided it.
    pub fn require_url(&self) -> Result<&str> {
        match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(Error::Config(format!(
                "{} is not set; a database connection string is required",
                self.url_var
            ))),
        }
    }

    /// Parses `search_path` entries, rejecting anything that is not a valid
    /// schema name.
    pub fn extra_search_path(&self) -> Result<Vec<NamespaceIdentifier>> {
        self.search_path
            .iter()
            .map(NamespaceIdentifier::parse)
            .collect()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            url_var: "DATABASE_URL".to_string(),
            search_path: Vec::new(),
        }
    }
}

// Connection strings carry credentials.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("url_var", &self.url_var)
            .field("search_path", &self.search_path)
            .finish()
    }
}

/// Environment variables consulted for each signal, first non-empty wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSources {
    pub override_vars: Vec<String>,
    pub pull_request_vars: Vec<String>,
    pub branch_vars: Vec<String>,
}

impl Default for SignalSources {
    fn default() -> Self {
        Self {
            override_vars: vec!["DB_SCHEMA".to_string()],
            pull_request_vars: vec![
                "VERCEL_GIT_PULL_REQUEST_ID".to_string(),
                "PR_NUMBER".to_string(),
            ],
            branch_vars: vec![
                "VERCEL_GIT_COMMIT_REF".to_string(),
                "GITHUB_HEAD_REF".to_string(),
                "GITHUB_REF_NAME".to_string(),
            ],
        }
    }
}

impl SignalSources {
    pub fn collect<F>(&self, lookup: F) -> EnvironmentSignals
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |vars: &[String]| {
            vars.iter()
                .filter_map(|var| lookup(var.as_str()))
                .find(|value| !value.trim().is_empty())
        };

        EnvironmentSignals {
            override_schema: first(&self.override_vars),
            pull_request: first(&self.pull_request_vars),
            branch: first(&self.branch_vars),
        }
    }
}
