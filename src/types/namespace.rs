use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Postgres truncates identifiers longer than this.
pub const MAX_IDENTIFIER_LEN: usize = 63;

const RESERVED: &[&str] = &["pg_catalog", "information_schema"];

/// The name of a Postgres schema that owns one preview environment.
///
/// Values are produced by the resolver and are never persisted. Anything that
/// embeds an identifier into SQL text must call [`NamespaceIdentifier::validate`]
/// (or go through [`NamespaceIdentifier::quoted`]) first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceIdentifier(String);

impl NamespaceIdentifier {
    pub const DEFAULT: &'static str = "public";

    /// Parses and validates a schema name.
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let id = Self(name.into());
        id.validate()?;
        Ok(id)
    }

    /// The shared schema used when no preview signal is present.
    #[must_use]
    pub fn default_namespace() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// Wraps a name without checking it. Used by the resolver for override
    /// values, which are passed through verbatim.
    pub(crate) fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.0.as_str();
        let invalid = |reason: &str| {
            Err(Error::InvalidIdentifier {
                name: name.to_string(),
                reason: reason.to_string(),
            })
        };

        if name.is_empty() {
            return invalid("schema name cannot be empty");
        }
        if name.len() > MAX_IDENTIFIER_LEN {
            return invalid("schema name cannot exceed 63 characters");
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return invalid("schema name can only contain lowercase letters, digits, and underscores");
        }
        if is_reserved(name) {
            return invalid("schema name is reserved by Postgres");
        }
        Ok(())
    }

    /// Returns the identifier as a double-quoted SQL identifier, validating it
    /// first.
    pub fn quoted(&self) -> Result<String> {
        self.validate()?;
        Ok(format!("\"{}\"", self.0))
    }
}

/// Returns true for names Postgres keeps for itself.
pub(crate) fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name) || name.starts_with("pg_")
}

impl fmt::Display for NamespaceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NamespaceIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
