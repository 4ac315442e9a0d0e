use std::fmt;

use serde::{Deserialize, Serialize};

use super::NamespaceIdentifier;

/// Raw candidate values for the namespace, collected once at startup.
///
/// Empty or whitespace-only values count as absent. Present values are
/// returned as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSignals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl EnvironmentSignals {
    #[must_use]
    pub fn with_override(mut self, value: impl Into<String>) -> Self {
        self.override_schema = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_pull_request(mut self, value: impl Into<String>) -> Self {
        self.pull_request = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_branch(mut self, value: impl Into<String>) -> Self {
        self.branch = Some(value.into());
        self
    }

    /// Replaces each signal that `other` carries, keeping the rest.
    #[must_use]
    pub fn overlay(self, other: EnvironmentSignals) -> Self {
        Self {
            override_schema: other.override_schema.or(self.override_schema),
            pull_request: other.pull_request.or(self.pull_request),
            branch: other.branch.or(self.branch),
        }
    }

    pub fn override_value(&self) -> Option<&str> {
        present(self.override_schema.as_deref())
    }

    /// The pull-request number, if the signal is present and numeric.
    pub fn pull_request_number(&self) -> Option<u64> {
        let raw = present(self.pull_request.as_deref())?.trim();
        match raw.parse::<u64>() {
            Ok(n) => Some(n),
            Err(_) => {
                tracing::warn!("Ignoring non-numeric pull request id '{raw}'");
                None
            }
        }
    }

    pub fn branch_value(&self) -> Option<&str> {
        present(self.branch.as_deref())
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Which signal decided the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Override,
    PullRequest,
    Branch,
    Default,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalKind::Override => "override",
            SignalKind::PullRequest => "pull request",
            SignalKind::Branch => "branch",
            SignalKind::Default => "default",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub namespace: NamespaceIdentifier,
    pub source: SignalKind,
}
