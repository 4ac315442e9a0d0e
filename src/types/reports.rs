use serde::Serialize;

use super::{NamespaceIdentifier, SignalKind};

/// Outcome of one ensure-and-migrate run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub namespace: NamespaceIdentifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SignalKind>,
    /// Number of migrations that were pending when the run started.
    pub pending: usize,
    pub applied: Vec<String>,
    pub up_to_date: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub namespace: NamespaceIdentifier,
    pub exists: bool,
    pub pending: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeardownReport {
    pub namespace: NamespaceIdentifier,
    /// False when the namespace was already absent.
    pub dropped: bool,
}
