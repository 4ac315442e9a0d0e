mod memory;
mod postgres;

pub use memory::{AppliedMigration, MemoryBackend, MemoryExecutor, MemoryRunner};
pub use postgres::{PostgresBackend, PostgresExecutor, PostgresRunner};

use crate::error::Result;
use crate::migrations::Migration;
use crate::types::NamespaceIdentifier;

/// Name of the per-namespace migration tracking table.
pub const TRACKING_TABLE: &str = "schemaline_migrations";

/// Where a migration runner reads and writes.
///
/// Statements and the tracking table always share one schema, so the only
/// way to build a scope is from a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScope {
    schema: NamespaceIdentifier,
    tracking_table: String,
}

impl MigrationScope {
    pub fn for_namespace(namespace: &NamespaceIdentifier) -> Result<Self> {
        namespace.validate()?;
        Ok(Self {
            schema: namespace.clone(),
            tracking_table: TRACKING_TABLE.to_string(),
        })
    }

    pub fn schema(&self) -> &NamespaceIdentifier {
        &self.schema
    }

    pub fn tracking_table(&self) -> &str {
        &self.tracking_table
    }

    /// Schema-qualified, quoted tracking table name.
    pub fn qualified_tracking_table(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.tracking_table)
    }
}

/// Opens the connections the lifecycle and teardown need.
///
/// Every call opens a fresh connection; callers close it when done.
#[allow(async_fn_in_trait)]
pub trait SchemaBackend {
    type Executor: SchemaExecutor;
    type Runner: MigrationRunner;

    async fn connect(&self, database_url: &str) -> Result<Self::Executor>;

    async fn migrator(&self, database_url: &str, scope: MigrationScope) -> Result<Self::Runner>;
}

/// Raw schema-level statements. Implementations must validate the
/// identifier before it reaches SQL text.
#[allow(async_fn_in_trait)]
pub trait SchemaExecutor {
    async fn schema_exists(&mut self, namespace: &NamespaceIdentifier) -> Result<bool>;

    /// Creates the schema if it is missing. Never touches existing objects.
    async fn create_schema(&mut self, namespace: &NamespaceIdentifier) -> Result<()>;

    /// Drops the schema and everything in it. Returns false if it was absent.
    async fn drop_schema(&mut self, namespace: &NamespaceIdentifier) -> Result<bool>;

    async fn close(self) -> Result<()>;
}

/// Applies migrations inside a single [`MigrationScope`].
#[allow(async_fn_in_trait)]
pub trait MigrationRunner {
    fn scope(&self) -> &MigrationScope;

    /// Creates the tracking table inside the scope's schema if missing.
    async fn prepare(&mut self) -> Result<()>;

    /// Migrations not yet recorded in the tracking table, in apply order.
    /// Read-only: a missing schema or tracking table means everything is
    /// pending.
    async fn pending(&mut self) -> Result<Vec<Migration>>;

    /// Applies one migration and records it.
    async fn apply(&mut self, migration: &Migration) -> Result<()>;

    async fn close(self) -> Result<()>;
}
