//! Build-time namespace preparation: ensure the schema exists, then bring its
//! migrations up to date.

use tracing::{error, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::store::{MigrationRunner, MigrationScope, SchemaBackend, SchemaExecutor};
use crate::types::{MigrationReport, NamespaceIdentifier, StatusReport};

pub struct LifecycleManager<B> {
    backend: B,
    database: DatabaseConfig,
}

impl<B: SchemaBackend> LifecycleManager<B> {
    pub fn new(backend: B, database: DatabaseConfig) -> Self {
        Self { backend, database }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Creates `namespace` if needed and applies every pending migration
    /// inside it, in order. Stops at the first failing migration; migrations
    /// applied before it stay applied.
    pub async fn ensure_and_migrate(
        &self,
        namespace: &NamespaceIdentifier,
    ) -> Result<MigrationReport> {
        let url = self
            .database
            .require_url()
            .inspect_err(|e| log_failure(namespace, "read configuration", e))?;
        namespace
            .validate()
            .inspect_err(|e| log_failure(namespace, "validate schema name", e))?;

        info!("Preparing schema {namespace}");
        self.ensure_namespace(url, namespace).await?;

        let scope = MigrationScope::for_namespace(namespace)?;
        let mut runner = self
            .backend
            .migrator(url, scope)
            .await
            .inspect_err(|e| log_failure(namespace, "connect", e))?;

        let outcome = apply_pending(&mut runner).await;
        let (pending, applied) = settle(outcome, runner.close().await, namespace)?;

        if pending > 0 {
            info!(
                "Schema {namespace}: applied {} migration(s)",
                applied.len()
            );
        }

        Ok(MigrationReport {
            namespace: namespace.clone(),
            source: None,
            pending,
            up_to_date: pending == 0,
            applied,
        })
    }

    /// Reports pending migrations without creating anything.
    pub async fn status(&self, namespace: &NamespaceIdentifier) -> Result<StatusReport> {
        let url = self
            .database
            .require_url()
            .inspect_err(|e| log_failure(namespace, "read configuration", e))?;
        namespace
            .validate()
            .inspect_err(|e| log_failure(namespace, "validate schema name", e))?;

        let mut executor = self
            .backend
            .connect(url)
            .await
            .inspect_err(|e| log_failure(namespace, "connect", e))?;
        let exists = executor.schema_exists(namespace).await;
        let exists = settle(exists, executor.close().await, namespace)?;

        let scope = MigrationScope::for_namespace(namespace)?;
        let mut runner = self
            .backend
            .migrator(url, scope)
            .await
            .inspect_err(|e| log_failure(namespace, "connect", e))?;
        let pending = runner.pending().await;
        let pending = settle(pending, runner.close().await, namespace)?;

        Ok(StatusReport {
            namespace: namespace.clone(),
            exists,
            pending: pending.into_iter().map(|m| m.id).collect(),
        })
    }

    async fn ensure_namespace(&self, url: &str, namespace: &NamespaceIdentifier) -> Result<()> {
        let mut executor = self
            .backend
            .connect(url)
            .await
            .inspect_err(|e| log_failure(namespace, "connect", e))?;
        let created = executor
            .create_schema(namespace)
            .await
            .inspect_err(|e| log_failure(namespace, "create schema", e));
        settle(created, executor.close().await, namespace)
    }
}

async fn apply_pending<R: MigrationRunner>(runner: &mut R) -> Result<(usize, Vec<String>)> {
    let namespace = runner.scope().schema().clone();

    runner
        .prepare()
        .await
        .inspect_err(|e| log_failure(&namespace, "create tracking table", e))?;
    let pending = runner
        .pending()
        .await
        .inspect_err(|e| log_failure(&namespace, "list pending migrations", e))?;

    if pending.is_empty() {
        info!("Schema {namespace} is up to date");
        return Ok((0, Vec::new()));
    }
    info!("Schema {namespace}: {} pending migration(s)", pending.len());

    let mut applied = Vec::with_capacity(pending.len());
    for migration in &pending {
        if let Err(e) = runner.apply(migration).await {
            log_failure(&namespace, "apply migration", &e);
            error!(
                "Schema {namespace}: {} of {} migration(s) applied before the failure; \
                 remaining migrations were skipped",
                applied.len(),
                pending.len()
            );
            return Err(e);
        }
        info!("Applied {} to {namespace}", migration.id);
        applied.push(migration.id.clone());
    }

    Ok((pending.len(), applied))
}

pub(crate) fn log_failure(namespace: &NamespaceIdentifier, step: &str, err: &Error) {
    error!("Schema {namespace}: {step} failed: {err}");
}

/// Combines an operation's outcome with the result of closing its
/// connection. A close failure never masks the outcome.
pub(crate) fn settle<T>(
    outcome: Result<T>,
    closed: Result<()>,
    namespace: &NamespaceIdentifier,
) -> Result<T> {
    if let Err(e) = closed {
        warn!("Failed to close connection for schema {namespace}: {e}");
    }
    outcome
}
