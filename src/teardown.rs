//! Pull-request-closed handling: drop the preview namespace and everything in
//! it. There is no soft delete.

use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::lifecycle::{log_failure, settle};
use crate::resolver;
use crate::store::{SchemaBackend, SchemaExecutor};
use crate::types::{EnvironmentSignals, NamespaceIdentifier, TeardownReport};

pub struct TeardownTrigger<B> {
    backend: B,
    database: DatabaseConfig,
}

impl<B: SchemaBackend> TeardownTrigger<B> {
    pub fn new(backend: B, database: DatabaseConfig) -> Self {
        Self { backend, database }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Drops the namespace that builds for pull request `number` created.
    pub async fn on_pull_request_closed(&self, number: u64) -> Result<TeardownReport> {
        // Same resolution path as the build, with only the pull-request signal set.
        let signals = EnvironmentSignals::default().with_pull_request(number.to_string());
        let namespace = resolver::resolve(&signals);
        info!("Pull request #{number} closed, tearing down schema {namespace}");
        self.drop_namespace(&namespace).await
    }

    /// Drops `namespace` with CASCADE. Dropping an absent namespace succeeds
    /// with `dropped: false`.
    pub async fn drop_namespace(&self, namespace: &NamespaceIdentifier) -> Result<TeardownReport> {
        let url = self
            .database
            .require_url()
            .inspect_err(|e| log_failure(namespace, "read configuration", e))?;
        namespace
            .validate()
            .inspect_err(|e| log_failure(namespace, "validate schema name", e))?;
        if namespace.is_default() {
            let err = Error::ProtectedNamespace(namespace.to_string());
            log_failure(namespace, "drop schema", &err);
            return Err(err);
        }

        let mut executor = self
            .backend
            .connect(url)
            .await
            .inspect_err(|e| log_failure(namespace, "connect", e))?;
        let dropped = executor
            .drop_schema(namespace)
            .await
            .inspect_err(|e| log_failure(namespace, "drop schema", e));
        let dropped = settle(dropped, executor.close().await, namespace)?;

        if dropped {
            info!("Dropped schema {namespace}");
        } else {
            info!("Schema {namespace} does not exist, nothing to drop");
        }

        Ok(TeardownReport {
            namespace: namespace.clone(),
            dropped,
        })
    }
}
