//! In-process backend that models schemas, tracking tables, and connections.
//!
//! Used by tests. All executors and runners created from one
//! [`MemoryBackend`] share its state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{MigrationRunner, MigrationScope, SchemaBackend, SchemaExecutor};
use crate::error::{Error, Result};
use crate::migrations::{self, Migration, MigrationSet};
use crate::types::NamespaceIdentifier;

#[derive(Debug, Clone)]
pub struct AppliedMigration {
    pub id: String,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SchemaState {
    /// None until the tracking table is created.
    tracking: Option<Vec<AppliedMigration>>,
    statements: Vec<String>,
    rows: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    schemas: BTreeMap<String, SchemaState>,
    open_connections: usize,
    total_connections: usize,
    failing_migrations: HashSet<String>,
    deny_create: bool,
    unreachable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    migrations: MigrationSet,
}

impl MemoryBackend {
    pub fn new(migrations: MigrationSet) -> Self {
        Self {
            state: Arc::default(),
            migrations,
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }

    /// Replaces the migration set, keeping schema state.
    pub fn set_migrations(&mut self, migrations: MigrationSet) {
        self.migrations = migrations;
    }

    /// Makes the named migration fail when applied.
    pub fn fail_migration(&self, id: &str) {
        self.state().failing_migrations.insert(id.to_string());
    }

    /// Makes schema creation fail as if permission were denied.
    pub fn deny_schema_creation(&self) {
        self.state().deny_create = true;
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    pub fn schema_exists(&self, name: &str) -> bool {
        self.state().schemas.contains_key(name)
    }

    pub fn schemas(&self) -> Vec<String> {
        self.state().schemas.keys().cloned().collect()
    }

    /// Ids recorded in the schema's tracking table, in apply order.
    pub fn applied(&self, name: &str) -> Vec<String> {
        self.state()
            .schemas
            .get(name)
            .and_then(|s| s.tracking.as_ref())
            .map(|t| t.iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn applied_migrations(&self, name: &str) -> Vec<AppliedMigration> {
        self.state()
            .schemas
            .get(name)
            .and_then(|s| s.tracking.clone())
            .unwrap_or_default()
    }

    /// SQL statements executed inside the schema, in order.
    pub fn statements(&self, name: &str) -> Vec<String> {
        self.state()
            .schemas
            .get(name)
            .map(|s| s.statements.clone())
            .unwrap_or_default()
    }

    /// Stores a row of application data in an existing schema.
    pub fn insert_row(&self, name: &str, row: &str) -> bool {
        match self.state().schemas.get_mut(name) {
            Some(schema) => {
                schema.rows.push(row.to_string());
                true
            }
            None => false,
        }
    }

    pub fn rows(&self, name: &str) -> Vec<String> {
        self.state()
            .schemas
            .get(name)
            .map(|s| s.rows.clone())
            .unwrap_or_default()
    }

    pub fn open_connections(&self) -> usize {
        self.state().open_connections
    }

    pub fn total_connections(&self) -> usize {
        self.state().total_connections
    }

    fn open(&self) -> Result<()> {
        let mut state = self.state();
        if state.unreachable {
            return Err(Error::Connectivity("connection refused".to_string()));
        }
        state.open_connections += 1;
        state.total_connections += 1;
        Ok(())
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn release(state: &Mutex<MemoryState>) {
    let mut state = lock(state);
    state.open_connections = state.open_connections.saturating_sub(1);
}

impl SchemaBackend for MemoryBackend {
    type Executor = MemoryExecutor;
    type Runner = MemoryRunner;

    async fn connect(&self, _database_url: &str) -> Result<MemoryExecutor> {
        self.open()?;
        Ok(MemoryExecutor {
            state: Arc::clone(&self.state),
        })
    }

    async fn migrator(&self, _database_url: &str, scope: MigrationScope) -> Result<MemoryRunner> {
        self.open()?;
        Ok(MemoryRunner {
            state: Arc::clone(&self.state),
            scope,
            migrations: self.migrations.clone(),
        })
    }
}

pub struct MemoryExecutor {
    state: Arc<Mutex<MemoryState>>,
}

impl SchemaExecutor for MemoryExecutor {
    async fn schema_exists(&mut self, namespace: &NamespaceIdentifier) -> Result<bool> {
        Ok(lock(&self.state).schemas.contains_key(namespace.as_str()))
    }

    async fn create_schema(&mut self, namespace: &NamespaceIdentifier) -> Result<()> {
        namespace.validate()?;
        let mut state = lock(&self.state);
        if state.deny_create {
            return Err(Error::NamespaceCreation {
                namespace: namespace.to_string(),
                message: "permission denied for database".to_string(),
            });
        }
        state
            .schemas
            .entry(namespace.to_string())
            .or_default();
        Ok(())
    }

    async fn drop_schema(&mut self, namespace: &NamespaceIdentifier) -> Result<bool> {
        namespace.validate()?;
        Ok(lock(&self.state)
            .schemas
            .remove(namespace.as_str())
            .is_some())
    }

    async fn close(self) -> Result<()> {
        release(&self.state);
        Ok(())
    }
}

pub struct MemoryRunner {
    state: Arc<Mutex<MemoryState>>,
    scope: MigrationScope,
    migrations: MigrationSet,
}

impl MigrationRunner for MemoryRunner {
    fn scope(&self) -> &MigrationScope {
        &self.scope
    }

    async fn prepare(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        let schema = state
            .schemas
            .get_mut(self.scope.schema().as_str())
            .ok_or_else(|| Error::MissingSchema(self.scope.schema().to_string()))?;
        schema.tracking.get_or_insert_with(Vec::new);
        Ok(())
    }

    async fn pending(&mut self) -> Result<Vec<Migration>> {
        let applied: HashMap<String, String> = lock(&self.state)
            .schemas
            .get(self.scope.schema().as_str())
            .and_then(|s| s.tracking.as_ref())
            .map(|t| {
                t.iter()
                    .map(|m| (m.id.clone(), m.checksum.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(migrations::pending(&self.migrations, &applied))
    }

    async fn apply(&mut self, migration: &Migration) -> Result<()> {
        let fail = |message: &str| Error::MigrationApplication {
            namespace: self.scope.schema().to_string(),
            migration: migration.id.clone(),
            message: message.to_string(),
        };

        let mut state = lock(&self.state);
        if state.failing_migrations.contains(&migration.id) {
            return Err(fail("syntax error at or near \"TABLE\""));
        }
        let schema = state
            .schemas
            .get_mut(self.scope.schema().as_str())
            .ok_or_else(|| fail("schema does not exist"))?;
        let tracking = schema
            .tracking
            .as_mut()
            .ok_or_else(|| fail("tracking table does not exist"))?;
        if tracking.iter().any(|m| m.id == migration.id) {
            return Err(fail("duplicate key value violates unique constraint"));
        }

        tracking.push(AppliedMigration {
            id: migration.id.clone(),
            checksum: migration.checksum.clone(),
            applied_at: Utc::now(),
        });
        schema.statements.push(migration.sql.clone());
        Ok(())
    }

    async fn close(self) -> Result<()> {
        release(&self.state);
        Ok(())
    }
}
