use std::collections::HashMap;

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};

use super::{MigrationRunner, MigrationScope, SchemaBackend, SchemaExecutor};
use crate::error::{Error, Result};
use crate::migrations::{self, Migration, MigrationSet};
use crate::types::NamespaceIdentifier;

const UNIQUE_VIOLATION: &str = "23505";
const DUPLICATE_SCHEMA: &str = "42P06";
const DUPLICATE_TABLE: &str = "42P07";

/// Postgres backend. Opens one dedicated connection per executor or runner;
/// nothing is pooled or cached between calls.
#[derive(Debug, Clone, Default)]
pub struct PostgresBackend {
    migrations: MigrationSet,
    extra_search_path: Vec<NamespaceIdentifier>,
}

impl PostgresBackend {
    pub fn new(migrations: MigrationSet) -> Self {
        Self {
            migrations,
            extra_search_path: Vec::new(),
        }
    }

    /// Schemas searched after the scoped one while migrations run, e.g.
    /// `public` for extensions installed there.
    pub fn with_search_path(mut self, extra: Vec<NamespaceIdentifier>) -> Self {
        self.extra_search_path = extra;
        self
    }
}

/// `SET search_path` for a runner: the scoped schema first, so unqualified
/// DDL lands there, then the extra entries.
fn search_path_sql(scope: &MigrationScope, extra: &[NamespaceIdentifier]) -> Result<String> {
    let mut entries = vec![scope.schema().quoted()?];
    for schema in extra {
        if schema != scope.schema() {
            entries.push(schema.quoted()?);
        }
    }
    Ok(format!("SET search_path TO {}", entries.join(", ")))
}

/// Whether `err` is the loser's side of two sessions creating the same
/// object at once. `IF NOT EXISTS` does not cover that race in Postgres.
fn lost_create_race(err: &sqlx::Error, duplicate_code: &str) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| is_create_race_code(&code, duplicate_code))
}

fn is_create_race_code(code: &str, duplicate_code: &str) -> bool {
    code == UNIQUE_VIOLATION || code == duplicate_code
}

fn connect_options(database_url: &str) -> Result<PgConnectOptions> {
    database_url
        .parse::<PgConnectOptions>()
        .map_err(Error::from_connect)
}

impl SchemaBackend for PostgresBackend {
    type Executor = PostgresExecutor;
    type Runner = PostgresRunner;

    async fn connect(&self, database_url: &str) -> Result<PostgresExecutor> {
        let conn = connect_options(database_url)?
            .connect()
            .await
            .map_err(Error::from_connect)?;
        Ok(PostgresExecutor { conn })
    }

    async fn migrator(&self, database_url: &str, scope: MigrationScope) -> Result<PostgresRunner> {
        let set_search_path = search_path_sql(&scope, &self.extra_search_path)?;
        let mut conn = connect_options(database_url)?
            .connect()
            .await
            .map_err(Error::from_connect)?;

        // Set after connecting; some poolers reject startup `options`.
        if let Err(e) = sqlx::query(&set_search_path).execute(&mut conn).await {
            if let Err(close_err) = conn.close().await {
                tracing::warn!(
                    "Failed to close connection for schema {}: {close_err}",
                    scope.schema()
                );
            }
            return Err(e.into());
        }

        Ok(PostgresRunner {
            conn,
            scope,
            migrations: self.migrations.clone(),
        })
    }
}

pub struct PostgresExecutor {
    conn: PgConnection,
}

impl SchemaExecutor for PostgresExecutor {
    async fn schema_exists(&mut self, namespace: &NamespaceIdentifier) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_namespace WHERE nspname = $1)")
                .bind(namespace.as_str())
                .fetch_one(&mut self.conn)
                .await?;
        Ok(exists)
    }

    async fn create_schema(&mut self, namespace: &NamespaceIdentifier) -> Result<()> {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", namespace.quoted()?);
        let Err(e) = sqlx::query(&sql).execute(&mut self.conn).await else {
            return Ok(());
        };

        if lost_create_race(&e, DUPLICATE_SCHEMA) && self.schema_exists(namespace).await? {
            tracing::debug!("Schema {namespace} was created concurrently");
            return Ok(());
        }
        Err(Error::NamespaceCreation {
            namespace: namespace.to_string(),
            message: e.to_string(),
        })
    }

    async fn drop_schema(&mut self, namespace: &NamespaceIdentifier) -> Result<bool> {
        let sql = format!("DROP SCHEMA IF EXISTS {} CASCADE", namespace.quoted()?);
        let existed = self.schema_exists(namespace).await?;
        sqlx::query(&sql)
            .execute(&mut self.conn)
            .await
            .map_err(|e| Error::NamespaceDrop {
                namespace: namespace.to_string(),
                message: e.to_string(),
            })?;
        Ok(existed)
    }

    async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

pub struct PostgresRunner {
    conn: PgConnection,
    scope: MigrationScope,
    migrations: MigrationSet,
}

fn application_error(namespace: &str, migration: &Migration, err: sqlx::Error) -> Error {
    Error::MigrationApplication {
        namespace: namespace.to_string(),
        migration: migration.id.clone(),
        message: err.to_string(),
    }
}

impl PostgresRunner {
    async fn tracking_table_exists(&mut self) -> Result<bool> {
        let name = format!("{}.{}", self.scope.schema(), self.scope.tracking_table());
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(name)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(exists)
    }
}

impl MigrationRunner for PostgresRunner {
    fn scope(&self) -> &MigrationScope {
        &self.scope
    }

    async fn prepare(&mut self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                checksum TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            self.scope.qualified_tracking_table()
        );
        let Err(e) = sqlx::query(&sql).execute(&mut self.conn).await else {
            return Ok(());
        };

        if lost_create_race(&e, DUPLICATE_TABLE) && self.tracking_table_exists().await? {
            tracing::debug!(
                "Tracking table in schema {} was created concurrently",
                self.scope.schema()
            );
            return Ok(());
        }
        Err(e.into())
    }

    async fn pending(&mut self) -> Result<Vec<Migration>> {
        if !self.tracking_table_exists().await? {
            return Ok(self.migrations.iter().cloned().collect());
        }

        let sql = format!(
            "SELECT id, checksum FROM {}",
            self.scope.qualified_tracking_table()
        );
        let applied: HashMap<String, String> = sqlx::query_as::<_, (String, String)>(&sql)
            .fetch_all(&mut self.conn)
            .await?
            .into_iter()
            .collect();

        Ok(migrations::pending(&self.migrations, &applied))
    }

    async fn apply(&mut self, migration: &Migration) -> Result<()> {
        let insert = format!(
            "INSERT INTO {} (id, checksum) VALUES ($1, $2)",
            self.scope.qualified_tracking_table()
        );
        let namespace = self.scope.schema().to_string();

        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| application_error(&namespace, migration, e))?;

        if let Err(e) = sqlx::raw_sql(&migration.sql).execute(&mut *tx).await {
            return Err(application_error(&namespace, migration, e));
        }
        if let Err(e) = sqlx::query(&insert)
            .bind(migration.id.as_str())
            .bind(migration.checksum.as_str())
            .execute(&mut *tx)
            .await
        {
            return Err(application_error(&namespace, migration, e));
        }

        tx.commit()
            .await
            .map_err(|e| application_error(&namespace, migration, e))?;
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(name: &str) -> NamespaceIdentifier {
        NamespaceIdentifier::parse(name).unwrap()
    }

    #[test]
    fn test_search_path_puts_scope_first() {
        let scope = MigrationScope::for_namespace(&ns("pr_7")).unwrap();
        assert_eq!(
            search_path_sql(&scope, &[]).unwrap(),
            "SET search_path TO \"pr_7\""
        );
        assert_eq!(
            search_path_sql(&scope, &[ns("public"), ns("pr_7"), ns("extensions")]).unwrap(),
            "SET search_path TO \"pr_7\", \"public\", \"extensions\""
        );
    }

    #[test]
    fn test_create_race_codes() {
        assert!(is_create_race_code("23505", DUPLICATE_SCHEMA));
        assert!(is_create_race_code("42P06", DUPLICATE_SCHEMA));
        assert!(is_create_race_code("42P07", DUPLICATE_TABLE));
        assert!(!is_create_race_code("42P07", DUPLICATE_SCHEMA));
        assert!(!is_create_race_code("42501", DUPLICATE_SCHEMA));
    }

    #[test]
    fn test_non_database_error_is_not_a_race() {
        let err = sqlx::Error::Protocol("connection reset".to_string());
        assert!(!lost_create_race(&err, DUPLICATE_SCHEMA));
    }
}
