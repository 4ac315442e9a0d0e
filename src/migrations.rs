//! File-system migration source.
//!
//! Migrations are plain `.sql` files in one directory. They are applied in
//! file-name order, so names should start with a sortable prefix such as
//! `0001_` or a timestamp.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// File name, e.g. `0001_create_todos.sql`.
    pub id: String,
    pub sql: String,
    /// Hex SHA-256 of `sql`.
    pub checksum: String,
}

impl Migration {
    pub fn new(id: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let checksum = checksum(&sql);
        Self {
            id: id.into(),
            sql,
            checksum,
        }
    }
}

pub fn checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}

/// An ordered list of migrations.
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    /// Builds a set from in-memory migrations, sorting them by id.
    pub fn new(mut migrations: Vec<Migration>) -> Self {
        migrations.sort_by(|a, b| a.id.cmp(&b.id));
        Self { migrations }
    }

    /// Loads every `*.sql` file in `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::MigrationSource(format!(
                "migrations directory not found at {}",
                dir.display()
            )));
        }

        let dir_str = dir.to_str().ok_or_else(|| {
            Error::MigrationSource(format!("non-UTF-8 path: {}", dir.display()))
        })?;
        let pattern = format!("{}/*.sql", glob::Pattern::escape(dir_str));

        let paths: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| Error::MigrationSource(e.to_string()))?
            .collect::<std::result::Result<Vec<PathBuf>, glob::GlobError>>()
            .map_err(|e| Error::MigrationSource(e.to_string()))?;

        let mut migrations = Vec::with_capacity(paths.len());
        for path in paths.into_iter().filter(|p| p.is_file()) {
            let Some(id) = path.file_name().and_then(|n| n.to_str()) else {
                return Err(Error::MigrationSource(format!(
                    "non-UTF-8 file name: {}",
                    path.display()
                )));
            };
            let sql = fs::read_to_string(&path)?;
            migrations.push(Migration::new(id, sql));
        }

        if migrations.is_empty() {
            tracing::warn!("No migrations found in {}", dir.display());
        }

        Ok(Self::new(migrations))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.iter()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Migration> {
        self.migrations.iter().find(|m| m.id == id)
    }
}

/// Diffs `set` against what a schema's tracking table records, keyed by id
/// with the recorded checksum as value.
///
/// A recorded migration whose content has since changed is not re-applied;
/// the drift is only logged. Recorded ids missing from `set` are ignored.
pub fn pending(set: &MigrationSet, applied: &HashMap<String, String>) -> Vec<Migration> {
    for id in applied.keys() {
        if set.get(id).is_none() {
            tracing::debug!("Tracking table records migration {id} that is not in the local set");
        }
    }

    let mut pending = Vec::new();
    for migration in set.iter() {
        match applied.get(&migration.id) {
            None => pending.push(migration.clone()),
            Some(recorded) if *recorded != migration.checksum => {
                tracing::warn!(
                    "Migration {} changed after it was applied; not re-applying",
                    migration.id
                );
            }
            Some(_) => {}
        }
    }
    pending
}
