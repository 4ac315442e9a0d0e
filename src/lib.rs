//! # Schemaline
//!
//! Schema-per-branch preview environments for Postgres. Every pull request
//! gets its own schema, migrations run inside it at build time, and the schema
//! is dropped when the pull request closes. Usable both as a standalone binary
//! and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! schemaline = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::path::Path;
//! use schemaline::config::DatabaseConfig;
//! use schemaline::lifecycle::LifecycleManager;
//! use schemaline::migrations::MigrationSet;
//! use schemaline::resolver;
//! use schemaline::store::PostgresBackend;
//! use schemaline::types::EnvironmentSignals;
//!
//! let signals = EnvironmentSignals::default().with_pull_request("42");
//! let namespace = resolver::resolve(&signals); // pr_42
//!
//! let migrations = MigrationSet::load(Path::new("./migrations"))?;
//! let manager = LifecycleManager::new(
//!     PostgresBackend::new(migrations),
//!     DatabaseConfig::new("postgres://localhost/app"),
//! );
//! let report = manager.ensure_and_migrate(&namespace).await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod migrations;
pub mod resolver;
pub mod store;
pub mod teardown;
pub mod types;
