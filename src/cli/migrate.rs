use std::path::Path;

use tracing::info;

use crate::config::Settings;
use crate::error::Result;
use crate::lifecycle::{LifecycleManager, log_failure};
use crate::migrations::MigrationSet;
use crate::resolver;
use crate::store::PostgresBackend;
use crate::types::{NamespaceIdentifier, Resolution};

use super::{MigrateArgs, load_context, print_json};

fn prepare(args: &MigrateArgs) -> anyhow::Result<(LifecycleManager<PostgresBackend>, Resolution)> {
    let (settings, signals) = load_context(&args.config, &args.signals)?;

    let resolution = resolver::explain(&signals);
    info!(
        "Resolved schema {} from {} signal",
        resolution.namespace, resolution.source
    );

    let manager = build_manager(settings, args.migrations_dir.as_deref(), &resolution.namespace)?;
    Ok((manager, resolution))
}

/// Checks everything that can fail before a connection is opened, logging
/// each failure against the resolved schema.
fn build_manager(
    settings: Settings,
    migrations_dir: Option<&Path>,
    namespace: &NamespaceIdentifier,
) -> Result<LifecycleManager<PostgresBackend>> {
    settings
        .database
        .require_url()
        .inspect_err(|e| log_failure(namespace, "read configuration", e))?;
    namespace
        .validate()
        .inspect_err(|e| log_failure(namespace, "validate schema name", e))?;
    let search_path = settings
        .database
        .extra_search_path()
        .inspect_err(|e| log_failure(namespace, "read configuration", e))?;

    let migrations_dir = migrations_dir.unwrap_or(&settings.migrations_dir);
    let migrations = MigrationSet::load(migrations_dir)
        .inspect_err(|e| log_failure(namespace, "load migrations", e))?;
    info!(
        "Loaded {} migration(s) from {}",
        migrations.len(),
        migrations_dir.display()
    );

    let backend = PostgresBackend::new(migrations).with_search_path(search_path);
    Ok(LifecycleManager::new(backend, settings.database))
}

pub async fn run_migrate(args: MigrateArgs) -> anyhow::Result<()> {
    let (manager, resolution) = prepare(&args)?;

    let mut report = manager.ensure_and_migrate(&resolution.namespace).await?;
    report.source = Some(resolution.source);

    if args.config.json {
        return print_json(&report);
    }

    if report.up_to_date {
        println!("Schema \"{}\" is up to date", report.namespace);
    } else {
        println!(
            "Applied {} migration(s) to schema \"{}\":",
            report.applied.len(),
            report.namespace
        );
        for id in &report.applied {
            println!("  {id}");
        }
    }
    Ok(())
}

pub async fn run_status(args: MigrateArgs) -> anyhow::Result<()> {
    let (manager, resolution) = prepare(&args)?;
    let status = manager.status(&resolution.namespace).await?;

    if args.config.json {
        return print_json(&status);
    }

    let state = if status.exists { "exists" } else { "does not exist" };
    println!("Schema \"{}\" {state}", status.namespace);
    if status.pending.is_empty() {
        println!("No pending migrations");
    } else {
        println!("{} pending migration(s):", status.pending.len());
        for id in &status.pending {
            println!("  {id}");
        }
    }
    Ok(())
}
