use tracing::error;

use crate::migrations::MigrationSet;
use crate::store::PostgresBackend;
use crate::teardown::TeardownTrigger;
use crate::types::NamespaceIdentifier;

use super::{SignalArgs, TeardownArgs, load_context, print_json};

pub async fn run_teardown(args: TeardownArgs) -> anyhow::Result<()> {
    // Only the explicit flags decide what gets dropped; ambient signals such
    // as DB_SCHEMA must not redirect a drop.
    let (settings, _) = load_context(&args.config, &SignalArgs::default())?;

    let trigger = TeardownTrigger::new(
        PostgresBackend::new(MigrationSet::default()),
        settings.database,
    );

    let report = match (args.pr, args.schema) {
        (Some(number), _) => trigger.on_pull_request_closed(number).await?,
        (None, Some(schema)) => {
            let namespace = NamespaceIdentifier::parse(schema.as_str())
                .inspect_err(|e| error!("Schema {schema}: validate schema name failed: {e}"))?;
            trigger.drop_namespace(&namespace).await?
        }
        (None, None) => anyhow::bail!("either --pr or --schema is required"),
    };

    if args.config.json {
        return print_json(&report);
    }

    if report.dropped {
        println!("Dropped schema \"{}\"", report.namespace);
    } else {
        println!("Schema \"{}\" does not exist, nothing to drop", report.namespace);
    }
    Ok(())
}
