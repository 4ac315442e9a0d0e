use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use schemaline::cli::{
    ConfigArgs, MigrateArgs, SignalArgs, TeardownArgs, run_migrate, run_resolve, run_status,
    run_teardown,
};

#[derive(Parser)]
#[command(name = "schemaline")]
#[command(about = "Per-pull-request Postgres schemas for preview deployments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the schema name resolved from the environment
    Resolve {
        #[command(flatten)]
        signals: SignalArgs,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Create the resolved schema if needed and apply pending migrations
    Migrate(MigrateArgs),

    /// Show pending migrations for the resolved schema without changing it
    Status(MigrateArgs),

    /// Drop a preview schema when its pull request closes
    Teardown(TeardownArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("schemaline=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve { signals, config } => run_resolve(signals, config)?,
        Commands::Migrate(args) => run_migrate(args).await?,
        Commands::Status(args) => run_status(args).await?,
        Commands::Teardown(args) => run_teardown(args).await?,
    }

    Ok(())
}
