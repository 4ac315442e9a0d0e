use std::path::PathBuf;

use clap::Args;

use crate::types::EnvironmentSignals;

/// Flags that override the namespace signals read from the environment.
#[derive(Args, Debug, Clone, Default)]
pub struct SignalArgs {
    /// Use this schema verbatim (overrides every other signal)
    #[arg(long)]
    pub schema: Option<String>,

    /// Pull request number; resolves to pr_<number>
    #[arg(long)]
    pub pr: Option<String>,

    /// Branch or ref name; sanitized into a schema name
    #[arg(long)]
    pub branch: Option<String>,
}

impl SignalArgs {
    pub fn to_signals(&self) -> EnvironmentSignals {
        EnvironmentSignals {
            override_schema: self.schema.clone(),
            pull_request: self.pr.clone(),
            branch: self.branch.clone(),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a schemaline.toml config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Database connection string (defaults to $DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub signals: SignalArgs,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Directory containing *.sql migrations, applied in file-name order
    #[arg(long)]
    pub migrations_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TeardownArgs {
    /// Number of the closed pull request
    #[arg(long, conflicts_with = "schema", required_unless_present = "schema")]
    pub pr: Option<u64>,

    /// Drop this schema instead of resolving one from a pull request
    #[arg(long)]
    pub schema: Option<String>,

    #[command(flatten)]
    pub config: ConfigArgs,
}
