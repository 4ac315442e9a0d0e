mod commands;
mod migrate;
mod resolve;
mod teardown;

pub use commands::{ConfigArgs, MigrateArgs, SignalArgs, TeardownArgs};
pub use migrate::{run_migrate, run_status};
pub use resolve::run_resolve;
pub use teardown::run_teardown;

use serde::Serialize;

use crate::config::Settings;
use crate::types::EnvironmentSignals;

/// Loads settings and collects signals from the process environment, then
/// applies command-line overrides. Called once per invocation.
pub fn load_context(
    config: &ConfigArgs,
    signals: &SignalArgs,
) -> anyhow::Result<(Settings, EnvironmentSignals)> {
    let settings = Settings::load(config.config.as_deref())?;
    let (mut settings, env_signals) = settings.with_environment(|key| std::env::var(key).ok());

    if let Some(url) = &config.database_url {
        settings.database.url = Some(url.clone());
    }

    Ok((settings, env_signals.overlay(signals.to_signals())))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
