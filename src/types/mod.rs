pub(crate) mod namespace;
mod reports;
mod signals;

pub use namespace::NamespaceIdentifier;
pub use reports::{MigrationReport, StatusReport, TeardownReport};
pub use signals::{EnvironmentSignals, Resolution, SignalKind};
