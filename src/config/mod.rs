mod settings;

pub use settings::{DEFAULT_CONFIG_FILE, DatabaseConfig, Settings, SignalSources};
