use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("database unreachable: {0}")]
    Connectivity(String),

    #[error("failed to create schema \"{namespace}\": {message}")]
    NamespaceCreation { namespace: String, message: String },

    #[error("failed to drop schema \"{namespace}\": {message}")]
    NamespaceDrop { namespace: String, message: String },

    #[error("migration {migration} failed in schema \"{namespace}\": {message}")]
    MigrationApplication {
        namespace: String,
        migration: String,
        message: String,
    },

    #[error("schema \"{0}\" does not exist")]
    MissingSchema(String),

    #[error("migration source error: {0}")]
    MigrationSource(String),

    #[error("invalid schema name '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("schema \"{0}\" is shared and cannot be dropped")]
    ProtectedNamespace(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classifies a failure to open a connection. Malformed DSNs are
    /// configuration problems; everything else means the server could not be
    /// reached or refused us.
    pub(crate) fn from_connect(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => Error::Config(format!("malformed database url: {e}")),
            other => Error::Connectivity(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
