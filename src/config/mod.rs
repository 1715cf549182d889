pub mod keys;
pub mod store;

pub use keys::{ConfigKey, ConfigValue, ValueKind};
pub use store::ConfigStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("settings are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("settings root must be a JSON object")]
    NotAnObject,

    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    #[error("setting '{key}' expects {expected:?}, got {found:?}")]
    TypeMismatch {
        key: ConfigKey,
        expected: ValueKind,
        found: ValueKind,
    },
}
