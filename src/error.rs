use thiserror::Error;

use crate::audio::service::AudioError;
use crate::config::ConfigError;
use crate::telephony::types::DialError;

/// Crate-wide error. Components contain and log their failures; this type is
/// what bubbles up to the binary and to callers that want a `Result`.
#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("dial error: {0}")]
    Dial(#[from] DialError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = AlarmError> = std::result::Result<T, E>;
