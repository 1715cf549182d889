pub mod alarm;
pub mod audio;
pub mod config;
pub mod error;
pub mod kernel;
pub mod telephony;

pub use alarm::{classify, AlarmPipeline, AlarmRecord, AlarmType};
pub use audio::{AlertPlayer, RingerModeGuard};
pub use error::{AlarmError, Result};
pub use telephony::AcknowledgmentSession;
