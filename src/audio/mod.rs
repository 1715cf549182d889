pub mod cpal_backend;
pub mod player;
pub mod ringer;
pub mod service;
pub mod tone;

pub use cpal_backend::CpalAudioService;
pub use player::{AlertPlayer, AlertSettings, PlayOutcome};
pub use ringer::RingerModeGuard;
pub use service::{AudioError, AudioService, RingerMode, ToneCompletion, ALARM_VIBRATION_PATTERN_MS};
pub use tone::{Tone, ToneLibrary};
