use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::tone::Tone;

/// Device-wide audio policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RingerMode {
    Silent,
    Vibrate,
    Normal,
}

/// Alternating off/on durations in milliseconds, starting with a delay.
pub const ALARM_VIBRATION_PATTERN_MS: [u64; 6] = [0, 500, 300, 500, 300, 500];

pub type ToneCompletion = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("unknown tone id {0}")]
    UnknownTone(i64),

    #[error("failed to decode tone {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("tone '{0}' has no samples")]
    EmptyTone(String),

    #[error("no audio output device available")]
    NoOutputDevice,

    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Process-wide audio collaborator: ringer policy, volumes, vibrator and
/// tone output. Injected into every component that touches sound.
pub trait AudioService: Send + Sync {
    fn ringer_mode(&self) -> RingerMode;
    fn set_ringer_mode(&self, mode: RingerMode);

    fn ring_volume(&self) -> u32;
    fn max_ring_volume(&self) -> u32;

    fn media_volume(&self) -> u32;
    fn max_media_volume(&self) -> u32;
    fn set_media_volume(&self, volume: u32);

    fn vibrate(&self, pattern_ms: &[u64]);
    fn cancel_vibration(&self);

    /// Starts `tone` from position 0. `on_complete` fires once the tone ran to
    /// its end; it does not fire after [`AudioService::stop_tone`].
    /// An `Err` means the tone could not be prepared and nothing is playing.
    fn play_tone(&self, tone: &Tone, on_complete: ToneCompletion) -> Result<(), AudioError>;

    fn stop_tone(&self);
}

/// Projects the ring-volume fraction onto the media-volume range.
pub fn project_volume(ring_volume: u32, max_ring_volume: u32, max_media_volume: u32) -> u32 {
    if max_ring_volume == 0 {
        return max_media_volume;
    }
    let ring = ring_volume.min(max_ring_volume) as u64;
    let projected = (ring * max_media_volume as u64 + max_ring_volume as u64 / 2) / max_ring_volume as u64;
    projected as u32
}
