use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alarm::types::AlarmType;
use crate::audio::service::RingerMode;
use crate::telephony::types::CallOutcome;

// Allowed: IDs, Durations, Counts, Enums
// Forbidden: message text

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    AlarmClassified {
        alarm_type: AlarmType,
        by_free_text: bool,
    },

    AlertStarted {
        alarm_type: AlarmType,
        repetitions: u8,
    },

    AlertSkipped {
        reason: AlertSkipReason,
    },

    /// Ringer in VIBRATE with OS settings honored: vibration, no tone.
    AlertVibrated {
        alarm_type: AlarmType,
    },

    RingerOverridden {
        from: RingerMode,
        to: RingerMode,
        window_ms: u64,
    },

    RingerRestored {
        to: RingerMode,
    },

    CallPlaced {
        attempt: u32,
    },

    CallEvaluated {
        attempt: u32,
        outcome: CallOutcome,
        duration_ms: u64,
    },

    RedialScheduled {
        attempt: u32,
        countdown_ms: u64,
    },

    Acknowledged {
        alarm_id: Option<Uuid>,
        attempts: u32,
    },

    SessionEnded {
        reason: SessionEndReason,
        attempts: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSkipReason {
    AlreadyPlaying,
    SilentMode,
    AudioUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEndReason {
    Acknowledged,
    DialFailed,
    AttemptsExhausted,
    Cancelled,
}
