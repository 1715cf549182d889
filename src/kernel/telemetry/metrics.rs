use std::collections::VecDeque;

use super::event::{AlertSkipReason, SessionEndReason, TelemetryEvent};
use crate::alarm::types::AlarmType;
use crate::telephony::types::CallOutcome;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub alarm_stats: AlarmStats,
    pub alert_stats: AlertStats,
    pub ringer_stats: RingerStats,
    pub call_stats: CallStats,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmStats {
    pub primary: u64,
    pub secondary: u64,
    pub free_text_matches: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertStats {
    pub started: u64,
    pub vibrate_only: u64,
    pub skipped_busy: u64,
    pub skipped_silent: u64,
    pub audio_failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingerStats {
    pub overrides: u64,
    pub restores: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallStats {
    pub attempts: u64,
    pub busy: u64,
    pub connected: u64,
    pub acknowledged: u64,
    pub abandoned: u64,
    pub avg_connected_ms: f64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();
    let mut connected_total_ms = 0u64;

    for event in events {
        match event {
            TelemetryEvent::AlarmClassified { alarm_type, by_free_text } => {
                match alarm_type {
                    AlarmType::Primary => snap.alarm_stats.primary += 1,
                    AlarmType::Secondary => snap.alarm_stats.secondary += 1,
                    AlarmType::Undefined => {}
                }
                if *by_free_text {
                    snap.alarm_stats.free_text_matches += 1;
                }
            }
            TelemetryEvent::AlertStarted { .. } => snap.alert_stats.started += 1,
            TelemetryEvent::AlertVibrated { .. } => snap.alert_stats.vibrate_only += 1,
            TelemetryEvent::AlertSkipped { reason } => match reason {
                AlertSkipReason::AlreadyPlaying => snap.alert_stats.skipped_busy += 1,
                AlertSkipReason::SilentMode => snap.alert_stats.skipped_silent += 1,
                AlertSkipReason::AudioUnavailable => snap.alert_stats.audio_failures += 1,
            },
            TelemetryEvent::RingerOverridden { .. } => snap.ringer_stats.overrides += 1,
            TelemetryEvent::RingerRestored { .. } => snap.ringer_stats.restores += 1,
            TelemetryEvent::CallPlaced { .. } => snap.call_stats.attempts += 1,
            TelemetryEvent::CallEvaluated { outcome, duration_ms, .. } => match outcome {
                CallOutcome::Busy => snap.call_stats.busy += 1,
                CallOutcome::Connected => {
                    snap.call_stats.connected += 1;
                    connected_total_ms += duration_ms;
                }
            },
            TelemetryEvent::Acknowledged { .. } => snap.call_stats.acknowledged += 1,
            TelemetryEvent::SessionEnded { reason, .. } => {
                if *reason != SessionEndReason::Acknowledged {
                    snap.call_stats.abandoned += 1;
                }
            }
            TelemetryEvent::RedialScheduled { .. } => {}
        }
    }

    if snap.call_stats.connected > 0 {
        snap.call_stats.avg_connected_ms = connected_total_ms as f64 / snap.call_stats.connected as f64;
    }

    snap
}
