use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::ringer::RingerModeGuard;
use super::service::{project_volume, AudioService, RingerMode, ALARM_VIBRATION_PATTERN_MS};
use super::tone::{Tone, ToneLibrary};
use crate::alarm::types::AlarmType;
use crate::config::{ConfigKey, ConfigStore};
use crate::kernel::flight::{Generation, SingleFlight};
use crate::kernel::telemetry::event::AlertSkipReason;
use crate::kernel::telemetry::{SharedTelemetry, TelemetryEvent};

/// Sound-related settings, snapshotted from the store at alert time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSettings {
    pub use_os_sound_settings: bool,
    pub play_tone_twice: bool,
    pub primary_tone: i64,
    pub secondary_tone: i64,
    pub ringer_override: Duration,
}

impl AlertSettings {
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            use_os_sound_settings: store.get_bool(ConfigKey::UseOsSoundSettings),
            play_tone_twice: store.get_bool(ConfigKey::PlayToneTwice),
            primary_tone: store.get_int(ConfigKey::PrimaryTone),
            secondary_tone: store.get_int(ConfigKey::SecondaryTone),
            ringer_override: Duration::from_millis(store.get_int(ConfigKey::RingerOverrideMs).max(0) as u64),
        }
    }

    pub fn tone_for(&self, alarm_type: AlarmType) -> Option<i64> {
        match alarm_type {
            AlarmType::Primary => Some(self.primary_tone),
            AlarmType::Secondary => Some(self.secondary_tone),
            AlarmType::Undefined => None,
        }
    }

    pub fn repetitions(&self) -> u8 {
        if self.play_tone_twice {
            2
        } else {
            1
        }
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self::from_store(&ConfigStore::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Tone started (vibration included).
    Playing,
    /// Ringer mode is VIBRATE and OS settings are honored.
    VibrateOnly,
    Skipped(AlertSkipReason),
    /// Vibration ran but the tone could not be resolved or prepared.
    AudioFailed,
    /// `stop()` was called before the tone started.
    Stopped,
    NotAnAlarm,
}

#[derive(Debug)]
struct Playback {
    tone: Tone,
    requested: u8,
    played: u8,
    original_media_volume: u32,
    ringer_claim: Option<Generation>,
}

struct PlayerInner {
    audio: Arc<dyn AudioService>,
    tones: ToneLibrary,
    guard: RingerModeGuard,
    flight: SingleFlight<Option<Playback>>,
    telemetry: Option<SharedTelemetry>,
}

/// Tone + vibration for a classified alarm. One playback at a time; a `play`
/// while another is active does nothing.
#[derive(Clone)]
pub struct AlertPlayer {
    inner: Arc<PlayerInner>,
}

impl AlertPlayer {
    pub fn new(audio: Arc<dyn AudioService>, tones: ToneLibrary, guard: RingerModeGuard) -> Self {
        Self::build(audio, tones, guard, None)
    }

    pub fn with_telemetry(
        audio: Arc<dyn AudioService>,
        tones: ToneLibrary,
        guard: RingerModeGuard,
        telemetry: SharedTelemetry,
    ) -> Self {
        Self::build(audio, tones, guard, Some(telemetry))
    }

    fn build(
        audio: Arc<dyn AudioService>,
        tones: ToneLibrary,
        guard: RingerModeGuard,
        telemetry: Option<SharedTelemetry>,
    ) -> Self {
        Self {
            inner: Arc::new(PlayerInner {
                audio,
                tones,
                guard,
                flight: SingleFlight::new(),
                telemetry,
            }),
        }
    }

    pub async fn play(&self, alarm_type: AlarmType, settings: &AlertSettings) -> PlayOutcome {
        let inner = &self.inner;
        let Some(tone_id) = settings.tone_for(alarm_type) else {
            return PlayOutcome::NotAnAlarm;
        };

        // Claim first; the playback details are filled in once the branch is known.
        let Some(generation) = inner.flight.try_begin(None) else {
            debug!("Alert already playing; ignoring {} alarm", alarm_type);
            inner.record(TelemetryEvent::AlertSkipped { reason: AlertSkipReason::AlreadyPlaying });
            return PlayOutcome::Skipped(AlertSkipReason::AlreadyPlaying);
        };
        // Releases the slot if this future is dropped at the await below.
        let claim = SlotClaim { inner: Arc::clone(inner), generation: Some(generation) };

        let tone = inner.tones.resolve(tone_id);
        let audio = &inner.audio;
        let original_media_volume = audio.media_volume();

        // A live override would hide the user's real ringer mode.
        if !inner.guard.is_idle() {
            debug!("Waiting for ringer override to end before reading ringer mode");
            inner.guard.wait_idle().await;
        }
        let mode = audio.ringer_mode();

        let (volume, ringer_claim) = if settings.use_os_sound_settings {
            match mode {
                RingerMode::Silent => {
                    info!("Ringer is SILENT; {} alarm not sounded", alarm_type);
                    inner.flight.finish(generation);
                    inner.record(TelemetryEvent::AlertSkipped { reason: AlertSkipReason::SilentMode });
                    return PlayOutcome::Skipped(AlertSkipReason::SilentMode);
                }
                RingerMode::Vibrate => {
                    info!("Ringer is VIBRATE; {} alarm vibrates only", alarm_type);
                    audio.vibrate(&ALARM_VIBRATION_PATTERN_MS);
                    inner.flight.finish(generation);
                    inner.record(TelemetryEvent::AlertVibrated { alarm_type });
                    return PlayOutcome::VibrateOnly;
                }
                RingerMode::Normal => (
                    project_volume(audio.ring_volume(), audio.max_ring_volume(), audio.max_media_volume()),
                    None,
                ),
            }
        } else {
            let ringer = if mode == RingerMode::Normal {
                None
            } else {
                inner.guard.claim_override(RingerMode::Normal, settings.ringer_override)
            };
            (audio.max_media_volume(), ringer)
        };

        audio.set_media_volume(volume);
        // Vibration does not wait on the tone being playable.
        audio.vibrate(&ALARM_VIBRATION_PATTERN_MS);

        let tone = match tone {
            Ok(tone) => tone,
            Err(e) => {
                error!("Alert tone unavailable: {}", e);
                inner.abandon(generation, original_media_volume, ringer_claim);
                return PlayOutcome::AudioFailed;
            }
        };

        let repetitions = settings.repetitions();
        let filled = inner.flight.with_active(generation, |slot| {
            *slot = Some(Playback {
                tone: tone.clone(),
                requested: repetitions,
                played: 0,
                original_media_volume,
                ringer_claim,
            })
        });
        if filled.is_none() {
            // stop() landed while we were waiting on the ringer guard
            audio.set_media_volume(original_media_volume);
            if let Some(ringer) = ringer_claim {
                inner.guard.release(ringer);
            }
            return PlayOutcome::Stopped;
        }

        if let Err(e) = PlayerInner::start_tone(inner, generation, &tone) {
            error!("Failed to prepare alert tone '{}': {}", tone.name, e);
            inner.finish(generation);
            inner.record(TelemetryEvent::AlertSkipped { reason: AlertSkipReason::AudioUnavailable });
            return PlayOutcome::AudioFailed;
        }

        claim.disarm();
        info!("Playing {} alert '{}' x{} at volume {}", alarm_type, tone.name, repetitions, volume);
        inner.record(TelemetryEvent::AlertStarted { alarm_type, repetitions });
        PlayOutcome::Playing
    }

    /// Stops an active playback early and restores the media volume.
    pub fn stop(&self) {
        if let Some(generation) = self.inner.flight.current() {
            self.inner.audio.cancel_vibration();
            self.inner.finish(generation);
        }
    }

    pub fn is_playing(&self) -> bool {
        !self.inner.flight.is_idle()
    }

    pub async fn wait_finished(&self) {
        self.inner.flight.wait_idle().await;
    }
}

impl PlayerInner {
    fn record(&self, event: TelemetryEvent) {
        if let Some(t) = &self.telemetry {
            t.record(event);
        }
    }

    fn start_tone(this: &Arc<Self>, generation: Generation, tone: &Tone) -> Result<(), super::service::AudioError> {
        let weak = Arc::downgrade(this);
        this.audio.play_tone(
            tone,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    PlayerInner::on_tone_complete(&inner, generation);
                }
            }),
        )
    }

    fn on_tone_complete(this: &Arc<Self>, generation: Generation) {
        let next = this.flight.with_active(generation, |slot| {
            slot.as_mut().and_then(|p| {
                p.played += 1;
                (p.played < p.requested).then(|| p.tone.clone())
            })
        });

        match next {
            // stale completion from a finished playback
            None => {}
            Some(Some(tone)) => {
                debug!("Replaying alert tone '{}' from the start", tone.name);
                if let Err(e) = PlayerInner::start_tone(this, generation, &tone) {
                    error!("Failed to replay alert tone: {}", e);
                    this.finish(generation);
                }
            }
            Some(None) => this.finish(generation),
        }
    }

    /// Restores volume and releases tone resources. Safe to call twice.
    fn finish(&self, generation: Generation) {
        let released = self.flight.finish_with(generation, |slot| {
            slot.map(|p| (p.original_media_volume, p.ringer_claim))
        });
        if let Some(Some((volume, ringer_claim))) = released {
            self.audio.stop_tone();
            self.audio.set_media_volume(volume);
            if let Some(claim) = ringer_claim {
                self.guard.release(claim);
            }
            debug!("Alert finished; media volume restored to {}", volume);
        }
    }

    fn abandon(&self, generation: Generation, original_media_volume: u32, ringer_claim: Option<Generation>) {
        if self.flight.finish(generation).is_some() {
            self.audio.set_media_volume(original_media_volume);
            if let Some(claim) = ringer_claim {
                self.guard.release(claim);
            }
        }
        self.record(TelemetryEvent::AlertSkipped { reason: AlertSkipReason::AudioUnavailable });
    }
}

/// Holds the playback slot for an in-progress `play`. Dropping it without
/// [`SlotClaim::disarm`] releases the slot; releasing an already finished
/// generation is a no-op, so early returns that finished explicitly are fine.
struct SlotClaim {
    inner: Arc<PlayerInner>,
    generation: Option<Generation>,
}

impl SlotClaim {
    fn disarm(mut self) {
        self.generation = None;
    }
}

impl Drop for SlotClaim {
    fn drop(&mut self) {
        if let Some(generation) = self.generation.take() {
            if self.inner.flight.finish(generation).is_some() {
                debug!("Alert claim released before playback started");
            }
        }
    }
}
