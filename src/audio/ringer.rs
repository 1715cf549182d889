use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::service::{AudioService, RingerMode};
use crate::kernel::flight::{Generation, SingleFlight};
use crate::kernel::scheduler::{Scheduler, TimerHandle};
use crate::kernel::telemetry::{SharedTelemetry, TelemetryEvent};

#[derive(Debug)]
struct RingerSnapshot {
    previous: RingerMode,
    timer: Option<TimerHandle>,
}

struct GuardInner {
    audio: Option<Arc<dyn AudioService>>,
    scheduler: Arc<dyn Scheduler>,
    flight: SingleFlight<RingerSnapshot>,
    telemetry: Option<SharedTelemetry>,
}

/// Bounded, single-flight override of the device ringer mode.
///
/// IDLE -> OVERRIDING on a successful [`RingerModeGuard::try_override`];
/// OVERRIDING -> IDLE when the backstop timer fires or on
/// [`RingerModeGuard::restore`], whichever comes first. Every successful
/// override is restored exactly once.
#[derive(Clone)]
pub struct RingerModeGuard {
    inner: Arc<GuardInner>,
}

impl RingerModeGuard {
    pub fn new(audio: Arc<dyn AudioService>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::build(Some(audio), scheduler, None)
    }

    pub fn with_telemetry(
        audio: Arc<dyn AudioService>,
        scheduler: Arc<dyn Scheduler>,
        telemetry: SharedTelemetry,
    ) -> Self {
        Self::build(Some(audio), scheduler, Some(telemetry))
    }

    /// A guard with no audio service behind it. Every override is refused.
    pub fn uninitialized(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::build(None, scheduler, None)
    }

    fn build(
        audio: Option<Arc<dyn AudioService>>,
        scheduler: Arc<dyn Scheduler>,
        telemetry: Option<SharedTelemetry>,
    ) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                audio,
                scheduler,
                flight: SingleFlight::new(),
                telemetry,
            }),
        }
    }

    /// Applies `mode` for at most `duration`. Returns false, with no effect,
    /// while another override is in flight or when there is no audio service.
    pub fn try_override(&self, mode: RingerMode, duration: Duration) -> bool {
        self.claim_override(mode, duration).is_some()
    }

    /// Like [`Self::try_override`], but hands back the claim so the caller can
    /// later [`release`](Self::release) exactly its own override.
    pub fn claim_override(&self, mode: RingerMode, duration: Duration) -> Option<Generation> {
        let inner = &self.inner;
        let Some(audio) = inner.audio.as_ref() else {
            warn!("Ringer override refused: audio service not initialized");
            return None;
        };

        let mut previous = mode;
        let claimed = inner.flight.try_begin_with(|| {
            previous = audio.ringer_mode();
            audio.set_ringer_mode(mode);
            RingerSnapshot { previous, timer: None }
        });
        let Some(generation) = claimed else {
            debug!("Ringer override refused: another override in flight");
            return None;
        };

        // Strong handle: the backstop must restore even if every guard clone is dropped.
        let backstop = Arc::clone(inner);
        let timer = inner
            .scheduler
            .schedule(duration, Box::new(move || backstop.restore(generation)));

        // An explicit restore may already have won the race; then the timer is moot.
        if inner.flight.with_active(generation, |snap| snap.timer = Some(timer.clone())).is_none() {
            timer.cancel();
        }

        info!("Ringer mode overridden to {:?} for {:?} (was {:?})", mode, duration, previous);
        if let Some(t) = &inner.telemetry {
            t.record(TelemetryEvent::RingerOverridden {
                from: previous,
                to: mode,
                window_ms: duration.as_millis() as u64,
            });
        }
        Some(generation)
    }

    /// Ends the current override early, whoever holds it. No-op while idle.
    pub fn restore(&self) {
        if let Some(generation) = self.inner.flight.current() {
            self.inner.restore(generation);
        }
    }

    /// Ends the override identified by `generation`. No-op once it has
    /// already been restored, even if a newer override is now in flight.
    pub fn release(&self, generation: Generation) {
        self.inner.restore(generation);
    }

    pub fn is_idle(&self) -> bool {
        self.inner.flight.is_idle()
    }

    /// Resolves once no override is in flight.
    pub async fn wait_idle(&self) {
        self.inner.flight.wait_idle().await;
    }
}

impl GuardInner {
    /// Idempotent against the generation check: of a racing timer fire and an
    /// explicit restore, only the first writes the snapshot back.
    fn restore(&self, generation: Generation) {
        let audio = self.audio.as_ref();
        let restored = self.flight.finish_with(generation, |snap| {
            if let Some(timer) = snap.timer {
                timer.cancel();
            }
            if let Some(audio) = audio {
                audio.set_ringer_mode(snap.previous);
            }
            snap.previous
        });

        match restored {
            Some(mode) => {
                info!("Ringer mode restored to {:?}", mode);
                if let Some(t) = &self.telemetry {
                    t.record(TelemetryEvent::RingerRestored { to: mode });
                }
            }
            None => debug!("Ringer restore skipped: override already finished"),
        }
    }
}
