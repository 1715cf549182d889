use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::machine::{AckEffect, AckEvent, AckMachine, AckSettings, AckState};
use super::types::{CallOutcome, CallState, Dialer, SubscriptionId, TelephonyObserver};
use crate::alarm::log::AlarmLogStore;
use crate::alarm::types::AlarmType;
use crate::config::{ConfigKey, ConfigStore};
use crate::kernel::scheduler::{Scheduler, TimerHandle};
use crate::kernel::telemetry::{SharedTelemetry, TelemetryEvent};
use crate::kernel::time::Clock;

/// Collaborators an acknowledgment session drives.
#[derive(Clone)]
pub struct AckContext {
    pub dialer: Arc<dyn Dialer>,
    pub telephony: Arc<dyn TelephonyObserver>,
    pub alarm_log: Arc<dyn AlarmLogStore>,
    pub config: Arc<ConfigStore>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<dyn Scheduler>,
    pub telemetry: Option<SharedTelemetry>,
}

struct SessionInner {
    ctx: AckContext,
    /// Record to stamp on success; latest PRIMARY when absent.
    alarm_id: Option<Uuid>,
    machine: Mutex<AckMachine>,
    subscription: Mutex<Option<SubscriptionId>>,
    tick_timer: Mutex<Option<TimerHandle>>,
    status_tx: watch::Sender<AckState>,
}

/// Calls the acknowledge number and keeps redialing while the line is busy,
/// until a call lasts long enough to count as an acknowledgment.
///
/// Event driven: telephony callbacks and countdown timers feed
/// [`AckMachine::step`]; the effects it returns are executed here with no
/// lock held. Nothing in here blocks the caller.
#[derive(Clone)]
pub struct AcknowledgmentSession {
    inner: Arc<SessionInner>,
}

impl AcknowledgmentSession {
    pub fn new(ctx: AckContext, settings: AckSettings, alarm_id: Option<Uuid>) -> Self {
        let (status_tx, _) = watch::channel(AckState::Idle);
        Self {
            inner: Arc::new(SessionInner {
                ctx,
                alarm_id,
                machine: Mutex::new(AckMachine::new(settings)),
                subscription: Mutex::new(None),
                tick_timer: Mutex::new(None),
                status_tx,
            }),
        }
    }

    /// Calls the configured acknowledge number. Returns false when
    /// acknowledgment is disabled or no number is configured.
    pub fn start_configured(&self) -> bool {
        let config = &self.inner.ctx.config;
        if !config.get_bool(ConfigKey::EnableAcknowledge) {
            info!("Acknowledgment disabled; not calling");
            return false;
        }
        let number = config.get_string(ConfigKey::AcknowledgeNumber);
        if number.trim().is_empty() {
            warn!("Acknowledgment enabled but no acknowledge number configured");
            return false;
        }
        self.start(number.trim());
        true
    }

    /// Ignored unless the session is still idle.
    pub fn start(&self, number: &str) {
        SessionInner::dispatch(&self.inner, AckEvent::Start { number: number.to_string() });
    }

    /// Stops the session: drops the observer and any pending redial countdown.
    pub fn cancel(&self) {
        SessionInner::dispatch(&self.inner, AckEvent::Cancel);
    }

    pub fn state(&self) -> AckState {
        self.inner.machine.lock().state().clone()
    }

    /// Live status, including the redial countdown.
    pub fn status(&self) -> watch::Receiver<AckState> {
        self.inner.status_tx.subscribe()
    }

    pub async fn wait_finished(&self) -> AckState {
        let mut rx = self.status();
        let finished = match rx.wait_for(AckState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        finished
    }
}

impl SessionInner {
    fn dispatch(this: &Arc<Self>, event: AckEvent) {
        let (effects, state) = {
            let mut machine = this.machine.lock();
            let now = this.ctx.clock.now();
            let effects = machine.step(event, now);
            (effects, machine.state().clone())
        };
        this.status_tx.send_replace(state);

        for effect in effects {
            Self::execute(this, effect);
        }
    }

    fn execute(this: &Arc<Self>, effect: AckEffect) {
        let ctx = &this.ctx;
        match effect {
            AckEffect::Subscribe { attempt } => {
                let weak: Weak<Self> = Arc::downgrade(this);
                let id = ctx.telephony.subscribe(Arc::new(move |state: CallState| {
                    if let Some(inner) = weak.upgrade() {
                        SessionInner::dispatch(&inner, AckEvent::CallState { attempt, state });
                    }
                }));
                if let Some(stale) = this.subscription.lock().replace(id) {
                    ctx.telephony.unsubscribe(stale);
                }
                // A cancel that ran while we were subscribing already emptied the slot.
                if !this.attempt_is_live(attempt) {
                    let orphan = this.subscription.lock().take();
                    if let Some(orphan) = orphan {
                        ctx.telephony.unsubscribe(orphan);
                    }
                }
            }

            AckEffect::Unsubscribe => {
                let id = this.subscription.lock().take();
                if let Some(id) = id {
                    ctx.telephony.unsubscribe(id);
                }
            }

            AckEffect::PlaceCall { number, attempt } => {
                if !this.attempt_is_live(attempt) {
                    info!("Attempt {} ended before dialing; call not placed", attempt);
                    return;
                }
                if let Err(e) = ctx.config.set_bool(ConfigKey::HasCalled, true) {
                    warn!("Could not flag acknowledgment in progress: {}", e);
                }
                info!("Placing acknowledgment call to {} (attempt {})", number, attempt);
                this.record(TelemetryEvent::CallPlaced { attempt });
                if let Err(e) = ctx.dialer.place_call(&number) {
                    error!("Acknowledgment call failed: {}", e);
                    Self::dispatch(this, AckEvent::DialFailed { attempt });
                }
            }

            AckEffect::Evaluated { attempt, outcome, duration } => {
                match outcome {
                    CallOutcome::Busy => info!("Attempt {} ended after {:?}: line busy", attempt, duration),
                    CallOutcome::Connected => info!("Attempt {} lasted {:?}: connected", attempt, duration),
                }
                this.record(TelemetryEvent::CallEvaluated {
                    attempt,
                    outcome,
                    duration_ms: duration.as_millis() as u64,
                });
            }

            AckEffect::RedialScheduled { attempt, countdown } => {
                info!("Redialing in {:?} (after attempt {})", countdown, attempt);
                this.record(TelemetryEvent::RedialScheduled {
                    attempt,
                    countdown_ms: countdown.as_millis() as u64,
                });
            }

            AckEffect::ScheduleTick(after) => {
                let weak = Arc::downgrade(this);
                let timer = ctx.scheduler.schedule(
                    after,
                    Box::new(move || {
                        if let Some(inner) = weak.upgrade() {
                            SessionInner::dispatch(&inner, AckEvent::CountdownTick);
                        }
                    }),
                );
                *this.tick_timer.lock() = Some(timer);
            }

            AckEffect::CancelTick => {
                if let Some(timer) = this.tick_timer.lock().take() {
                    timer.cancel();
                }
            }

            AckEffect::PersistAcknowledgment { at } => {
                let stamped = match this.alarm_id {
                    Some(id) => ctx.alarm_log.acknowledge(id, at),
                    None => ctx.alarm_log.update_acknowledged_on_latest_of_type(AlarmType::Primary, at),
                };
                if !stamped {
                    warn!("No unacknowledged alarm record to stamp");
                }
                if let Err(e) = ctx.config.set_bool(ConfigKey::HasCalled, false) {
                    warn!("Could not clear acknowledgment flag: {}", e);
                }
                let attempts = this.machine.lock().call().map(|c| c.attempt).unwrap_or(0);
                this.record(TelemetryEvent::Acknowledged { alarm_id: this.alarm_id, attempts });
            }

            AckEffect::SessionEnded { reason, attempts } => {
                info!("Acknowledgment session ended: {:?} after {} attempt(s)", reason, attempts);
                this.record(TelemetryEvent::SessionEnded { reason, attempts });
            }
        }
    }

    fn attempt_is_live(&self, attempt: u32) -> bool {
        matches!(self.machine.lock().state(), AckState::Calling { attempt: current } if *current == attempt)
    }

    fn record(&self, event: TelemetryEvent) {
        if let Some(t) = &self.ctx.telemetry {
            t.record(event);
        }
    }
}
