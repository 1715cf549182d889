use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{CallOutcome, CallState};
use crate::config::{ConfigKey, ConfigStore};
use crate::kernel::telemetry::event::SessionEndReason;
use crate::kernel::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckSettings {
    /// Calls shorter than this are treated as a busy line.
    pub min_call_time: Duration,
    pub redial_countdown: Duration,
    pub redial_tick: Duration,
    /// `None` redials forever.
    pub max_redial_attempts: Option<u32>,
}

impl AckSettings {
    pub fn from_store(store: &ConfigStore) -> Self {
        let ms = |key| Duration::from_millis(store.get_int(key).max(0) as u64);
        let cap = store.get_int(ConfigKey::MaxRedialAttempts);
        Self {
            min_call_time: ms(ConfigKey::MinCallTimeMs),
            redial_countdown: ms(ConfigKey::RedialCountdownMs),
            redial_tick: ms(ConfigKey::RedialTickMs).max(Duration::from_millis(1)),
            max_redial_attempts: (cap > 0).then(|| u32::try_from(cap).unwrap_or(u32::MAX)),
        }
    }
}

impl Default for AckSettings {
    fn default() -> Self {
        Self::from_store(&ConfigStore::new())
    }
}

/// Externally visible session state; also the payload of the status channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckState {
    Idle,
    Calling { attempt: u32 },
    Evaluating { attempt: u32 },
    Redialing { attempt: u32, remaining_ms: u64 },
    Acknowledged { attempts: u32 },
    Failed { attempts: u32 },
    Cancelled { attempts: u32 },
}

impl AckState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AckState::Acknowledged { .. } | AckState::Failed { .. } | AckState::Cancelled { .. }
        )
    }
}

/// One outbound attempt. Replaced wholesale on every redial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    pub target_number: String,
    pub call_started_at: Timestamp,
    pub previous_state: Option<CallState>,
    pub current_state: Option<CallState>,
    /// One-shot latch: the busy/connected decision fires at most once per attempt.
    pub evaluated: bool,
    pub attempt: u32,
}

impl CallSession {
    fn new(target_number: String, call_started_at: Timestamp, attempt: u32) -> Self {
        Self {
            target_number,
            call_started_at,
            previous_state: None,
            current_state: None,
            evaluated: false,
            attempt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckEvent {
    Start { number: String },
    CallState { attempt: u32, state: CallState },
    DialFailed { attempt: u32 },
    CountdownTick,
    Cancel,
}

/// Work the runtime performs after a step, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckEffect {
    Subscribe { attempt: u32 },
    Unsubscribe,
    PlaceCall { number: String, attempt: u32 },
    Evaluated { attempt: u32, outcome: CallOutcome, duration: Duration },
    ScheduleTick(Duration),
    CancelTick,
    RedialScheduled { attempt: u32, countdown: Duration },
    PersistAcknowledgment { at: Timestamp },
    SessionEnded { reason: SessionEndReason, attempts: u32 },
}

/// Acknowledgment state machine. No I/O, no clocks: time comes in with each
/// event and everything observable goes out as [`AckEffect`]s.
#[derive(Debug, Clone)]
pub struct AckMachine {
    settings: AckSettings,
    state: AckState,
    call: Option<CallSession>,
}

impl AckMachine {
    pub fn new(settings: AckSettings) -> Self {
        Self { settings, state: AckState::Idle, call: None }
    }

    pub fn state(&self) -> &AckState {
        &self.state
    }

    pub fn call(&self) -> Option<&CallSession> {
        self.call.as_ref()
    }

    pub fn settings(&self) -> &AckSettings {
        &self.settings
    }

    /// Single transition function: (state, event, now) -> (state', effects).
    pub fn step(&mut self, event: AckEvent, now: Timestamp) -> Vec<AckEffect> {
        match (self.state.clone(), event) {
            (AckState::Idle, AckEvent::Start { number }) => self.begin_attempt(number, 1, now),

            (AckState::Calling { attempt }, AckEvent::CallState { attempt: from, state }) if from == attempt => {
                self.observe(state, now)
            }

            (AckState::Calling { attempt }, AckEvent::DialFailed { attempt: from }) if from == attempt => {
                self.state = AckState::Failed { attempts: attempt };
                vec![
                    AckEffect::Unsubscribe,
                    AckEffect::SessionEnded { reason: SessionEndReason::DialFailed, attempts: attempt },
                ]
            }

            (AckState::Redialing { attempt, remaining_ms }, AckEvent::CountdownTick) => {
                let tick = self.settings.redial_tick.as_millis() as u64;
                let remaining_ms = remaining_ms.saturating_sub(tick);
                if remaining_ms > 0 {
                    self.state = AckState::Redialing { attempt, remaining_ms };
                    return vec![AckEffect::ScheduleTick(self.settings.redial_tick)];
                }
                let number = self.call.as_ref().map(|c| c.target_number.clone()).unwrap_or_default();
                self.begin_attempt(number, attempt + 1, now)
            }

            (state, AckEvent::Cancel) if !state.is_terminal() && state != AckState::Idle => {
                let attempts = self.call.as_ref().map(|c| c.attempt).unwrap_or(0);
                self.state = AckState::Cancelled { attempts };
                let mut effects = vec![AckEffect::Unsubscribe];
                if matches!(state, AckState::Redialing { .. }) {
                    effects.push(AckEffect::CancelTick);
                }
                effects.push(AckEffect::SessionEnded { reason: SessionEndReason::Cancelled, attempts });
                effects
            }

            (state, event) => {
                debug!("Ack event {:?} ignored in state {:?}", event, state);
                Vec::new()
            }
        }
    }

    fn begin_attempt(&mut self, number: String, attempt: u32, now: Timestamp) -> Vec<AckEffect> {
        self.call = Some(CallSession::new(number.clone(), now, attempt));
        self.state = AckState::Calling { attempt };
        vec![AckEffect::Subscribe { attempt }, AckEffect::PlaceCall { number, attempt }]
    }

    fn observe(&mut self, state: CallState, now: Timestamp) -> Vec<AckEffect> {
        let Some(call) = self.call.as_mut() else {
            return Vec::new();
        };

        if let CallState::Unknown(raw) = state {
            warn!("Unrecognized call state {} on attempt {}", raw, call.attempt);
            return Vec::new();
        }

        call.previous_state = call.current_state.replace(state);

        let hung_up = call.previous_state == Some(CallState::OffHook) && state == CallState::Idle;
        if !hung_up || call.evaluated {
            return Vec::new();
        }
        call.evaluated = true;

        let attempt = call.attempt;
        let duration = now.since(call.call_started_at);
        let outcome = if duration < self.settings.min_call_time {
            CallOutcome::Busy
        } else {
            CallOutcome::Connected
        };
        self.state = AckState::Evaluating { attempt };

        let mut effects = vec![
            AckEffect::Evaluated { attempt, outcome, duration },
            AckEffect::Unsubscribe,
        ];

        match outcome {
            CallOutcome::Connected => {
                self.state = AckState::Acknowledged { attempts: attempt };
                effects.push(AckEffect::PersistAcknowledgment { at: now });
                effects.push(AckEffect::SessionEnded { reason: SessionEndReason::Acknowledged, attempts: attempt });
            }
            CallOutcome::Busy => {
                let redials_done = attempt - 1;
                if self.settings.max_redial_attempts.is_some_and(|cap| redials_done >= cap) {
                    self.state = AckState::Failed { attempts: attempt };
                    effects.push(AckEffect::SessionEnded {
                        reason: SessionEndReason::AttemptsExhausted,
                        attempts: attempt,
                    });
                } else {
                    let countdown = self.settings.redial_countdown;
                    self.state = AckState::Redialing { attempt, remaining_ms: countdown.as_millis() as u64 };
                    effects.push(AckEffect::RedialScheduled { attempt, countdown });
                    effects.push(AckEffect::ScheduleTick(self.settings.redial_tick));
                }
            }
        }

        effects
    }
}
