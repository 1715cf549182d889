mod common;

use alarm_bridge::alarm::{AlarmLogStore, AlarmRecord, AlarmType, Classification, InMemoryAlarmLog};
use alarm_bridge::config::{ConfigKey, ConfigStore};
use alarm_bridge::kernel::telemetry::event::SessionEndReason;
use alarm_bridge::kernel::telemetry::{SharedTelemetry, TelemetryEvent};
use alarm_bridge::kernel::{Clock, ManualTime, Timestamp, TokioScheduler};
use alarm_bridge::telephony::{
    AckContext, AckEffect, AckEvent, AckMachine, AckSettings, AckState, AcknowledgmentSession, CallOutcome, CallState,
    CallStateCallback, SubscriptionId, TelephonyObserver,
};
use common::{FakeDialer, FakeTelephony};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const T0: u64 = 1_700_000_000_000;

struct Rig {
    time: ManualTime,
    dialer: Arc<FakeDialer>,
    telephony: Arc<FakeTelephony>,
    log: Arc<InMemoryAlarmLog>,
    config: Arc<ConfigStore>,
    telemetry: SharedTelemetry,
}

impl Rig {
    fn new() -> Self {
        Self {
            time: ManualTime::new(Timestamp::from_millis(T0)),
            dialer: Arc::new(FakeDialer::default()),
            telephony: Arc::new(FakeTelephony::default()),
            log: Arc::new(InMemoryAlarmLog::new()),
            config: Arc::new(ConfigStore::new()),
            telemetry: SharedTelemetry::new(),
        }
    }

    fn session(&self, settings: AckSettings, alarm_id: Option<Uuid>) -> AcknowledgmentSession {
        let ctx = AckContext {
            dialer: self.dialer.clone(),
            telephony: self.telephony.clone(),
            alarm_log: self.log.clone(),
            config: self.config.clone(),
            clock: self.time.as_clock(),
            scheduler: self.time.as_scheduler(),
            telemetry: Some(self.telemetry.clone()),
        };
        AcknowledgmentSession::new(ctx, settings, alarm_id)
    }

    fn add_alarm(&self, alarm_type: AlarmType) -> Uuid {
        let classification = Classification {
            alarm_type,
            normalized_sender: "112".into(),
            trigger_text: "-".into(),
        };
        let record = AlarmRecord::new("112", "body", classification, self.time.now()).unwrap();
        let id = record.id;
        self.log.append(record);
        id
    }

    /// OFFHOOK now, IDLE after `call_ms`.
    fn call_lasting(&self, call_ms: u64) {
        self.telephony.emit(CallState::OffHook);
        self.time.advance(Duration::from_millis(call_ms));
        self.telephony.emit(CallState::Idle);
    }
}

#[test]
fn test_busy_line_redials_after_countdown() {
    let rig = Rig::new();
    let session = rig.session(AckSettings::default(), None);

    session.start("0401234567");
    assert_eq!(rig.dialer.count(), 1);
    assert_eq!(session.state(), AckState::Calling { attempt: 1 });

    rig.call_lasting(3_000);
    assert_eq!(session.state(), AckState::Redialing { attempt: 1, remaining_ms: 6_000 });
    assert_eq!(rig.telephony.subscriber_count(), 0, "Busy attempt drops its observer");

    rig.time.advance(Duration::from_millis(3_000));
    assert_eq!(session.state(), AckState::Redialing { attempt: 1, remaining_ms: 3_000 });
    assert_eq!(rig.dialer.count(), 1);

    rig.time.advance(Duration::from_millis(3_000));
    assert_eq!(rig.dialer.count(), 2, "Redial after the 6000ms countdown");
    assert_eq!(session.state(), AckState::Calling { attempt: 2 });
    assert_eq!(rig.telephony.subscriber_count(), 1, "Fresh observer for the new attempt");
    assert_eq!(rig.dialer.calls.lock()[1], "0401234567");
}

#[test]
fn test_connected_call_acknowledges_once() {
    let rig = Rig::new();
    let id = rig.add_alarm(AlarmType::Primary);
    rig.config.set_bool(ConfigKey::HasCalled, true).unwrap();
    let session = rig.session(AckSettings::default(), Some(id));

    session.start("112");
    rig.call_lasting(9_000);

    assert_eq!(session.state(), AckState::Acknowledged { attempts: 1 });
    let records = rig.log.query_all();
    assert_eq!(records[0].acknowledged_at, Some(Timestamp::from_millis(T0 + 9_000)));
    assert!(!rig.config.get_bool(ConfigKey::HasCalled), "In-progress flag cleared");

    rig.time.advance(Duration::from_secs(60));
    assert_eq!(rig.dialer.count(), 1, "No further calls after acknowledgment");
    assert_eq!(rig.telephony.subscriber_count(), 0);
}

#[test]
fn test_repeated_hangup_in_same_attempt_evaluates_once() {
    let rig = Rig::new();
    rig.add_alarm(AlarmType::Primary);
    let session = rig.session(AckSettings::default(), None);

    session.start("112");
    rig.telephony.emit(CallState::OffHook);
    let observers = rig.telephony.snapshot();
    rig.time.advance(Duration::from_millis(9_000));
    rig.telephony.emit(CallState::Idle);

    // Replay the same transition through the attempt's (now removed) observer.
    for cb in &observers {
        cb(CallState::OffHook);
        cb(CallState::Idle);
    }

    let snap = rig.telemetry.snapshot();
    assert_eq!(snap.call_stats.connected, 1);
    assert_eq!(snap.call_stats.acknowledged, 1);
    assert_eq!(rig.log.query_all()[0].acknowledged_at, Some(Timestamp::from_millis(T0 + 9_000)));
}

#[test]
fn test_latch_holds_within_attempt() {
    let mut machine = AckMachine::new(AckSettings::default());
    let at = |ms| Timestamp::from_millis(T0 + ms);

    machine.step(AckEvent::Start { number: "112".into() }, at(0));
    machine.step(AckEvent::CallState { attempt: 1, state: CallState::OffHook }, at(0));
    let first = machine.step(AckEvent::CallState { attempt: 1, state: CallState::Idle }, at(3_000));
    assert!(first.contains(&AckEffect::Evaluated {
        attempt: 1,
        outcome: CallOutcome::Busy,
        duration: Duration::from_millis(3_000),
    }));
    assert!(machine.call().unwrap().evaluated);

    // Late deliveries for the same attempt change nothing.
    assert!(machine.step(AckEvent::CallState { attempt: 1, state: CallState::OffHook }, at(3_100)).is_empty());
    assert!(machine.step(AckEvent::CallState { attempt: 1, state: CallState::Idle }, at(3_200)).is_empty());
    assert_eq!(machine.state(), &AckState::Redialing { attempt: 1, remaining_ms: 6_000 });
}

#[test]
fn test_only_offhook_to_idle_triggers_evaluation() {
    let mut machine = AckMachine::new(AckSettings::default());
    let at = |ms| Timestamp::from_millis(T0 + ms);

    machine.step(AckEvent::Start { number: "112".into() }, at(0));
    assert!(machine.step(AckEvent::CallState { attempt: 1, state: CallState::Idle }, at(10)).is_empty());
    assert!(machine.step(AckEvent::CallState { attempt: 1, state: CallState::Ringing }, at(20)).is_empty());
    assert!(machine.step(AckEvent::CallState { attempt: 1, state: CallState::Idle }, at(30)).is_empty());
    assert!(machine.step(AckEvent::CallState { attempt: 1, state: CallState::OffHook }, at(40)).is_empty());
    // Unknown states are logged and do not disturb the OFFHOOK -> IDLE pair.
    assert!(machine.step(AckEvent::CallState { attempt: 1, state: CallState::Unknown(9) }, at(50)).is_empty());
    assert_eq!(machine.call().unwrap().current_state, Some(CallState::OffHook));

    let effects = machine.step(AckEvent::CallState { attempt: 1, state: CallState::Idle }, at(8_000));
    assert!(effects.contains(&AckEffect::PersistAcknowledgment { at: at(8_000) }));
    assert_eq!(machine.state(), &AckState::Acknowledged { attempts: 1 });
}

#[test]
fn test_threshold_boundary_counts_as_connected() {
    let mut machine = AckMachine::new(AckSettings::default());
    let at = |ms| Timestamp::from_millis(T0 + ms);

    machine.step(AckEvent::Start { number: "112".into() }, at(0));
    machine.step(AckEvent::CallState { attempt: 1, state: CallState::OffHook }, at(100));
    machine.step(AckEvent::CallState { attempt: 1, state: CallState::Idle }, at(7_000));
    assert_eq!(machine.state(), &AckState::Acknowledged { attempts: 1 });
}

#[test]
fn test_stale_attempt_events_are_ignored() {
    let mut machine = AckMachine::new(AckSettings::default());
    let at = |ms| Timestamp::from_millis(T0 + ms);

    machine.step(AckEvent::Start { number: "112".into() }, at(0));
    machine.step(AckEvent::CallState { attempt: 1, state: CallState::OffHook }, at(0));
    machine.step(AckEvent::CallState { attempt: 1, state: CallState::Idle }, at(1_000));
    for i in 0..60 {
        machine.step(AckEvent::CountdownTick, at(1_100 + i * 100));
    }
    assert_eq!(machine.state(), &AckState::Calling { attempt: 2 });

    assert!(machine.step(AckEvent::CallState { attempt: 1, state: CallState::OffHook }, at(8_000)).is_empty());
    assert!(machine.step(AckEvent::CallState { attempt: 1, state: CallState::Idle }, at(20_000)).is_empty());
    assert_eq!(machine.state(), &AckState::Calling { attempt: 2 });
}

#[test]
fn test_dial_failure_ends_unacknowledged() {
    let rig = Rig::new();
    rig.add_alarm(AlarmType::Primary);
    *rig.dialer.fail.lock() = true;
    let session = rig.session(AckSettings::default(), None);

    session.start("112");
    assert_eq!(session.state(), AckState::Failed { attempts: 1 });
    assert_eq!(rig.telephony.subscriber_count(), 0);
    assert_eq!(rig.log.query_all()[0].acknowledged_at, None);
    assert!(rig.telemetry.events().contains(&TelemetryEvent::SessionEnded {
        reason: SessionEndReason::DialFailed,
        attempts: 1,
    }));
}

#[test]
fn test_cancel_during_countdown_suppresses_redial() {
    let rig = Rig::new();
    let session = rig.session(AckSettings::default(), None);

    session.start("112");
    rig.call_lasting(2_000);
    rig.time.advance(Duration::from_millis(1_000));
    session.cancel();

    assert_eq!(session.state(), AckState::Cancelled { attempts: 1 });
    rig.time.advance(Duration::from_secs(30));
    assert_eq!(rig.dialer.count(), 1);
    assert_eq!(rig.time.pending(), 0);

    // Cancel is idempotent and start after a terminal state does nothing.
    session.cancel();
    session.start("112");
    assert_eq!(session.state(), AckState::Cancelled { attempts: 1 });
    assert_eq!(rig.dialer.count(), 1);
}

#[test]
fn test_cancel_while_calling_unsubscribes() {
    let rig = Rig::new();
    let session = rig.session(AckSettings::default(), None);

    session.start("112");
    assert_eq!(rig.telephony.subscriber_count(), 1);
    session.cancel();
    assert_eq!(rig.telephony.subscriber_count(), 0);

    rig.call_lasting(9_000);
    assert_eq!(session.state(), AckState::Cancelled { attempts: 1 });
}

#[test]
fn test_redial_cap_when_configured() {
    let rig = Rig::new();
    let settings = AckSettings { max_redial_attempts: Some(2), ..AckSettings::default() };
    let session = rig.session(settings, None);

    session.start("112");
    for _ in 0..3 {
        rig.call_lasting(1_000);
        rig.time.advance(Duration::from_millis(6_000));
    }

    assert_eq!(rig.dialer.count(), 3, "One call plus two redials");
    assert_eq!(session.state(), AckState::Failed { attempts: 3 });
}

#[test]
fn test_unbounded_redial_by_default() {
    let rig = Rig::new();
    let session = rig.session(AckSettings::default(), None);

    session.start("112");
    for _ in 0..10 {
        rig.call_lasting(500);
        rig.time.advance(Duration::from_millis(6_000));
    }
    assert_eq!(rig.dialer.count(), 11);
    assert_eq!(session.state(), AckState::Calling { attempt: 11 });

    rig.call_lasting(12_000);
    assert_eq!(session.state(), AckState::Acknowledged { attempts: 11 });
}

#[test]
fn test_countdown_is_visible_on_status_channel() {
    let rig = Rig::new();
    let session = rig.session(AckSettings::default(), None);
    let status = session.status();

    session.start("112");
    rig.call_lasting(1_000);
    rig.time.advance(Duration::from_millis(2_500));

    assert_eq!(*status.borrow(), AckState::Redialing { attempt: 1, remaining_ms: 3_500 });
}

#[test]
fn test_acknowledges_latest_primary_without_record_id() {
    let rig = Rig::new();
    let primary = rig.add_alarm(AlarmType::Primary);
    let secondary = rig.add_alarm(AlarmType::Secondary);
    let session = rig.session(AckSettings::default(), None);

    session.start("112");
    rig.call_lasting(8_000);

    let records = rig.log.query_all();
    let find = |id| records.iter().find(|r| r.id == id).unwrap();
    assert!(find(primary).acknowledged_at.is_some());
    assert!(find(secondary).acknowledged_at.is_none());
}

#[test]
fn test_start_configured_uses_settings() {
    let rig = Rig::new();
    let session = rig.session(AckSettings::from_store(&rig.config), None);
    assert!(!session.start_configured(), "Disabled by default");

    rig.config.set_bool(ConfigKey::EnableAcknowledge, true).unwrap();
    assert!(!session.start_configured(), "No number configured");

    rig.config.set_string(ConfigKey::AcknowledgeNumber, " 0401234567 ").unwrap();
    assert!(session.start_configured());
    assert_eq!(rig.dialer.calls.lock().as_slice(), ["0401234567".to_string()]);
    assert!(rig.config.get_bool(ConfigKey::HasCalled));
}

#[tokio::test]
async fn test_wait_finished_reports_terminal_state() {
    let rig = Rig::new();
    let session = rig.session(AckSettings::default(), None);

    session.start("112");
    let waiter = {
        let session = session.clone();
        tokio::spawn(async move { session.wait_finished().await })
    };
    tokio::task::yield_now().await;

    rig.call_lasting(7_500);
    let state = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    assert_eq!(state, AckState::Acknowledged { attempts: 1 });
}

#[test]
fn test_failed_restart_does_not_flag_call_in_progress() {
    let rig = Rig::new();
    let session = rig.session(AckSettings::default(), None);

    session.start("112");
    assert!(rig.config.get_bool(ConfigKey::HasCalled));
    session.cancel();
    rig.config.set_bool(ConfigKey::HasCalled, false).unwrap();

    session.start("112");
    assert_eq!(session.state(), AckState::Cancelled { attempts: 1 });
    assert_eq!(rig.dialer.count(), 1);
    assert!(!rig.config.get_bool(ConfigKey::HasCalled), "Ignored start must not raise the flag");
}

/// Observer that cancels the session from inside `subscribe`, the tightest
/// window between a step and its effects.
struct CancelOnSubscribe {
    inner: FakeTelephony,
    session: Mutex<Option<AcknowledgmentSession>>,
}

impl TelephonyObserver for CancelOnSubscribe {
    fn subscribe(&self, callback: CallStateCallback) -> SubscriptionId {
        let id = self.inner.subscribe(callback);
        let session = self.session.lock().clone();
        if let Some(session) = session {
            session.cancel();
        }
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.unsubscribe(id);
    }
}

#[test]
fn test_cancel_racing_start_places_no_call() {
    let rig = Rig::new();
    let telephony = Arc::new(CancelOnSubscribe { inner: FakeTelephony::default(), session: Mutex::new(None) });
    let ctx = AckContext {
        dialer: rig.dialer.clone(),
        telephony: telephony.clone(),
        alarm_log: rig.log.clone(),
        config: rig.config.clone(),
        clock: rig.time.as_clock(),
        scheduler: rig.time.as_scheduler(),
        telemetry: None,
    };
    let session = AcknowledgmentSession::new(ctx, AckSettings::default(), None);
    *telephony.session.lock() = Some(session.clone());

    session.start("112");

    assert_eq!(session.state(), AckState::Cancelled { attempts: 1 });
    assert_eq!(rig.dialer.count(), 0, "Cancelled attempt must not dial");
    assert_eq!(telephony.inner.subscriber_count(), 0, "Late subscription is dropped");
    assert!(!rig.config.get_bool(ConfigKey::HasCalled));
    *telephony.session.lock() = None;
}

/// Wall clock that follows tokio's (pausable) time.
struct TokioClock {
    origin: tokio::time::Instant,
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(T0 + self.origin.elapsed().as_millis() as u64)
    }
}

#[tokio::test(start_paused = true)]
async fn test_busy_then_connected_on_tokio_timers() {
    let rig = Rig::new();
    let ctx = AckContext {
        dialer: rig.dialer.clone(),
        telephony: rig.telephony.clone(),
        alarm_log: rig.log.clone(),
        config: rig.config.clone(),
        clock: Arc::new(TokioClock { origin: tokio::time::Instant::now() }),
        scheduler: TokioScheduler::current().shared(),
        telemetry: Some(rig.telemetry.clone()),
    };
    let id = rig.add_alarm(AlarmType::Primary);
    let session = AcknowledgmentSession::new(ctx, AckSettings::default(), Some(id));

    // 1. Busy: hang up after 3 s
    session.start("112");
    rig.telephony.emit(CallState::OffHook);
    tokio::time::sleep(Duration::from_secs(3)).await;
    rig.telephony.emit(CallState::Idle);
    assert!(matches!(session.state(), AckState::Redialing { attempt: 1, .. }));

    // 2. Countdown runs on real timers
    tokio::time::sleep(Duration::from_millis(6_050)).await;
    assert_eq!(rig.dialer.count(), 2);
    assert_eq!(session.state(), AckState::Calling { attempt: 2 });

    // 3. Connected
    rig.telephony.emit(CallState::OffHook);
    tokio::time::sleep(Duration::from_secs(9)).await;
    rig.telephony.emit(CallState::Idle);

    assert_eq!(session.wait_finished().await, AckState::Acknowledged { attempts: 2 });
    assert!(rig.log.query_all()[0].acknowledged_at.is_some());
}
