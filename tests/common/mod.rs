#![allow(dead_code)]

use alarm_bridge::alarm::{AlarmType, NotificationService};
use alarm_bridge::audio::{AudioError, AudioService, RingerMode, Tone, ToneCompletion};
use alarm_bridge::telephony::{CallState, CallStateCallback, DialError, Dialer, SubscriptionId, TelephonyObserver};
use parking_lot::Mutex;
use std::collections::BTreeMap;

// === Audio ===

pub struct AudioLog {
    pub ringer: RingerMode,
    pub ring_volume: u32,
    pub max_ring_volume: u32,
    pub media_volume: u32,
    pub max_media_volume: u32,
    pub ringer_writes: Vec<RingerMode>,
    pub media_writes: Vec<u32>,
    pub vibrations: usize,
    pub vibration_cancels: usize,
    pub tones_started: Vec<String>,
    pub tone_stops: usize,
    pub fail_prepare: bool,
    pending: Option<ToneCompletion>,
}

pub struct FakeAudio {
    pub log: Mutex<AudioLog>,
}

impl FakeAudio {
    pub fn new(ringer: RingerMode) -> Self {
        Self {
            log: Mutex::new(AudioLog {
                ringer,
                ring_volume: 5,
                max_ring_volume: 7,
                media_volume: 4,
                max_media_volume: 15,
                ringer_writes: Vec::new(),
                media_writes: Vec::new(),
                vibrations: 0,
                vibration_cancels: 0,
                tones_started: Vec::new(),
                tone_stops: 0,
                fail_prepare: false,
                pending: None,
            }),
        }
    }

    /// Runs the completion of the tone currently playing, if any.
    pub fn finish_tone(&self) -> bool {
        let pending = self.log.lock().pending.take();
        match pending {
            Some(done) => {
                done();
                true
            }
            None => false,
        }
    }
}

impl AudioService for FakeAudio {
    fn ringer_mode(&self) -> RingerMode {
        self.log.lock().ringer
    }

    fn set_ringer_mode(&self, mode: RingerMode) {
        let mut log = self.log.lock();
        log.ringer = mode;
        log.ringer_writes.push(mode);
    }

    fn ring_volume(&self) -> u32 {
        self.log.lock().ring_volume
    }

    fn max_ring_volume(&self) -> u32 {
        self.log.lock().max_ring_volume
    }

    fn media_volume(&self) -> u32 {
        self.log.lock().media_volume
    }

    fn max_media_volume(&self) -> u32 {
        self.log.lock().max_media_volume
    }

    fn set_media_volume(&self, volume: u32) {
        let mut log = self.log.lock();
        log.media_volume = volume;
        log.media_writes.push(volume);
    }

    fn vibrate(&self, _pattern_ms: &[u64]) {
        self.log.lock().vibrations += 1;
    }

    fn cancel_vibration(&self) {
        self.log.lock().vibration_cancels += 1;
    }

    fn play_tone(&self, tone: &Tone, on_complete: ToneCompletion) -> Result<(), AudioError> {
        let mut log = self.log.lock();
        if log.fail_prepare {
            return Err(AudioError::Backend("prepare failed".to_string()));
        }
        log.tones_started.push(tone.name.clone());
        log.pending = Some(on_complete);
        Ok(())
    }

    fn stop_tone(&self) {
        let mut log = self.log.lock();
        log.pending = None;
        log.tone_stops += 1;
    }
}

// === Telephony ===

#[derive(Default)]
pub struct FakeDialer {
    pub calls: Mutex<Vec<String>>,
    pub fail: Mutex<bool>,
}

impl FakeDialer {
    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Dialer for FakeDialer {
    fn place_call(&self, number: &str) -> Result<(), DialError> {
        if *self.fail.lock() {
            return Err(DialError::NoDialer);
        }
        self.calls.lock().push(number.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTelephony {
    next: Mutex<u64>,
    subscribers: Mutex<BTreeMap<u64, CallStateCallback>>,
    pub unsubscribes: Mutex<usize>,
}

impl FakeTelephony {
    /// Delivers `state` to every current subscriber.
    pub fn emit(&self, state: CallState) {
        let callbacks: Vec<CallStateCallback> = self.subscribers.lock().values().cloned().collect();
        for cb in callbacks {
            cb(state);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Grabs the current subscribers so a test can replay them after they
    /// were removed.
    pub fn snapshot(&self) -> Vec<CallStateCallback> {
        self.subscribers.lock().values().cloned().collect()
    }
}

impl TelephonyObserver for FakeTelephony {
    fn subscribe(&self, callback: CallStateCallback) -> SubscriptionId {
        let mut next = self.next.lock();
        *next += 1;
        self.subscribers.lock().insert(*next, callback);
        SubscriptionId(*next)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().remove(&id.0);
        *self.unsubscribes.lock() += 1;
    }
}

// === Notifications ===

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(AlarmType, String, String)>>,
}

impl NotificationService for RecordingNotifier {
    fn notify(&self, alarm_type: AlarmType, rescue_service_name: &str, message: &str) {
        self.sent
            .lock()
            .push((alarm_type, rescue_service_name.to_string(), message.to_string()));
    }
}
