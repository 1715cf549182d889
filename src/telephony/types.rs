use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Line state as reported by the platform telephony observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    Idle,
    OffHook,
    Ringing,
    Unknown(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallOutcome {
    /// Call ended before the minimum call time: line busy or rejected.
    Busy,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialError {
    #[error("no dialer available")]
    NoDialer,

    #[error("call to {number} rejected: {reason}")]
    Rejected { number: String, reason: String },
}

/// Fire-and-forget outbound call. The outcome is only ever observed through
/// the [`TelephonyObserver`]; an `Err` means the call never left the device.
pub trait Dialer: Send + Sync {
    fn place_call(&self, number: &str) -> Result<(), DialError>;
}

pub type CallStateCallback = Arc<dyn Fn(CallState) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

pub trait TelephonyObserver: Send + Sync {
    fn subscribe(&self, callback: CallStateCallback) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}
