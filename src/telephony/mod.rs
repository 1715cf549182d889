pub mod machine;
pub mod session;
pub mod types;

pub use machine::{AckEffect, AckEvent, AckMachine, AckSettings, AckState, CallSession};
pub use session::{AckContext, AcknowledgmentSession};
pub use types::{CallOutcome, CallState, CallStateCallback, DialError, Dialer, SubscriptionId, TelephonyObserver};
