//! Alarm delivery telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer.
//! It must **NEVER** be read inside decision logic (classifier, ringer guard,
//! alert player or acknowledgment session).
//!
//! # PRIVACY INVARIANT
//! Events must **NEVER** carry message bodies. Alarm ids, attempt counters,
//! durations and enum tags only.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::TelemetryEvent;
pub use recorder::{SharedTelemetry, TelemetryRecorder};
