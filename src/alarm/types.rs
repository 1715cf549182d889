use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::kernel::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmType {
    Primary,
    Secondary,
    /// Not an alarm. Never persisted, alerted or notified.
    Undefined,
}

impl AlarmType {
    pub fn is_alarm(&self) -> bool {
        !matches!(self, AlarmType::Undefined)
    }
}

impl fmt::Display for AlarmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlarmType::Primary => "PRIMARY",
            AlarmType::Secondary => "SECONDARY",
            AlarmType::Undefined => "UNDEFINED",
        };
        f.write_str(s)
    }
}

/// Placeholder trigger text when no free-text entry matched.
pub const NO_TRIGGER: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub alarm_type: AlarmType,
    pub normalized_sender: String,
    pub trigger_text: String,
}

impl Classification {
    pub fn matched_free_text(&self) -> bool {
        self.trigger_text != NO_TRIGGER
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub id: Uuid,
    pub received_at: Timestamp,
    pub sender: String,
    pub normalized_sender: String,
    pub message: String,
    pub trigger_text: String,
    pub acknowledged_at: Option<Timestamp>,
    pub alarm_type: AlarmType,
}

impl AlarmRecord {
    /// Returns `None` for UNDEFINED classifications, which must never become records.
    pub fn new(
        sender: &str,
        message: &str,
        classification: Classification,
        received_at: Timestamp,
    ) -> Option<Self> {
        if !classification.alarm_type.is_alarm() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            received_at,
            sender: sender.to_string(),
            normalized_sender: classification.normalized_sender,
            message: message.to_string(),
            trigger_text: classification.trigger_text,
            acknowledged_at: None,
            alarm_type: classification.alarm_type,
        })
    }
}
