use parking_lot::RwLock;
use uuid::Uuid;

use super::types::{AlarmRecord, AlarmType};
use crate::kernel::time::Timestamp;

/// Alarm history. Records are appended at classification time and only their
/// `acknowledged_at` is ever written afterwards, at most once.
pub trait AlarmLogStore: Send + Sync {
    fn append(&self, record: AlarmRecord);

    /// Stamps the given record. Returns false if it is unknown or already acknowledged.
    fn acknowledge(&self, id: Uuid, at: Timestamp) -> bool;

    fn update_acknowledged_on_latest(&self, at: Timestamp) -> bool;

    fn update_acknowledged_on_latest_of_type(&self, alarm_type: AlarmType, at: Timestamp) -> bool;

    fn query_all(&self) -> Vec<AlarmRecord>;

    fn count(&self) -> usize;
}

/// Process-local history in arrival order.
#[derive(Debug, Default)]
pub struct InMemoryAlarmLog {
    records: RwLock<Vec<AlarmRecord>>,
}

impl InMemoryAlarmLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn stamp(record: &mut AlarmRecord, at: Timestamp) -> bool {
        if record.acknowledged_at.is_some() {
            return false;
        }
        record.acknowledged_at = Some(at);
        true
    }
}

impl AlarmLogStore for InMemoryAlarmLog {
    fn append(&self, record: AlarmRecord) {
        // UNDEFINED never reaches history.
        if !record.alarm_type.is_alarm() {
            return;
        }
        self.records.write().push(record);
    }

    fn acknowledge(&self, id: Uuid, at: Timestamp) -> bool {
        let mut records = self.records.write();
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => Self::stamp(record, at),
            None => false,
        }
    }

    fn update_acknowledged_on_latest(&self, at: Timestamp) -> bool {
        match self.records.write().last_mut() {
            Some(record) => Self::stamp(record, at),
            None => false,
        }
    }

    fn update_acknowledged_on_latest_of_type(&self, alarm_type: AlarmType, at: Timestamp) -> bool {
        let mut records = self.records.write();
        match records.iter_mut().rev().find(|r| r.alarm_type == alarm_type) {
            Some(record) => Self::stamp(record, at),
            None => false,
        }
    }

    fn query_all(&self) -> Vec<AlarmRecord> {
        self.records.read().clone()
    }

    fn count(&self) -> usize {
        self.records.read().len()
    }
}
