use tracing::info;

use super::types::AlarmType;

/// User-visible presentation of a classified alarm.
pub trait NotificationService: Send + Sync {
    fn notify(&self, alarm_type: AlarmType, rescue_service_name: &str, message: &str);
}

/// Writes notifications to the log only. The message body is reduced to its
/// length to keep content out of log sinks.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationService for TracingNotifier {
    fn notify(&self, alarm_type: AlarmType, rescue_service_name: &str, message: &str) {
        let title = if rescue_service_name.is_empty() {
            "Alarm"
        } else {
            rescue_service_name
        };
        info!("[NOTIFY] {} alarm from {} ({} chars)", alarm_type, title, message.chars().count());
    }
}
