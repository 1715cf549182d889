use std::sync::Arc;
use tracing::{info, warn};

use super::classifier::{classify, MatchConfiguration};
use super::log::AlarmLogStore;
use super::notify::NotificationService;
use super::types::AlarmRecord;
use crate::audio::player::{AlertPlayer, AlertSettings, PlayOutcome};
use crate::config::{ConfigKey, ConfigStore};
use crate::kernel::telemetry::{SharedTelemetry, TelemetryEvent};
use crate::kernel::time::Clock;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledAlarm {
    pub record: AlarmRecord,
    pub alert: PlayOutcome,
}

/// Inbound message -> classification -> history, notification, alert.
pub struct AlarmPipeline {
    config: Arc<ConfigStore>,
    alarm_log: Arc<dyn AlarmLogStore>,
    notifier: Arc<dyn NotificationService>,
    player: AlertPlayer,
    clock: Arc<dyn Clock>,
    telemetry: Option<SharedTelemetry>,
}

impl AlarmPipeline {
    pub fn new(
        config: Arc<ConfigStore>,
        alarm_log: Arc<dyn AlarmLogStore>,
        notifier: Arc<dyn NotificationService>,
        player: AlertPlayer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { config, alarm_log, notifier, player, clock, telemetry: None }
    }

    pub fn with_telemetry(mut self, telemetry: SharedTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn player(&self) -> &AlertPlayer {
        &self.player
    }

    /// Returns `None` for messages that are not alarms; those leave no trace
    /// in history, notifications or audio.
    pub async fn handle_message(&self, sender: &str, body: &str) -> Option<HandledAlarm> {
        let criteria = MatchConfiguration::from_store(&self.config);
        let classification = classify(sender, body, &criteria);
        let by_free_text = classification.matched_free_text();

        let record = AlarmRecord::new(sender, body, classification, self.clock.now())?;
        info!(
            "{} alarm from {} (trigger '{}')",
            record.alarm_type, record.normalized_sender, record.trigger_text
        );
        if let Some(t) = &self.telemetry {
            t.record(TelemetryEvent::AlarmClassified { alarm_type: record.alarm_type, by_free_text });
        }

        self.alarm_log.append(record.clone());
        self.remember(ConfigKey::LastFullMessage, body);

        let rescue_service = self.config.get_string(ConfigKey::RescueServiceName);
        self.notifier.notify(record.alarm_type, &rescue_service, body);

        if self.config.get_bool(ConfigKey::EnableAcknowledge) {
            if let Err(e) = self.config.set_bool(ConfigKey::HasCalled, true) {
                warn!("Could not flag pending acknowledgment: {}", e);
            }
        }

        let settings = AlertSettings::from_store(&self.config);
        let alert = self.player.play(record.alarm_type, &settings).await;

        Some(HandledAlarm { record, alert })
    }

    fn remember(&self, key: ConfigKey, value: &str) {
        if let Err(e) = self.config.set_string(key, value) {
            warn!("Could not store {}: {}", key, e);
        }
    }
}
