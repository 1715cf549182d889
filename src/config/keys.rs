use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag carried by every configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Integer,
    String,
    Boolean,
    List,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Integer(i64),
    Boolean(bool),
    String(String),
    List(Vec<String>),
}

impl ConfigValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Integer(_) => ValueKind::Integer,
            ConfigValue::String(_) => ValueKind::String,
            ConfigValue::Boolean(_) => ValueKind::Boolean,
            ConfigValue::List(_) => ValueKind::List,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKey {
    PrimaryNumbers,
    SecondaryNumbers,
    PrimaryFreeTexts,
    SecondaryFreeTexts,
    PrimaryTone,
    SecondaryTone,
    UseOsSoundSettings,
    PlayToneTwice,
    EnableAcknowledge,
    AcknowledgeNumber,
    HasCalled,
    RescueServiceName,
    LastFullMessage,
    MinCallTimeMs,
    RedialCountdownMs,
    RedialTickMs,
    RingerOverrideMs,
    MaxRedialAttempts,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 18] = [
        ConfigKey::PrimaryNumbers,
        ConfigKey::SecondaryNumbers,
        ConfigKey::PrimaryFreeTexts,
        ConfigKey::SecondaryFreeTexts,
        ConfigKey::PrimaryTone,
        ConfigKey::SecondaryTone,
        ConfigKey::UseOsSoundSettings,
        ConfigKey::PlayToneTwice,
        ConfigKey::EnableAcknowledge,
        ConfigKey::AcknowledgeNumber,
        ConfigKey::HasCalled,
        ConfigKey::RescueServiceName,
        ConfigKey::LastFullMessage,
        ConfigKey::MinCallTimeMs,
        ConfigKey::RedialCountdownMs,
        ConfigKey::RedialTickMs,
        ConfigKey::RingerOverrideMs,
        ConfigKey::MaxRedialAttempts,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::PrimaryNumbers => "primary_numbers",
            ConfigKey::SecondaryNumbers => "secondary_numbers",
            ConfigKey::PrimaryFreeTexts => "primary_free_texts",
            ConfigKey::SecondaryFreeTexts => "secondary_free_texts",
            ConfigKey::PrimaryTone => "primary_tone",
            ConfigKey::SecondaryTone => "secondary_tone",
            ConfigKey::UseOsSoundSettings => "use_os_sound_settings",
            ConfigKey::PlayToneTwice => "play_tone_twice",
            ConfigKey::EnableAcknowledge => "enable_acknowledge",
            ConfigKey::AcknowledgeNumber => "acknowledge_number",
            ConfigKey::HasCalled => "has_called",
            ConfigKey::RescueServiceName => "rescue_service_name",
            ConfigKey::LastFullMessage => "last_full_message",
            ConfigKey::MinCallTimeMs => "min_call_time_ms",
            ConfigKey::RedialCountdownMs => "redial_countdown_ms",
            ConfigKey::RedialTickMs => "redial_tick_ms",
            ConfigKey::RingerOverrideMs => "ringer_override_ms",
            ConfigKey::MaxRedialAttempts => "max_redial_attempts",
        }
    }

    pub fn from_name(name: &str) -> Option<ConfigKey> {
        ConfigKey::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn kind(&self) -> ValueKind {
        use ConfigKey::*;
        match self {
            PrimaryNumbers | SecondaryNumbers | PrimaryFreeTexts | SecondaryFreeTexts => ValueKind::List,
            PrimaryTone | SecondaryTone | MinCallTimeMs | RedialCountdownMs | RedialTickMs
            | RingerOverrideMs | MaxRedialAttempts => ValueKind::Integer,
            UseOsSoundSettings | PlayToneTwice | EnableAcknowledge | HasCalled => ValueKind::Boolean,
            AcknowledgeNumber | RescueServiceName | LastFullMessage => ValueKind::String,
        }
    }

    pub fn default_value(&self) -> ConfigValue {
        use ConfigKey::*;
        match self {
            PrimaryNumbers | SecondaryNumbers | PrimaryFreeTexts | SecondaryFreeTexts => {
                ConfigValue::List(Vec::new())
            }
            PrimaryTone => ConfigValue::Integer(0),
            SecondaryTone => ConfigValue::Integer(1),
            UseOsSoundSettings => ConfigValue::Boolean(true),
            PlayToneTwice | EnableAcknowledge | HasCalled => ConfigValue::Boolean(false),
            AcknowledgeNumber | RescueServiceName | LastFullMessage => ConfigValue::String(String::new()),
            MinCallTimeMs => ConfigValue::Integer(7_000),
            RedialCountdownMs => ConfigValue::Integer(6_000),
            RedialTickMs => ConfigValue::Integer(100),
            RingerOverrideMs => ConfigValue::Integer(10_000),
            // 0 = no cap
            MaxRedialAttempts => ConfigValue::Integer(0),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
