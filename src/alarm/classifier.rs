use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{AlarmType, Classification, NO_TRIGGER};
use crate::config::{ConfigKey, ConfigStore};

/// International prefixes stripped from inbound senders before matching.
pub const COUNTRY_CODE_PREFIXES: [&str; 12] = [
    "+1", "+33", "+358", "+386", "+420", "+43", "+44", "+45", "+46", "+47", "+49", "+64",
];

/// Read-only matching criteria, snapshotted from the settings store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfiguration {
    pub primary_numbers: Vec<String>,
    pub secondary_numbers: Vec<String>,
    pub primary_free_texts: Vec<String>,
    pub secondary_free_texts: Vec<String>,
}

impl MatchConfiguration {
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            primary_numbers: store.get_list(ConfigKey::PrimaryNumbers),
            secondary_numbers: store.get_list(ConfigKey::SecondaryNumbers),
            primary_free_texts: store.get_list(ConfigKey::PrimaryFreeTexts),
            secondary_free_texts: store.get_list(ConfigKey::SecondaryFreeTexts),
        }
    }
}

/// PURE FUNCTION: (sender, body, criteria) -> classification.
///
/// Order of precedence: primary numbers, secondary numbers, primary free
/// texts, secondary free texts. Within a list the first entry wins. Never
/// fails; anything unmatched is UNDEFINED with trigger text "-".
pub fn classify(sender: &str, body: &str, config: &MatchConfiguration) -> Classification {
    let sender = sender.trim();
    let (stripped, country_code_removed) = strip_country_code(sender);

    // === 1. Sender numbers ===
    if !stripped.is_empty() {
        let lists = [
            (AlarmType::Primary, &config.primary_numbers),
            (AlarmType::Secondary, &config.secondary_numbers),
        ];
        for (alarm_type, numbers) in lists {
            if let Some(normalized) = match_number(stripped, country_code_removed, numbers) {
                debug!("Sender {} matched {} number list", normalized, alarm_type);
                return Classification {
                    alarm_type,
                    normalized_sender: normalized,
                    trigger_text: NO_TRIGGER.to_string(),
                };
            }
        }
    }

    // === 2. Free-text triggers ===
    let body_lower = body.to_lowercase();
    let texts = [
        (AlarmType::Primary, &config.primary_free_texts),
        (AlarmType::Secondary, &config.secondary_free_texts),
    ];
    for (alarm_type, triggers) in texts {
        if let Some(trigger) = match_free_text(&body_lower, triggers) {
            debug!("Body matched {} free text '{}'", alarm_type, trigger);
            return Classification {
                alarm_type,
                normalized_sender: stripped.to_string(),
                trigger_text: trigger.to_string(),
            };
        }
    }

    Classification {
        alarm_type: AlarmType::Undefined,
        normalized_sender: stripped.to_string(),
        trigger_text: NO_TRIGGER.to_string(),
    }
}

/// Removes the longest known international prefix. Returns the remainder and
/// whether anything was removed.
pub fn strip_country_code(sender: &str) -> (&str, bool) {
    COUNTRY_CODE_PREFIXES
        .iter()
        .copied()
        .filter(|prefix| sender.starts_with(*prefix))
        .max_by_key(|prefix| prefix.len())
        .map(|prefix| (&sender[prefix.len()..], true))
        .unwrap_or((sender, false))
}

/// Exact match, or a match once the national leading zero lost with the
/// country code is put back. Returns the normalized sender.
fn match_number(sender: &str, country_code_removed: bool, numbers: &[String]) -> Option<String> {
    numbers
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .find_map(|entry| {
            if entry == sender {
                Some(sender.to_string())
            } else if country_code_removed && entry.strip_prefix('0') == Some(sender) {
                Some(format!("0{}", sender))
            } else {
                None
            }
        })
}

fn match_free_text<'a>(body_lower: &str, triggers: &'a [String]) -> Option<&'a str> {
    triggers
        .iter()
        .map(|t| t.as_str())
        .filter(|t| !t.trim().is_empty())
        .find(|t| body_lower.contains(&t.to_lowercase()))
}
