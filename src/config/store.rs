use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use super::keys::{ConfigKey, ConfigValue, ValueKind};
use super::ConfigError;

/// Typed key/value settings. Reads never fail: a missing key yields its
/// documented default and a value of the wrong type is logged and replaced by
/// the default.
#[derive(Debug, Default)]
pub struct ConfigStore {
    values: RwLock<HashMap<ConfigKey, ConfigValue>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object of `key -> value`. Keys that are unknown or carry
    /// the wrong type are logged and skipped; the rest are applied.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let store = Self::new();
        store.apply_json_str(json)?;
        Ok(store)
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Returns the per-key problems that were skipped.
    pub fn apply_json_str(&self, json: &str) -> Result<Vec<ConfigError>, ConfigError> {
        let root: Value = serde_json::from_str(json)?;
        let Value::Object(map) = root else {
            return Err(ConfigError::NotAnObject);
        };

        let mut skipped = Vec::new();
        for (name, raw) in map {
            let Some(key) = ConfigKey::from_name(&name) else {
                warn!("Ignoring unknown setting '{}'", name);
                skipped.push(ConfigError::UnknownKey(name));
                continue;
            };
            match convert(key, raw) {
                Ok(value) => {
                    self.values.write().insert(key, value);
                }
                Err(e) => {
                    warn!("Skipping setting: {}", e);
                    skipped.push(e);
                }
            }
        }
        Ok(skipped)
    }

    pub fn set(&self, key: ConfigKey, value: ConfigValue) -> Result<(), ConfigError> {
        if value.kind() != key.kind() {
            return Err(ConfigError::TypeMismatch { key, expected: key.kind(), found: value.kind() });
        }
        debug!("Setting '{}' updated", key);
        self.values.write().insert(key, value);
        Ok(())
    }

    pub fn set_bool(&self, key: ConfigKey, value: bool) -> Result<(), ConfigError> {
        self.set(key, ConfigValue::Boolean(value))
    }

    pub fn set_int(&self, key: ConfigKey, value: i64) -> Result<(), ConfigError> {
        self.set(key, ConfigValue::Integer(value))
    }

    pub fn set_string(&self, key: ConfigKey, value: impl Into<String>) -> Result<(), ConfigError> {
        self.set(key, ConfigValue::String(value.into()))
    }

    pub fn set_list(&self, key: ConfigKey, value: Vec<String>) -> Result<(), ConfigError> {
        self.set(key, ConfigValue::List(value))
    }

    /// Writes a value without the type check. Only useful for exercising the
    /// read-side fallback.
    pub fn set_unchecked(&self, key: ConfigKey, value: ConfigValue) {
        self.values.write().insert(key, value);
    }

    pub fn get(&self, key: ConfigKey) -> ConfigValue {
        self.values
            .read()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| key.default_value())
    }

    pub fn get_bool(&self, key: ConfigKey) -> bool {
        match self.get(key) {
            ConfigValue::Boolean(b) => b,
            other => match fallback(key, &other) {
                ConfigValue::Boolean(b) => b,
                _ => false,
            },
        }
    }

    pub fn get_int(&self, key: ConfigKey) -> i64 {
        match self.get(key) {
            ConfigValue::Integer(i) => i,
            other => match fallback(key, &other) {
                ConfigValue::Integer(i) => i,
                _ => 0,
            },
        }
    }

    pub fn get_string(&self, key: ConfigKey) -> String {
        match self.get(key) {
            ConfigValue::String(s) => s,
            other => match fallback(key, &other) {
                ConfigValue::String(s) => s,
                _ => String::new(),
            },
        }
    }

    pub fn get_list(&self, key: ConfigKey) -> Vec<String> {
        match self.get(key) {
            ConfigValue::List(l) => l,
            other => match fallback(key, &other) {
                ConfigValue::List(l) => l,
                _ => Vec::new(),
            },
        }
    }
}

fn fallback(key: ConfigKey, found: &ConfigValue) -> ConfigValue {
    warn!(
        "Setting '{}' holds a {:?}, expected {:?}; using default",
        key,
        found.kind(),
        key.kind()
    );
    key.default_value()
}

fn convert(key: ConfigKey, raw: Value) -> Result<ConfigValue, ConfigError> {
    let found = json_kind(&raw);
    let mismatch = || ConfigError::TypeMismatch { key, expected: key.kind(), found };

    match (key.kind(), raw) {
        (ValueKind::Integer, Value::Number(n)) => n.as_i64().map(ConfigValue::Integer).ok_or_else(mismatch),
        (ValueKind::Boolean, Value::Bool(b)) => Ok(ConfigValue::Boolean(b)),
        (ValueKind::String, Value::String(s)) => Ok(ConfigValue::String(s)),
        (ValueKind::List, Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(mismatch()),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ConfigValue::List),
        _ => Err(mismatch()),
    }
}

fn json_kind(raw: &Value) -> ValueKind {
    match raw {
        Value::Number(_) => ValueKind::Integer,
        Value::Bool(_) => ValueKind::Boolean,
        Value::Array(_) => ValueKind::List,
        _ => ValueKind::String,
    }
}
