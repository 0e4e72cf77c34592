use std::collections::BTreeMap;

use serde_json::Value;

use crate::analytics::constants::{
    MAX_EVENT_NAME_LENGTH, MAX_EVENT_PARAMETERS, MAX_PARAMETER_KEY_LENGTH,
    MAX_PARAMETER_VALUE_LENGTH, MAX_USER_ID_LENGTH,
};
use crate::analytics::error::{
    event_name_too_long, invalid_argument, parameter_key_too_long, parameter_value_too_long,
    too_many_parameters, AnalyticsResult,
};
use crate::analytics::gtag::EventParams;

/// Parameters of a single tracked event. Later inserts overwrite earlier ones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventPayload {
    params: BTreeMap<String, Value>,
}

impl EventPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in entries {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Checks the GA4 collection limits.
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.params.len() > MAX_EVENT_PARAMETERS {
            return Err(too_many_parameters(format!(
                "events accept at most {MAX_EVENT_PARAMETERS} parameters, got {}",
                self.params.len()
            )));
        }
        for (key, value) in &self.params {
            if key.chars().count() > MAX_PARAMETER_KEY_LENGTH {
                return Err(parameter_key_too_long(format!(
                    "parameter key `{key}` exceeds {MAX_PARAMETER_KEY_LENGTH} characters"
                )));
            }
            let limit = if key == "user_id" {
                MAX_USER_ID_LENGTH
            } else {
                MAX_PARAMETER_VALUE_LENGTH
            };
            match value {
                Value::String(text) if text.chars().count() > limit => {
                    return Err(parameter_value_too_long(format!(
                        "value of parameter `{key}` exceeds {limit} characters"
                    )));
                }
                Value::Array(_) => {
                    return Err(invalid_argument(format!(
                        "parameter `{key}` must be a scalar value"
                    )));
                }
                Value::Object(_) if key != "user_properties" => {
                    return Err(invalid_argument(format!(
                        "parameter `{key}` must be a scalar value"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn into_params(self) -> EventParams {
        self.params
    }
}

pub(crate) fn validate_event_name(name: &str) -> AnalyticsResult<()> {
    if name.trim().is_empty() {
        return Err(invalid_argument("Event name must not be empty"));
    }
    if name.chars().count() > MAX_EVENT_NAME_LENGTH {
        return Err(event_name_too_long(format!(
            "event name `{name}` exceeds {MAX_EVENT_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Truncates `value` to at most `max` characters.
pub(crate) fn clip(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_inserts_win() {
        let mut payload = EventPayload::new();
        payload.insert("x_context", "web");
        payload.extend([("x_context", "app"), ("x_extra", "1")]);
        assert_eq!(payload.get("x_context"), Some(&Value::from("app")));
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn event_name_limits() {
        assert!(validate_event_name(&"x".repeat(40)).is_ok());
        let err = validate_event_name(&"x".repeat(41)).unwrap_err();
        assert_eq!(err.code_str(), "analytics/event-name-too-long");
        let err = validate_event_name("  ").unwrap_err();
        assert_eq!(err.code_str(), "analytics/invalid-argument");
    }

    #[test]
    fn parameter_count_limit() {
        let mut payload = EventPayload::new();
        payload.extend((0..25).map(|i| (format!("p{i}"), i)));
        assert!(payload.validate().is_ok());
        payload.insert("p25", 25);
        let err = payload.validate().unwrap_err();
        assert_eq!(err.code_str(), "analytics/too-many-parameters");
    }

    #[test]
    fn key_and_value_limits() {
        let mut payload = EventPayload::new();
        payload.insert("k".repeat(41), "v");
        assert_eq!(
            payload.validate().unwrap_err().code_str(),
            "analytics/parameter-key-too-long"
        );

        let mut payload = EventPayload::new();
        payload.insert("a", "y".repeat(101));
        assert_eq!(
            payload.validate().unwrap_err().code_str(),
            "analytics/parameter-value-too-long"
        );

        let mut payload = EventPayload::new();
        payload.insert("a", "y".repeat(100));
        payload.insert("user_id", "u".repeat(256));
        assert!(payload.validate().is_ok());
        payload.insert("user_id", "u".repeat(257));
        assert_eq!(
            payload.validate().unwrap_err().code_str(),
            "analytics/parameter-value-too-long"
        );
    }

    #[test]
    fn only_user_properties_may_be_an_object() {
        let mut payload = EventPayload::new();
        payload.insert("user_properties", serde_json::json!({"x_user_id": "abc"}));
        assert!(payload.validate().is_ok());
        payload.insert("nested", serde_json::json!({"a": 1}));
        assert_eq!(
            payload.validate().unwrap_err().code_str(),
            "analytics/invalid-argument"
        );
    }

    #[test]
    fn clip_counts_characters() {
        assert_eq!(clip("héllo", 2), "hé");
        assert_eq!(clip("short", 100), "short");
    }
}
