//! Merged result of one poll cycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::ClientError;

/// One poll cycle's view of the amplifier.
///
/// Built only when `status`, `settings` and `info` were all fetched in the same
/// cycle. Never mutated after construction; the coordinator replaces it whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: Map<String, Value>,
    pub settings: Map<String, Value>,
    pub info: Map<String, Value>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        status: Map<String, Value>,
        settings: Map<String, Value>,
        info: Map<String, Value>,
    ) -> Self {
        Self {
            status,
            settings,
            info,
            fetched_at: Utc::now(),
        }
    }

    /// Assemble from raw endpoint responses. Each must be a JSON object.
    pub fn from_responses(
        status: Value,
        settings: Value,
        info: Value,
    ) -> Result<Self, ClientError> {
        Ok(Self::new(
            into_object("status", status)?,
            into_object("settings", settings)?,
            into_object("info", info)?,
        ))
    }

    pub fn status_field(&self, key: &str) -> Option<&Value> {
        self.status.get(key)
    }

    pub fn settings_field(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn info_field(&self, key: &str) -> Option<&Value> {
        self.info.get(key)
    }
}

fn into_object(endpoint: &str, value: Value) -> Result<Map<String, Value>, ClientError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ClientError::Protocol(format!(
            "{} response is not a JSON object: {}",
            endpoint, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_responses_keeps_all_sections() {
        let snapshot = Snapshot::from_responses(
            json!({"amp_pwr": true}),
            json!({"vol": 30}),
            json!({"fw": "1.2"}),
        )
        .unwrap();

        assert_eq!(snapshot.status_field("amp_pwr"), Some(&json!(true)));
        assert_eq!(snapshot.settings_field("vol"), Some(&json!(30)));
        assert_eq!(snapshot.info_field("fw"), Some(&json!("1.2")));
    }

    #[test]
    fn test_non_object_section_is_protocol_error() {
        let err = Snapshot::from_responses(json!({}), json!([1, 2]), json!({})).unwrap_err();
        assert!(err.is_protocol());
        assert!(err.to_string().contains("settings"));

        let err = Snapshot::from_responses(Value::Null, json!({}), json!({})).unwrap_err();
        assert!(err.to_string().contains("status"));
    }

    #[test]
    fn test_serializes_three_sections() {
        let snapshot = Snapshot::new(Map::new(), Map::new(), Map::new());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("status").is_some());
        assert!(value.get("settings").is_some());
        assert!(value.get("info").is_some());
        assert!(value.get("fetched_at").is_some());
    }
}
