use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single provider record.
///
/// Records are free-form JSON objects; adapters decide which fields they
/// carry. Provider identity must never be written into a record, since
/// records pass the masking boundary unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Wraps a JSON value; objects become records, anything else is kept
    /// under a single `value` field.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            other => Self::new().with_field("value", other),
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_values_are_wrapped() {
        let record = Record::from_value(json!("+15550100"));
        assert_eq!(record.get("value"), Some(&json!("+15550100")));
    }

    #[test]
    fn record_serializes_as_plain_object() {
        let record = Record::new().with_field("name", "Jane Doe").with_field("age", 41);
        let json = serde_json::to_value(&record).expect("serializable");
        assert_eq!(json, json!({"name": "Jane Doe", "age": 41}));
    }
}
