use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{
    errors::SourceError,
    evaluation::{self, EvaluationReason, RawValuePolicy},
    flag_record::FlagRecord,
};

// Flag APIs wrap the listed shape in one of these fields.
const LISTING_FIELDS: [&str; 2] = ["toggles", "value"];

/// A value a flag store can hold for one key.
pub trait FlagValue: Sized + Send + Sync + 'static {
    /// Builds a value from an entry of the keyed shape, `{"<key>": <entry>}`.
    fn from_keyed(key: &str, entry: Value) -> Option<Self>;

    /// Builds a key and value from an entry of the listed shape, `[<entry>]`.
    fn from_listed(entry: Value) -> Option<(String, Self)>;

    /// Why the flag is on or off. `None` means the key is unknown.
    fn explain(value: Option<&Self>, now: DateTime<Utc>, policy: RawValuePolicy) -> EvaluationReason;

    fn is_enabled(value: Option<&Self>, now: DateTime<Utc>, policy: RawValuePolicy) -> bool {
        Self::explain(value, now, policy).is_enabled()
    }
}

impl FlagValue for FlagRecord {
    fn from_keyed(key: &str, entry: Value) -> Option<Self> {
        let mut record: FlagRecord = serde_json::from_value(entry).ok()?;
        if !record.key().is_empty() && record.key() != key {
            tracing::debug!(
                key,
                inner_key = record.key(),
                "flag entry key differs from its map key"
            );
        }
        record.assign_key(key);
        Some(record)
    }

    fn from_listed(entry: Value) -> Option<(String, Self)> {
        let record: FlagRecord = serde_json::from_value(entry).ok()?;
        if record.key().is_empty() {
            return None;
        }
        Some((record.key().to_string(), record))
    }

    fn explain(value: Option<&Self>, now: DateTime<Utc>, policy: RawValuePolicy) -> EvaluationReason {
        evaluation::explain(value, now, policy)
    }
}

impl FlagValue for bool {
    fn from_keyed(_key: &str, entry: Value) -> Option<Self> {
        match entry {
            Value::Bool(flag) => Some(flag),
            Value::String(text) if text == "true" => Some(true),
            Value::String(text) if text == "false" => Some(false),
            _ => None,
        }
    }

    fn from_listed(entry: Value) -> Option<(String, Self)> {
        let Value::Object(mut fields) = entry else {
            return None;
        };
        let key = match take_field(&mut fields, "key", "Key") {
            Some(Value::String(key)) if !key.is_empty() => key,
            _ => return None,
        };
        let enabled = match take_field(&mut fields, "value", "Value") {
            Some(Value::Bool(flag)) => flag,
            Some(Value::String(text)) => text == "true",
            _ => false,
        };
        Some((key, enabled))
    }

    fn explain(value: Option<&Self>, _now: DateTime<Utc>, _policy: RawValuePolicy) -> EvaluationReason {
        match value {
            None => EvaluationReason::UnknownFlag,
            Some(true) => EvaluationReason::Enabled,
            Some(false) => EvaluationReason::RawValueFalse,
        }
    }

    fn is_enabled(value: Option<&Self>, _now: DateTime<Utc>, _policy: RawValuePolicy) -> bool {
        evaluation::evaluate_boolean(value.copied())
    }
}

fn take_field(fields: &mut Map<String, Value>, name: &str, alias: &str) -> Option<Value> {
    fields.remove(name).or_else(|| fields.remove(alias))
}

/// An immutable key to value mapping. Keys are unique; when a payload repeats
/// a key the last entry wins.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<V> {
    entries: HashMap<String, V>,
}

impl<V> Default for Dataset<V> {
    fn default() -> Self {
        Dataset {
            entries: HashMap::new(),
        }
    }
}

impl<V> FromIterator<(String, V)> for Dataset<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Dataset {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<V> Dataset<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in lexical order.
    pub fn sorted_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl<V: FlagValue> Dataset<V> {
    /// Parses either payload shape. Malformed entries are dropped; only a
    /// payload that is neither an object nor an array is an error.
    pub fn from_payload(payload: Value) -> Result<Self, SourceError> {
        match payload {
            Value::Array(entries) => Ok(Self::from_listing(entries)),
            Value::Object(mut fields) => {
                for field in LISTING_FIELDS {
                    if let Some(Value::Array(_)) = fields.get(field) {
                        if let Some(Value::Array(entries)) = fields.remove(field) {
                            return Ok(Self::from_listing(entries));
                        }
                    }
                }
                Ok(Self::from_keyed_map(fields))
            }
            other => Err(SourceError::InvalidPayload(format!(
                "expected an object or an array, got {}",
                json_kind(&other)
            ))),
        }
    }

    fn from_listing(entries: Vec<Value>) -> Self {
        let total = entries.len();
        let dataset: Self = entries.into_iter().filter_map(V::from_listed).collect();
        if dataset.len() < total {
            tracing::debug!(
                dropped = total - dataset.len(),
                "dropped malformed or duplicate flag entries"
            );
        }
        dataset
    }

    fn from_keyed_map(fields: Map<String, Value>) -> Self {
        fields
            .into_iter()
            .filter_map(|(key, entry)| match V::from_keyed(&key, entry) {
                Some(value) => Some((key, value)),
                None => {
                    tracing::debug!(key = %key, "dropped malformed flag entry");
                    None
                }
            })
            .collect()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
