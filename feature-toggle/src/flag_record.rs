use serde::{Deserialize, Deserializer, Serialize};

/// One feature's stored state, as delivered by a flag source.
///
/// Wire names follow the flag API (`value`, `activeAt`, `disabledAt`), and the
/// capitalised spellings some backends emit are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FlagRecord {
    #[serde(alias = "Key", default)]
    key: String,
    /// Kept as text; booleans on the wire are normalised to "true"/"false".
    #[serde(
        rename = "value",
        alias = "Value",
        default,
        deserialize_with = "deserialize_raw_value"
    )]
    pub raw_value: String,
    #[serde(
        rename = "activeAt",
        alias = "ActiveAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub active_at: Option<String>,
    #[serde(
        rename = "disabledAt",
        alias = "DisabledAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub disabled_at: Option<String>,
    #[serde(alias = "Tags", default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
}

impl FlagRecord {
    pub fn new(key: impl Into<String>, raw_value: impl Into<String>) -> Self {
        FlagRecord {
            key: key.into(),
            raw_value: raw_value.into(),
            active_at: None,
            disabled_at: None,
            tags: Vec::new(),
        }
    }

    pub fn with_active_at(mut self, active_at: impl Into<String>) -> Self {
        self.active_at = Some(active_at.into());
        self
    }

    pub fn with_disabled_at(mut self, disabled_at: impl Into<String>) -> Self {
        self.disabled_at = Some(disabled_at.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// In the keyed payload shape the map key is authoritative, whether the
    /// entry omits its own key or disagrees with it. Only called while a
    /// dataset is being parsed.
    pub(crate) fn assign_key(&mut self, key: &str) {
        if self.key != key {
            self.key = key.to_string();
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Flag(bool),
}

fn deserialize_raw_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawValue>::deserialize(deserializer)? {
        Some(RawValue::Text(text)) => text,
        Some(RawValue::Flag(flag)) => flag.to_string(),
        None => String::new(),
    })
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
