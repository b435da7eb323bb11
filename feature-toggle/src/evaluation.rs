use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::flag_record::FlagRecord;

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// How a record's raw value text is turned into a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RawValuePolicy {
    /// Exactly "true" is enabled, anything else is disabled.
    #[default]
    Text,
    /// The raw value is parsed as a JSON boolean literal. Parse failures are
    /// disabled rather than surfaced.
    JsonLiteral,
}

impl RawValuePolicy {
    pub fn is_truthy(&self, raw_value: &str) -> bool {
        match self {
            RawValuePolicy::Text => raw_value == "true",
            RawValuePolicy::JsonLiteral => serde_json::from_str::<bool>(raw_value).unwrap_or(false),
        }
    }
}

impl FromStr for RawValuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(RawValuePolicy::Text),
            "json" | "json_literal" => Ok(RawValuePolicy::JsonLiteral),
            other => Err(format!("Invalid raw value policy: {}", other)),
        }
    }
}

/// Why a flag evaluated the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationReason {
    UnknownFlag,
    Deactivated,
    NotYetActive,
    RawValueFalse,
    Enabled,
}

impl EvaluationReason {
    pub fn is_enabled(&self) -> bool {
        matches!(self, EvaluationReason::Enabled)
    }
}

impl std::fmt::Display for EvaluationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                EvaluationReason::UnknownFlag => "unknown_flag",
                EvaluationReason::Deactivated => "deactivated",
                EvaluationReason::NotYetActive => "not_yet_active",
                EvaluationReason::RawValueFalse => "raw_value_false",
                EvaluationReason::Enabled => "enabled",
            }
        )
    }
}

/// Evaluates a record at `now`.
///
/// The activation window is `[activeAt, disabledAt)`. A deactivation that is
/// in effect wins, then a pending activation, and only then is the raw value
/// consulted. Missing, empty and unparseable timestamps are constraints that
/// are not in effect. Never panics.
pub fn evaluate(record: Option<&FlagRecord>, now: DateTime<Utc>, policy: RawValuePolicy) -> bool {
    explain(record, now, policy).is_enabled()
}

pub fn explain(
    record: Option<&FlagRecord>,
    now: DateTime<Utc>,
    policy: RawValuePolicy,
) -> EvaluationReason {
    let Some(record) = record else {
        return EvaluationReason::UnknownFlag;
    };

    if let Some(disabled_at) = constraint(record, "disabledAt", record.disabled_at.as_deref()) {
        if disabled_at <= now {
            return EvaluationReason::Deactivated;
        }
    }

    // Strict: a flag activating in the future is off no matter its raw value.
    if let Some(active_at) = constraint(record, "activeAt", record.active_at.as_deref()) {
        if active_at > now {
            return EvaluationReason::NotYetActive;
        }
    }

    if policy.is_truthy(&record.raw_value) {
        EvaluationReason::Enabled
    } else {
        EvaluationReason::RawValueFalse
    }
}

/// Boolean flags have no time dimension: absent is off, present passes through.
pub fn evaluate_boolean(value: Option<bool>) -> bool {
    value.unwrap_or(false)
}

fn constraint(record: &FlagRecord, field: &str, text: Option<&str>) -> Option<DateTime<Utc>> {
    let text = text?;
    if text.trim().is_empty() {
        return None;
    }
    let parsed = parse_timestamp(text);
    if parsed.is_none() {
        tracing::debug!(key = record.key(), field, value = text, "ignoring unparseable timestamp");
    }
    parsed
}

/// Parses ISO-8601 text. Offsets are honoured; naive date-times and bare dates
/// are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
