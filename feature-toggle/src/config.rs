use std::num::NonZeroU64;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;

use envconfig::Envconfig;

use crate::evaluation::RawValuePolicy;

/// Boolean env var accepting the usual spellings (`true`, `1`, `yes`, `on`
/// and their opposites).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlexBool(pub bool);

impl FromStr for FlexBool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(FlexBool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(FlexBool(false)),
            _ => Err(format!("Invalid boolean value: {}", s)),
        }
    }
}

impl From<FlexBool> for bool {
    fn from(flex: FlexBool) -> Self {
        flex.0
    }
}

impl Deref for FlexBool {
    type Target = bool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Where flag data is loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Http,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(SourceKind::File),
            "http" | "api" => Ok(SourceKind::Http),
            other => Err(format!("Invalid flag source: {}", other)),
        }
    }
}

/// Which flag representation the loaded data uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    /// Time-windowed flag records.
    Feature,
    /// Plain key to boolean flags.
    Boolean,
}

impl FromStr for FlagKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "feature" => Ok(FlagKind::Feature),
            "boolean" | "bool" => Ok(FlagKind::Boolean),
            other => Err(format!("Invalid flag kind: {}", other)),
        }
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "file")]
    pub flags_source: SourceKind,

    #[envconfig(default = "flags.json")]
    pub flags_file: String,

    #[envconfig(default = "feature")]
    pub flags_kind: FlagKind,

    #[envconfig(default = "")]
    pub api_url: String,

    #[envconfig(default = "")]
    pub base_uuid: String,

    #[envconfig(default = "30")]
    pub refresh_interval_secs: NonZeroU64,

    #[envconfig(default = "2000")]
    pub http_timeout_ms: u64,

    #[envconfig(default = "text")]
    pub raw_value_policy: RawValuePolicy,

    #[envconfig(default = "false")]
    pub watch: FlexBool,

    #[envconfig(default = "false")]
    pub debug: FlexBool,
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.get())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();
        assert_eq!(config.flags_source, SourceKind::File);
        assert_eq!(config.flags_file, "flags.json");
        assert_eq!(config.flags_kind, FlagKind::Feature);
        assert_eq!(config.api_url, "");
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.http_timeout(), Duration::from_millis(2000));
        assert_eq!(config.raw_value_policy, RawValuePolicy::Text);
        assert_eq!(config.watch, FlexBool(false));
        assert_eq!(config.debug, FlexBool(false));
    }

    #[test]
    fn test_http_config_from_env_map() {
        let env: HashMap<String, String> = [
            ("FLAGS_SOURCE", "http"),
            ("FLAGS_KIND", "boolean"),
            ("API_URL", "http://flags.local/api"),
            ("BASE_UUID", "base-1"),
            ("RAW_VALUE_POLICY", "json"),
            ("WATCH", "yes"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = Config::init_from_hashmap(&env).unwrap();
        assert_eq!(config.flags_source, SourceKind::Http);
        assert_eq!(config.flags_kind, FlagKind::Boolean);
        assert_eq!(config.api_url, "http://flags.local/api");
        assert_eq!(config.base_uuid, "base-1");
        assert_eq!(config.raw_value_policy, RawValuePolicy::JsonLiteral);
        assert!(*config.watch);
    }

    #[rstest]
    #[case("0")]
    #[case("-5")]
    #[case("soon")]
    fn test_invalid_refresh_interval_is_rejected(#[case] raw: &str) {
        let env = HashMap::from([("REFRESH_INTERVAL_SECS".to_string(), raw.to_string())]);
        assert!(Config::init_from_hashmap(&env).is_err());
    }

    #[test]
    fn test_invalid_source_is_rejected() {
        let env = HashMap::from([("FLAGS_SOURCE".to_string(), "redis".to_string())]);
        assert!(Config::init_from_hashmap(&env).is_err());
    }

    #[rstest]
    #[case("true", true)]
    #[case("1", true)]
    #[case(" ON ", true)]
    #[case("no", false)]
    #[case("", false)]
    fn test_flex_bool(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(raw.parse::<FlexBool>(), Ok(FlexBool(expected)));
    }

    #[test]
    fn test_flex_bool_rejects_garbage() {
        assert!("maybe".parse::<FlexBool>().is_err());
    }
}
