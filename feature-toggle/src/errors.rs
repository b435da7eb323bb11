use thiserror::Error;

/// Raised while resolving a toggled declaration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToggleError {
    /// No flag store has been registered for the process. This is a
    /// programming error and must abort building the declaration.
    #[error("toggle provider not set")]
    ProviderNotSet,
}

/// Raised by flag sources and by store refreshes. Never reaches
/// `FlagStore::is_enabled`.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read flag data: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse flag data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("flag api request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("flag api returned status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("unexpected flag payload: {0}")]
    InvalidPayload(String),
    #[error("mock source has no queued responses")]
    Exhausted,
}

impl SourceError {
    /// Short code used in log lines.
    pub fn error_code(&self) -> &'static str {
        match self {
            SourceError::Io(_) => "io_error",
            SourceError::Parse(_) => "parse_error",
            SourceError::Http(_) => "http_error",
            SourceError::Status { .. } => "unexpected_status",
            SourceError::InvalidPayload(_) => "invalid_payload",
            SourceError::Exhausted => "exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_not_set_message() {
        assert_eq!(
            ToggleError::ProviderNotSet.to_string(),
            "toggle provider not set"
        );
    }

    #[test]
    fn test_source_error_codes() {
        let err = SourceError::Status {
            status: 503,
            url: "http://localhost/features/abc".to_string(),
        };
        assert_eq!(err.error_code(), "unexpected_status");
        assert_eq!(
            err.to_string(),
            "flag api returned status 503 for http://localhost/features/abc"
        );

        let err: SourceError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.error_code(), "parse_error");
    }
}
