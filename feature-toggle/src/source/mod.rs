use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SourceError;

pub mod file;
pub mod http;
pub mod mock;

pub use file::FileFlagSource;
pub use http::HttpFlagSource;
pub use mock::MockFlagSource;

/// Outcome of one fetch from a flag source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceUpdate {
    /// A new raw payload to parse and swap in.
    Replaced(Value),
    /// The source knows its data has not changed since the last fetch.
    Unchanged,
}

/// Where flag datasets come from. Stores only see the raw JSON payload;
/// shape handling lives in `Dataset::from_payload`.
#[async_trait]
pub trait FlagSource: Send + Sync {
    async fn fetch(&self) -> Result<SourceUpdate, SourceError>;
}
