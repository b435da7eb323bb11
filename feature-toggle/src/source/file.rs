use std::path::PathBuf;

use async_trait::async_trait;
use tracing::instrument;

use super::{FlagSource, SourceUpdate};
use crate::errors::SourceError;

/// Reads a JSON flag file from disk on every fetch.
#[derive(Debug, Clone)]
pub struct FileFlagSource {
    path: PathBuf,
}

impl FileFlagSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileFlagSource { path: path.into() }
    }
}

#[async_trait]
impl FlagSource for FileFlagSource {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn fetch(&self) -> Result<SourceUpdate, SourceError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        tracing::debug!(len = contents.len(), "read flag file");
        let payload = serde_json::from_str(&contents)?;
        Ok(SourceUpdate::Replaced(payload))
    }
}
