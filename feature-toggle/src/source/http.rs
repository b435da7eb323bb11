use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use super::{FlagSource, SourceUpdate};
use crate::errors::SourceError;

/// Fetches flags from a flag API.
///
/// Each fetch first asks `{api_url}/collectionHash/{base_uuid}` for the
/// collection hash. The features listing at `{api_url}/features/{base_uuid}`
/// is only downloaded when the hash differs from the last one seen, or when
/// the API does not report a hash at all.
pub struct HttpFlagSource {
    client: reqwest::Client,
    api_url: String,
    base_uuid: String,
    collection_hash: Mutex<Option<String>>,
}

impl HttpFlagSource {
    pub fn new(
        api_url: impl Into<String>,
        base_uuid: impl Into<String>,
        timeout: Duration,
    ) -> Result<HttpFlagSource, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let api_url: String = api_url.into();

        Ok(HttpFlagSource {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            base_uuid: base_uuid.into(),
            collection_hash: Mutex::new(None),
        })
    }

    pub fn collection_hash_url(&self) -> String {
        format!("{}/collectionHash/{}", self.api_url, self.base_uuid)
    }

    pub fn features_url(&self) -> String {
        format!("{}/features/{}", self.api_url, self.base_uuid)
    }

    /// The hash of the last collection that was downloaded.
    pub fn last_collection_hash(&self) -> Option<String> {
        self.collection_hash
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn get_json(&self, url: &str) -> Result<Value, SourceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl FlagSource for HttpFlagSource {
    #[instrument(skip_all, fields(base_uuid = %self.base_uuid))]
    async fn fetch(&self) -> Result<SourceUpdate, SourceError> {
        let body = self.get_json(&self.collection_hash_url()).await?;
        let hash = collection_hash(&body);

        if hash.is_some() && hash == self.last_collection_hash() {
            tracing::debug!("collection hash unchanged");
            return Ok(SourceUpdate::Unchanged);
        }

        let payload = self.get_json(&self.features_url()).await?;
        // Only remember the hash once its collection has actually been fetched.
        *self
            .collection_hash
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = hash;

        Ok(SourceUpdate::Replaced(payload))
    }
}

// The hash is reported as `collectionHash`, or as `value` by some backends.
fn collection_hash(body: &Value) -> Option<String> {
    let raw = body
        .get("collectionHash")
        .filter(|v| !is_blank(v))
        .or_else(|| body.get("value").filter(|v| !is_blank(v)))?;

    match raw {
        Value::String(hash) => Some(hash.clone()),
        other => Some(other.to_string()),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}
