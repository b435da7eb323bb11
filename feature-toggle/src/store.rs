use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use crate::{
    dataset::{Dataset, FlagValue},
    errors::SourceError,
    evaluation::{EvaluationReason, RawValuePolicy},
    flag_record::FlagRecord,
    source::{FlagSource, SourceUpdate},
};

/// The query side of a flag store.
///
/// `is_enabled` is synchronous, has no visible side effects and is total:
/// unknown keys and malformed records are `false`, never a panic.
pub trait FlagStore: Send + Sync {
    fn is_enabled(&self, key: &str) -> bool;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Holds the current dataset behind a swappable reference. Readers take a
/// clone of the `Arc`, so a refresh is never observed half-applied.
pub struct DatasetStore<V> {
    dataset: RwLock<Arc<Dataset<V>>>,
    clock: Arc<dyn Clock>,
    policy: RawValuePolicy,
}

/// Time-windowed flags.
pub type FeatureStore = DatasetStore<FlagRecord>;

/// Plain key to boolean flags.
pub type BooleanStore = DatasetStore<bool>;

impl<V: FlagValue> Default for DatasetStore<V> {
    fn default() -> Self {
        Self::new(Dataset::default())
    }
}

impl<V: FlagValue> DatasetStore<V> {
    pub fn new(dataset: Dataset<V>) -> Self {
        DatasetStore {
            dataset: RwLock::new(Arc::new(dataset)),
            clock: Arc::new(SystemClock),
            policy: RawValuePolicy::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: RawValuePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The dataset as of this instant. Later refreshes do not affect it.
    pub fn snapshot(&self) -> Arc<Dataset<V>> {
        // A writer only ever swaps the Arc, so a poisoned lock still holds a
        // complete dataset.
        match self.dataset.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the whole dataset at once.
    pub fn refresh(&self, dataset: Dataset<V>) {
        let dataset = Arc::new(dataset);
        let size = dataset.len();
        match self.dataset.write() {
            Ok(mut guard) => *guard = dataset,
            Err(poisoned) => *poisoned.into_inner() = dataset,
        }
        tracing::info!(flags = size, "flag dataset replaced");
    }

    /// Fetches from `source` and swaps in the result. On failure the previous
    /// dataset stays in place.
    #[instrument(skip_all)]
    pub async fn refresh_from(&self, source: &dyn FlagSource) -> Result<SourceUpdate, SourceError> {
        let update = source.fetch().await.map_err(|e| {
            tracing::error!(code = e.error_code(), "failed to fetch flag data: {}", e);
            e
        })?;

        if let SourceUpdate::Replaced(payload) = &update {
            let dataset = Dataset::from_payload(payload.clone()).map_err(|e| {
                tracing::error!(code = e.error_code(), "failed to load flag data: {}", e);
                e
            })?;
            self.refresh(dataset);
        } else {
            tracing::debug!("flag data unchanged");
        }

        Ok(update)
    }
}

impl<V: FlagValue> FlagStore for DatasetStore<V> {
    fn is_enabled(&self, key: &str) -> bool {
        let dataset = self.snapshot();
        V::is_enabled(dataset.get(key), self.clock.now(), self.policy)
    }
}

/// One flag's answer, as reported by `DatasetStore::evaluations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagEvaluation {
    pub key: String,
    pub enabled: bool,
    pub reason: EvaluationReason,
}

impl<V: FlagValue> DatasetStore<V> {
    /// Like `is_enabled`, with the reason behind the answer.
    pub fn explain(&self, key: &str) -> EvaluationReason {
        let dataset = self.snapshot();
        V::explain(dataset.get(key), self.clock.now(), self.policy)
    }

    /// Every known flag evaluated against one snapshot at one instant, in key
    /// order.
    pub fn evaluations(&self) -> Vec<FlagEvaluation> {
        let dataset = self.snapshot();
        let now = self.clock.now();
        dataset
            .sorted_keys()
            .into_iter()
            .map(|key| {
                let reason = V::explain(dataset.get(key), now, self.policy);
                FlagEvaluation {
                    key: key.to_string(),
                    enabled: reason.is_enabled(),
                    reason,
                }
            })
            .collect()
    }

    /// `evaluations` as a JSON array, the report the CLI prints.
    pub fn report(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.evaluations())
    }
}

// The process-wide registration point. Exactly one store is active at a time.
static GLOBAL_STORE: RwLock<Option<Arc<dyn FlagStore>>> = RwLock::new(None);

/// Registers `store` as the process-wide flag store, replacing any previous one.
pub fn set_global_store(store: Arc<dyn FlagStore>) {
    match GLOBAL_STORE.write() {
        Ok(mut guard) => *guard = Some(store),
        Err(poisoned) => *poisoned.into_inner() = Some(store),
    }
}

pub fn clear_global_store() {
    match GLOBAL_STORE.write() {
        Ok(mut guard) => *guard = None,
        Err(poisoned) => *poisoned.into_inner() = None,
    }
}

/// The store registered at this instant, if any.
pub fn global_store() -> Option<Arc<dyn FlagStore>> {
    match GLOBAL_STORE.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}
