use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{
    dataset::FlagValue,
    source::{FlagSource, SourceUpdate},
    store::DatasetStore,
};

// `tokio::time::interval` panics on a zero period.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Refreshes `store` from `source` every `interval`, starting immediately.
///
/// A failed refresh is logged and leaves the current dataset in place; the
/// loop keeps running until the task is aborted.
pub fn spawn_refresh_loop<V: FlagValue>(
    store: Arc<DatasetStore<V>>,
    source: Arc<dyn FlagSource>,
    interval: Duration,
) -> JoinHandle<()> {
    spawn_refresh_loop_with(store, source, interval, |_| {})
}

/// Same as `spawn_refresh_loop`, calling `on_replaced` after every refresh
/// that swapped in a new dataset.
pub fn spawn_refresh_loop_with<V, F>(
    store: Arc<DatasetStore<V>>,
    source: Arc<dyn FlagSource>,
    interval: Duration,
    on_replaced: F,
) -> JoinHandle<()>
where
    V: FlagValue,
    F: Fn(&DatasetStore<V>) + Send + 'static,
{
    let interval = if interval < MIN_INTERVAL {
        tracing::warn!(
            requested_ms = interval.as_millis() as u64,
            "refresh interval too short, using {:?}",
            MIN_INTERVAL
        );
        MIN_INTERVAL
    } else {
        interval
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.refresh_from(source.as_ref()).await {
                Ok(SourceUpdate::Replaced(_)) => on_replaced(&store),
                Ok(SourceUpdate::Unchanged) => {}
                Err(e) => {
                    // refresh_from has already logged the cause
                    tracing::warn!(code = e.error_code(), "flag refresh failed, keeping current flags");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::errors::SourceError;
    use crate::source::MockFlagSource;
    use crate::store::{BooleanStore, FlagStore};

    #[tokio::test(start_paused = true)]
    async fn test_loop_keeps_running_after_failures() {
        let store = Arc::new(BooleanStore::default());
        let source = Arc::new(
            MockFlagSource::new()
                .failing(SourceError::InvalidPayload("boom".to_string()))
                .replaced(json!({"on": true}))
                .unchanged(),
        );

        let handle = spawn_refresh_loop(store.clone(), source.clone(), Duration::from_secs(30));

        // first tick fires immediately and fails
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.fetch_count(), 1);
        assert!(!store.is_enabled("on"));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.fetch_count(), 2);
        assert!(store.is_enabled("on"));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.fetch_count(), 3);
        assert!(store.is_enabled("on"));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        let store = Arc::new(BooleanStore::default());
        let source = Arc::new(
            MockFlagSource::new()
                .replaced(json!({"on": false}))
                .replaced(json!({"on": true})),
        );

        let handle = spawn_refresh_loop(store.clone(), source.clone(), Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(source.fetch_count(), 1);
        assert!(!handle.is_finished());

        tokio::time::sleep(MIN_INTERVAL).await;
        assert_eq!(source.fetch_count(), 2);
        assert!(store.is_enabled("on"));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_only_fires_when_dataset_is_replaced() {
        let store = Arc::new(BooleanStore::default());
        let source = Arc::new(
            MockFlagSource::new()
                .replaced(json!({"a": true}))
                .unchanged()
                .failing(SourceError::InvalidPayload("boom".to_string()))
                .replaced(json!({"a": true, "b": true})),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();

        let handle = spawn_refresh_loop_with(
            store.clone(),
            source.clone(),
            Duration::from_secs(10),
            move |store| recorder.lock().unwrap().push(store.snapshot().len()),
        );

        // Ticks at 0s, 10s, 20s and 30s.
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(source.fetch_count(), 4);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);

        handle.abort();
    }
}
