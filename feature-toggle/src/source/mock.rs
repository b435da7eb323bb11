use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::{FlagSource, SourceUpdate};
use crate::errors::SourceError;

/// Replays queued fetch results in order, then fails with `Exhausted`.
#[derive(Default)]
pub struct MockFlagSource {
    responses: Mutex<VecDeque<Result<SourceUpdate, SourceError>>>,
    fetches: AtomicUsize,
}

impl MockFlagSource {
    pub fn new() -> MockFlagSource {
        MockFlagSource::default()
    }

    pub fn replaced(self, payload: Value) -> Self {
        self.push(Ok(SourceUpdate::Replaced(payload)))
    }

    pub fn unchanged(self) -> Self {
        self.push(Ok(SourceUpdate::Unchanged))
    }

    pub fn failing(self, error: SourceError) -> Self {
        self.push(Err(error))
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn push(self, response: Result<SourceUpdate, SourceError>) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
        self
    }
}

#[async_trait]
impl FlagSource for MockFlagSource {
    async fn fetch(&self) -> Result<SourceUpdate, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::Exhausted))
    }
}
