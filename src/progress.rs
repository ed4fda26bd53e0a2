//! Result storage with TTL.
//!
//! Results are immutable once written and expire after `result_ttl_s`
//! (24 hours by default). Expired entries disappear on read; a periodic
//! sweep keeps the map from accumulating dead weight between reads.
//! Phase/percent progress itself is published through the job queue, so
//! this store only holds finished results.

use crate::error::CaseStrainerError;
use crate::format::AnalysisResult;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

struct StoredResult {
    stored_at: DateTime<Utc>,
    result: AnalysisResult,
}

/// Single-writer result store keyed by `result_id`.
pub struct ResultStore {
    ttl: Duration,
    inner: Mutex<HashMap<String, StoredResult>>,
}

impl ResultStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredResult>>, CaseStrainerError> {
        self.inner
            .lock()
            .map_err(|_| CaseStrainerError::StoreUnavailable("result store lock poisoned".into()))
    }

    fn expired(&self, stored_at: DateTime<Utc>) -> bool {
        let age = Utc::now().signed_duration_since(stored_at);
        age.to_std().is_ok_and(|age| age > self.ttl)
    }

    /// Store a result and return its fresh id.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` when the store lock is poisoned.
    pub fn put(&self, result: AnalysisResult) -> Result<String, CaseStrainerError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.lock()?.insert(
            id.clone(),
            StoredResult {
                stored_at: Utc::now(),
                result,
            },
        );
        Ok(id)
    }

    /// Fetch a result; expired entries are evicted and read as absent.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` when the store lock is poisoned.
    pub fn get(&self, id: &str) -> Result<Option<AnalysisResult>, CaseStrainerError> {
        let mut inner = self.lock()?;
        match inner.get(id) {
            Some(stored) if self.expired(stored.stored_at) => {
                inner.remove(id);
                Ok(None)
            }
            Some(stored) => Ok(Some(stored.result.clone())),
            None => Ok(None),
        }
    }

    /// Drop every expired entry; returns how many were evicted.
    pub fn sweep(&self) -> Result<usize, CaseStrainerError> {
        let mut inner = self.lock()?;
        let before = inner.len();
        inner.retain(|_, stored| {
            let age = Utc::now().signed_duration_since(stored.stored_at);
            !age.to_std().is_ok_and(|age| age > self.ttl)
        });
        let evicted = before - inner.len();
        if evicted > 0 {
            debug!(evicted, "result store sweep");
        }
        Ok(evicted)
    }
}
