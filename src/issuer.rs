use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::classifier::{Classification, NOTE_RESTORE_REQUEST_FAILED, classify};
use crate::config::Config;
use crate::storage::Storage;
use crate::types::{RestoreState, RestoreStatistics, RestoreTier};

const NOTE_ALREADY_ISSUED: &str = "restore already requested earlier in this run";

/// Issues restore requests, at most once per key per run.
///
/// The issued-key ledger is shared by every page worker, so a key listed
/// under two overlapping work items is only requested once. A failed request
/// is never sent again in the same run; throttling retries stay inside the
/// AWS SDK retry config.
pub struct RestoreIssuer {
    target: Storage,
    restore_days: i32,
    restore_tier: Option<RestoreTier>,
    has_warning: Arc<AtomicBool>,
    issued_keys: Mutex<HashSet<String>>,
}

impl RestoreIssuer {
    pub fn new(target: Storage, config: &Config, has_warning: Arc<AtomicBool>) -> Arc<Self> {
        Arc::new(Self {
            target,
            restore_days: config.restore_days,
            restore_tier: config.restore_tier,
            has_warning,
            issued_keys: Mutex::new(HashSet::new()),
        })
    }

    /// Request a restore of `key`, then re-read and re-classify it.
    ///
    /// Never fails: request and fetch errors end up in the returned note.
    pub async fn issue(&self, key: &str) -> Classification {
        if !self.claim(key) {
            debug!(key = key, "restore has already been requested in this run.");
            return match self.target.fetch_restore_descriptor(key).await {
                Ok(descriptor) => classify(key, descriptor.as_deref(), false)
                    .with_note(NOTE_ALREADY_ISSUED.to_string()),
                Err(e) => Classification::fetch_failed(&e),
            };
        }

        let request_result = self
            .target
            .request_restore(key, self.restore_days, self.restore_tier)
            .await;

        let request_error = match request_result {
            Ok(outcome) => {
                debug!(key = key, outcome = ?outcome, "restore requested.");
                self.target
                    .send_stats(RestoreStatistics::RestoreRequested {
                        key: key.to_string(),
                    })
                    .await;
                None
            }
            Err(e) => {
                warn!(key = key, "restore request failed: {e:#}");
                self.has_warning.store(true, Ordering::SeqCst);
                self.target
                    .send_stats(RestoreStatistics::RestoreError {
                        key: key.to_string(),
                    })
                    .await;
                Some(e)
            }
        };

        match (self.target.fetch_restore_descriptor(key).await, request_error) {
            (Ok(descriptor), None) => classify(key, descriptor.as_deref(), true),
            (Ok(descriptor), Some(e)) => {
                classify(key, descriptor.as_deref(), true).with_note(format!("{e:#}"))
            }
            (Err(e), None) => Classification::fetch_failed(&e),
            (Err(_), Some(e)) => Classification::new(
                RestoreState::NotRequested,
                Some(format!("{NOTE_RESTORE_REQUEST_FAILED}: {e:#}")),
            ),
        }
    }

    /// Number of keys a restore has been requested for in this run.
    pub fn issued_count(&self) -> usize {
        self.issued_keys
            .lock()
            .map(|issued_keys| issued_keys.len())
            .unwrap_or_default()
    }

    fn claim(&self, key: &str) -> bool {
        match self.issued_keys.lock() {
            Ok(mut issued_keys) => issued_keys.insert(key.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(key.to_string()),
        }
    }
}
