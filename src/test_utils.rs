//! Shared test utilities for the s3thaw library crate.
//!
//! `MockStorage` is an in-memory object store. Listing is a prefix match over
//! the stored keys in key order, paginated by `max_keys`. A successful restore
//! request flips the object's descriptor to `ongoing-request="true"`.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};
use async_trait::async_trait;

use crate::config::Config;
use crate::storage::{RestoreRequestOutcome, StorageTrait};
use crate::types::{ListingEntry, ListingPage, Operation, RestoreStatistics, RestoreTier};

pub(crate) const ONGOING: &str = r#"ongoing-request="true""#;
pub(crate) const FINISHED: &str =
    r#"ongoing-request="false", expiry-date="Fri, 23 Dec 2022 00:00:00 GMT""#;

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Create a default [`Config`] suitable for most unit / property tests.
///
/// Key defaults: bucket=`"test-bucket"`, `worker_size=4`, no progress file.
pub(crate) fn make_test_config() -> Config {
    let mut config = Config::for_bucket("test-bucket", Operation::Status);
    config.worker_size = 4;
    config
}

#[derive(Default)]
struct MockState {
    objects: Mutex<BTreeMap<String, Option<String>>>,
    failing_list_prefixes: Mutex<HashSet<String>>,
    failing_fetch_keys: Mutex<HashSet<String>>,
    failing_restore_keys: Mutex<HashSet<String>>,
    panicking_keys: Mutex<HashSet<String>>,
    fetch_delay: Mutex<Option<Duration>>,
    list_calls: Mutex<Vec<String>>,
    restore_calls: Mutex<Vec<String>>,
    fetch_calls: AtomicUsize,
}

/// In-memory store with call recorders and failure injection.
#[derive(Clone)]
pub(crate) struct MockStorage {
    state: Arc<MockState>,
    stats_sender: Sender<RestoreStatistics>,
    stats_receiver: Option<Receiver<RestoreStatistics>>,
}

impl MockStorage {
    pub(crate) fn new(stats_sender: Sender<RestoreStatistics>) -> Self {
        Self {
            state: Arc::new(MockState::default()),
            stats_sender,
            stats_receiver: None,
        }
    }

    /// A mock that keeps the receiving end of its own stats channel.
    pub(crate) fn new_with_stats() -> Self {
        let (stats_sender, stats_receiver) = async_channel::unbounded();
        Self {
            stats_receiver: Some(stats_receiver),
            ..Self::new(stats_sender)
        }
    }

    pub(crate) fn stats_receiver(&self) -> Receiver<RestoreStatistics> {
        self.stats_receiver
            .clone()
            .expect("create the mock with MockStorage::new_with_stats()")
    }

    /// Add an object with the given raw descriptor (`None`: no restore yet).
    pub(crate) fn with_object(self, key: &str, descriptor: Option<&str>) -> Self {
        self.state
            .objects
            .lock()
            .unwrap()
            .insert(key.to_string(), descriptor.map(String::from));
        self
    }

    pub(crate) fn with_objects(self, keys: &[&str], descriptor: Option<&str>) -> Self {
        keys.iter()
            .fold(self, |storage, key| storage.with_object(key, descriptor))
    }

    pub(crate) fn fail_listing(self, prefix: &str) -> Self {
        self.state
            .failing_list_prefixes
            .lock()
            .unwrap()
            .insert(prefix.to_string());
        self
    }

    pub(crate) fn fail_fetch(self, key: &str) -> Self {
        self.state
            .failing_fetch_keys
            .lock()
            .unwrap()
            .insert(key.to_string());
        self
    }

    pub(crate) fn fail_restore(self, key: &str) -> Self {
        self.state
            .failing_restore_keys
            .lock()
            .unwrap()
            .insert(key.to_string());
        self
    }

    /// Fetching this key panics, faulting its page task.
    pub(crate) fn panic_on_fetch(self, key: &str) -> Self {
        self.state
            .panicking_keys
            .lock()
            .unwrap()
            .insert(key.to_string());
        self
    }

    /// Every descriptor fetch sleeps for `delay` first.
    pub(crate) fn delay_fetch(self, delay: Duration) -> Self {
        *self.state.fetch_delay.lock().unwrap() = Some(delay);
        self
    }

    pub(crate) fn descriptor(&self, key: &str) -> Option<String> {
        self.state
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .flatten()
    }

    pub(crate) fn list_calls(&self) -> Vec<String> {
        self.state.list_calls.lock().unwrap().clone()
    }

    pub(crate) fn restore_calls(&self) -> Vec<String> {
        self.state.restore_calls.lock().unwrap().clone()
    }

    pub(crate) fn fetch_call_count(&self) -> usize {
        self.state.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn store_call_count(&self) -> usize {
        self.list_calls().len() + self.restore_calls().len() + self.fetch_call_count()
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    async fn list_pages(
        &self,
        prefix: &str,
        item_index: usize,
        sender: &Sender<ListingPage>,
        max_keys: i32,
    ) -> Result<usize> {
        self.state.list_calls.lock().unwrap().push(prefix.to_string());
        if self.state.failing_list_prefixes.lock().unwrap().contains(prefix) {
            return Err(anyhow!("AccessDenied (listing of {prefix} denied)"));
        }

        let keys: Vec<String> = self
            .state
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();

        let mut page_count = 0;
        for (page_index, chunk) in keys.chunks(max_keys.max(1) as usize).enumerate() {
            let page = ListingPage {
                item_index,
                page_index,
                entries: chunk.iter().map(|key| ListingEntry::new(key)).collect(),
            };
            sender.send(page).await?;
            page_count += 1;
        }
        Ok(page_count)
    }

    async fn fetch_restore_descriptor(&self, key: &str) -> Result<Option<String>> {
        self.state.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let fetch_delay = *self.state.fetch_delay.lock().unwrap();
        match fetch_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        if self.state.panicking_keys.lock().unwrap().contains(key) {
            panic!("injected panic while fetching {key}");
        }
        if self.state.failing_fetch_keys.lock().unwrap().contains(key) {
            return Err(anyhow!("SlowDown (please reduce your request rate)"));
        }
        Ok(self.descriptor(key))
    }

    async fn request_restore(
        &self,
        key: &str,
        _days: i32,
        _tier: Option<RestoreTier>,
    ) -> Result<RestoreRequestOutcome> {
        self.state.restore_calls.lock().unwrap().push(key.to_string());
        tokio::task::yield_now().await;

        if self.state.failing_restore_keys.lock().unwrap().contains(key) {
            return Err(anyhow!("InvalidObjectState (object is not archived)"));
        }

        let mut objects = self.state.objects.lock().unwrap();
        let descriptor = objects.entry(key.to_string()).or_default();
        if descriptor.as_deref() == Some(ONGOING) {
            return Ok(RestoreRequestOutcome::AlreadyInProgress);
        }
        *descriptor = Some(ONGOING.to_string());
        Ok(RestoreRequestOutcome::Accepted)
    }

    fn get_stats_sender(&self) -> Sender<RestoreStatistics> {
        self.stats_sender.clone()
    }

    async fn send_stats(&self, stats: RestoreStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}
