//! Shared integration test infrastructure for s3thaw-rs.
//!
//! `InMemoryStore` implements the public `StorageTrait` over a key map, so
//! whole runs can be driven through `RestorePipeline` without AWS access.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use s3thaw_rs::config::args::build_config_from_args;
use s3thaw_rs::types::{ListingEntry, ListingPage, RestoreTier};
use s3thaw_rs::{
    Config, Operation, RestorePipeline, RestoreRequestOutcome, RestoreStatistics, RestoreTotals,
    StorageTrait, Verdict, create_pipeline_cancellation_token,
};
use tempfile::TempDir;

pub const ONGOING: &str = r#"ongoing-request="true""#;
pub const FINISHED: &str =
    r#"ongoing-request="false", expiry-date="Wed, 01 Jan 2031 00:00:00 GMT""#;

/// A restore request as the store received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreRequest {
    pub key: String,
    pub days: i32,
    pub tier: Option<RestoreTier>,
}

#[derive(Default)]
struct StoreState {
    objects: BTreeMap<String, Option<String>>,
    requests: Vec<RestoreRequest>,
    denied_prefixes: Vec<String>,
}

/// In-memory object store. A restore request starts a restore; call
/// [`InMemoryStore::finish_restores`] to complete every running one.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    stats_sender: Sender<RestoreStatistics>,
}

impl InMemoryStore {
    pub fn new(keys: &[(&str, Option<&str>)]) -> Self {
        let (stats_sender, _) = async_channel::unbounded();
        let store = Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            stats_sender,
        };
        {
            let mut state = store.state.lock().unwrap();
            for (key, descriptor) in keys {
                state
                    .objects
                    .insert(key.to_string(), descriptor.map(String::from));
            }
        }
        store
    }

    pub fn deny_listing(&self, prefix: &str) {
        self.state
            .lock()
            .unwrap()
            .denied_prefixes
            .push(prefix.to_string());
    }

    pub fn finish_restores(&self) {
        for descriptor in self.state.lock().unwrap().objects.values_mut() {
            if descriptor.as_deref() == Some(ONGOING) {
                *descriptor = Some(FINISHED.to_string());
            }
        }
    }

    pub fn requests(&self) -> Vec<RestoreRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// A copy sharing the object map but reporting to a fresh stats channel.
    fn with_stats_channel(&self) -> (Self, Receiver<RestoreStatistics>) {
        let (stats_sender, stats_receiver) = async_channel::unbounded();
        (
            Self {
                state: self.state.clone(),
                stats_sender,
            },
            stats_receiver,
        )
    }
}

#[async_trait]
impl StorageTrait for InMemoryStore {
    async fn list_pages(
        &self,
        prefix: &str,
        item_index: usize,
        sender: &Sender<ListingPage>,
        max_keys: i32,
    ) -> Result<usize> {
        let keys: Vec<String> = {
            let state = self.state.lock().unwrap();
            if state.denied_prefixes.iter().any(|denied| denied == prefix) {
                return Err(anyhow!("AccessDenied: listing {prefix} is not allowed"));
            }
            state
                .objects
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect()
        };

        let mut page_count = 0;
        for (page_index, chunk) in keys.chunks(max_keys.max(1) as usize).enumerate() {
            sender
                .send(ListingPage {
                    item_index,
                    page_index,
                    entries: chunk.iter().map(|key| ListingEntry::new(key)).collect(),
                })
                .await?;
            page_count += 1;
        }
        Ok(page_count)
    }

    async fn fetch_restore_descriptor(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .objects
            .get(key)
            .cloned()
            .flatten())
    }

    async fn request_restore(
        &self,
        key: &str,
        days: i32,
        tier: Option<RestoreTier>,
    ) -> Result<RestoreRequestOutcome> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(RestoreRequest {
            key: key.to_string(),
            days,
            tier,
        });
        let descriptor = state.objects.entry(key.to_string()).or_default();
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

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct RunResult {
    pub totals: Option<RestoreTotals>,
    pub verdict: Option<Verdict>,
    pub has_error: bool,
    pub has_warning: bool,
    pub errors: Vec<anyhow::Error>,
}

/// A work list file plus a scratch directory for the progress file.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new(work_list: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("folders.csv")).unwrap();
        for line in work_list {
            writeln!(file, "{line}").unwrap();
        }
        Self { dir }
    }

    pub fn work_list(&self) -> std::path::PathBuf {
        self.dir.path().join("folders.csv")
    }

    pub fn progress_file(&self) -> std::path::PathBuf {
        self.dir.path().join("folders.csv.restoreInProgress.csv")
    }

    /// Build a config through the CLI parser, as the binary does.
    pub fn config(&self, operation: Operation, extra_args: &[&str]) -> Config {
        let work_list = self.work_list();
        let mut args = vec![
            "s3thaw".to_string(),
            operation.to_string(),
            "--bucket".to_string(),
            "archive-bucket".to_string(),
            "--work-list".to_string(),
            work_list.display().to_string(),
        ];
        args.extend(extra_args.iter().map(|arg| arg.to_string()));
        build_config_from_args(args).unwrap()
    }
}

pub async fn run(config: Config, store: &InMemoryStore) -> RunResult {
    let (store, stats_receiver) = store.with_stats_channel();
    let mut pipeline = RestorePipeline::with_storage(
        config,
        Box::new(store),
        stats_receiver,
        create_pipeline_cancellation_token(),
    );
    pipeline.run().await;

    RunResult {
        totals: pipeline.get_totals().cloned(),
        verdict: pipeline.verdict(),
        has_error: pipeline.has_error(),
        has_warning: pipeline.has_warning(),
        errors: pipeline.get_errors_and_consume().unwrap_or_default(),
    }
}

pub fn read_progress_file(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}
