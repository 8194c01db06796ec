//! Restore reconciliation pipeline orchestrator.
//!
//! Creates and connects the stages: List → Page workers → Aggregate.
//!
//! Listing pages flow through a bounded channel (capacity = worker count) so
//! listing overlaps processing. `worker_size` page workers share it (MPMC).
//! Every page summary goes to a single aggregator task, the only writer of
//! the run totals.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::aggregator::{Aggregator, AggregatorEvent};
use crate::config::Config;
use crate::issuer::RestoreIssuer;
use crate::lister::ObjectLister;
use crate::reporter::{Reporter, RunContext};
use crate::stage::Stage;
use crate::storage::{self, Storage};
use crate::summary::{RestoreTotals, Verdict};
use crate::types::error::S3thawError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{ListingPage, RestoreStatistics};
use crate::work_list::{WorkItem, read_work_list};
use crate::worker::PageWorker;

/// The restore reconciliation pipeline.
///
/// ```text
/// ObjectLister → PageWorker × worker_size (MPMC) → Aggregator
/// ```
///
/// ## Usage
///
/// ```no_run
/// # async fn example() {
/// # use s3thaw_rs::{Config, RestorePipeline, create_pipeline_cancellation_token};
/// # let config: Config = todo!();
/// let cancellation_token = create_pipeline_cancellation_token();
/// let mut pipeline = RestorePipeline::new(config, cancellation_token).await;
/// pipeline.close_stats_sender();
/// pipeline.run().await;
/// if pipeline.has_error() {
///     eprintln!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
/// } else if let Some(verdict) = pipeline.verdict() {
///     println!("{verdict}");
/// }
/// # }
/// ```
pub struct RestorePipeline {
    config: Config,
    target: Storage,
    cancellation_token: PipelineCancellationToken,
    stats_receiver: Receiver<RestoreStatistics>,
    has_error: Arc<AtomicBool>,
    has_panic: Arc<AtomicBool>,
    has_warning: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<anyhow::Error>>>,
    ready: bool,
    totals: Option<RestoreTotals>,
}

impl RestorePipeline {
    /// Create a pipeline backed by S3.
    pub async fn new(config: Config, cancellation_token: PipelineCancellationToken) -> Self {
        let (stats_sender, stats_receiver) = async_channel::unbounded();

        let target =
            storage::create_storage(config.clone(), cancellation_token.clone(), stats_sender)
                .await;

        Self::build(config, target, stats_receiver, cancellation_token)
    }

    /// Create a pipeline over any [`StorageTrait`](crate::storage::StorageTrait)
    /// implementation. `stats_receiver` must be the receiving end of the
    /// storage's stats channel.
    pub fn with_storage(
        config: Config,
        target: Storage,
        stats_receiver: Receiver<RestoreStatistics>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self::build(config, target, stats_receiver, cancellation_token)
    }

    fn build(
        config: Config,
        target: Storage,
        stats_receiver: Receiver<RestoreStatistics>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            config,
            target,
            cancellation_token,
            stats_receiver,
            has_error: Arc::new(AtomicBool::new(false)),
            has_panic: Arc::new(AtomicBool::new(false)),
            has_warning: Arc::new(AtomicBool::new(false)),
            errors: Arc::new(Mutex::new(VecDeque::new())),
            ready: true,
            totals: None,
        }
    }

    /// Run the pipeline.
    ///
    /// 1. Read the work list
    /// 2. Execute the stages (list → process pages → aggregate)
    /// 3. Shutdown
    pub async fn run(&mut self) {
        assert!(self.ready, "RestorePipeline::run() called more than once");
        self.ready = false;

        info!(
            operation = %self.config.operation,
            work_list = %self.config.work_list.display(),
            restore_days = self.config.restore_days,
            "starting {} of the folders in {} (restore days: {}).",
            self.config.operation,
            self.config.work_list.display(),
            self.config.restore_days,
        );

        match read_work_list(&self.config.work_list, &self.config.bucket) {
            Ok(items) => self.execute_pipeline(items).await,
            Err(e) => {
                error!("{e:#}");
                self.record_error(e);
            }
        }

        self.shutdown();
    }

    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    pub fn has_panic(&self) -> bool {
        self.has_panic.load(Ordering::SeqCst)
    }

    pub fn has_warning(&self) -> bool {
        self.has_warning.load(Ordering::SeqCst)
    }

    /// Consume and return all accumulated errors.
    ///
    /// Returns `None` if no errors occurred.
    pub fn get_errors_and_consume(&self) -> Option<Vec<anyhow::Error>> {
        if !self.has_error() {
            return None;
        }
        let mut error_list = self.errors.lock().unwrap();
        let mut errors = Vec::with_capacity(error_list.len());
        while let Some(e) = error_list.pop_front() {
            errors.push(e);
        }
        Some(errors)
    }

    /// Get error messages without consuming them.
    pub fn get_error_messages(&self) -> Option<Vec<String>> {
        if !self.has_error() {
            return None;
        }
        let error_list = self.errors.lock().unwrap();
        Some(error_list.iter().map(|e| e.to_string()).collect())
    }

    /// Run totals. `None` when the run failed or was cancelled: partial
    /// totals are not trusted.
    pub fn get_totals(&self) -> Option<&RestoreTotals> {
        self.totals.as_ref()
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.totals.as_ref().map(RestoreTotals::verdict)
    }

    /// Receiver of per-object statistics for the progress indicator.
    pub fn get_stats_receiver(&self) -> Receiver<RestoreStatistics> {
        self.stats_receiver.clone()
    }

    /// Close the stats sender to signal the progress indicator to finish.
    pub fn close_stats_sender(&self) {
        self.target.get_stats_sender().close();
    }

    // -----------------------------------------------------------------------
    // Internal methods
    // -----------------------------------------------------------------------

    async fn execute_pipeline(&mut self, items: Vec<WorkItem>) {
        let (page_sender, page_receiver) =
            async_channel::bounded::<ListingPage>(self.config.worker_size.max(1) as usize);
        let (event_sender, event_receiver) = async_channel::unbounded::<AggregatorEvent>();

        let issuer = RestoreIssuer::new(
            dyn_clone::clone_box(&*self.target),
            &self.config,
            self.has_warning.clone(),
        );

        self.list_items(items.clone(), page_sender, event_sender.clone());
        self.process_pages(page_receiver, event_sender, issuer);
        let aggregator_handle = self.aggregate(items, event_receiver);

        let totals = self.wait_for_aggregator(aggregator_handle).await;
        if self.cancellation_token.is_cancelled() {
            info!("run was cancelled.");
            if !self.has_error() {
                self.record_error(anyhow!(S3thawError::Cancelled));
            }
        } else if !self.has_error() {
            self.totals = totals;
        }

        if self.config.warn_as_error && self.has_warning() {
            self.record_error(anyhow!("warnings promoted to errors (--warn-as-error)"));
        }
    }

    fn record_error(&self, error: anyhow::Error) {
        self.has_error.store(true, Ordering::SeqCst);
        self.errors.lock().unwrap().push_back(error);
    }

    fn shutdown(&self) {
        self.close_stats_sender();
    }

    fn create_stage(
        &self,
        receiver: Option<Receiver<ListingPage>>,
        sender: Option<Sender<ListingPage>>,
        event_sender: Sender<AggregatorEvent>,
    ) -> Stage {
        Stage::new(
            self.config.clone(),
            dyn_clone::clone_box(&*self.target),
            receiver,
            sender,
            event_sender,
            self.cancellation_token.clone(),
            self.has_warning.clone(),
        )
    }

    // -----------------------------------------------------------------------
    // Pipeline stages
    // -----------------------------------------------------------------------

    /// Stage 1: spawn the lister. It owns the only page sender, so the page
    /// channel closes when listing ends.
    fn list_items(
        &self,
        items: Vec<WorkItem>,
        page_sender: Sender<ListingPage>,
        event_sender: Sender<AggregatorEvent>,
    ) {
        let stage = self.create_stage(None, Some(page_sender), event_sender.clone());

        let max_keys = self.config.max_keys;
        let has_error = self.has_error.clone();
        let has_panic = self.has_panic.clone();
        let error_list = self.errors.clone();
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            // Keeps the aggregator waiting until the outcome is recorded.
            let _event_sender = event_sender;
            let lister = ObjectLister::new(stage, items);
            let join_result = tokio::spawn(async move { lister.list_items(max_keys).await }).await;

            match join_result {
                Ok(Ok(())) => {
                    debug!("object lister completed successfully.");
                }
                Ok(Err(e)) => {
                    // Workers stop taking pages once cancelled, so a send
                    // failure after cancellation is expected.
                    if cancellation_token.is_cancelled() {
                        info!("object lister stopped after cancellation: {:#}", e);
                        return;
                    }
                    cancellation_token.cancel();
                    has_error.store(true, Ordering::SeqCst);
                    error!("object lister failed: {:#}", e);
                    error_list.lock().unwrap().push_back(e);
                }
                Err(e) => {
                    cancellation_token.cancel();
                    has_error.store(true, Ordering::SeqCst);
                    has_panic.store(true, Ordering::SeqCst);
                    error!("object lister task panicked: {}", e);
                    error_list
                        .lock()
                        .unwrap()
                        .push_back(anyhow!(S3thawError::Pipeline(format!(
                            "object lister task panicked: {e}"
                        ))));
                }
            }
        });
    }

    /// Stage 2: spawn `worker_size` page workers sharing the page channel.
    ///
    /// Takes the last event sender, so the event channel closes when the
    /// lister and every worker are done.
    fn process_pages(
        &self,
        page_receiver: Receiver<ListingPage>,
        event_sender: Sender<AggregatorEvent>,
        issuer: Arc<RestoreIssuer>,
    ) {
        for worker_index in 0..self.config.worker_size.max(1) {
            let stage = self.create_stage(Some(page_receiver.clone()), None, event_sender.clone());
            let worker = PageWorker::new(stage, worker_index, issuer.clone());
            let worker_event_sender = event_sender.clone();

            let has_error = self.has_error.clone();
            let has_panic = self.has_panic.clone();
            let error_list = self.errors.clone();
            let cancellation_token = self.cancellation_token.clone();

            tokio::spawn(async move {
                let _event_sender = worker_event_sender;
                let join_result = tokio::spawn(async move { worker.run().await }).await;

                match join_result {
                    Ok(Ok(())) => {
                        debug!(worker_index, "page worker completed successfully.");
                    }
                    Ok(Err(e)) => {
                        cancellation_token.cancel();
                        has_error.store(true, Ordering::SeqCst);
                        error!(worker_index, "page worker failed: {:#}", e);
                        error_list.lock().unwrap().push_back(e);
                    }
                    Err(e) => {
                        cancellation_token.cancel();
                        has_error.store(true, Ordering::SeqCst);
                        has_panic.store(true, Ordering::SeqCst);
                        error!(worker_index, "page worker task panicked: {}", e);
                        error_list
                            .lock()
                            .unwrap()
                            .push_back(anyhow!(S3thawError::Pipeline(format!(
                                "page worker {worker_index} panicked: {e}"
                            ))));
                    }
                }
            });
        }

        drop(event_sender);
    }

    /// Stage 3: spawn the aggregator.
    fn aggregate(
        &self,
        items: Vec<WorkItem>,
        event_receiver: Receiver<AggregatorEvent>,
    ) -> JoinHandle<Result<RestoreTotals>> {
        let reporter = Reporter::new(
            RunContext::new(self.config.operation),
            self.config.progress_file_path(),
        );
        let aggregator = Aggregator::new(
            event_receiver,
            items,
            reporter,
            self.cancellation_token.clone(),
        );

        tokio::spawn(aggregator.aggregate())
    }

    /// Wait for the aggregator, bounded by the configured wait timeout.
    async fn wait_for_aggregator(
        &self,
        mut aggregator_handle: JoinHandle<Result<RestoreTotals>>,
    ) -> Option<RestoreTotals> {
        let wait_timeout_secs = self.config.wait_timeout_secs;
        let wait_result =
            tokio::time::timeout(Duration::from_secs(wait_timeout_secs), &mut aggregator_handle)
                .await;

        match wait_result {
            Ok(Ok(Ok(totals))) => Some(totals),
            Ok(Ok(Err(e))) => {
                self.cancellation_token.cancel();
                error!("aggregator failed: {:#}", e);
                self.record_error(e);
                None
            }
            Ok(Err(e)) => {
                self.cancellation_token.cancel();
                self.has_panic.store(true, Ordering::SeqCst);
                error!("aggregator task panicked: {}", e);
                self.record_error(anyhow!(S3thawError::Pipeline(format!(
                    "aggregator task panicked: {e}"
                ))));
                None
            }
            Err(_) => {
                self.cancellation_token.cancel();
                aggregator_handle.abort();
                let e = anyhow!(S3thawError::WaitTimeout(wait_timeout_secs));
                error!("{}", e);
                self.record_error(e);
                None
            }
        }
    }
}
