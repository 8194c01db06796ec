//! Page workers.
//!
//! `worker_size` workers share the bounded page channel. Each page is processed
//! in its own spawned task so that a fault while processing one page only
//! costs that page: the worker logs it, flags a warning and reports an empty
//! summary in its place.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, trace, warn};

use crate::aggregator::AggregatorEvent;
use crate::classifier::{Classification, classify};
use crate::issuer::RestoreIssuer;
use crate::stage::{SendResult, Stage};
use crate::summary::PageSummary;
use crate::types::{ListingPage, Operation, RestoreState, RestoreStatistics, is_folder_marker};

#[derive(Clone)]
pub struct PageWorker {
    worker_index: u16,
    base: Stage,
    issuer: Arc<RestoreIssuer>,
}

impl PageWorker {
    pub fn new(base: Stage, worker_index: u16, issuer: Arc<RestoreIssuer>) -> Self {
        Self {
            worker_index,
            base,
            issuer,
        }
    }

    /// Take pages until the channel is closed and drained, or the run is
    /// cancelled.
    pub async fn run(&self) -> Result<()> {
        let receiver = self.base.page_receiver()?.clone();

        loop {
            tokio::select! {
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(page) => {
                            if self.handle_page(page).await? == SendResult::Closed {
                                debug!(worker_index = self.worker_index, "aggregator has gone away.");
                                return Ok(());
                            }
                        }
                        Err(_) => {
                            debug!(worker_index = self.worker_index, "page worker has been completed.");
                            break;
                        }
                    }
                },
                _ = self.base.cancellation_token.cancelled() => {
                    info!(worker_index = self.worker_index, "page worker has been cancelled.");
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    async fn handle_page(&self, page: ListingPage) -> Result<SendResult> {
        let (item_index, page_index) = (page.item_index, page.page_index);

        let worker = self.clone();
        let join_result = tokio::spawn(async move { worker.process_page(&page).await }).await;

        let summary = match join_result {
            Ok(summary) => {
                self.base
                    .send_stats(RestoreStatistics::PageComplete {
                        item_index,
                        page_index,
                    })
                    .await;
                summary
            }
            Err(e) => {
                warn!(
                    worker_index = self.worker_index,
                    item_index = item_index,
                    page_index = page_index,
                    "page task failed, its keys are not counted: {}",
                    e
                );
                self.base.set_warning();
                self.base
                    .send_stats(RestoreStatistics::PageError {
                        item_index,
                        page_index,
                    })
                    .await;
                PageSummary::empty(item_index, page_index)
            }
        };

        self.base.send_event(AggregatorEvent::Page(summary)).await
    }

    /// Classify every entry of `page`, issuing restores when the operation
    /// is `restore`. Per-object failures end up as notes, never as errors.
    pub async fn process_page(&self, page: &ListingPage) -> PageSummary {
        let mut summary = PageSummary::new(page.item_index, page.page_index);

        for entry in &page.entries {
            let classification = self.process_object(&entry.key).await;
            trace!(
                worker_index = self.worker_index,
                key = entry.key,
                storage_class = ?entry.storage_class,
                state = %classification.state,
                "object classified."
            );
            self.base
                .send_stats(RestoreStatistics::ObjectClassified {
                    key: entry.key.clone(),
                    state: classification.state,
                })
                .await;
            summary.record(&entry.key, classification);
        }

        summary
    }

    async fn process_object(&self, key: &str) -> Classification {
        // Folder markers need no store call.
        if is_folder_marker(key) {
            return classify(key, None, false);
        }

        let classification = match self.base.target.fetch_restore_descriptor(key).await {
            Ok(descriptor) => classify(key, descriptor.as_deref(), false),
            Err(e) => {
                warn!(
                    worker_index = self.worker_index,
                    key = key,
                    "failed to read restore status: {e:#}"
                );
                self.base.set_warning();
                return Classification::fetch_failed(&e);
            }
        };

        if self.base.config.operation == Operation::Restore
            && classification.state == RestoreState::NotRequested
        {
            return self.issuer.issue(key).await;
        }

        classification
    }
}
