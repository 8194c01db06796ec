use anyhow::{Result, anyhow};
use tracing::{debug, info};

use crate::aggregator::AggregatorEvent;
use crate::stage::{SendResult, Stage};
use crate::types::error::S3thawError;
use crate::work_list::WorkItem;

/// Walks the active work items in order and feeds their listing pages to the
/// page workers.
///
/// ## Pipeline role
///
/// ```text
/// ObjectLister → PageWorker × worker_size → Aggregator
/// ```
///
/// Pages go to the bounded page channel as they are listed, so listing
/// overlaps processing. Once every page of an item has been sent, the lister
/// tells the aggregator how many pages to expect for it.
pub struct ObjectLister {
    stage: Stage,
    items: Vec<WorkItem>,
}

impl ObjectLister {
    pub fn new(stage: Stage, items: Vec<WorkItem>) -> Self {
        Self { stage, items }
    }

    /// List every active work item. A listing failure is fatal for the run.
    pub async fn list_items(&self, max_keys: i32) -> Result<()> {
        debug!("listing work items has started.");
        let sender = self.stage.page_sender()?;

        for (item_index, item) in self.items.iter().enumerate() {
            if self.stage.cancellation_token.is_cancelled() {
                info!("listing cancelled.");
                return Ok(());
            }

            let WorkItem::Active { raw, prefix } = item else {
                continue;
            };

            debug!(item = raw, prefix = prefix, "listing work item.");
            let page_count = self
                .stage
                .target
                .list_pages(prefix, item_index, sender, max_keys)
                .await
                .map_err(|e| anyhow!(S3thawError::Listing(format!("{raw}: {e:#}"))))?;

            if self.stage.cancellation_token.is_cancelled() {
                info!(item = raw, "listing cancelled.");
                return Ok(());
            }

            debug!(item = raw, page_count = page_count, "work item listed.");
            let event = AggregatorEvent::ItemListed {
                item_index,
                page_count,
            };
            if self.stage.send_event(event).await? == SendResult::Closed {
                return Ok(());
            }
        }

        debug!("listing work items has been completed.");
        Ok(())
    }
}
