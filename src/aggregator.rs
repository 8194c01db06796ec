//! Single-writer aggregation of page summaries.
//!
//! Every page summary and every "item listed" notice goes through one
//! channel to one task. An item is finished when the number of pages it
//! received equals the page count the lister announced for it; the item's
//! totals are then merged into the run totals and reported.

use std::collections::HashMap;

use anyhow::Result;
use async_channel::Receiver;
use tracing::{debug, warn};

use crate::reporter::Reporter;
use crate::summary::{PageSummary, RestoreTotals};
use crate::types::token::PipelineCancellationToken;
use crate::work_list::WorkItem;

#[derive(Debug)]
pub enum AggregatorEvent {
    /// A processed page.
    Page(PageSummary),
    /// Every page of the item has been sent to the page workers.
    ItemListed {
        item_index: usize,
        page_count: usize,
    },
}

#[derive(Default)]
struct ItemProgress {
    totals: RestoreTotals,
    received: usize,
    expected: Option<usize>,
}

impl ItemProgress {
    fn is_complete(&self) -> bool {
        self.expected == Some(self.received)
    }
}

pub struct Aggregator {
    receiver: Receiver<AggregatorEvent>,
    items: Vec<WorkItem>,
    reporter: Reporter,
    cancellation_token: PipelineCancellationToken,
    run_totals: RestoreTotals,
    pending: HashMap<usize, ItemProgress>,
    processed_keys: u64,
}

impl Aggregator {
    pub fn new(
        receiver: Receiver<AggregatorEvent>,
        items: Vec<WorkItem>,
        reporter: Reporter,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            receiver,
            items,
            reporter,
            cancellation_token,
            run_totals: RestoreTotals::new(),
            pending: HashMap::new(),
            processed_keys: 0,
        }
    }

    /// Drain events until every sender is gone, then report the run.
    ///
    /// The run report is skipped when the run was cancelled. Reporter I/O
    /// failures are fatal.
    pub async fn aggregate(mut self) -> Result<RestoreTotals> {
        while let Ok(event) = self.receiver.recv().await {
            match event {
                AggregatorEvent::Page(page) => self.merge_page(page)?,
                AggregatorEvent::ItemListed {
                    item_index,
                    page_count,
                } => {
                    self.pending.entry(item_index).or_default().expected = Some(page_count);
                    self.complete_if_done(item_index)?;
                }
            }
        }

        self.merge_unfinished_items();

        if self.cancellation_token.is_cancelled() {
            debug!("run was cancelled, skipping the run report.");
        } else {
            self.reporter.report_run(&self.run_totals)?;
        }

        Ok(self.run_totals)
    }

    fn merge_page(&mut self, page: PageSummary) -> Result<()> {
        let item_index = page.item_index;
        self.processed_keys += page.len() as u64;
        self.reporter
            .report_page(self.item_name(item_index), &page, self.processed_keys);

        let progress = self.pending.entry(item_index).or_default();
        progress.totals.merge_page(&page);
        progress.received += 1;

        self.complete_if_done(item_index)
    }

    fn complete_if_done(&mut self, item_index: usize) -> Result<()> {
        if !self
            .pending
            .get(&item_index)
            .is_some_and(ItemProgress::is_complete)
        {
            return Ok(());
        }
        let Some(progress) = self.pending.remove(&item_index) else {
            return Ok(());
        };

        self.run_totals.merge(&progress.totals);
        self.reporter
            .report_item(self.item_name(item_index), &progress.totals)
    }

    /// Items still open when the channel closes (a cancelled or failed run)
    /// are merged as they are.
    fn merge_unfinished_items(&mut self) {
        let mut unfinished: Vec<(usize, ItemProgress)> = self.pending.drain().collect();
        unfinished.sort_by_key(|(item_index, _)| *item_index);

        for (item_index, progress) in unfinished {
            warn!(
                item = self.item_name(item_index),
                received = progress.received,
                expected = ?progress.expected,
                "work item did not finish."
            );
            self.run_totals.merge(&progress.totals);
        }
    }

    fn item_name(&self, item_index: usize) -> &str {
        self.items
            .get(item_index)
            .map(WorkItem::raw)
            .unwrap_or("<unknown item>")
    }
}
