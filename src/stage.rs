use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use async_channel::{Receiver, Sender};

use crate::aggregator::AggregatorEvent;
use crate::config::Config;
use crate::storage::Storage;
use crate::types::token::PipelineCancellationToken;
use crate::types::{ListingPage, RestoreStatistics};

/// Result of sending to the next stage.
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    Success,
    Closed,
}

/// Shared context passed to each pipeline stage.
///
/// - The lister owns the page `sender` and has no `receiver`.
/// - Page workers share the page `receiver` (MPMC) and have no page `sender`.
/// - Both send [`AggregatorEvent`]s to the single aggregator task.
#[derive(Clone)]
pub struct Stage {
    pub config: Config,
    pub target: Storage,
    pub receiver: Option<Receiver<ListingPage>>,
    pub sender: Option<Sender<ListingPage>>,
    pub event_sender: Sender<AggregatorEvent>,
    pub cancellation_token: PipelineCancellationToken,
    pub has_warning: Arc<AtomicBool>,
}

impl Stage {
    pub fn new(
        config: Config,
        target: Storage,
        receiver: Option<Receiver<ListingPage>>,
        sender: Option<Sender<ListingPage>>,
        event_sender: Sender<AggregatorEvent>,
        cancellation_token: PipelineCancellationToken,
        has_warning: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            target,
            receiver,
            sender,
            event_sender,
            cancellation_token,
            has_warning,
        }
    }

    /// Send an event to the aggregator.
    ///
    /// Returns `SendResult::Closed` if the aggregator has gone away, allowing
    /// the caller to exit gracefully.
    pub async fn send_event(&self, event: AggregatorEvent) -> Result<SendResult> {
        let result = self
            .event_sender
            .send(event)
            .await
            .context("async_channel::Sender::send() failed.");

        if let Err(e) = result {
            return if !self.event_sender.is_closed() {
                Err(anyhow!(e))
            } else {
                Ok(SendResult::Closed)
            };
        }

        Ok(SendResult::Success)
    }

    /// The page channel sender. Only the lister stage has one.
    pub fn page_sender(&self) -> Result<&Sender<ListingPage>> {
        self.sender
            .as_ref()
            .context("this stage has no page sender.")
    }

    /// The page channel receiver. Only page worker stages have one.
    pub fn page_receiver(&self) -> Result<&Receiver<ListingPage>> {
        self.receiver
            .as_ref()
            .context("this stage has no page receiver.")
    }

    /// Send a statistics event through the storage stats channel.
    pub async fn send_stats(&self, stats: RestoreStatistics) {
        let _ = self.target.get_stats_sender().send(stats).await;
    }

    /// Set the warning flag to indicate a non-fatal issue occurred.
    pub fn set_warning(&self) {
        self.has_warning.store(true, Ordering::SeqCst);
    }
}
