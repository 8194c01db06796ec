use anyhow::Result;
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::types::RequestPayer;
use dyn_clone::DynClone;
use leaky_bucket::RateLimiter;
use std::sync::Arc;

use crate::config::{ClientConfig, Config};
use crate::types::token::PipelineCancellationToken;
use crate::types::{ListingPage, RestoreStatistics, RestoreTier};

pub mod s3;

/// Type alias for a boxed Storage trait object.
pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// Factory trait for creating Storage instances.
#[async_trait]
pub trait StorageFactory {
    #[allow(clippy::too_many_arguments)]
    async fn create(
        config: Config,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<RestoreStatistics>,
        client_config: Option<ClientConfig>,
        request_payer: Option<RequestPayer>,
        rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
    ) -> Storage;
}

/// How the store answered a restore request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreRequestOutcome {
    /// The request was accepted and a new restore job started.
    Accepted,
    /// A restore for this object is already running. Counts as accepted.
    AlreadyInProgress,
}

/// Object store capability needed by the restore pipeline.
///
/// The pipeline depends only on this trait. The AWS implementation lives in
/// [`s3`]; tests substitute an in-memory store.
#[async_trait]
pub trait StorageTrait: DynClone {
    /// List every object under `prefix` and send it to `sender` as pages of
    /// at most `max_keys` entries, tagged with `item_index`.
    ///
    /// Pages without entries are not sent. Returns the number of pages sent.
    /// Listing failures are treated as unrecoverable errors.
    async fn list_pages(
        &self,
        prefix: &str,
        item_index: usize,
        sender: &Sender<ListingPage>,
        max_keys: i32,
    ) -> Result<usize>;

    /// Fetch the raw restore descriptor (`x-amz-restore`) of `key`.
    ///
    /// `Ok(None)` means the object has no descriptor: no restore has been
    /// requested.
    async fn fetch_restore_descriptor(&self, key: &str) -> Result<Option<String>>;

    /// Ask the store to restore `key` for `days` days.
    async fn request_restore(
        &self,
        key: &str,
        days: i32,
        tier: Option<RestoreTier>,
    ) -> Result<RestoreRequestOutcome>;

    /// Get the statistics sender channel.
    fn get_stats_sender(&self) -> Sender<RestoreStatistics>;

    /// Send a statistics event through the channel.
    async fn send_stats(&self, stats: RestoreStatistics);
}

dyn_clone::clone_trait_object!(StorageTrait);

// Default refill interval 100ms
const REFILL_PER_INTERVAL_DIVIDER: usize = 10;

fn create_rate_limiter(rate_limit_value: u32) -> Arc<RateLimiter> {
    let refill = if (rate_limit_value as usize) <= REFILL_PER_INTERVAL_DIVIDER {
        1
    } else {
        rate_limit_value as usize / REFILL_PER_INTERVAL_DIVIDER
    };
    Arc::new(
        RateLimiter::builder()
            .max(rate_limit_value as usize)
            .initial(rate_limit_value as usize)
            .refill(refill)
            .fair(true)
            .build(),
    )
}

/// Create the S3 storage used by the restore pipeline.
pub async fn create_storage(
    config: Config,
    cancellation_token: PipelineCancellationToken,
    stats_sender: Sender<RestoreStatistics>,
) -> Storage {
    let rate_limit_objects_per_sec = config.rate_limit_objects.map(create_rate_limiter);

    let client_config = config.target_client_config.clone();
    let request_payer = client_config.as_ref().and_then(|c| c.request_payer.clone());

    s3::S3StorageFactory::create(
        config,
        cancellation_token,
        stats_sender,
        client_config,
        request_payer,
        rate_limit_objects_per_sec,
    )
    .await
}
