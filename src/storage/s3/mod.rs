pub mod client_builder;

use anyhow::{Context, Result};
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::types::{GlacierJobParameters, RequestPayer, RestoreRequest, Tier};
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use leaky_bucket::RateLimiter;
use std::sync::Arc;

use crate::config::{ClientConfig, Config};
use crate::storage::{RestoreRequestOutcome, Storage, StorageFactory, StorageTrait};
use crate::types::error::S3thawError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{ListingEntry, ListingPage, RestoreStatistics, RestoreTier};

const RESTORE_ALREADY_IN_PROGRESS_CODE: &str = "RestoreAlreadyInProgress";

/// Extracts the S3 error code and message from an AWS SDK error.
///
/// For service errors (S3 API responses), returns the S3 error code
/// (e.g. "AccessDenied", "InvalidObjectState") and the human-readable error
/// message from the response. For other error types (network, timeout,
/// construction failure), returns "N/A" as the code and the full error
/// description as the message.
fn extract_sdk_error_details<E: std::fmt::Display + ProvideErrorMetadata>(
    e: &SdkError<E>,
) -> (String, String) {
    if let Some(service_err) = e.as_service_error() {
        (
            service_err.code().unwrap_or("unknown").to_string(),
            service_err.message().unwrap_or("no message").to_string(),
        )
    } else {
        ("N/A".to_string(), e.to_string())
    }
}

fn is_restore_already_in_progress(s3_error_code: &str) -> bool {
    s3_error_code == RESTORE_ALREADY_IN_PROGRESS_CODE
}

impl From<RestoreTier> for Tier {
    fn from(tier: RestoreTier) -> Self {
        match tier {
            RestoreTier::Standard => Tier::Standard,
            RestoreTier::Bulk => Tier::Bulk,
            RestoreTier::Expedited => Tier::Expedited,
        }
    }
}

/// Continuation token for the next ListObjectsV2 call, or `None` when the
/// listing is complete. A truncated response must carry a token.
fn next_continuation_token(
    prefix: &str,
    is_truncated: Option<bool>,
    next_continuation_token: Option<&str>,
) -> Result<Option<String>> {
    if is_truncated != Some(true) {
        return Ok(None);
    }
    next_continuation_token
        .map(|token| Some(token.to_string()))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "truncated ListObjectsV2 response for {prefix} has no continuation token."
            )
        })
}

fn build_restore_request(days: i32, tier: Option<RestoreTier>) -> Result<RestoreRequest> {
    let glacier_job_parameters = tier
        .map(|tier| {
            GlacierJobParameters::builder()
                .tier(Tier::from(tier))
                .build()
                .context("aws_sdk_s3::types::GlacierJobParameters::build() failed.")
        })
        .transpose()?;

    Ok(RestoreRequest::builder()
        .days(days)
        .set_glacier_job_parameters(glacier_job_parameters)
        .build())
}

/// Factory for creating S3 storage instances.
pub struct S3StorageFactory;

#[async_trait]
impl StorageFactory for S3StorageFactory {
    async fn create(
        config: Config,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<RestoreStatistics>,
        client_config: Option<ClientConfig>,
        request_payer: Option<RequestPayer>,
        rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
    ) -> Storage {
        let bucket = config.bucket.clone();

        let client = if let Some(ref client_config) = client_config {
            Some(Arc::new(client_config.create_client().await))
        } else {
            None
        };

        Box::new(S3Storage {
            bucket,
            cancellation_token,
            client,
            request_payer,
            stats_sender,
            rate_limit_objects_per_sec,
        })
    }
}

/// S3 storage for the restore pipeline: ListObjectsV2 for listing, HeadObject
/// for the restore descriptor and RestoreObject for restore requests.
#[derive(Clone)]
struct S3Storage {
    bucket: String,
    cancellation_token: PipelineCancellationToken,
    client: Option<Arc<Client>>,
    request_payer: Option<RequestPayer>,
    stats_sender: Sender<RestoreStatistics>,
    rate_limit_objects_per_sec: Option<Arc<RateLimiter>>,
}

#[async_trait]
impl StorageTrait for S3Storage {
    async fn list_pages(
        &self,
        prefix: &str,
        item_index: usize,
        sender: &Sender<ListingPage>,
        max_keys: i32,
    ) -> Result<usize> {
        let client = self.client()?;
        let mut continuation_token: Option<String> = None;
        let mut page_index = 0;

        loop {
            if self.cancellation_token.is_cancelled() {
                tracing::info!(prefix = prefix, "listing cancelled.");
                break;
            }

            self.exec_rate_limit_objects_per_sec().await;

            let output = client
                .list_objects_v2()
                .set_request_payer(self.request_payer.clone())
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.clone())
                .max_keys(max_keys)
                .send()
                .await
                .map_err(|e| {
                    let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                    tracing::error!(
                        bucket = self.bucket,
                        prefix = prefix,
                        s3_error_code = s3_error_code,
                        s3_error_message = s3_error_message,
                        "S3 ListObjectsV2 API call failed for s3://{}/{}: {} ({}).",
                        self.bucket,
                        prefix,
                        s3_error_code,
                        s3_error_message,
                    );
                    anyhow::anyhow!(e).context("aws_sdk_s3::client::list_objects_v2() failed.")
                })?;

            let entries: Vec<ListingEntry> = output
                .contents()
                .iter()
                .filter_map(|object| {
                    object.key().map(|key| ListingEntry {
                        key: key.to_string(),
                        storage_class: object.storage_class().map(|c| c.as_str().to_string()),
                    })
                })
                .collect();

            if !entries.is_empty() {
                let page = ListingPage {
                    item_index,
                    page_index,
                    entries,
                };
                if let Err(e) = sender
                    .send(page)
                    .await
                    .context("async_channel::Sender::send() failed.")
                {
                    return if !sender.is_closed() {
                        Err(e)
                    } else {
                        Ok(page_index)
                    };
                }
                page_index += 1;
            }

            match next_continuation_token(
                prefix,
                output.is_truncated(),
                output.next_continuation_token(),
            )? {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(page_index)
    }

    async fn fetch_restore_descriptor(&self, key: &str) -> Result<Option<String>> {
        let client = self.client()?;
        self.exec_rate_limit_objects_per_sec().await;

        let output = client
            .head_object()
            .set_request_payer(self.request_payer.clone())
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                tracing::warn!(
                    bucket = self.bucket,
                    key = key,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 HeadObject API call failed for s3://{}/{}: {} ({}).",
                    self.bucket,
                    key,
                    s3_error_code,
                    s3_error_message,
                );
                anyhow::anyhow!(e).context("aws_sdk_s3::client::head_object() failed.")
            })?;

        tracing::trace!(
            key = key,
            storage_class = ?output.storage_class(),
            restore = ?output.restore(),
            "head_object completed."
        );

        Ok(output.restore().map(String::from))
    }

    async fn request_restore(
        &self,
        key: &str,
        days: i32,
        tier: Option<RestoreTier>,
    ) -> Result<RestoreRequestOutcome> {
        let client = self.client()?;
        let restore_request = build_restore_request(days, tier)?;
        self.exec_rate_limit_objects_per_sec().await;

        let result = client
            .restore_object()
            .set_request_payer(self.request_payer.clone())
            .bucket(&self.bucket)
            .key(key)
            .restore_request(restore_request)
            .send()
            .await;

        match result {
            Ok(_) => Ok(RestoreRequestOutcome::Accepted),
            Err(e) => {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                if is_restore_already_in_progress(&s3_error_code) {
                    tracing::debug!(key = key, "restore is already in progress.");
                    return Ok(RestoreRequestOutcome::AlreadyInProgress);
                }

                tracing::warn!(
                    bucket = self.bucket,
                    key = key,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 RestoreObject API call failed for s3://{}/{}: {} ({}).",
                    self.bucket,
                    key,
                    s3_error_code,
                    s3_error_message,
                );
                Err(anyhow::anyhow!(S3thawError::AwsSdk(format!(
                    "{s3_error_code} ({s3_error_message})"
                )))
                .context("aws_sdk_s3::client::restore_object() failed."))
            }
        }
    }

    fn get_stats_sender(&self) -> Sender<RestoreStatistics> {
        self.stats_sender.clone()
    }

    async fn send_stats(&self, stats: RestoreStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}

impl S3Storage {
    fn client(&self) -> Result<&Arc<Client>> {
        self.client.as_ref().ok_or_else(|| {
            anyhow::anyhow!(S3thawError::InvalidConfig(
                "no S3 client has been configured.".to_string()
            ))
        })
    }

    /// Acquire one token from the objects-per-second rate limiter, if any.
    async fn exec_rate_limit_objects_per_sec(&self) {
        if let Some(ref rate_limiter) = self.rate_limit_objects_per_sec {
            rate_limiter.acquire_one().await;
        }
    }
}
