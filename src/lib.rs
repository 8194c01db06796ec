/*!
# Overview
s3thaw-rs reconciles the archival restore state of S3 objects against a work
list of folders. For every object under every listed folder it reports
whether a restore from Glacier-class storage is finished, in progress, not
requested yet, or unknown, and with the `restore` operation it requests the
missing restores, at most once per key per run.

## Features
- **Bounded concurrency**: listing pages are processed by a fixed pool of
  page workers while listing continues
- **Single-writer totals**: one aggregator task merges every page summary
- **Progress file**: an append-only `<base>.restoreInProgress.csv` with one
  block per folder and one per run
- **Scriptable verdict**: exit code 0 when every object is restored, 3 while
  restores are still pending
- **Library-First**: the s3thaw CLI is a thin wrapper over this crate

## As a Library

```toml
[dependencies]
s3thaw-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3thaw_rs::{Config, RestorePipeline, create_pipeline_cancellation_token, parse_from_args};

#[tokio::main]
async fn main() {
    let args = vec![
        "s3thaw",
        "status",
        "--bucket",
        "archive-bucket",
        "--work-list",
        "folders_to_restore.csv",
    ];

    let parsed_args = parse_from_args(args).unwrap();
    let config = Config::try_from(parsed_args).unwrap();
    let cancellation_token = create_pipeline_cancellation_token();
    let mut pipeline = RestorePipeline::new(config, cancellation_token).await;
    pipeline.close_stats_sender();
    pipeline.run().await;

    if pipeline.has_error() {
        eprintln!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
    } else if let Some(verdict) = pipeline.verdict() {
        println!("{verdict}");
    }
}
```
*/

#![allow(clippy::collapsible_if)]

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod issuer;
pub mod lister;
pub mod path;
pub mod pipeline;
pub mod reporter;
pub mod stage;
pub mod storage;
pub mod summary;
pub mod types;
pub mod work_list;
pub mod worker;

#[cfg(test)]
mod property_tests;
#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use config::args::{CLIArgs, build_config_from_args, parse_from_args};
pub use pipeline::RestorePipeline;
pub use storage::{RestoreRequestOutcome, StorageTrait};
pub use summary::{RestoreTotals, StateCounts, Verdict};
pub use types::error::{S3thawError, exit_code_from_error, is_cancelled_error};
pub use types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
pub use types::{Operation, RestoreState, RestoreStatistics};
