pub mod args;

use std::path::{Path, PathBuf};

use crate::types::{ClientConfigLocation, Operation, RestoreTier, S3Credentials};
use aws_sdk_s3::types::RequestPayer;

pub const DEFAULT_RESTORE_DAYS: i32 = 14;
pub const DEFAULT_WORKER_SIZE: u16 = 16;
pub const DEFAULT_MAX_KEYS: i32 = 1000;
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 86_400;

/// Suffix appended to the output file base to form the progress file name.
pub const PROGRESS_FILE_SUFFIX: &str = ".restoreInProgress.csv";

/// Main configuration for a restore reconciliation run.
///
/// Holds everything a [`RestorePipeline`](crate::RestorePipeline) needs:
/// bucket, operation, work list, restore parameters, AWS client settings and
/// worker pool size.
///
/// # Quick Start
///
/// ```
/// use s3thaw_rs::Config;
/// use s3thaw_rs::types::Operation;
///
/// let mut config = Config::for_bucket("archive-bucket", Operation::Status);
/// config.work_list = "folders_to_restore.csv".into();
/// assert_eq!(config.worker_size, 16);
/// assert_eq!(config.restore_days, 14);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub bucket: String,
    pub operation: Operation,
    pub work_list: PathBuf,
    /// Base path of the progress file. `None` disables the file.
    pub output_file_base: Option<PathBuf>,
    pub restore_days: i32,
    pub restore_tier: Option<RestoreTier>,
    pub show_no_progress: bool,
    pub target_client_config: Option<ClientConfig>,
    pub tracing_config: Option<TracingConfig>,
    pub worker_size: u16,
    pub warn_as_error: bool,
    pub rate_limit_objects: Option<u32>,
    pub max_keys: i32,
    pub wait_timeout_secs: u64,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

impl Config {
    /// Create a `Config` with CLI defaults for the given bucket and operation.
    ///
    /// The work list path is empty and must be set before running a pipeline.
    pub fn for_bucket(bucket: &str, operation: Operation) -> Self {
        Config {
            bucket: bucket.to_string(),
            operation,
            ..Config::default()
        }
    }

    /// Path of the progress file, when one is configured.
    pub fn progress_file_path(&self) -> Option<PathBuf> {
        self.output_file_base.as_deref().map(progress_file_path)
    }
}

/// `<base>.restoreInProgress.csv`
pub fn progress_file_path(base: &Path) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(PROGRESS_FILE_SUFFIX);
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bucket: String::new(),
            operation: Operation::Status,
            work_list: PathBuf::new(),
            output_file_base: None,
            restore_days: DEFAULT_RESTORE_DAYS,
            restore_tier: None,
            show_no_progress: false,
            target_client_config: None,
            tracing_config: None,
            worker_size: DEFAULT_WORKER_SIZE,
            warn_as_error: false,
            rate_limit_objects: None,
            max_keys: DEFAULT_MAX_KEYS,
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
            auto_complete_shell: None,
        }
    }
}

/// AWS S3 client configuration: credentials, region, endpoint, retry and
/// timeout settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_config_location: ClientConfigLocation,
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub accelerate: bool,
    pub request_payer: Option<RequestPayer>,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
    pub disable_stalled_stream_protection: bool,
}

/// Retry configuration for AWS SDK operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

/// Timeout configuration for AWS SDK operations.
#[derive(Debug, Clone)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}
