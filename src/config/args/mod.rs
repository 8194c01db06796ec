use crate::config::{
    CLITimeoutConfig, ClientConfig, Config, DEFAULT_MAX_KEYS, DEFAULT_RESTORE_DAYS,
    DEFAULT_WAIT_TIMEOUT_SECS, DEFAULT_WORKER_SIZE, RetryConfig, TracingConfig,
};
use crate::types::{AccessKeys, ClientConfigLocation, Operation, RestoreTier, S3Credentials};
use aws_sdk_s3::types::RequestPayer;
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod value_parser;


const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_WARN_AS_ERROR: bool = false;
const DEFAULT_FORCE_PATH_STYLE: bool = false;
const DEFAULT_DISABLE_STALLED_STREAM_PROTECTION: bool = false;
const DEFAULT_ACCELERATE: bool = false;
const DEFAULT_REQUEST_PAYER: bool = false;
const DEFAULT_SHOW_NO_PROGRESS: bool = false;
const DEFAULT_NO_PROGRESS_FILE: bool = false;

const S3_LIST_MAX_KEYS_LIMIT: i32 = 1000;

const ERROR_MESSAGE_MISSING_BUCKET: &str = "--bucket is required.";
const ERROR_MESSAGE_MISSING_WORK_LIST: &str = "--work-list is required.";
const ERROR_MESSAGE_WORKER_SIZE_ZERO: &str = "Worker size must be at least 1.";
const ERROR_MESSAGE_MAX_KEYS_OUT_OF_RANGE: &str = "Max keys must be between 1 and 1000.";
const ERROR_MESSAGE_WAIT_TIMEOUT_ZERO: &str = "Wait timeout must be at least 1 second.";
const ERROR_MESSAGE_RATE_LIMIT_ZERO: &str = "Rate limit must be at least 1 object per second.";
const ERROR_MESSAGE_BUCKET_WITH_SCHEME: &str =
    "Bucket must be a bucket name, not an s3:// URL (e.g., --bucket my-archive).";

/// Clap value parser for the positional operation argument.
fn check_operation(s: &str) -> Result<Operation, String> {
    Operation::from_str(s).map_err(|e| e.to_string())
}

/// s3thaw - Restore reconciliation for archived Amazon S3 objects.
///
/// Reads a work list of folder prefixes, classifies every object under them by
/// its archival restore state and, with the `restore` operation, requests a
/// restore for each object that has none yet.
///
/// Example:
///   s3thaw status --bucket my-archive --work-list folders.csv
///   s3thaw restore --bucket my-archive --work-list folders.csv --restore-days 7
#[derive(Parser, Clone, Debug)]
#[command(name = "s3thaw", version, about, long_about = None)]
pub struct CLIArgs {
    /// `status` or `restore`
    #[arg(
        env = "S3THAW_OPERATION",
        value_parser = check_operation,
        required_unless_present = "auto_complete_shell",
    )]
    pub operation: Option<Operation>,

    // -----------------------------------------------------------------------
    // General options
    // -----------------------------------------------------------------------
    /// Bucket holding the archived objects.
    #[arg(
        short = 'b',
        long,
        env,
        value_parser = NonEmptyStringValueParser::new(),
        required_unless_present = "auto_complete_shell",
        help_heading = "General"
    )]
    pub bucket: Option<String>,

    /// Work list file: one folder prefix per line. Blank and '#' lines are skipped.
    #[arg(
        short = 'l',
        long,
        env,
        value_parser = value_parser::file_exist::is_file_exist,
        required_unless_present = "auto_complete_shell",
        help_heading = "General"
    )]
    pub work_list: Option<String>,

    /// Base path of the progress file (<base>.restoreInProgress.csv). Default: the work list path.
    #[arg(long, env, help_heading = "General")]
    pub output_file_base: Option<PathBuf>,

    /// Don't write the progress file.
    #[arg(long, env, default_value_t = DEFAULT_NO_PROGRESS_FILE, conflicts_with = "output_file_base", help_heading = "General")]
    pub no_progress_file: bool,

    /// Don't show the progress bar.
    #[arg(long, env, default_value_t = DEFAULT_SHOW_NO_PROGRESS, help_heading = "General")]
    pub show_no_progress: bool,

    // -----------------------------------------------------------------------
    // Restore options
    // -----------------------------------------------------------------------
    /// Number of days a restored copy stays available.
    #[arg(
        short = 'd',
        long,
        env,
        default_value_t = DEFAULT_RESTORE_DAYS,
        value_parser = clap::value_parser!(i32).range(1..),
        help_heading = "Restore"
    )]
    pub restore_days: i32,

    /// Retrieval tier for restore requests. Default: the storage class default.
    #[arg(long, env, value_enum, help_heading = "Restore")]
    pub restore_tier: Option<RestoreTier>,

    // -----------------------------------------------------------------------
    // Performance options
    // -----------------------------------------------------------------------
    /// Number of concurrent page workers (1–65535). Default: 16.
    #[arg(long, env, default_value_t = DEFAULT_WORKER_SIZE, help_heading = "Performance")]
    pub worker_size: u16,

    /// Maximum store calls per second.
    #[arg(long, env, help_heading = "Performance")]
    pub rate_limit_objects: Option<u32>,

    /// Max keys per listing page (1–1000). Default: 1000.
    #[arg(long, env, default_value_t = DEFAULT_MAX_KEYS, help_heading = "Performance")]
    pub max_keys: i32,

    /// Seconds to wait for all pages to be processed before giving up. Default: 86400.
    #[arg(long, env, default_value_t = DEFAULT_WAIT_TIMEOUT_SECS, help_heading = "Performance")]
    pub wait_timeout_secs: u64,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (warnings only), default (status lines), -v, -vv.
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Output logs in JSON format.
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Enable AWS SDK tracing.
    #[arg(long, env, default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Logging")]
    pub aws_sdk_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // Retry options
    // -----------------------------------------------------------------------
    /// Maximum retry attempts for AWS SDK operations. Default: 10.
    #[arg(long, env, default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, help_heading = "Retry")]
    pub aws_max_attempts: u32,

    /// Initial backoff in milliseconds for retries. Default: 100.
    #[arg(long, env, default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, help_heading = "Retry")]
    pub initial_backoff_milliseconds: u64,

    // -----------------------------------------------------------------------
    // Timeout options
    // -----------------------------------------------------------------------
    /// Overall operation timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub operation_timeout_milliseconds: Option<u64>,

    /// Per-attempt operation timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub operation_attempt_timeout_milliseconds: Option<u64>,

    /// Connection timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub connect_timeout_milliseconds: Option<u64>,

    /// Read timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub read_timeout_milliseconds: Option<u64>,

    // -----------------------------------------------------------------------
    // AWS configuration
    // -----------------------------------------------------------------------
    /// AWS config file path.
    #[arg(long, env, help_heading = "AWS")]
    pub aws_config_file: Option<PathBuf>,

    /// AWS shared credentials file path.
    #[arg(long, env, help_heading = "AWS")]
    pub aws_shared_credentials_file: Option<PathBuf>,

    /// AWS profile. If not set, the default credential chain is used.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), conflicts_with_all = ["access_key", "secret_key"], help_heading = "AWS")]
    pub profile: Option<String>,

    /// AWS access key ID.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), requires = "secret_key", help_heading = "AWS")]
    pub access_key: Option<String>,

    /// AWS secret access key.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), requires = "access_key", help_heading = "AWS")]
    pub secret_key: Option<String>,

    /// AWS session token.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), requires = "access_key", help_heading = "AWS")]
    pub session_token: Option<String>,

    /// AWS region.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint URL (e.g. MinIO).
    #[arg(long, env, value_parser = value_parser::url::check_scheme, help_heading = "AWS")]
    pub endpoint_url: Option<String>,

    /// Force path-style access (required for some S3-compatible services).
    #[arg(long, env, default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "AWS")]
    pub force_path_style: bool,

    /// Enable S3 Transfer Acceleration.
    #[arg(long, env, default_value_t = DEFAULT_ACCELERATE, help_heading = "AWS")]
    pub accelerate: bool,

    /// Enable requester-pays for the bucket.
    #[arg(long, env, default_value_t = DEFAULT_REQUEST_PAYER, help_heading = "AWS")]
    pub request_payer: bool,

    /// Disable stalled stream protection.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_STALLED_STREAM_PROTECTION, help_heading = "AWS")]
    pub disable_stalled_stream_protection: bool,

    // -----------------------------------------------------------------------
    // Advanced options
    // -----------------------------------------------------------------------
    /// Treat warnings as errors (exit code 1).
    #[arg(long, env, default_value_t = DEFAULT_WARN_AS_ERROR, help_heading = "Advanced")]
    pub warn_as_error: bool,

    /// Generate shell completions.
    #[arg(long, env, help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use s3thaw_rs::config::args::parse_from_args;
/// use s3thaw_rs::types::Operation;
///
/// let args = vec!["s3thaw", "status", "--bucket", "my-archive", "--work-list", "Cargo.toml"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert_eq!(cli_args.operation, Some(Operation::Status));
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if self.worker_size == 0 {
            return Err(ERROR_MESSAGE_WORKER_SIZE_ZERO.to_string());
        }
        if !(1..=S3_LIST_MAX_KEYS_LIMIT).contains(&self.max_keys) {
            return Err(ERROR_MESSAGE_MAX_KEYS_OUT_OF_RANGE.to_string());
        }
        if self.wait_timeout_secs == 0 {
            return Err(ERROR_MESSAGE_WAIT_TIMEOUT_ZERO.to_string());
        }
        if self.rate_limit_objects == Some(0) {
            return Err(ERROR_MESSAGE_RATE_LIMIT_ZERO.to_string());
        }
        if let Some(bucket) = &self.bucket {
            if bucket.contains("://") {
                return Err(ERROR_MESSAGE_BUCKET_WITH_SCHEME.to_string());
            }
        }
        Ok(())
    }

    fn build_client_config(&self) -> ClientConfig {
        let credential = if let Some(ref profile) = self.profile {
            S3Credentials::Profile(profile.clone())
        } else if let Some(ref access_key) = self.access_key {
            S3Credentials::Credentials {
                access_keys: AccessKeys {
                    access_key: access_key.clone(),
                    secret_access_key: self.secret_key.clone().unwrap_or_default(),
                    session_token: self.session_token.clone(),
                },
            }
        } else {
            S3Credentials::FromEnvironment
        };

        let request_payer = if self.request_payer {
            Some(RequestPayer::Requester)
        } else {
            None
        };

        ClientConfig {
            client_config_location: ClientConfigLocation {
                aws_config_file: self.aws_config_file.clone(),
                aws_shared_credentials_file: self.aws_shared_credentials_file.clone(),
            },
            credential,
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
            accelerate: self.accelerate,
            request_payer,
            retry_config: RetryConfig {
                aws_max_attempts: self.aws_max_attempts,
                initial_backoff_milliseconds: self.initial_backoff_milliseconds,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: self.operation_timeout_milliseconds,
                operation_attempt_timeout_milliseconds: self.operation_attempt_timeout_milliseconds,
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
                read_timeout_milliseconds: self.read_timeout_milliseconds,
            },
            disable_stalled_stream_protection: self.disable_stalled_stream_protection,
        }
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            aws_sdk_tracing: self.aws_sdk_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }

    /// The progress file base defaults to the work list path.
    fn resolve_output_file_base(&self, work_list: &Path) -> Option<PathBuf> {
        if self.no_progress_file {
            return None;
        }
        Some(
            self.output_file_base
                .clone()
                .unwrap_or_else(|| work_list.to_path_buf()),
        )
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        args.validate()?;

        let target_client_config = Some(args.build_client_config());
        let tracing_config = args.build_tracing_config();

        let (bucket, work_list) = if args.auto_complete_shell.is_some() {
            (
                args.bucket.clone().unwrap_or_default(),
                args.work_list.clone().map(PathBuf::from).unwrap_or_default(),
            )
        } else {
            let bucket = args
                .bucket
                .clone()
                .ok_or_else(|| ERROR_MESSAGE_MISSING_BUCKET.to_string())?;
            let work_list = args
                .work_list
                .clone()
                .map(PathBuf::from)
                .ok_or_else(|| ERROR_MESSAGE_MISSING_WORK_LIST.to_string())?;
            (bucket, work_list)
        };
        let output_file_base = args.resolve_output_file_base(&work_list);

        Ok(Config {
            bucket,
            operation: args.operation.unwrap_or_default(),
            work_list,
            output_file_base,
            restore_days: args.restore_days,
            restore_tier: args.restore_tier,
            show_no_progress: args.show_no_progress,
            target_client_config,
            tracing_config,
            worker_size: args.worker_size,
            warn_as_error: args.warn_as_error,
            rate_limit_objects: args.rate_limit_objects,
            max_keys: args.max_keys,
            wait_timeout_secs: args.wait_timeout_secs,
            auto_complete_shell: args.auto_complete_shell,
        })
    }
}
