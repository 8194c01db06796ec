use anyhow::Error;
use thiserror::Error;

/// Application-level error types for s3thaw-rs.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 0: Non-error conditions (Cancelled)
/// - 1: Run-level failures (AwsSdk, Io, Listing, WaitTimeout, Pipeline)
/// - 2: Configuration errors (InvalidConfig, InvalidOperation)
/// - 3: Run completed but not every eligible object is restored yet
#[derive(Error, Debug, PartialEq)]
pub enum S3thawError {
    /// AWS SDK error.
    #[error("AWS SDK error: {0}")]
    AwsSdk(String),

    /// Configuration error (non-retryable).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation other than `status` or `restore`.
    #[error("{0} is an invalid operation. Please choose either 'restore' or 'status'")]
    InvalidOperation(String),

    /// I/O error (work list unreadable, progress file not writable).
    #[error("I/O error: {0}")]
    Io(String),

    /// Listing a work item prefix failed.
    #[error("Listing failed: {0}")]
    Listing(String),

    /// Page workers did not finish within the configured wait timeout.
    #[error("Timed out after {0} seconds waiting for page workers to finish")]
    WaitTimeout(u64),

    /// Operation cancelled by user.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// Run completed, but not all eligible objects are finished.
    #[error("Incomplete: {finished} of {eligible} objects are restored")]
    Incomplete { finished: u64, eligible: u64 },

    /// A pipeline task panicked.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl S3thawError {
    pub fn exit_code(&self) -> i32 {
        match self {
            S3thawError::Cancelled => 0,
            S3thawError::InvalidConfig(_) | S3thawError::InvalidOperation(_) => 2,
            S3thawError::Incomplete { .. } => 3,
            _ => 1,
        }
    }
}

/// Check if an anyhow::Error wraps a cancellation error.
pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<S3thawError>() {
        return *err == S3thawError::Cancelled;
    }
    false
}

/// Check if an anyhow::Error wraps a wait timeout.
pub fn is_wait_timeout_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<S3thawError>(),
        Some(S3thawError::WaitTimeout(_))
    )
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<S3thawError>() {
        return err.exit_code();
    }
    1
}
