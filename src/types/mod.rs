use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use zeroize_derive::{Zeroize, ZeroizeOnDrop};

use crate::types::error::S3thawError;

pub mod error;
pub mod token;

/// Path separator used by S3 keys. A key ending with it is a folder marker.
pub const KEY_SEPARATOR: char = '/';

/// Archival restore state of one object, as observed during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RestoreState {
    NotRequested,
    InProgress,
    Finished,
    Unknown,
    SkippedFolder,
}

impl RestoreState {
    pub const ALL: [RestoreState; 5] = [
        RestoreState::NotRequested,
        RestoreState::InProgress,
        RestoreState::Finished,
        RestoreState::Unknown,
        RestoreState::SkippedFolder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreState::NotRequested => "not_requested",
            RestoreState::InProgress => "in_progress",
            RestoreState::Finished => "finished",
            RestoreState::Unknown => "unknown",
            RestoreState::SkippedFolder => "skipped_folder",
        }
    }
}

impl Display for RestoreState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a run does with objects that have not been requested yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    /// Observe and report only. No restore request is ever issued.
    #[default]
    Status,
    /// Issue a restore request for every object in `NotRequested` state.
    Restore,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Status => "status",
            Operation::Restore => "restore",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = S3thawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(Operation::Status),
            "restore" => Ok(Operation::Restore),
            other => Err(S3thawError::InvalidOperation(other.to_string())),
        }
    }
}

/// Glacier retrieval tier used for restore requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RestoreTier {
    Standard,
    Bulk,
    Expedited,
}

/// One object entry of a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub key: String,
    pub storage_class: Option<String>,
}

impl ListingEntry {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            storage_class: None,
        }
    }
}

pub fn is_folder_marker(key: &str) -> bool {
    key.ends_with(KEY_SEPARATOR)
}

/// One bounded batch of entries returned by a paginated listing call.
///
/// `item_index` identifies the work item the page belongs to and `page_index`
/// its position in that item's listing order.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub item_index: usize,
    pub page_index: usize,
    pub entries: Vec<ListingEntry>,
}

/// Statistics sent through the stats channel during pipeline execution.
#[derive(Debug, PartialEq)]
pub enum RestoreStatistics {
    ObjectClassified { key: String, state: RestoreState },
    RestoreRequested { key: String },
    RestoreError { key: String },
    PageComplete { item_index: usize, page_index: usize },
    PageError { item_index: usize, page_index: usize },
}

/// AWS configuration file locations.
#[derive(Debug, Clone)]
pub struct ClientConfigLocation {
    pub aws_config_file: Option<PathBuf>,
    pub aws_shared_credentials_file: Option<PathBuf>,
}

/// AWS credential sources supported by s3thaw.
#[derive(Debug, Clone)]
pub enum S3Credentials {
    Profile(String),
    Credentials { access_keys: AccessKeys },
    FromEnvironment,
}

/// AWS access key pair.
///
/// The secret_access_key and session_token are cleared from memory
/// when this struct is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessKeys {
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Debug for AccessKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("AccessKeys");
        let session_token = self
            .session_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        keys.field("access_key", &self.access_key)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &session_token);
        keys.finish()
    }
}
