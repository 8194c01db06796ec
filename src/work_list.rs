//! Work list reading.
//!
//! A work list is a text file with one S3 path per line. Blank lines and
//! lines starting with `#` are excluded: their prefixes are neither listed
//! nor counted.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::path::strip_bucket_prefix;
use crate::types::error::S3thawError;

pub const COMMENT_MARKER: char = '#';

/// One line of the work list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// A path to reconcile. `prefix` is the store-relative listing prefix.
    Active { raw: String, prefix: String },
    /// A blank or commented-out line.
    Excluded { raw: String },
}

impl WorkItem {
    pub fn from_line(line: &str, bucket: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER) {
            return WorkItem::Excluded {
                raw: line.to_string(),
            };
        }

        WorkItem::Active {
            raw: trimmed.to_string(),
            prefix: strip_bucket_prefix(trimmed, bucket),
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            WorkItem::Active { raw, .. } | WorkItem::Excluded { raw } => raw,
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        match self {
            WorkItem::Active { prefix, .. } => Some(prefix),
            WorkItem::Excluded { .. } => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, WorkItem::Active { .. })
    }
}

/// Parse work list text into work items, keeping line order.
pub fn parse_work_list(content: &str, bucket: &str) -> Vec<WorkItem> {
    content
        .lines()
        .map(|line| WorkItem::from_line(line, bucket))
        .collect()
}

/// Read the work list file. An unreadable file is a fatal run error.
pub fn read_work_list(path: &Path, bucket: &str) -> Result<Vec<WorkItem>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| S3thawError::Io(format!("{}: {e}", path.display())))
        .context("failed to read the work list.")?;

    let items = parse_work_list(&content, bucket);
    for item in items.iter().filter(|item| !item.is_active()) {
        if !item.raw().trim().is_empty() {
            info!(
                line = item.raw(),
                "skipping this folder since it is commented out with #."
            );
        }
    }

    Ok(items)
}
