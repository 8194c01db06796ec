//! Restore state classification.
//!
//! S3 reports the restore status of an archived object through the
//! `x-amz-restore` header returned by HeadObject:
//!
//! ```text
//! ongoing-request="true"
//! ongoing-request="false", expiry-date="Fri, 21 Dec 2012 00:00:00 GMT"
//! ```
//!
//! The header is absent when no restore has ever been requested.
//! [`RestoreDescriptor::parse`] turns the raw header into a typed value and
//! [`classify`] maps it, together with the key, to a [`RestoreState`].

use chrono::{DateTime, Utc};

use crate::types::{RestoreState, is_folder_marker};

const ONGOING_REQUEST_FIELD: &str = "ongoing-request";
const EXPIRY_DATE_FIELD: &str = "expiry-date";

pub const NOTE_FOLDER_SKIPPED: &str = "folder, skipped";
pub const NOTE_RESTORE_REQUEST_FAILED: &str = "restore request failed";
pub const NOTE_RESTORE_REQUESTED: &str = "restore requested";

/// Parsed form of an `x-amz-restore` descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreDescriptor {
    /// `ongoing-request="true"`.
    Ongoing,
    /// `ongoing-request="false"`, with the expiry date when it could be parsed.
    Completed { expiry: Option<DateTime<Utc>> },
    /// Anything that could not be understood. Holds the raw text.
    Unrecognized(String),
}

impl RestoreDescriptor {
    pub fn parse(raw: &str) -> Self {
        match quoted_field(raw, ONGOING_REQUEST_FIELD) {
            Some(value) if value.eq_ignore_ascii_case("true") => RestoreDescriptor::Ongoing,
            Some(value) if value.eq_ignore_ascii_case("false") => RestoreDescriptor::Completed {
                expiry: quoted_field(raw, EXPIRY_DATE_FIELD).and_then(parse_expiry_date),
            },
            _ => RestoreDescriptor::Unrecognized(raw.to_string()),
        }
    }
}

/// Find `name="value"` in `raw` and return `value`.
fn quoted_field<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    let mut search_from = 0;
    while let Some(offset) = raw[search_from..].find(name) {
        let start = search_from + offset;
        search_from = start + name.len();

        // Must be a whole field name, not the tail of another one.
        let preceded_ok = raw[..start]
            .chars()
            .next_back()
            .is_none_or(|c| c == ',' || c.is_whitespace());
        if !preceded_ok {
            continue;
        }

        let rest = raw[search_from..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let Some(rest) = rest.trim_start().strip_prefix('"') else {
            continue;
        };
        return rest.find('"').map(|end| &rest[..end]);
    }
    None
}

fn parse_expiry_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .or_else(|_| DateTime::parse_from_rfc3339(value.trim()))
        .map(|date| date.with_timezone(&Utc))
        .ok()
}

/// Final state of one key plus an optional diagnostic note.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub state: RestoreState,
    pub note: Option<String>,
}

impl Classification {
    pub fn new(state: RestoreState, note: Option<String>) -> Self {
        Self { state, note }
    }

    /// The restore status could not be read at all (HeadObject failed).
    pub fn fetch_failed(error: &anyhow::Error) -> Self {
        Self {
            state: RestoreState::Unknown,
            note: Some(format!("failed to read restore status: {error:#}")),
        }
    }

    /// Append a note, keeping any note already present.
    pub fn with_note(mut self, note: String) -> Self {
        self.note = Some(match self.note.take() {
            Some(existing) => format!("{note}; {existing}"),
            None => note,
        });
        self
    }
}

/// Classify one object.
///
/// `descriptor` is the raw `x-amz-restore` value, `None` when the header was
/// absent. `restore_requested` is true when a restore request was issued for
/// this key earlier in the same run, which changes the notes but never the
/// state.
///
/// Folder markers are checked before anything else, and an absent descriptor
/// is distinct from one that fails to parse.
pub fn classify(key: &str, descriptor: Option<&str>, restore_requested: bool) -> Classification {
    if is_folder_marker(key) {
        return Classification::new(
            RestoreState::SkippedFolder,
            Some(NOTE_FOLDER_SKIPPED.to_string()),
        );
    }

    let Some(raw) = descriptor else {
        let note = restore_requested.then(|| NOTE_RESTORE_REQUEST_FAILED.to_string());
        return Classification::new(RestoreState::NotRequested, note);
    };

    match RestoreDescriptor::parse(raw) {
        RestoreDescriptor::Ongoing => {
            let note = restore_requested.then(|| NOTE_RESTORE_REQUESTED.to_string());
            Classification::new(RestoreState::InProgress, note)
        }
        RestoreDescriptor::Completed { expiry } => {
            let note = match expiry {
                Some(expiry) => format!("already finished, expires {}", expiry.format("%Y-%m-%d")),
                None => "already finished".to_string(),
            };
            Classification::new(RestoreState::Finished, Some(note))
        }
        RestoreDescriptor::Unrecognized(raw) => Classification::new(
            RestoreState::Unknown,
            Some(format!("unknown restore status ({raw})")),
        ),
    }
}
